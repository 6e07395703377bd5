//! Transient save status shown next to the save button.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved { at: Instant },
    Failed { message: String, at: Instant },
}

impl SaveStatus {
    pub fn saved() -> Self {
        SaveStatus::Saved { at: Instant::now() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        SaveStatus::Failed {
            message: message.into(),
            at: Instant::now(),
        }
    }

    /// Text to display, or `None` once a finished save is older than `ttl`.
    pub fn message(&self, ttl: Duration) -> Option<String> {
        match self {
            SaveStatus::Idle => None,
            SaveStatus::Saving => Some("Saving...".to_string()),
            SaveStatus::Saved { at } => (at.elapsed() < ttl).then(|| "Saved!".to_string()),
            SaveStatus::Failed { message, at } => {
                (at.elapsed() < ttl).then(|| format!("Error: {}", message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saving_never_expires() {
        assert_eq!(
            SaveStatus::Saving.message(Duration::ZERO),
            Some("Saving...".to_string())
        );
    }

    #[test]
    fn finished_messages_expire() {
        let long = Duration::from_secs(60);
        assert_eq!(SaveStatus::saved().message(long), Some("Saved!".to_string()));
        assert_eq!(SaveStatus::saved().message(Duration::ZERO), None);
        assert_eq!(
            SaveStatus::failed("boom").message(long),
            Some("Error: boom".to_string())
        );
        assert_eq!(SaveStatus::Idle.message(long), None);
    }
}
