use std::time::Duration;
use tracing::warn;

/// Builder settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuilderConfig {
    /// How long "Saved!" / "Error: ..." stay visible (default: 3s)
    pub status_ttl: Duration,
    /// Maximum number of blocks on one page, post or product (default: 200)
    pub max_blocks_per_parent: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            status_ttl: Duration::from_secs(3),
            max_blocks_per_parent: 200,
        }
    }
}

impl BuilderConfig {
    /// Defaults overridden by `SITEKIT_STATUS_TTL_MS` and `SITEKIT_MAX_BLOCKS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_number("SITEKIT_STATUS_TTL_MS") {
            config.status_ttl = Duration::from_millis(ms);
        }
        if let Some(max) = env_number("SITEKIT_MAX_BLOCKS") {
            config.max_blocks_per_parent = max as usize;
        }
        config
    }
}

fn env_number(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("[BuilderConfig] Ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        std::env::set_var("SITEKIT_STATUS_TTL_MS", "1500");
        std::env::set_var("SITEKIT_MAX_BLOCKS", "12");
        let config = BuilderConfig::from_env();
        std::env::remove_var("SITEKIT_STATUS_TTL_MS");
        std::env::remove_var("SITEKIT_MAX_BLOCKS");

        assert_eq!(config.status_ttl, Duration::from_millis(1500));
        assert_eq!(config.max_blocks_per_parent, 12);
    }

    #[test]
    #[serial]
    fn bad_env_values_fall_back() {
        std::env::set_var("SITEKIT_MAX_BLOCKS", "lots");
        let config = BuilderConfig::from_env();
        std::env::remove_var("SITEKIT_MAX_BLOCKS");

        assert_eq!(config, BuilderConfig::default());
    }
}
