use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use sitekit_api::{SiteId, UserId};

fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info,sitekit=debug")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// List every block type with its fields.
    Types { json: bool },
    /// Check content against a block type's rules.
    Validate { block_type: String, content: String },
    /// Print the block outline of one page, post or product.
    Preview { slug: String },
    /// Create a snapshot with one site and a starter home page.
    Init,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub snapshot: Option<PathBuf>,
    pub user: Option<UserId>,
    pub site: Option<SiteId>,
    pub command: Command,
}

fn print_help() {
    eprintln!("Usage: sitekit [OPTIONS] <COMMAND>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  types [--json]               List block types and their fields");
    eprintln!("  validate TYPE JSON|@FILE     Validate block content");
    eprintln!("  preview SLUG                 Show the blocks of a page, post or product");
    eprintln!("  init                         Write a starter snapshot");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --snapshot PATH              Store snapshot file (preview, init)");
    eprintln!("  --user ID                    Acting user id (preview)");
    eprintln!("  --site ID                    Selected site id (preview)");
    eprintln!("  --help, -h                   Show this help message");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG                     Log filter (default: info,sitekit=debug)");
    eprintln!("  SITEKIT_STATUS_TTL_MS        How long save status messages stay visible");
    eprintln!("  SITEKIT_MAX_BLOCKS           Maximum blocks per page, post or product");
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Option<Config>> {
    let mut args = args.into_iter();
    let mut snapshot = None;
    let mut user = None;
    let mut site = None;
    let mut positional = Vec::new();
    let mut json = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--snapshot" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--snapshot requires a path argument"))?;
                snapshot = Some(PathBuf::from(path));
            }
            "--user" => {
                let raw = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--user requires an id argument"))?;
                user = Some(UserId::parse(&raw)?);
            }
            "--site" => {
                let raw = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--site requires an id argument"))?;
                site = Some(SiteId::parse(&raw)?);
            }
            "--json" => json = true,
            "--help" | "-h" => return Ok(None),
            other if other.starts_with("--") => {
                anyhow::bail!("Unknown option '{}'", other);
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("types") => Command::Types { json },
        Some("validate") => {
            let block_type = positional
                .next()
                .ok_or_else(|| anyhow::anyhow!("validate requires a block type"))?;
            let content = positional.next().unwrap_or_else(|| "{}".to_string());
            Command::Validate {
                block_type,
                content,
            }
        }
        Some("preview") => {
            let slug = positional
                .next()
                .ok_or_else(|| anyhow::anyhow!("preview requires a slug"))?;
            Command::Preview { slug }
        }
        Some("init") => Command::Init,
        Some(other) => anyhow::bail!("Unknown command '{}'", other),
        None => return Ok(None),
    };
    if let Some(extra) = positional.next() {
        anyhow::bail!("Unexpected argument '{}'", extra);
    }

    Ok(Some(Config {
        snapshot,
        user,
        site,
        command,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(config) = parse_args(std::env::args().skip(1))? else {
        print_help();
        return Ok(());
    };

    let log_level = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter());
    tracing_subscriber::registry()
        .with(log_level)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    match commands::run(config).await? {
        true => Ok(()),
        false => std::process::exit(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn parses_options_in_any_position() {
        let user = UserId::new();
        let config = parse_args(args(&format!(
            "preview home --snapshot store.json --user {}",
            user
        )))
        .unwrap()
        .unwrap();

        assert_eq!(config.command, Command::Preview { slug: "home".to_string() });
        assert_eq!(config.snapshot, Some(PathBuf::from("store.json")));
        assert_eq!(config.user, Some(user));
        assert_eq!(config.site, None);
    }

    #[test]
    fn validate_defaults_to_empty_content() {
        let config = parse_args(args("validate hero")).unwrap().unwrap();
        assert_eq!(
            config.command,
            Command::Validate {
                block_type: "hero".to_string(),
                content: "{}".to_string(),
            }
        );
    }

    #[test]
    fn no_command_means_help() {
        assert!(parse_args(args("")).unwrap().is_none());
        assert!(parse_args(args("types --help")).unwrap().is_none());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(args("publish")).is_err());
        assert!(parse_args(args("types --verbose")).is_err());
        assert!(parse_args(args("preview")).is_err());
        assert!(parse_args(args("types --user nope")).is_err());
        assert!(parse_args(args("types extra")).is_err());
    }
}
