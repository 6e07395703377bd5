use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use sitekit_api::{FieldDeltas, ParentKind, UserId};
use sitekit_core::{
    render_outline, BlockBuilder, BlockDefinition, BuilderConfig, SchemaRegistry, SessionContext,
};
use sitekit_store::MemoryGateway;

use crate::{Command, Config};

/// Run one command. `Ok(false)` means the command ran but reported a
/// failure (e.g. invalid content).
pub async fn run(config: Config) -> Result<bool> {
    let registry = Arc::new(SchemaRegistry::builtin());
    match config.command {
        Command::Types { json } => {
            let definitions: Vec<&BlockDefinition> = registry.definitions().collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&definitions)?);
            } else {
                print!("{}", describe_types(&definitions));
            }
            Ok(true)
        }
        Command::Validate {
            block_type,
            content,
        } => {
            let content = read_content(&content).await?;
            let report = registry.validate(&block_type, &content);
            if report.valid {
                println!("valid");
            } else {
                for error in &report.errors {
                    println!("{}", error);
                }
            }
            Ok(report.valid)
        }
        Command::Preview { slug } => {
            let path = config
                .snapshot
                .context("preview needs --snapshot PATH")?;
            let user = config.user.context("preview needs --user ID")?;
            let site = config.site.context("preview needs --site ID")?;
            let outline = preview(registry, &path, SessionContext::new(user, site), &slug).await?;
            print!("{}", outline);
            Ok(true)
        }
        Command::Init => {
            let path = config.snapshot.context("init needs --snapshot PATH")?;
            let session = init(registry, &path).await?;
            println!("user: {}", session.user_id);
            println!("site: {}", session.site_id);
            println!(
                "try:  sitekit preview home --snapshot {} --user {} --site {}",
                path.display(),
                session.user_id,
                session.site_id
            );
            Ok(true)
        }
    }
}

fn describe_types(definitions: &[&BlockDefinition]) -> String {
    let mut out = String::new();
    for definition in definitions {
        let lock = if definition.protection().is_some() { " [layout]" } else { "" };
        out.push_str(&format!(
            "{:<16} {}{}: {}\n",
            definition.block_type.as_str(),
            definition.label,
            lock,
            definition.description
        ));
        for field in &definition.fields {
            let required = if field.required { ", required" } else { "" };
            out.push_str(&format!(
                "    {:<18} {:?}{}\n",
                field.key, field.field_type, required
            ));
        }
    }
    out
}

/// Parse content given inline or as `@path`.
async fn read_content(arg: &str) -> Result<Map<String, Value>> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path))?,
        None => arg.to_string(),
    };
    match serde_json::from_str(&raw).context("Content is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Content must be a JSON object, got {}", other),
    }
}

async fn preview(
    registry: Arc<SchemaRegistry>,
    path: &Path,
    session: SessionContext,
    slug: &str,
) -> Result<String> {
    let gateway = Arc::new(MemoryGateway::load_snapshot(registry.clone(), path).await?);
    let parent = gateway
        .list_parents(&session)
        .await
        .map_err(|e| anyhow::anyhow!("{}", sitekit_core::BuilderError::from(e).user_message()))?
        .into_iter()
        .find(|p| p.slug == slug)
        .with_context(|| format!("No page, post or product with slug '{}'", slug))?;

    let builder = BlockBuilder::with_config(registry, gateway, session, BuilderConfig::from_env());
    builder
        .load(slug, &parent.id.to_string())
        .await
        .map_err(|e| anyhow::anyhow!("{}", e.user_message()))?;

    let nodes = builder.preview(slug);
    if nodes.is_empty() {
        return Ok(format!("{} '{}' has no blocks\n", parent.kind, parent.title));
    }
    Ok(format!(
        "{} '{}'\n{}",
        parent.kind,
        parent.title,
        render_outline(&nodes)
    ))
}

/// Write a snapshot holding one site with a home page of
/// navigation, hero and footer.
async fn init(registry: Arc<SchemaRegistry>, path: &Path) -> Result<SessionContext> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    let gateway = Arc::new(MemoryGateway::new(registry.clone()));
    let user = UserId::new();
    let site = gateway.create_site(user, "My Site").await;
    let session = SessionContext::new(user, site);
    let page = gateway
        .create_parent(&session, ParentKind::Page, "Home")
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create home page: {}", e))?
        .to_string();

    let builder = BlockBuilder::with_config(
        registry,
        gateway.clone(),
        session,
        BuilderConfig::from_env(),
    );
    builder.load("home", &page).await?;
    for tag in ["navigation", "hero", "footer"] {
        builder.add_block("home", tag, &FieldDeltas::new())?;
    }
    builder.save("home", &page).await?;

    gateway.save_snapshot(path).await?;
    info!("[sitekit] Wrote starter snapshot to {}", path.display());
    Ok(session)
}
