//! End-to-end editing scenarios: builder on top of the in-memory gateway.

use std::sync::Arc;

use serde_json::json;
use sitekit_api::{BlockContent, BlockId, BlockType, FieldDeltas, ParentKind, UserId};
use sitekit_core::{BlockBuilder, BlockGateway, BuilderError, SchemaRegistry, SessionContext};
use sitekit_store::MemoryGateway;

struct Fixture {
    gateway: Arc<MemoryGateway>,
    session: SessionContext,
    builder: BlockBuilder,
}

async fn fixture() -> Fixture {
    let registry = Arc::new(SchemaRegistry::builtin());
    let gateway = Arc::new(MemoryGateway::new(registry.clone()));
    let user = UserId::new();
    let site = gateway.create_site(user, "Bakery").await;
    let session = SessionContext::new(user, site);
    let builder = BlockBuilder::new(registry, gateway.clone(), session);
    Fixture {
        gateway,
        session,
        builder,
    }
}

fn ids(blocks: &[sitekit_api::Block]) -> Vec<String> {
    blocks.iter().map(|b| b.id.to_string()).collect()
}

#[tokio::test]
async fn add_then_save_persists_default_rich_text() {
    let f = fixture().await;
    let page = f
        .gateway
        .create_parent(&f.session, ParentKind::Page, "Home")
        .await
        .unwrap()
        .to_string();
    f.builder.load("home", &page).await.unwrap();
    assert!(f.builder.visible_blocks("home").is_empty());

    f.builder
        .add_block("home", "rich-text", &FieldDeltas::new())
        .unwrap();
    f.builder.save("home", &page).await.unwrap();

    let stored = f.gateway.load_blocks(&f.session, &page).await.unwrap();
    assert_eq!(stored.len(), 1);
    let block = stored.iter().next().unwrap();
    assert_eq!(block.block_type(), BlockType::RichText);
    assert_eq!(block.content, BlockContent::default_for(BlockType::RichText));
    assert_eq!(block.display_order, 0);
}

#[tokio::test]
async fn stage_delete_then_cancel_keeps_everything() {
    let f = fixture().await;
    let page = f
        .gateway
        .create_parent(&f.session, ParentKind::Page, "Home")
        .await
        .unwrap()
        .to_string();
    f.builder.load("home", &page).await.unwrap();
    let a = f.builder.add_block("home", "hero", &FieldDeltas::new()).unwrap();
    let b = f.builder.add_block("home", "faq", &FieldDeltas::new()).unwrap();
    f.builder.save("home", &page).await.unwrap();

    f.builder.stage_delete(a.id.as_str()).unwrap();

    assert_eq!(ids(&f.builder.visible_blocks("home")), vec![b.id.to_string()]);
    assert_eq!(
        ids(&f.builder.all_blocks("home")),
        vec![a.id.to_string(), b.id.to_string()]
    );
    assert_eq!(f.gateway.load_blocks(&f.session, &page).await.unwrap().len(), 2);

    f.builder.unstage_delete(a.id.as_str());
    assert_eq!(f.builder.visible_blocks("home").len(), 2);
}

#[tokio::test]
async fn staged_deletion_is_removed_on_save_only() {
    let f = fixture().await;
    let post = f
        .gateway
        .create_parent(&f.session, ParentKind::Post, "First Post")
        .await
        .unwrap()
        .to_string();
    let loaded = f.builder.load("first-post", &post).await.unwrap();
    let scaffold = loaded[0].id.clone();
    f.builder
        .add_block("first-post", "call-to-action", &FieldDeltas::new())
        .unwrap();

    f.builder.stage_delete(scaffold.as_str()).unwrap();
    assert_eq!(f.builder.all_blocks("first-post").len(), 2);

    f.builder.save("first-post", &post).await.unwrap();
    let stored = f.gateway.load_blocks(&f.session, &post).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored.contains(scaffold.as_str()));
    assert_eq!(f.builder.all_blocks("first-post").len(), 1);
}

#[tokio::test]
async fn failed_save_can_be_retried() {
    let f = fixture().await;
    let post = f
        .gateway
        .create_parent(&f.session, ParentKind::Post, "Draft")
        .await
        .unwrap()
        .to_string();
    let loaded = f.builder.load("draft", &post).await.unwrap();
    f.builder.stage_delete(loaded[0].id.as_str()).unwrap();

    f.gateway.fail_next();
    let err = f.builder.save("draft", &post).await.unwrap_err();
    assert_eq!(
        err.user_message(),
        "replace_blocks failed: injected failure"
    );
    assert_eq!(f.builder.pending_deletions().len(), 1);
    assert_eq!(f.gateway.load_blocks(&f.session, &post).await.unwrap().len(), 1);

    f.builder.save("draft", &post).await.unwrap();
    assert!(f.builder.pending_deletions().is_empty());
    assert!(f.gateway.load_blocks(&f.session, &post).await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_content_is_rejected_by_the_gateway() {
    let f = fixture().await;
    let page = f
        .gateway
        .create_parent(&f.session, ParentKind::Page, "Landing")
        .await
        .unwrap()
        .to_string();
    f.builder.load("landing", &page).await.unwrap();
    let cta = f
        .builder
        .add_block("landing", "call-to-action", &FieldDeltas::new())
        .unwrap();

    let mut deltas = FieldDeltas::new();
    deltas.insert("buttonUrl".to_string(), json!("not a url"));
    f.builder.update_content(cta.id.as_str(), &deltas).unwrap();

    let err = f.builder.save("landing", &page).await.unwrap_err();
    assert_eq!(
        err,
        BuilderError::Validation(vec![format!("{}: Button URL must be a valid URL", cta.id)])
    );
    assert!(!err.is_fatal());
    assert!(f.gateway.load_blocks(&f.session, &page).await.unwrap().is_empty());
}

#[tokio::test]
async fn unauthorized_replace_changes_nothing() {
    let f = fixture().await;
    let page = f
        .gateway
        .create_parent(&f.session, ParentKind::Page, "Home")
        .await
        .unwrap()
        .to_string();
    f.builder.load("home", &page).await.unwrap();
    f.builder.add_block("home", "hero", &FieldDeltas::new()).unwrap();
    f.builder.save("home", &page).await.unwrap();
    let before = f.gateway.snapshot().await;

    let intruder = SessionContext::new(UserId::new(), f.session.site_id);
    let err = f
        .gateway
        .replace_blocks(&intruder, &page, Default::default())
        .await
        .unwrap_err();
    assert_eq!(err, sitekit_core::GatewayError::AccessDenied);
    assert_eq!(f.gateway.snapshot().await, before);

    let other = BlockBuilder::new(
        Arc::new(SchemaRegistry::builtin()),
        f.gateway.clone(),
        intruder,
    );
    let denied = other.load("home", &page).await.unwrap_err();
    assert!(denied.is_fatal());
    assert_eq!(denied.user_message(), sitekit_core::NOT_AVAILABLE_MESSAGE);
}

#[tokio::test]
async fn second_save_without_edits_writes_nothing() {
    let f = fixture().await;
    let page = f
        .gateway
        .create_parent(&f.session, ParentKind::Page, "Home")
        .await
        .unwrap()
        .to_string();
    f.builder.load("home", &page).await.unwrap();
    f.builder.add_block("home", "gallery", &FieldDeltas::new()).unwrap();

    let first = f.builder.save("home", &page).await.unwrap();
    let stored = f.gateway.snapshot().await;
    let second = f.builder.save("home", &page).await.unwrap();

    assert_eq!(first.written, 1);
    assert!(second.is_noop());
    assert_eq!(f.gateway.snapshot().await, stored);
    assert_eq!(f.builder.status(), Some("Saved!".to_string()));
}

#[tokio::test]
async fn rename_follows_the_parent_to_its_new_slug() {
    let f = fixture().await;
    let page = f
        .gateway
        .create_parent(&f.session, ParentKind::Page, "About")
        .await
        .unwrap()
        .to_string();
    f.builder.load("about", &page).await.unwrap();
    f.builder.add_block("about", "navigation", &FieldDeltas::new()).unwrap();
    f.builder.add_block("about", "testimonials", &FieldDeltas::new()).unwrap();
    let before = f.builder.all_blocks("about");

    let new_slug = f
        .gateway
        .rename_parent(&f.session, &page, "About the Team")
        .await
        .unwrap();
    f.builder.rename_parent("about", &new_slug).unwrap();

    assert_eq!(new_slug, "about-the-team");
    assert_eq!(f.builder.all_blocks(&new_slug), before);
    assert!(f.builder.all_blocks("about").is_empty());

    f.builder.save(&new_slug, &page).await.unwrap();
    assert_eq!(f.gateway.load_blocks(&f.session, &page).await.unwrap().len(), 2);
}

#[tokio::test]
async fn reorder_is_persisted_with_dense_display_order() {
    let f = fixture().await;
    let page = f
        .gateway
        .create_parent(&f.session, ParentKind::Page, "Pricing")
        .await
        .unwrap()
        .to_string();
    f.builder.load("pricing", &page).await.unwrap();
    let nav = f.builder.add_block("pricing", "navigation", &FieldDeltas::new()).unwrap();
    let footer = f.builder.add_block("pricing", "footer", &FieldDeltas::new()).unwrap();
    let plans = f.builder.add_block("pricing", "pricing", &FieldDeltas::new()).unwrap();
    let faq = f.builder.add_block("pricing", "faq", &FieldDeltas::new()).unwrap();

    let order: Vec<BlockId> = vec![nav.id, faq.id.clone(), plans.id.clone(), footer.id];
    let visible = f.builder.reorder("pricing", &order).unwrap();
    assert_eq!(visible.iter().map(|b| b.id.clone()).collect::<Vec<_>>(), order);

    f.builder.save("pricing", &page).await.unwrap();
    let stored = f.gateway.load_blocks(&f.session, &page).await.unwrap();
    let persisted: Vec<BlockId> = stored.into_ordered().into_iter().map(|b| b.id).collect();
    assert_eq!(persisted, order);
    assert_eq!(
        f.gateway
            .load_blocks(&f.session, &page)
            .await
            .unwrap()
            .get(faq.id.as_str())
            .unwrap()
            .display_order,
        1
    );
}
