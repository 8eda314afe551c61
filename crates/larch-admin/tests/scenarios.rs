//! End-to-end scenarios across the admin crates

use async_trait::async_trait;
use larch_admin::{Admin, AdminConfig, Dependencies, Module, ModuleContext, ModuleManifest};
use larch_features::keys;
use larch_panel::{
    ActionRequest, ContentType, ContentTypeListener, ContentTypeService, ContentTypeStatus,
    InMemoryContentTypeService, InMemoryRepository, MenuItem, MenuTarget, PanelBuilder,
};
use larch_types::{AdminContext, AdminError, AdminResult, ErrorCategory, Record};
use larch_workflow::{
    BindingQuery, NewBinding, NewWorkflow, ScopeType, TranslationPolicy, TranslationPolicyInput,
    WorkflowDefinition, WorkflowStatus, WorkflowTransition, WorkflowUpdate,
};
use serde_json::json;
use std::sync::Arc;

fn editorial_definition() -> WorkflowDefinition {
    WorkflowDefinition::new("draft").with_transition(WorkflowTransition::new("publish", "draft", "published"))
}

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

async fn create_active_workflows(admin: &Admin, ids: &[&str]) {
    let ctx = AdminContext::system();
    for id in ids {
        admin
            .workflows()
            .create_workflow(
                &ctx,
                NewWorkflow {
                    id: Some((*id).into()),
                    name: (*id).into(),
                    status: Some(WorkflowStatus::Active),
                    environment: None,
                    definition: editorial_definition(),
                },
            )
            .await
            .unwrap();
    }
}

async fn loaded_admin(config: AdminConfig, deps: Dependencies) -> Admin {
    let admin = Admin::new(config, deps).await.unwrap();
    admin.load(&AdminContext::system()).await.unwrap();
    admin
}

#[tokio::test]
async fn dynamic_panel_from_content_type() {
    let content_types = Arc::new(InMemoryContentTypeService::new());
    let deps = Dependencies::default().with_content_types(content_types.clone());
    let admin = loaded_admin(AdminConfig::default(), deps).await;
    let listener: Arc<dyn ContentTypeListener> = admin.panel_factory().clone();
    content_types.subscribe(listener).await;

    let ctx = AdminContext::system();
    let page = ContentType::new("page", json!({ "type": "object", "properties": { "title": { "type": "string" } } }))
        .with_id("ct-page")
        .with_status(ContentTypeStatus::Active)
        .with_capability("panel_slug", "pages")
        .with_capability("permissions", "admin.pages");
    content_types.create(&ctx, page.clone()).await.unwrap();

    let panel = admin.registry().require("pages").await.unwrap();
    let permissions = panel.permissions();
    assert_eq!(permissions.view, "admin.pages.view");
    assert_eq!(permissions.create, "admin.pages.create");
    assert_eq!(permissions.edit, "admin.pages.edit");
    assert_eq!(permissions.delete, "admin.pages.delete");

    // A second reconciliation leaves one navigation entry for the panel
    admin.panel_factory().create_panel_from_content_type(&ctx, &page).await.unwrap();
    let items = admin.navigation(&AdminContext::new(), "admin").await.unwrap();
    let page_items = items
        .iter()
        .filter(|item| item.target.panel_key.as_deref() == Some("pages"))
        .count();
    assert_eq!(page_items, 1);
}

#[tokio::test]
async fn workflow_rollback_restores_revision() {
    let admin = loaded_admin(AdminConfig::default(), Dependencies::default()).await;
    let ctx = AdminContext::system();
    let workflows = admin.workflows();

    let created = workflows
        .create_workflow(
            &ctx,
            NewWorkflow {
                id: Some("editorial.default".into()),
                name: "Editorial Default".into(),
                status: Some(WorkflowStatus::Draft),
                environment: None,
                definition: editorial_definition(),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.version, 1);

    let updated = workflows
        .update_workflow(
            &ctx,
            "editorial.default",
            WorkflowUpdate {
                name: Some("Editorial Default v2".into()),
                status: Some(WorkflowStatus::Active),
                ..Default::default()
            },
            1,
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    let rolled_back = workflows.rollback_workflow(&ctx, "editorial.default", 1, 2).await.unwrap();
    assert_eq!(rolled_back.name, "Editorial Default");
    assert_eq!(rolled_back.status, WorkflowStatus::Draft);
    assert_eq!(rolled_back.version, 3);

    let revisions = workflows.list_revisions(&ctx, "editorial.default").await.unwrap();
    let versions: Vec<u64> = revisions.iter().map(|r| r.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
}

#[tokio::test]
async fn binding_conflict_names_existing_binding() {
    let admin = loaded_admin(AdminConfig::default(), Dependencies::default()).await;
    create_active_workflows(&admin, &["editorial.default", "editorial.alternate"]).await;
    let ctx = AdminContext::system();

    let first = admin
        .workflows()
        .create_binding(
            &ctx,
            NewBinding::new(ScopeType::Trait, "editorial", "editorial.default").with_priority(10),
        )
        .await
        .unwrap();

    let err = admin
        .workflows()
        .create_binding(
            &ctx,
            NewBinding::new(ScopeType::Trait, "editorial", "editorial.alternate").with_priority(10),
        )
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
    assert_eq!(err.text_code(), "BINDING_CONFLICT");
    assert_eq!(err.metadata()["existing_binding_id"], json!(first.id));
}

#[tokio::test]
async fn binding_precedence_falls_back_by_tier() {
    let admin = loaded_admin(AdminConfig::default(), Dependencies::default()).await;
    create_active_workflows(&admin, &["w_global", "w_trait", "w_news"]).await;
    let ctx = AdminContext::system();
    let workflows = admin.workflows();

    workflows
        .create_binding(&ctx, NewBinding::global("w_global").with_priority(100))
        .await
        .unwrap();
    let trait_binding = workflows
        .create_binding(&ctx, NewBinding::new(ScopeType::Trait, "editorial", "w_trait").with_priority(50))
        .await
        .unwrap();
    let news_binding = workflows
        .create_binding(&ctx, NewBinding::new(ScopeType::ContentType, "news", "w_news").with_priority(10))
        .await
        .unwrap();

    let query = BindingQuery::new("news").with_traits(["editorial"]);
    let resolved = |found: Option<larch_workflow::ResolvedBinding>| found.map(|b| b.workflow_id);

    assert_eq!(
        resolved(workflows.resolve_binding(&ctx, &query).await.unwrap()).as_deref(),
        Some("w_news")
    );

    workflows.delete_binding(&ctx, &news_binding.id).await.unwrap();
    assert_eq!(
        resolved(workflows.resolve_binding(&ctx, &query).await.unwrap()).as_deref(),
        Some("w_trait")
    );

    workflows.delete_binding(&ctx, &trait_binding.id).await.unwrap();
    assert_eq!(
        resolved(workflows.resolve_binding(&ctx, &query).await.unwrap()).as_deref(),
        Some("w_global")
    );
}

/// Reports `es` missing for every publish
struct SpanishRequired;

#[async_trait]
impl TranslationPolicy for SpanishRequired {
    async fn apply(&self, _ctx: &AdminContext, input: &TranslationPolicyInput) -> AdminResult<()> {
        if input.transition != "publish" {
            return Ok(());
        }
        Err(AdminError::MissingTranslations {
            entity_type: input.entity_type.clone(),
            entity_id: input.entity_id.clone(),
            transition: input.transition.clone(),
            environment: input.environment.clone(),
            requested_locale: input.requested_locale.clone(),
            missing_locales: vec!["es".into()],
        })
    }
}

#[tokio::test]
async fn translation_policy_blocks_publish() {
    let deps = Dependencies::default().with_translation_policy(Arc::new(SpanishRequired));
    let admin = loaded_admin(AdminConfig::default(), deps).await;
    let ctx = AdminContext::system();

    admin
        .workflows()
        .create_workflow(
            &ctx,
            NewWorkflow {
                id: Some("editorial.default".into()),
                name: "Editorial Default".into(),
                status: Some(WorkflowStatus::Active),
                environment: None,
                definition: editorial_definition(),
            },
        )
        .await
        .unwrap();

    let page = ContentType::new("page", json!({ "type": "object" }))
        .with_id("ct-page")
        .with_status(ContentTypeStatus::Active)
        .with_capability("panel_slug", "pages")
        .with_capability("workflow_id", "editorial.default");
    let panel = admin
        .panel_factory()
        .create_panel_from_content_type(&ctx, &page)
        .await
        .unwrap()
        .unwrap();
    assert!(panel.workflow().is_some());

    panel
        .create(&ctx, record(json!({ "id": "page_123", "status": "draft" })))
        .await
        .unwrap();

    let request_ctx = AdminContext::system().with_locale("en").with_environment("production");
    let err = panel
        .run_action(
            &request_ctx,
            "publish",
            ActionRequest {
                ids: vec!["page_123".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.text_code(), "TRANSLATION_MISSING");
    assert_eq!(err.metadata()["missing_locales"], json!(["es"]));

    let metrics = admin.policy().metrics();
    assert_eq!(metrics.blocked_count("pages", "publish", "en", "production"), 1);

    // The record keeps its state
    let stored = panel.get(&ctx, "page_123").await.unwrap();
    assert_eq!(stored["status"], json!("draft"));
}

/// Registers a panel and a menu entry when loaded
struct ReportsModule {
    manifest: ModuleManifest,
}

#[async_trait]
impl Module for ReportsModule {
    fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    async fn register(&self, _ctx: &AdminContext, modules: &ModuleContext) -> AdminResult<()> {
        let panel = PanelBuilder::new("reports")
            .with_repository(Arc::new(InMemoryRepository::new("reports")))
            .build()?;
        modules.registry.register(panel).await?;
        Ok(())
    }

    fn menu_items(&self, _locale: &str) -> Vec<MenuItem> {
        vec![MenuItem::new("", "Reports", MenuTarget::panel("/admin/reports", "reports", "reports"))]
    }
}

#[tokio::test]
async fn disabled_feature_skips_module() {
    let mut config = AdminConfig::default();
    config.features.commands = Some(false);
    let admin = Admin::new(config, Dependencies::default()).await.unwrap();
    admin
        .register_module(Arc::new(ReportsModule {
            manifest: ModuleManifest::new("reports").with_feature(keys::COMMANDS),
        }))
        .await
        .unwrap();

    let report = admin.load(&AdminContext::system()).await.unwrap();
    let skipped = report.skipped("reports").unwrap();
    assert_eq!(skipped.text_code, "FEATURE_DISABLED");
    assert_eq!(skipped.feature, keys::COMMANDS);
    assert!(skipped.message.contains("reports"));
    assert!(!report.is_loaded("reports"));

    assert!(admin.registry().get("reports").await.is_none());
    let items = admin.navigation(&AdminContext::new(), "admin").await.unwrap();
    assert!(items.iter().all(|item| item.label != "Reports"));
}
