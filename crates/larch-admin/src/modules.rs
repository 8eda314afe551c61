//! Built-in modules

use crate::dashboard::{DashboardProvider, TranslationQueueWidget};
use crate::module::{Module, ModuleContext, ModuleManifest};
use async_trait::async_trait;
use larch_features::keys;
use larch_panel::{MenuItem, MenuTarget, PanelRegistry};
use larch_translation::register_queue_commands;
use larch_types::{AdminContext, AdminResult};
use serde_json::{json, Value};
use std::sync::Arc;

fn url(modules_base: &str, path: &str) -> MenuTarget {
    MenuTarget::url(format!("{modules_base}{path}"))
}

/// Panel overview widget and the dashboard navigation entry
pub struct DashboardModule {
    manifest: ModuleManifest,
    base: String,
    permission: String,
}

impl DashboardModule {
    pub fn new(base: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            manifest: ModuleManifest::new("dashboard").with_feature(keys::DASHBOARD),
            base: base.into(),
            permission: permission.into(),
        }
    }
}

#[async_trait]
impl Module for DashboardModule {
    fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    async fn register(&self, _ctx: &AdminContext, modules: &ModuleContext) -> AdminResult<()> {
        modules
            .dashboard
            .register(Arc::new(PanelOverview {
                registry: modules.registry.clone(),
            }))
            .await
    }

    fn menu_items(&self, _locale: &str) -> Vec<MenuItem> {
        vec![MenuItem::new("", "Dashboard", url(&self.base, ""))
            .with_position(0)
            .with_permission(self.permission.clone())]
    }
}

/// Panels the actor can view
struct PanelOverview {
    registry: Arc<PanelRegistry>,
}

#[async_trait]
impl DashboardProvider for PanelOverview {
    fn code(&self) -> &str {
        "panels"
    }

    fn title(&self) -> &str {
        "Panels"
    }

    async fn render(&self, ctx: &AdminContext) -> AdminResult<Value> {
        let mut visible = Vec::new();
        for panel in self.registry.list().await {
            if panel.can_view(ctx).await {
                visible.push(json!({ "name": panel.name(), "label": panel.label() }));
            }
        }
        Ok(json!({ "count": visible.len(), "panels": visible }))
    }
}

/// Binds the workflow engine to the persisted active workflows
pub struct WorkflowsModule {
    manifest: ModuleManifest,
    base: String,
    permission: String,
}

impl WorkflowsModule {
    pub fn new(base: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            manifest: ModuleManifest::new("workflows").with_feature(keys::WORKFLOWS),
            base: base.into(),
            permission: permission.into(),
        }
    }
}

#[async_trait]
impl Module for WorkflowsModule {
    fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    async fn register(&self, ctx: &AdminContext, modules: &ModuleContext) -> AdminResult<()> {
        modules
            .workflows
            .bind_workflow_engine(ctx, modules.registrar.clone())
            .await
            .map(|_| ())
    }

    fn menu_items(&self, _locale: &str) -> Vec<MenuItem> {
        vec![MenuItem::new("", "Workflows", url(&self.base, "/workflows"))
            .with_position(80)
            .with_permission(self.permission.clone())]
    }
}

/// Queue commands plus the queue dashboard widget
pub struct TranslationQueueModule {
    manifest: ModuleManifest,
    base: String,
    permission: String,
}

impl TranslationQueueModule {
    pub fn new(base: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            manifest: ModuleManifest::new("translation_queue").with_feature(keys::TRANSLATION_QUEUE),
            base: base.into(),
            permission: permission.into(),
        }
    }
}

#[async_trait]
impl Module for TranslationQueueModule {
    fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    async fn register(&self, _ctx: &AdminContext, modules: &ModuleContext) -> AdminResult<()> {
        register_queue_commands(&modules.commands, modules.queue.clone()).await?;
        modules
            .dashboard
            .register(Arc::new(TranslationQueueWidget::new(
                modules.queue.clone(),
                self.permission.clone(),
            )))
            .await
    }

    fn menu_items(&self, _locale: &str) -> Vec<MenuItem> {
        vec![MenuItem::new("", "Translations", url(&self.base, "/translations"))
            .with_position(90)
            .with_permission(self.permission.clone())]
    }
}

/// Exposes a panel for every stored content type
pub struct CmsModule {
    manifest: ModuleManifest,
}

impl CmsModule {
    pub fn new() -> Self {
        Self {
            manifest: ModuleManifest::new("cms").with_feature(keys::CMS),
        }
    }
}

impl Default for CmsModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for CmsModule {
    fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    async fn register(&self, ctx: &AdminContext, modules: &ModuleContext) -> AdminResult<()> {
        let exposed = modules
            .factory
            .reconcile_all(ctx, modules.content_types.as_ref())
            .await?;
        tracing::info!(panels = exposed, "Content type panels reconciled");
        Ok(())
    }
}
