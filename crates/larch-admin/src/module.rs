//! Module loader
//!
//! Optional subsystems register themselves as [`Module`]s. Loading walks the
//! modules in registration order; a module whose declared features are not
//! all enabled is skipped with a `FEATURE_DISABLED` explanation, and so is
//! every module depending on it. Loaded modules contribute menu items that
//! are merged into the navigation menus by canonical key.

use crate::config::AdminConfig;
use crate::dashboard::Dashboard;
use async_trait::async_trait;
use larch_command::CommandBus;
use larch_features::{is_enabled, FeatureGate};
use larch_panel::{Authorizer, ContentTypeService, DynamicPanelFactory, MenuItem, MenuService, PanelRegistry};
use larch_translation::TranslationQueue;
use larch_types::{normalize_key, AdminContext, AdminError, AdminResult};
use larch_workflow::{WorkflowEngine, WorkflowRegistrar, WorkflowRuntime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Static description of a module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub id: String,
    pub name_key: String,
    #[serde(default)]
    pub description_key: String,
    /// Every listed feature must be enabled for the module to load
    #[serde(default)]
    pub feature_flags: Vec<String>,
    /// Modules that must load first
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ModuleManifest {
    /// Manifest with `modules.<id>.name` / `.description` translation keys.
    pub fn new(id: impl Into<String>) -> Self {
        let id = normalize_key(&id.into());
        Self {
            name_key: format!("modules.{id}.name"),
            description_key: format!("modules.{id}.description"),
            id,
            ..Default::default()
        }
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature_flags.push(normalize_key(&feature.into()));
        self
    }

    pub fn depends_on(mut self, module_id: impl Into<String>) -> Self {
        self.depends_on.push(normalize_key(&module_id.into()));
        self
    }
}

/// Services a module may register against
#[derive(Clone)]
pub struct ModuleContext {
    pub config: Arc<AdminConfig>,
    pub features: Arc<dyn FeatureGate>,
    pub registry: Arc<PanelRegistry>,
    pub commands: Arc<CommandBus>,
    pub workflows: Arc<WorkflowRuntime>,
    pub engine: Arc<dyn WorkflowEngine>,
    pub registrar: Arc<dyn WorkflowRegistrar>,
    pub queue: Arc<TranslationQueue>,
    pub dashboard: Arc<Dashboard>,
    pub factory: Arc<DynamicPanelFactory>,
    pub content_types: Arc<dyn ContentTypeService>,
    pub authorizer: Arc<dyn Authorizer>,
}

/// An optional subsystem
#[async_trait]
pub trait Module: Send + Sync {
    fn manifest(&self) -> &ModuleManifest;

    async fn register(&self, ctx: &AdminContext, modules: &ModuleContext) -> AdminResult<()>;

    /// Navigation entries contributed once registered
    fn menu_items(&self, _locale: &str) -> Vec<MenuItem> {
        Vec::new()
    }
}

/// Why a module was not loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedModule {
    pub module_id: String,
    pub feature: String,
    pub text_code: String,
    pub message: String,
}

impl SkippedModule {
    fn from_error(module_id: &str, err: &AdminError) -> Self {
        let (feature, message) = match err {
            AdminError::FeatureDisabled { feature, reason } => {
                (feature.clone(), reason.clone().unwrap_or_else(|| err.to_string()))
            }
            other => (String::new(), other.to_string()),
        };
        Self {
            module_id: module_id.to_string(),
            feature,
            text_code: err.text_code().to_string(),
            message,
        }
    }
}

/// Outcome of [`ModuleLoader::load`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedModule>,
    pub menu_items_added: usize,
}

impl LoadReport {
    pub fn is_loaded(&self, module_id: &str) -> bool {
        self.loaded.iter().any(|id| id == module_id)
    }

    pub fn skipped(&self, module_id: &str) -> Option<&SkippedModule> {
        self.skipped.iter().find(|s| s.module_id == module_id)
    }
}

/// In-memory navigation used when no persistent menu is available
#[derive(Debug, Default)]
pub struct FallbackNavigation {
    menus: RwLock<BTreeMap<String, Vec<MenuItem>>>,
}

impl FallbackNavigation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add items not already present; returns how many were added.
    pub async fn merge(&self, items: &[MenuItem]) -> usize {
        let mut menus = self.menus.write().await;
        let mut added = 0;
        for item in items {
            let item = item.clone().with_canonical_id();
            let entries = menus.entry(normalize_key(&item.menu_code)).or_default();
            if entries.iter().all(|existing| existing.id != item.id) {
                entries.push(item);
                added += 1;
            }
        }
        added
    }

    pub async fn items(&self, menu_code: &str) -> Vec<MenuItem> {
        let mut items = self
            .menus
            .read()
            .await
            .get(&normalize_key(menu_code))
            .cloned()
            .unwrap_or_default();
        items.sort_by(|a, b| {
            (a.position.unwrap_or(i32::MAX), &a.label).cmp(&(b.position.unwrap_or(i32::MAX), &b.label))
        });
        items
    }
}

/// Registers modules and loads them in order
#[derive(Default)]
pub struct ModuleLoader {
    modules: RwLock<Vec<Arc<dyn Module>>>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Ids are unique and dependencies must already be
    /// registered.
    pub async fn register(&self, module: Arc<dyn Module>) -> AdminResult<()> {
        let manifest = module.manifest();
        let id = normalize_key(&manifest.id);
        if id.is_empty() {
            return Err(AdminError::validation("id", "module id is required"));
        }
        let mut modules = self.modules.write().await;
        if modules.iter().any(|m| normalize_key(&m.manifest().id) == id) {
            return Err(AdminError::already_exists("module", id));
        }
        for dependency in &manifest.depends_on {
            let dependency = normalize_key(dependency);
            if !modules.iter().any(|m| normalize_key(&m.manifest().id) == dependency) {
                return Err(AdminError::validation(
                    "depends_on",
                    format!("module {id} depends on unregistered module {dependency}"),
                ));
            }
        }
        tracing::debug!(module = %id, "Module registered");
        modules.push(module);
        Ok(())
    }

    pub async fn ids(&self) -> Vec<String> {
        self.modules
            .read()
            .await
            .iter()
            .map(|m| normalize_key(&m.manifest().id))
            .collect()
    }

    /// Load every registered module, merging their menu items.
    pub async fn load(
        &self,
        ctx: &AdminContext,
        modules: &ModuleContext,
        menus: Option<&dyn MenuService>,
        navigation: &FallbackNavigation,
    ) -> AdminResult<LoadReport> {
        let registered = self.modules.read().await.clone();
        let locale = if ctx.locale().is_empty() {
            modules.config.default_locale.clone()
        } else {
            ctx.locale().to_string()
        };

        let mut report = LoadReport::default();
        let mut skipped_features: BTreeMap<String, String> = BTreeMap::new();
        let mut contributed = Vec::new();

        for module in registered {
            ctx.ensure_active()?;
            let manifest = module.manifest();
            let id = normalize_key(&manifest.id);

            if let Some(err) = self.skip_reason(ctx, modules, manifest, &skipped_features).await? {
                let skip = SkippedModule::from_error(&id, &err);
                tracing::info!(module = %id, feature = %skip.feature, "Module skipped: {}", skip.message);
                skipped_features.insert(id, skip.feature.clone());
                report.skipped.push(skip);
                continue;
            }

            if let Err(err) = module.register(ctx, modules).await {
                tracing::error!(module = %id, error = %err, "Module registration failed");
                return Err(err);
            }
            tracing::info!(module = %id, "Module loaded");

            let menu_code = modules.config.nav_menu_code.clone();
            contributed.extend(module.menu_items(&locale).into_iter().map(|mut item| {
                if item.menu_code.trim().is_empty() {
                    item.menu_code = menu_code.clone();
                }
                if item.locale.trim().is_empty() {
                    item.locale = locale.clone();
                }
                item.with_canonical_id()
            }));
            report.loaded.push(id);
        }

        report.menu_items_added = merge_menu_items(ctx, menus, navigation, &contributed).await?;
        Ok(report)
    }

    async fn skip_reason(
        &self,
        ctx: &AdminContext,
        modules: &ModuleContext,
        manifest: &ModuleManifest,
        skipped: &BTreeMap<String, String>,
    ) -> AdminResult<Option<AdminError>> {
        let id = normalize_key(&manifest.id);
        for feature in &manifest.feature_flags {
            if !is_enabled(modules.features.as_ref(), ctx, feature).await? {
                return Ok(Some(AdminError::FeatureDisabled {
                    feature: feature.clone(),
                    reason: Some(format!("module {id} requires feature {feature}")),
                }));
            }
        }
        for dependency in &manifest.depends_on {
            if let Some(feature) = skipped.get(&normalize_key(dependency)) {
                return Ok(Some(AdminError::FeatureDisabled {
                    feature: feature.clone(),
                    reason: Some(format!("module {id} depends on skipped module {dependency}")),
                }));
            }
        }
        Ok(None)
    }
}

/// Merge items into their menus, dropping canonical keys already present.
///
/// Missing menus are created; "already exists" from a concurrent reconciler
/// is tolerated. Items always reach the fallback navigation too.
pub async fn merge_menu_items(
    ctx: &AdminContext,
    menus: Option<&dyn MenuService>,
    navigation: &FallbackNavigation,
    items: &[MenuItem],
) -> AdminResult<usize> {
    let fallback_added = navigation.merge(items).await;
    let Some(menus) = menus else {
        return Ok(fallback_added);
    };

    let mut by_menu: BTreeMap<String, Vec<MenuItem>> = BTreeMap::new();
    for item in items {
        by_menu
            .entry(normalize_key(&item.menu_code))
            .or_default()
            .push(item.clone().with_canonical_id());
    }

    let mut added = 0;
    for (code, declared) in by_menu {
        let mut present: HashSet<String> = match menus.get_menu(ctx, &code).await {
            Ok(menu) => menu
                .items
                .iter()
                .flat_map(|item| [item.id.clone(), item.canonical_key()])
                .collect(),
            Err(err) if err.is_not_found() => {
                match menus.create_menu(ctx, &code).await {
                    Ok(_) => {}
                    Err(err) if err.is_already_exists() => {}
                    Err(err) => return Err(err),
                }
                HashSet::new()
            }
            Err(err) => return Err(err),
        };

        for item in declared {
            if !present.insert(item.canonical_key()) {
                continue;
            }
            match menus.add_item(ctx, item).await {
                Ok(_) => added += 1,
                Err(err) if err.is_already_exists() => {}
                Err(err) => return Err(err),
            }
        }
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use larch_panel::{InMemoryMenuService, MenuTarget};

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let ctx = AdminContext::new();
        let menus = InMemoryMenuService::new();
        let navigation = FallbackNavigation::new();
        let items = vec![
            MenuItem::new("admin", "Workflows", MenuTarget::url("/admin/workflows")),
            MenuItem::new("admin", "Dashboard", MenuTarget::url("/admin")).with_position(0),
        ];

        let added = merge_menu_items(&ctx, Some(&menus), &navigation, &items).await.unwrap();
        assert_eq!(added, 2);
        let added = merge_menu_items(&ctx, Some(&menus), &navigation, &items).await.unwrap();
        assert_eq!(added, 0);

        let menu = menus.get_menu(&ctx, "admin").await.unwrap();
        assert_eq!(menu.items.len(), 2);
        assert_eq!(menu.items[0].label, "Dashboard");
        assert_eq!(navigation.items("admin").await.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_tolerates_existing_menu() {
        let ctx = AdminContext::new();
        let menus = InMemoryMenuService::new();
        menus.create_menu(&ctx, "admin").await.unwrap();
        menus
            .add_item(&ctx, MenuItem::new("admin", "Pages", MenuTarget::url("/admin/pages")))
            .await
            .unwrap();

        let items = vec![
            MenuItem::new("admin", "pages", MenuTarget::url("/admin/pages/")),
            MenuItem::new("admin", "Media", MenuTarget::url("/admin/media")),
        ];
        let added = merge_menu_items(&ctx, Some(&menus), &FallbackNavigation::new(), &items)
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(menus.get_menu(&ctx, "admin").await.unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_only() {
        let navigation = FallbackNavigation::new();
        let items = vec![MenuItem::new("admin", "Jobs", MenuTarget::url("/admin/jobs"))];
        let added = merge_menu_items(&AdminContext::new(), None, &navigation, &items)
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(navigation.items("ADMIN").await[0].label, "Jobs");
    }

    #[test]
    fn test_manifest_keys() {
        let manifest = ModuleManifest::new("Translation_Queue").with_feature("translation_queue");
        assert_eq!(manifest.id, "translation_queue");
        assert_eq!(manifest.name_key, "modules.translation_queue.name");
        assert_eq!(manifest.feature_flags, vec!["translation_queue"]);
    }
}
