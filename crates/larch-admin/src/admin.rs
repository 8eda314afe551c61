//! Root controller
//!
//! [`Admin`] owns every shared service: the feature gate, panel registry,
//! command bus, workflow runtime and engine, translation queue, dashboard,
//! module loader and the prometheus registry. Hosts construct it once from
//! an [`AdminConfig`] and a set of [`Dependencies`], register their own
//! modules, call [`Admin::load`], then mount the router.

use crate::config::AdminConfig;
use crate::context::{Authenticator, ContextResolver, HeaderAuthenticator};
use crate::dashboard::Dashboard;
use crate::module::{FallbackNavigation, LoadReport, Module, ModuleContext, ModuleLoader};
use crate::modules::{CmsModule, DashboardModule, TranslationQueueModule, WorkflowsModule};
use crate::presenter::ErrorPresenter;
use larch_command::CommandBus;
use larch_features::{FeatureGate, ScopedFeatureGate};
use larch_panel::{
    AllowAll, Authorizer, ContentService, ContentTypeService, DynamicPanelFactory, InMemoryContentService,
    InMemoryContentTypeService, InMemoryMenuService, MenuItem, MenuService, PanelRegistry,
};
use larch_translation::{AssignmentStore, InMemoryAssignmentStore, TranslationQueue};
use larch_types::{AdminContext, AdminResult};
use larch_workflow::{
    InMemoryWorkflowEngine, InMemoryWorkflowStore, PolicyEnforcer, TranslationPolicy, WorkflowMetrics,
    WorkflowRuntime, WorkflowStore,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Collaborators supplied by the host
#[derive(Clone)]
pub struct Dependencies {
    pub authorizer: Arc<dyn Authorizer>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Persistent navigation; `None` leaves only the fallback navigation
    pub menus: Option<Arc<dyn MenuService>>,
    pub content_types: Arc<dyn ContentTypeService>,
    pub content: Arc<dyn ContentService>,
    pub workflow_store: Arc<dyn WorkflowStore>,
    pub assignment_store: Arc<dyn AssignmentStore>,
    pub translation_policy: Option<Arc<dyn TranslationPolicy>>,
    /// Replaces the config-seeded scoped gate
    pub feature_gate: Option<Arc<dyn FeatureGate>>,
}

impl Default for Dependencies {
    fn default() -> Self {
        Self {
            authorizer: Arc::new(AllowAll),
            authenticator: Arc::new(HeaderAuthenticator),
            menus: Some(Arc::new(InMemoryMenuService::new())),
            content_types: Arc::new(InMemoryContentTypeService::new()),
            content: Arc::new(InMemoryContentService::new()),
            workflow_store: Arc::new(InMemoryWorkflowStore::new()),
            assignment_store: Arc::new(InMemoryAssignmentStore::new()),
            translation_policy: None,
            feature_gate: None,
        }
    }
}

impl Dependencies {
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_menus(mut self, menus: Option<Arc<dyn MenuService>>) -> Self {
        self.menus = menus;
        self
    }

    pub fn with_content_types(mut self, content_types: Arc<dyn ContentTypeService>) -> Self {
        self.content_types = content_types;
        self
    }

    pub fn with_translation_policy(mut self, policy: Arc<dyn TranslationPolicy>) -> Self {
        self.translation_policy = Some(policy);
        self
    }

    pub fn with_feature_gate(mut self, gate: Arc<dyn FeatureGate>) -> Self {
        self.feature_gate = Some(gate);
        self
    }
}

/// The administrative root controller
pub struct Admin {
    config: Arc<AdminConfig>,
    features: Arc<dyn FeatureGate>,
    authorizer: Arc<dyn Authorizer>,
    authenticator: Arc<dyn Authenticator>,
    menus: Option<Arc<dyn MenuService>>,
    content_types: Arc<dyn ContentTypeService>,
    registry: Arc<PanelRegistry>,
    commands: Arc<CommandBus>,
    workflows: Arc<WorkflowRuntime>,
    engine: Arc<InMemoryWorkflowEngine>,
    policy: PolicyEnforcer,
    queue: Arc<TranslationQueue>,
    dashboard: Arc<Dashboard>,
    factory: Arc<DynamicPanelFactory>,
    loader: ModuleLoader,
    navigation: Arc<FallbackNavigation>,
    metrics: Registry,
    presenter: ErrorPresenter,
    resolver: ContextResolver,
    report: RwLock<Option<LoadReport>>,
}

impl Admin {
    /// Build the controller and register the built-in modules.
    pub async fn new(config: AdminConfig, deps: Dependencies) -> AdminResult<Self> {
        config.validate()?;
        let features: Arc<dyn FeatureGate> = match deps.feature_gate {
            Some(gate) => gate,
            None => Arc::new(ScopedFeatureGate::new(config.feature_defaults())?),
        };

        let metrics = Registry::new();
        let mut policy = PolicyEnforcer::new(WorkflowMetrics::new(&metrics)?);
        if let Some(translation_policy) = deps.translation_policy {
            policy = policy.with_policy(translation_policy);
        }

        let mut registry = PanelRegistry::new();
        if let Some(menus) = &deps.menus {
            registry = registry.with_menu_service(menus.clone());
        }
        let registry = Arc::new(registry);
        let commands = Arc::new(CommandBus::new());
        let workflows = Arc::new(WorkflowRuntime::new(deps.workflow_store));
        let engine = Arc::new(InMemoryWorkflowEngine::new());
        let queue = Arc::new(TranslationQueue::new(deps.assignment_store));
        let dashboard = Arc::new(Dashboard::new(deps.authorizer.clone()));

        let mut factory = DynamicPanelFactory::new(registry.clone(), deps.content)
            .with_workflows(workflows.clone(), engine.clone())
            .with_policy(policy.clone())
            .with_authorizer(deps.authorizer.clone())
            .with_commands(commands.clone())
            .with_base_path(config.base());
        if let Some(menus) = &deps.menus {
            factory = factory.with_menus(menus.clone(), config.nav_menu_code.clone());
        }
        for (trait_name, workflow_id) in &config.workflow_trait_defaults {
            factory = factory.with_trait_default(trait_name, workflow_id.clone());
        }

        let permissions = config.permissions();
        let base = config.base();
        let loader = ModuleLoader::new();
        loader
            .register(Arc::new(DashboardModule::new(base.clone(), permissions.dashboard_view)))
            .await?;
        loader
            .register(Arc::new(WorkflowsModule::new(base.clone(), permissions.workflows_view)))
            .await?;
        loader
            .register(Arc::new(TranslationQueueModule::new(base, permissions.translations_view)))
            .await?;
        loader.register(Arc::new(CmsModule::new())).await?;

        tracing::info!(title = %config.title, base_path = %config.base(), "Admin initialized");
        Ok(Self {
            presenter: ErrorPresenter::new(config.dev_mode),
            resolver: ContextResolver::new(config.default_locale.clone(), config.default_environment.clone()),
            config: Arc::new(config),
            features,
            authorizer: deps.authorizer,
            authenticator: deps.authenticator,
            menus: deps.menus,
            content_types: deps.content_types,
            registry,
            commands,
            workflows,
            engine,
            policy,
            queue,
            dashboard,
            factory: Arc::new(factory),
            loader,
            navigation: Arc::new(FallbackNavigation::new()),
            metrics,
            report: RwLock::new(None),
        })
    }

    /// Register a host module; it loads after the built-in ones.
    pub async fn register_module(&self, module: Arc<dyn Module>) -> AdminResult<()> {
        self.loader.register(module).await
    }

    /// Load every registered module. Later calls return the first report.
    pub async fn load(&self, ctx: &AdminContext) -> AdminResult<LoadReport> {
        let mut slot = self.report.write().await;
        if let Some(report) = slot.as_ref() {
            return Ok(report.clone());
        }
        let report = self
            .loader
            .load(ctx, &self.module_context(), self.menus.as_deref(), &self.navigation)
            .await?;
        tracing::info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            menu_items = report.menu_items_added,
            "Modules loaded"
        );
        *slot = Some(report.clone());
        Ok(report)
    }

    /// Report of the last [`Admin::load`]
    pub async fn load_report(&self) -> Option<LoadReport> {
        self.report.read().await.clone()
    }

    pub fn module_context(&self) -> ModuleContext {
        ModuleContext {
            config: self.config.clone(),
            features: self.features.clone(),
            registry: self.registry.clone(),
            commands: self.commands.clone(),
            workflows: self.workflows.clone(),
            engine: self.engine.clone(),
            registrar: self.engine.clone(),
            queue: self.queue.clone(),
            dashboard: self.dashboard.clone(),
            factory: self.factory.clone(),
            content_types: self.content_types.clone(),
            authorizer: self.authorizer.clone(),
        }
    }

    /// Navigation items of `menu_code`, from the persistent menu when one
    /// exists and the fallback navigation otherwise.
    pub async fn navigation(&self, ctx: &AdminContext, menu_code: &str) -> AdminResult<Vec<MenuItem>> {
        if let Some(menus) = &self.menus {
            match menus.get_menu(ctx, menu_code).await {
                Ok(menu) => return Ok(menu.items),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(self.navigation.items(menu_code).await)
    }

    pub fn config(&self) -> &Arc<AdminConfig> {
        &self.config
    }

    pub fn features(&self) -> &Arc<dyn FeatureGate> {
        &self.features
    }

    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    pub fn menus(&self) -> Option<&Arc<dyn MenuService>> {
        self.menus.as_ref()
    }

    pub fn content_types(&self) -> &Arc<dyn ContentTypeService> {
        &self.content_types
    }

    pub fn registry(&self) -> &Arc<PanelRegistry> {
        &self.registry
    }

    pub fn commands(&self) -> &Arc<CommandBus> {
        &self.commands
    }

    pub fn workflows(&self) -> &Arc<WorkflowRuntime> {
        &self.workflows
    }

    pub fn engine(&self) -> &Arc<InMemoryWorkflowEngine> {
        &self.engine
    }

    pub fn policy(&self) -> &PolicyEnforcer {
        &self.policy
    }

    pub fn queue(&self) -> &Arc<TranslationQueue> {
        &self.queue
    }

    pub fn dashboard(&self) -> &Arc<Dashboard> {
        &self.dashboard
    }

    /// The factory, for subscribing to content-type events
    pub fn panel_factory(&self) -> &Arc<DynamicPanelFactory> {
        &self.factory
    }

    pub fn metrics(&self) -> &Registry {
        &self.metrics
    }

    pub fn presenter(&self) -> &ErrorPresenter {
        &self.presenter
    }

    pub fn context_resolver(&self) -> &ContextResolver {
        &self.resolver
    }
}
