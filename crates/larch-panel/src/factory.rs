//! Dynamic panel factory
//!
//! Keeps exactly one panel per content type whose status exposes a panel.
//! Every flow tolerates already-present and already-absent end states, so
//! replaying an event or running two reconcilers converges on the same
//! registry and menu contents.

use crate::action::{Action, PASSIVE_ACTIONS};
use crate::authz::Authorizer;
use crate::content::{ContentRepository, ContentService};
use crate::content_type::{ContentType, ContentTypeEvent, ContentTypeListener, ContentTypeService, PermissionsCapability, SchemaValidator};
use crate::navigation::{MenuItem, MenuService, MenuTarget};
use crate::panel::{Panel, PanelBuilder, PanelWorkflow};
use crate::permissions::PermissionSet;
use crate::registry::{PanelRegistry, PanelSearchAdapter};
use crate::schema::FieldSets;
use async_trait::async_trait;
use larch_command::CommandBus;
use larch_types::{normalize_key, AdminContext, AdminError, AdminResult};
use larch_workflow::{BindingQuery, PolicyEnforcer, WorkflowEngine, WorkflowRuntime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Menu items the factory never deletes as stale
const PROTECTED_NAV_KEYS: &[&str] = &["content"];

/// Where a content type's workflow id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowSource {
    Capability,
    LegacyCapability,
    Binding,
    TraitDefault,
}

impl fmt::Display for WorkflowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowSource::Capability => "capability",
            WorkflowSource::LegacyCapability => "legacy_capability",
            WorkflowSource::Binding => "binding",
            WorkflowSource::TraitDefault => "trait_default",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResolution {
    pub workflow_id: String,
    pub source: WorkflowSource,
}

pub struct DynamicPanelFactory {
    registry: Arc<PanelRegistry>,
    content: Arc<dyn ContentService>,
    menus: Option<Arc<dyn MenuService>>,
    workflows: Option<Arc<WorkflowRuntime>>,
    engine: Option<Arc<dyn WorkflowEngine>>,
    policy: Option<PolicyEnforcer>,
    authorizer: Option<Arc<dyn Authorizer>>,
    validator: Option<Arc<dyn SchemaValidator>>,
    commands: Option<Arc<CommandBus>>,
    trait_defaults: BTreeMap<String, String>,
    menu_code: String,
    parent_id: Option<String>,
    base_path: String,
    /// `(environment, content type id) -> panel slug`
    slugs: RwLock<HashMap<(String, String), String>>,
}

impl DynamicPanelFactory {
    pub fn new(registry: Arc<PanelRegistry>, content: Arc<dyn ContentService>) -> Self {
        Self {
            registry,
            content,
            menus: None,
            workflows: None,
            engine: None,
            policy: None,
            authorizer: None,
            validator: None,
            commands: None,
            trait_defaults: BTreeMap::new(),
            menu_code: "admin".to_string(),
            parent_id: None,
            base_path: "/admin".to_string(),
            slugs: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_menus(mut self, menus: Arc<dyn MenuService>, menu_code: impl Into<String>) -> Self {
        self.menus = Some(menus);
        self.menu_code = normalize_key(&menu_code.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_workflows(mut self, workflows: Arc<WorkflowRuntime>, engine: Arc<dyn WorkflowEngine>) -> Self {
        self.workflows = Some(workflows);
        self.engine = Some(engine);
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn WorkflowEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_policy(mut self, policy: PolicyEnforcer) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_commands(mut self, commands: Arc<CommandBus>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Workflow used for content types tagged with `trait_name` when
    /// nothing more specific applies
    pub fn with_trait_default(mut self, trait_name: &str, workflow_id: impl Into<String>) -> Self {
        self.trait_defaults.insert(normalize_key(trait_name), workflow_id.into());
        self
    }

    pub fn registry(&self) -> &Arc<PanelRegistry> {
        &self.registry
    }

    /// Panel slug recorded for a content type
    pub async fn recorded_slug(&self, environment: &str, content_type_id: &str) -> Option<String> {
        self.slugs
            .read()
            .await
            .get(&(normalize_key(environment), content_type_id.to_string()))
            .cloned()
    }

    fn environment_for(ctx: &AdminContext, content_type: &ContentType) -> String {
        let env = normalize_key(&content_type.environment);
        if env.is_empty() {
            normalize_key(ctx.environment())
        } else {
            env
        }
    }

    /// Registry name for a slug in an environment
    pub fn panel_name(slug: &str, environment: &str) -> String {
        if environment.is_empty() {
            slug.to_string()
        } else {
            format!("{slug}@{environment}")
        }
    }

    /// Build, register and link the panel for `content_type`.
    ///
    /// Returns `None` when the status does not expose a panel; any panel
    /// recorded for the content type is removed in that case.
    pub async fn create_panel_from_content_type(
        &self,
        ctx: &AdminContext,
        content_type: &ContentType,
    ) -> AdminResult<Option<Arc<Panel>>> {
        self.create_with_position(ctx, content_type, None).await
    }

    async fn create_with_position(
        &self,
        ctx: &AdminContext,
        content_type: &ContentType,
        position: Option<i32>,
    ) -> AdminResult<Option<Arc<Panel>>> {
        ctx.ensure_active()?;
        let env = Self::environment_for(ctx, content_type);

        if !content_type.status.exposes_panel() {
            if let Some(validator) = &self.validator {
                validator.validate(ctx, content_type).await?;
            }
            self.cleanup(ctx, content_type, &env).await?;
            return Ok(None);
        }

        let slug = content_type.panel_slug();
        if slug.is_empty() {
            return Err(AdminError::validation("slug", "content type slug is required"));
        }
        let previous = self.reserve_slug(content_type, &env, &slug).await?;
        match self.link_panel(ctx, content_type, &env, &slug, position).await {
            Ok(panel) => {
                tracing::info!(
                    content_type = %content_type.slug,
                    panel = %panel.name(),
                    environment = %env,
                    "Panel reconciled from content type"
                );
                Ok(Some(panel))
            }
            Err(err) => {
                self.release_slug(content_type, &env, previous).await;
                Err(err)
            }
        }
    }

    /// Validate, build, register and link the panel under a reserved slug.
    async fn link_panel(
        &self,
        ctx: &AdminContext,
        content_type: &ContentType,
        env: &str,
        slug: &str,
        position: Option<i32>,
    ) -> AdminResult<Arc<Panel>> {
        if let Some(validator) = &self.validator {
            validator.validate(ctx, content_type).await?;
        }

        let panel = self.build_panel(ctx, content_type, env, slug).await?;
        let panel = self.registry.register_or_replace(panel).await;
        let title_field = if content_type.schema.pointer("/properties/title").is_some() {
            "title".to_string()
        } else {
            panel
                .fields()
                .list
                .first()
                .map(|f| f.name.clone())
                .unwrap_or_else(|| "id".to_string())
        };
        self.registry
            .register_search_adapter(panel.name(), Arc::new(PanelSearchAdapter::new(panel.clone(), title_field)))
            .await;

        if let Some(menus) = &self.menus {
            let item_id = self
                .upsert_navigation(ctx, menus.as_ref(), &panel, content_type, slug, position)
                .await?;
            self.registry
                .attach_navigation(panel.name(), &self.menu_code, &item_id)
                .await;
        }
        Ok(panel)
    }

    /// Record `slug` for the content type unless another content type holds
    /// it in the same environment. Returns the slug recorded before.
    async fn reserve_slug(&self, content_type: &ContentType, env: &str, slug: &str) -> AdminResult<Option<String>> {
        let mut slugs = self.slugs.write().await;
        let taken = slugs
            .iter()
            .any(|((e, id), s)| e == env && s == slug && id != &content_type.id);
        if taken {
            return Err(AdminError::Conflict(format!("panel slug already registered: {slug}")));
        }
        Ok(slugs.insert((env.to_string(), content_type.id.clone()), slug.to_string()))
    }

    /// Put back the slug recorded before a failed reservation.
    async fn release_slug(&self, content_type: &ContentType, env: &str, previous: Option<String>) {
        let mut slugs = self.slugs.write().await;
        let key = (env.to_string(), content_type.id.clone());
        match previous {
            Some(slug) => slugs.insert(key, slug),
            None => slugs.remove(&key),
        };
    }

    async fn build_panel(
        &self,
        ctx: &AdminContext,
        content_type: &ContentType,
        env: &str,
        slug: &str,
    ) -> AdminResult<Panel> {
        let mut fields = FieldSets::from_schemas(&content_type.schema, &content_type.ui_schema);
        let editorial = content_type.has_trait("editorial");
        if editorial {
            fields.apply_editorial_overlay();
        }

        let fallback = PermissionSet::from_base(&content_type.slug);
        let permissions = match content_type.permissions() {
            Some(PermissionsCapability::Base(base)) => PermissionSet::from_base(&base),
            Some(PermissionsCapability::Explicit(set)) => set.or(&fallback),
            None => fallback,
        };

        let passive = passive_actions(&permissions);
        let repository = Arc::new(ContentRepository::new(self.content.clone(), content_type.clone()));
        let mut builder = PanelBuilder::new(Self::panel_name(slug, env))
            .with_label(content_type.label())
            .with_repository(repository)
            .with_fields(fields)
            .with_permissions(permissions)
            .with_content_schema(content_type.schema.clone())
            .with_traits(content_type.panel_traits())
            .with_blocks(content_type.uses_blocks())
            .with_seo(content_type.uses_seo())
            .with_tree_view(content_type.tree_view())
            .localized(content_type.translatable() || editorial);

        if let Some(authorizer) = &self.authorizer {
            builder = builder.with_authorizer(authorizer.clone());
        }
        if let Some(commands) = &self.commands {
            builder = builder.with_commands(commands.clone());
        }
        for action in passive {
            builder = builder.with_action(action);
        }
        if let Some(workflow) = self.attach_workflow(ctx, content_type, env).await? {
            if let Some(definition) = workflow.engine.definition(&workflow.workflow_id).await {
                let mut seen = HashSet::new();
                for transition in &definition.transitions {
                    if seen.insert(transition.name.clone()) {
                        builder = builder.with_action(Action::transition(transition.name.clone()));
                    }
                }
            }
            builder = builder.with_workflow(workflow);
            if let Some(policy) = &self.policy {
                builder = builder.with_policy(policy.clone());
            }
        }
        builder.build()
    }

    async fn attach_workflow(
        &self,
        ctx: &AdminContext,
        content_type: &ContentType,
        env: &str,
    ) -> AdminResult<Option<PanelWorkflow>> {
        let Some(resolution) = self.resolve_workflow(ctx, content_type, env).await? else {
            return Ok(None);
        };
        let known = match &self.engine {
            Some(engine) => engine.has_workflow(&resolution.workflow_id).await,
            None => false,
        };
        match (&self.engine, known) {
            (Some(engine), true) => Ok(Some(PanelWorkflow::new(resolution.workflow_id, engine.clone()))),
            _ => {
                tracing::warn!(
                    content_type = %content_type.slug,
                    workflow = %resolution.workflow_id,
                    resolved_workflow_id = %resolution.workflow_id,
                    resolution_source = %resolution.source,
                    "Workflow not registered with the engine; panel created without workflow"
                );
                Ok(None)
            }
        }
    }

    /// Workflow for a content type: explicit capability, legacy capability,
    /// persisted binding, then trait default.
    pub async fn resolve_workflow(
        &self,
        ctx: &AdminContext,
        content_type: &ContentType,
        env: &str,
    ) -> AdminResult<Option<WorkflowResolution>> {
        if let Some(id) = content_type.explicit_workflow() {
            return Ok(Some(WorkflowResolution {
                workflow_id: id,
                source: WorkflowSource::Capability,
            }));
        }
        if let Some(id) = content_type.legacy_workflow() {
            return Ok(Some(WorkflowResolution {
                workflow_id: id,
                source: WorkflowSource::LegacyCapability,
            }));
        }

        let traits = content_type.panel_traits();
        if let Some(runtime) = &self.workflows {
            let query = BindingQuery::new(&content_type.slug)
                .with_traits(traits.iter().cloned())
                .with_environment(env);
            if let Some(resolved) = runtime.resolve_binding(ctx, &query).await? {
                return Ok(Some(WorkflowResolution {
                    workflow_id: resolved.workflow_id,
                    source: WorkflowSource::Binding,
                }));
            }
        }

        Ok(traits.iter().find_map(|t| {
            self.trait_defaults.get(t).map(|id| WorkflowResolution {
                workflow_id: id.clone(),
                source: WorkflowSource::TraitDefault,
            })
        }))
    }

    async fn ensure_menu(&self, ctx: &AdminContext, menus: &dyn MenuService) -> AdminResult<()> {
        match menus.get_menu(ctx, &self.menu_code).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => match menus.create_menu(ctx, &self.menu_code).await {
                Ok(_) => Ok(()),
                Err(err) if err.is_already_exists() => Ok(()),
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Add or update the menu item for a panel and drop stale items that
    /// point at the same target under the same parent.
    async fn upsert_navigation(
        &self,
        ctx: &AdminContext,
        menus: &dyn MenuService,
        panel: &Panel,
        content_type: &ContentType,
        slug: &str,
        position: Option<i32>,
    ) -> AdminResult<String> {
        // Targets are keyed by panel name so environments do not collide.
        self.ensure_menu(ctx, menus).await?;
        let panel_name = panel.name();

        let target = MenuTarget::panel(format!("{}/{slug}", self.base_path), panel_name, panel_name);
        let mut item = MenuItem::new(&self.menu_code, content_type.label(), target)
            .with_locale(ctx.locale())
            .with_permission(panel.permissions().view.clone());
        item.parent_id = self.parent_id.clone();
        item.position = position;
        let item = item.with_canonical_id();

        let existing = menus.list_items(ctx, &self.menu_code).await?;
        let mut inherited_position = None;
        for stale in existing.iter().filter(|i| {
            i.id != item.id
                && i.target.path == item.target.path
                && i.target.key == item.target.key
                && i.parent_id == item.parent_id
                && !i.target.is_group()
                && !PROTECTED_NAV_KEYS.contains(&i.id.as_str())
                && !PROTECTED_NAV_KEYS.contains(&i.target.key.as_str())
        }) {
            inherited_position = inherited_position.or(stale.position);
            match menus.delete_item(ctx, &self.menu_code, &stale.id).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
            tracing::debug!(item = %stale.id, panel = %panel_name, "Stale menu item removed");
        }

        let current = existing.iter().find(|i| i.id == item.id);
        let mut item = item;
        item.position = item
            .position
            .or_else(|| current.and_then(|c| c.position))
            .or(inherited_position);

        let stored = match current {
            Some(_) => menus.update_item(ctx, item).await?,
            None => match menus.add_item(ctx, item.clone()).await {
                Ok(stored) => stored,
                Err(err) if err.is_already_exists() => menus.update_item(ctx, item).await?,
                Err(err) => return Err(err),
            },
        };
        Ok(stored.id)
    }

    async fn nav_position(&self, ctx: &AdminContext, panel_name: &str) -> Option<i32> {
        let menus = self.menus.as_ref()?;
        let (menu_code, item_id) = self.registry.navigation_for(panel_name).await?;
        let menu = menus.get_menu(ctx, &menu_code).await.ok()?;
        menu.item(&item_id).and_then(|i| i.position)
    }

    async fn detach(&self, ctx: &AdminContext, panel_name: &str) -> AdminResult<()> {
        if let (Some(menus), Some((menu_code, item_id))) =
            (&self.menus, self.registry.navigation_for(panel_name).await)
        {
            match menus.delete_item(ctx, &menu_code, &item_id).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        self.registry.unregister(ctx, panel_name).await?;
        Ok(())
    }

    async fn cleanup(&self, ctx: &AdminContext, content_type: &ContentType, env: &str) -> AdminResult<()> {
        let recorded = self
            .slugs
            .write()
            .await
            .remove(&(env.to_string(), content_type.id.clone()));
        let slug = recorded.unwrap_or_else(|| content_type.panel_slug());
        if slug.is_empty() {
            return Ok(());
        }
        let panel_name = Self::panel_name(&slug, env);
        self.detach(ctx, &panel_name).await?;
        tracing::info!(content_type = %content_type.slug, panel = %panel_name, "Panel removed for content type");
        Ok(())
    }

    /// Reconcile after a content-type update.
    ///
    /// A changed slug moves the panel; the old menu position is kept.
    pub async fn refresh_panel(&self, ctx: &AdminContext, content_type: &ContentType) -> AdminResult<Option<Arc<Panel>>> {
        ctx.ensure_active()?;
        let env = Self::environment_for(ctx, content_type);
        let recorded = self.recorded_slug(&env, &content_type.id).await;
        let slug = content_type.panel_slug();

        let mut position = None;
        let mut moved = false;
        if let Some(old) = recorded.filter(|old| *old != slug) {
            let exposes = content_type.status.exposes_panel() && !slug.is_empty();
            if exposes {
                self.reserve_slug(content_type, &env, &slug).await?;
            }
            let old_name = Self::panel_name(&old, &env);
            position = self.nav_position(ctx, &old_name).await;
            if let Err(err) = self.detach(ctx, &old_name).await {
                if exposes {
                    self.release_slug(content_type, &env, Some(old)).await;
                }
                return Err(err);
            }
            if !exposes {
                self.slugs
                    .write()
                    .await
                    .remove(&(env.clone(), content_type.id.clone()));
            }
            moved = exposes;
            tracing::info!(from = %old, to = %slug, "Panel slug changed");
        }
        let result = self.create_with_position(ctx, content_type, position).await;
        if result.is_err() && moved {
            // The old panel is gone; keep no record of the new slug either.
            self.release_slug(content_type, &env, None).await;
        }
        result
    }

    /// Remove the panel and menu item of a deleted content type.
    pub async fn remove_panel(&self, ctx: &AdminContext, content_type: &ContentType) -> AdminResult<()> {
        ctx.ensure_active()?;
        let env = Self::environment_for(ctx, content_type);
        self.cleanup(ctx, content_type, &env).await
    }

    pub async fn handle_event(&self, ctx: &AdminContext, event: &ContentTypeEvent) -> AdminResult<()> {
        match event {
            ContentTypeEvent::Created(ct) => self.create_panel_from_content_type(ctx, ct).await.map(|_| ()),
            ContentTypeEvent::Updated(ct) => self.refresh_panel(ctx, ct).await.map(|_| ()),
            ContentTypeEvent::Deleted(ct) => self.remove_panel(ctx, ct).await,
        }
    }

    /// Reconcile every stored content type; returns the panels exposed.
    pub async fn reconcile_all(&self, ctx: &AdminContext, service: &dyn ContentTypeService) -> AdminResult<usize> {
        let mut exposed = 0;
        for content_type in service.list(ctx).await? {
            if self.refresh_panel(ctx, &content_type).await?.is_some() {
                exposed += 1;
            }
        }
        Ok(exposed)
    }
}

/// Passive actions with the permission each one needs
fn passive_actions(permissions: &PermissionSet) -> Vec<Action> {
    PASSIVE_ACTIONS
        .iter()
        .map(|name| {
            let permission = match *name {
                "view" => &permissions.view,
                "delete" => &permissions.delete,
                "create_translation" => &permissions.create,
                _ => &permissions.edit,
            };
            Action::client(*name).permission(permission.clone())
        })
        .collect()
}

#[async_trait]
impl ContentTypeListener for DynamicPanelFactory {
    async fn on_content_type_event(&self, ctx: &AdminContext, event: &ContentTypeEvent) -> AdminResult<()> {
        self.handle_event(ctx, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContentService;
    use crate::content_type::{ContentTypeStatus, InMemoryContentTypeService};
    use crate::navigation::InMemoryMenuService;
    use larch_workflow::{
        InMemoryWorkflowEngine, InMemoryWorkflowStore, NewBinding, NewWorkflow, ScopeType, WorkflowDefinition,
        WorkflowRegistrar, WorkflowStatus, WorkflowTransition,
    };
    use larch_types::Record;
    use serde_json::json;

    struct Fixture {
        factory: Arc<DynamicPanelFactory>,
        registry: Arc<PanelRegistry>,
        menus: Arc<InMemoryMenuService>,
    }

    fn fixture() -> Fixture {
        let menus = Arc::new(InMemoryMenuService::new());
        let registry = Arc::new(PanelRegistry::new().with_menu_service(menus.clone()));
        let factory = DynamicPanelFactory::new(registry.clone(), Arc::new(InMemoryContentService::new()))
            .with_menus(menus.clone(), "admin");
        Fixture {
            factory: Arc::new(factory),
            registry,
            menus,
        }
    }

    fn page_type() -> ContentType {
        ContentType::new(
            "page",
            json!({
                "type": "object",
                "required": ["title"],
                "properties": { "title": { "type": "string" }, "body": { "type": "string" } }
            }),
        )
        .with_id("ct-page")
        .with_status(ContentTypeStatus::Active)
        .with_capability("panel_slug", "pages")
        .with_capability("permissions", "admin.pages")
    }

    async fn menu_ids(menus: &InMemoryMenuService) -> Vec<String> {
        let mut ids: Vec<String> = menus
            .list_items(&AdminContext::new(), "admin")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_panel_from_content_type() {
        let fx = fixture();
        let ctx = AdminContext::new();
        fx.factory.create_panel_from_content_type(&ctx, &page_type()).await.unwrap();

        let panel = fx.registry.get("pages").await.unwrap();
        assert_eq!(
            panel.permissions(),
            &PermissionSet {
                view: "admin.pages.view".into(),
                create: "admin.pages.create".into(),
                edit: "admin.pages.edit".into(),
                delete: "admin.pages.delete".into(),
            }
        );
        assert!(fx.registry.has_search_adapter("pages").await);
        assert_eq!(menu_ids(&fx.menus).await.len(), 1);
        assert_eq!(fx.factory.recorded_slug("", "ct-page").await.as_deref(), Some("pages"));
    }

    /// Yields before accepting so concurrent reconcilers interleave
    struct YieldingValidator;

    #[async_trait]
    impl SchemaValidator for YieldingValidator {
        async fn validate(&self, _ctx: &AdminContext, _content_type: &ContentType) -> AdminResult<()> {
            tokio::task::yield_now().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_reconcilers_cannot_share_a_slug() {
        let menus = Arc::new(InMemoryMenuService::new());
        let registry = Arc::new(PanelRegistry::new().with_menu_service(menus.clone()));
        let factory = DynamicPanelFactory::new(registry.clone(), Arc::new(InMemoryContentService::new()))
            .with_menus(menus, "admin")
            .with_validator(Arc::new(YieldingValidator));
        let ctx = AdminContext::new();

        let shared = |id: &str| {
            ContentType::new(id, json!({ "type": "object", "properties": {} }))
                .with_id(id)
                .with_status(ContentTypeStatus::Active)
                .with_capability("panel_slug", "shared")
        };
        let (a, b) = (shared("ct-a"), shared("ct-b"));
        let (first, second) = tokio::join!(
            factory.create_panel_from_content_type(&ctx, &a),
            factory.create_panel_from_content_type(&ctx, &b),
        );

        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        let err = first.err().or(second.err()).unwrap();
        assert_eq!(err.text_code(), "CONFLICT");

        let recorded_a = factory.recorded_slug("", "ct-a").await;
        let recorded_b = factory.recorded_slug("", "ct-b").await;
        assert_eq!(recorded_a.is_some() as u8 + recorded_b.is_some() as u8, 1);
        assert_eq!(registry.names().await, vec!["shared".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_reservation_is_released() {
        struct Reject;

        #[async_trait]
        impl SchemaValidator for Reject {
            async fn validate(&self, _ctx: &AdminContext, _content_type: &ContentType) -> AdminResult<()> {
                Err(AdminError::validation("schema", "rejected"))
            }
        }

        let registry = Arc::new(PanelRegistry::new());
        let factory = DynamicPanelFactory::new(registry, Arc::new(InMemoryContentService::new()))
            .with_validator(Arc::new(Reject));
        let ctx = AdminContext::new();
        assert!(factory.create_panel_from_content_type(&ctx, &page_type()).await.is_err());
        assert!(factory.recorded_slug("", "ct-page").await.is_none());
    }

    #[tokio::test]
    async fn test_menu_item_uses_panel_view_permission() {
        let fx = fixture();
        let ctx = AdminContext::new();
        fx.factory.create_panel_from_content_type(&ctx, &page_type()).await.unwrap();

        let items = fx.menus.list_items(&ctx, "admin").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].permissions, vec!["admin.pages.view".to_string()]);
    }

    #[tokio::test]
    async fn test_actions_follow_workflow_state() {
        let engine = Arc::new(InMemoryWorkflowEngine::new());
        engine
            .register_workflow(
                "editorial.default",
                WorkflowDefinition::new("draft")
                    .with_transition(WorkflowTransition::new("publish", "draft", "published"))
                    .with_transition(WorkflowTransition::new("unpublish", "published", "draft")),
            )
            .await
            .unwrap();
        let factory = DynamicPanelFactory::new(Arc::new(PanelRegistry::new()), Arc::new(InMemoryContentService::new()))
            .with_engine(engine);
        let ctx = AdminContext::new();

        let plain = factory
            .create_panel_from_content_type(&ctx, &page_type())
            .await
            .unwrap()
            .unwrap();
        let names: Vec<&str> = plain.actions().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, PASSIVE_ACTIONS.to_vec());
        let delete = plain.actions().iter().find(|a| a.name == "delete").unwrap();
        assert_eq!(delete.permission.as_deref(), Some("admin.pages.delete"));

        let managed = page_type()
            .with_id("ct-posts")
            .with_capability("panel_slug", "posts")
            .with_capability("workflow_id", "editorial.default");
        let panel = factory
            .create_panel_from_content_type(&ctx, &managed)
            .await
            .unwrap()
            .unwrap();
        panel
            .create(&ctx, json!({ "id": "p1", "title": "Hello", "status": "draft" }).as_object().cloned().unwrap())
            .await
            .unwrap();

        let offered = |actions: Vec<Action>| -> Vec<String> {
            actions
                .into_iter()
                .filter(|a| a.transition_name().is_some())
                .map(|a| a.name)
                .collect()
        };
        let record = panel.get(&ctx, "p1").await.unwrap();
        let actions = panel.available_actions(&ctx, &record).await.unwrap();
        assert_eq!(offered(actions.clone()), vec!["publish".to_string()]);
        assert!(actions.iter().any(|a| a.name == "create_translation"));

        panel.transition_record(&ctx, "p1", "publish", &Record::new()).await.unwrap();
        let record = panel.get(&ctx, "p1").await.unwrap();
        let actions = panel.available_actions(&ctx, &record).await.unwrap();
        assert_eq!(offered(actions), vec!["unpublish".to_string()]);
    }

    #[tokio::test]
    async fn test_reconciliation_is_idempotent() {
        let fx = fixture();
        let ctx = AdminContext::new();
        let ct = page_type();
        fx.factory.create_panel_from_content_type(&ctx, &ct).await.unwrap();
        let names = fx.registry.names().await;
        let items = menu_ids(&fx.menus).await;

        fx.factory.create_panel_from_content_type(&ctx, &ct).await.unwrap();
        assert_eq!(fx.registry.names().await, names);
        assert_eq!(menu_ids(&fx.menus).await, items);
    }

    #[tokio::test]
    async fn test_environment_names_and_slug_conflicts() {
        let fx = fixture();
        let ctx = AdminContext::new().with_environment("production");
        fx.factory.create_panel_from_content_type(&ctx, &page_type()).await.unwrap();
        assert!(fx.registry.contains("pages@production").await);

        let clash = ContentType::new("landing", json!({}))
            .with_id("ct-landing")
            .with_status(ContentTypeStatus::Published)
            .with_capability("panel_slug", "pages");
        let err = fx.factory.create_panel_from_content_type(&ctx, &clash).await.unwrap_err();
        assert_eq!(err.text_code(), "CONFLICT");

        let staging = AdminContext::new().with_environment("staging");
        fx.factory.create_panel_from_content_type(&staging, &clash).await.unwrap();
        assert!(fx.registry.contains("pages@staging").await);
        assert_eq!(menu_ids(&fx.menus).await.len(), 2);
    }

    #[tokio::test]
    async fn test_slug_change_keeps_position() {
        let fx = fixture();
        let ctx = AdminContext::new();
        fx.factory.create_panel_from_content_type(&ctx, &page_type()).await.unwrap();
        let (_, item_id) = fx.registry.navigation_for("pages").await.unwrap();
        let mut item = fx.menus.get_menu(&ctx, "admin").await.unwrap().item(&item_id).cloned().unwrap();
        item.position = Some(7);
        fx.menus.update_item(&ctx, item).await.unwrap();

        let renamed = page_type().with_capability("panel_slug", "site-pages");
        fx.factory.refresh_panel(&ctx, &renamed).await.unwrap();

        assert!(fx.registry.get("pages").await.is_none());
        assert!(fx.registry.get("site-pages").await.is_some());
        let items = fx.menus.list_items(&ctx, "admin").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].position, Some(7));
        assert_eq!(items[0].target.key, "site-pages");
    }

    #[tokio::test]
    async fn test_deactivation_and_delete_cleanup() {
        let fx = fixture();
        let ctx = AdminContext::new();
        fx.factory.create_panel_from_content_type(&ctx, &page_type()).await.unwrap();

        // Slug override dropped in the same update; the recorded slug is used.
        let draft = page_type()
            .with_status(ContentTypeStatus::Draft)
            .with_capability("panel_slug", "");
        let result = fx.factory.create_panel_from_content_type(&ctx, &draft).await.unwrap();
        assert!(result.is_none());
        assert!(fx.registry.names().await.is_empty());
        assert!(menu_ids(&fx.menus).await.is_empty());
        assert!(fx.factory.recorded_slug("", "ct-page").await.is_none());

        fx.factory.remove_panel(&ctx, &page_type()).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_items_removed_but_scaffold_kept() {
        let fx = fixture();
        let ctx = AdminContext::new();
        fx.menus.create_menu(&ctx, "admin").await.unwrap();
        let legacy = fx
            .menus
            .add_item(&ctx, MenuItem::new("admin", "Old Pages", MenuTarget::panel("/admin/pages", "pages", "pages")))
            .await
            .unwrap();
        let group = fx
            .menus
            .add_item(&ctx, MenuItem::new("admin", "Content", MenuTarget::group("content")))
            .await
            .unwrap();

        fx.factory.create_panel_from_content_type(&ctx, &page_type()).await.unwrap();
        let ids = menu_ids(&fx.menus).await;
        assert!(!ids.contains(&legacy.id));
        assert!(ids.contains(&group.id));
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_workflow_resolution_order() {
        let engine = Arc::new(InMemoryWorkflowEngine::new());
        let runtime = Arc::new(WorkflowRuntime::new(Arc::new(InMemoryWorkflowStore::new())));
        let ctx = AdminContext::new();
        runtime.bind_workflow_engine(&ctx, engine.clone()).await.unwrap();
        for id in ["editorial.default", "news.flow"] {
            runtime
                .create_workflow(
                    &ctx,
                    NewWorkflow {
                        id: Some(id.into()),
                        name: id.into(),
                        status: Some(WorkflowStatus::Active),
                        environment: None,
                        definition: WorkflowDefinition::new("draft")
                            .with_transition(WorkflowTransition::new("publish", "draft", "published")),
                    },
                )
                .await
                .unwrap();
        }
        runtime
            .create_binding(&ctx, NewBinding::new(ScopeType::ContentType, "news", "news.flow"))
            .await
            .unwrap();

        let registry = Arc::new(PanelRegistry::new());
        let factory = DynamicPanelFactory::new(registry, Arc::new(InMemoryContentService::new()))
            .with_workflows(runtime, engine.clone())
            .with_trait_default("editorial", "editorial.default");

        let news = ContentType::new("news", json!({}))
            .with_status(ContentTypeStatus::Active)
            .with_capability("panel_traits", json!(["editorial"]));
        let resolved = factory.resolve_workflow(&ctx, &news, "").await.unwrap().unwrap();
        assert_eq!(resolved.workflow_id, "news.flow");
        assert_eq!(resolved.source, WorkflowSource::Binding);

        let article = ContentType::new("article", json!({}))
            .with_status(ContentTypeStatus::Active)
            .with_capability("panel_traits", json!(["editorial"]));
        let resolved = factory.resolve_workflow(&ctx, &article, "").await.unwrap().unwrap();
        assert_eq!(resolved.source, WorkflowSource::TraitDefault);

        let legacy = article.clone().with_capability("workflow", "legacy.flow");
        let resolved = factory.resolve_workflow(&ctx, &legacy, "").await.unwrap().unwrap();
        assert_eq!(resolved.source, WorkflowSource::LegacyCapability);

        let explicit = legacy.clone().with_capability("workflow-id", "news.flow");
        let resolved = factory.resolve_workflow(&ctx, &explicit, "").await.unwrap().unwrap();
        assert_eq!(resolved.source, WorkflowSource::Capability);

        // Unknown to the engine: the panel is created without a workflow.
        let panel = factory
            .create_panel_from_content_type(&ctx, &legacy.with_id("ct-legacy"))
            .await
            .unwrap()
            .unwrap();
        assert!(panel.workflow().is_none());

        let panel = factory
            .create_panel_from_content_type(&ctx, &news.with_id("ct-news"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(panel.workflow().unwrap().workflow_id, "news.flow");
        assert!(engine.has_workflow("news.flow").await);
    }

    #[tokio::test]
    async fn test_listener_routes_service_events() {
        let fx = fixture();
        let service = InMemoryContentTypeService::new();
        service.subscribe(fx.factory.clone()).await;
        let ctx = AdminContext::new();

        let created = service.create(&ctx, page_type()).await.unwrap();
        assert!(fx.registry.contains("pages").await);

        service
            .update(&ctx, created.clone().with_status(ContentTypeStatus::Deprecated))
            .await
            .unwrap();
        assert!(!fx.registry.contains("pages").await);

        service
            .update(&ctx, created.clone().with_status(ContentTypeStatus::Published))
            .await
            .unwrap();
        assert!(fx.registry.contains("pages").await);

        service.delete(&ctx, &created.id).await.unwrap();
        assert!(fx.registry.names().await.is_empty());
        assert!(menu_ids(&fx.menus).await.is_empty());
    }
}
