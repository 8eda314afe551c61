//! Panels
//!
//! Every operation follows the same path: permission check, before hook,
//! repository call, after hook. Hook and repository errors are returned
//! unchanged.

use crate::action::{Action, ActionRequest, ActionTarget};
use crate::authz::{AllowAll, Authorizer};
use crate::hooks::{NoHooks, PanelHooks};
use crate::permissions::PermissionSet;
use crate::repository::{ListOptions, ListResult, Repository, SEARCH_FILTER};
use crate::schema::{Field, FieldSets, FormSchema};
use larch_command::CommandBus;
use larch_types::{normalize_key, AdminContext, AdminError, AdminResult, Record, RecordExt};
use larch_workflow::{PolicyEnforcer, TransitionInput, TranslationPolicyInput, WorkflowEngine};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Record field holding the workflow state unless configured otherwise
pub const DEFAULT_STATE_FIELD: &str = "status";

/// Workflow attached to a panel
#[derive(Clone)]
pub struct PanelWorkflow {
    pub workflow_id: String,
    pub engine: Arc<dyn WorkflowEngine>,
    pub state_field: String,
}

impl PanelWorkflow {
    pub fn new(workflow_id: impl Into<String>, engine: Arc<dyn WorkflowEngine>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            engine,
            state_field: DEFAULT_STATE_FIELD.to_string(),
        }
    }

    pub fn with_state_field(mut self, field: impl Into<String>) -> Self {
        self.state_field = field.into();
        self
    }
}

impl fmt::Debug for PanelWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelWorkflow")
            .field("workflow_id", &self.workflow_id)
            .field("state_field", &self.state_field)
            .finish()
    }
}

#[derive(Clone)]
pub struct Panel {
    name: String,
    label: String,
    repository: Arc<dyn Repository>,
    fields: FieldSets,
    actions: Vec<Action>,
    bulk_actions: Vec<Action>,
    permissions: PermissionSet,
    workflow: Option<PanelWorkflow>,
    policy: Option<PolicyEnforcer>,
    content_schema: Option<Value>,
    traits: Vec<String>,
    use_blocks: bool,
    use_seo: bool,
    tree_view: bool,
    localized: bool,
    authorizer: Arc<dyn Authorizer>,
    hooks: Arc<dyn PanelHooks>,
    commands: Option<Arc<CommandBus>>,
}

impl fmt::Debug for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Panel")
            .field("name", &self.name)
            .field("permissions", &self.permissions)
            .field("actions", &self.actions)
            .field("workflow", &self.workflow)
            .field("traits", &self.traits)
            .finish()
    }
}

impl Panel {
    pub fn builder(name: impl Into<String>) -> PanelBuilder {
        PanelBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fields(&self) -> &FieldSets {
        &self.fields
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn bulk_actions(&self) -> &[Action] {
        &self.bulk_actions
    }

    pub fn workflow(&self) -> Option<&PanelWorkflow> {
        self.workflow.as_ref()
    }

    pub fn traits(&self) -> &[String] {
        &self.traits
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.iter().any(|t| t == name)
    }

    pub fn is_localized(&self) -> bool {
        self.localized
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Check `permission` for the request actor; an empty permission passes.
    pub async fn authorize(&self, ctx: &AdminContext, permission: &str) -> AdminResult<()> {
        if permission.trim().is_empty() || self.authorizer.can(ctx, permission, &self.name).await {
            Ok(())
        } else {
            Err(AdminError::forbidden(permission, &self.name))
        }
    }

    pub async fn can_view(&self, ctx: &AdminContext) -> bool {
        self.authorize(ctx, &self.permissions.view).await.is_ok()
    }

    pub async fn list(&self, ctx: &AdminContext, options: ListOptions) -> AdminResult<ListResult> {
        self.authorize(ctx, &self.permissions.view).await?;
        let mut options = options;
        if self.localized && !ctx.locale().is_empty() && !options.filters.contains_key("locale") {
            options.filters.insert("locale".into(), json!(ctx.locale()));
        }
        if !options.search.trim().is_empty() && !options.filters.contains_key(SEARCH_FILTER) {
            options
                .filters
                .insert(SEARCH_FILTER.into(), json!(options.search.trim()));
        }
        self.repository.list(ctx, &options).await
    }

    pub async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<Record> {
        self.authorize(ctx, &self.permissions.view).await?;
        self.repository.get(ctx, id).await
    }

    pub async fn create(&self, ctx: &AdminContext, mut record: Record) -> AdminResult<Record> {
        self.authorize(ctx, &self.permissions.create).await?;
        self.hooks.before_create(ctx, &mut record).await?;
        let created = self.repository.create(ctx, record).await?;
        self.hooks.after_create(ctx, &created).await?;
        tracing::debug!(panel = %self.name, id = ?created.record_id(), "Record created");
        Ok(created)
    }

    pub async fn update(&self, ctx: &AdminContext, id: &str, mut record: Record) -> AdminResult<Record> {
        self.authorize(ctx, &self.permissions.edit).await?;
        self.hooks.before_update(ctx, id, &mut record).await?;
        let updated = self.repository.update(ctx, id, record).await?;
        self.hooks.after_update(ctx, &updated).await?;
        Ok(updated)
    }

    pub async fn delete(&self, ctx: &AdminContext, id: &str) -> AdminResult<()> {
        self.authorize(ctx, &self.permissions.delete).await?;
        self.hooks.before_delete(ctx, id).await?;
        self.repository.delete(ctx, id).await?;
        self.hooks.after_delete(ctx, id).await?;
        tracing::debug!(panel = %self.name, id = %id, "Record deleted");
        Ok(())
    }

    /// Run a row action.
    ///
    /// With a workflow attached, an undeclared action name is treated as a
    /// transition of the same name.
    pub async fn run_action(&self, ctx: &AdminContext, name: &str, request: ActionRequest) -> AdminResult<Option<Value>> {
        let action = match find_action(&self.actions, name) {
            Some(action) => action.clone(),
            None if self.workflow.is_some() => Action::transition(name),
            None => return Err(AdminError::not_found("action", format!("{}/{name}", self.name))),
        };
        self.execute(ctx, &action, request).await
    }

    pub async fn run_bulk_action(&self, ctx: &AdminContext, name: &str, request: ActionRequest) -> AdminResult<Option<Value>> {
        if request.ids.is_empty() {
            return Err(AdminError::validation("ids", "bulk actions need at least one id"));
        }
        let action = find_action(&self.bulk_actions, name)
            .cloned()
            .ok_or_else(|| AdminError::not_found("bulk action", format!("{}/{name}", self.name)))?;
        self.execute(ctx, &action, request).await
    }

    async fn execute(&self, ctx: &AdminContext, action: &Action, request: ActionRequest) -> AdminResult<Option<Value>> {
        ctx.ensure_active()?;
        let permission = action.permission.as_deref().unwrap_or(&self.permissions.edit);
        self.authorize(ctx, permission).await?;

        match &action.target {
            ActionTarget::Handler(handler) => handler.handle(ctx, request).await,
            ActionTarget::Client => Err(AdminError::unsupported(&self.name, format!("{} runs in the client", action.name))),
            ActionTarget::Command(command) => {
                let bus = self
                    .commands
                    .as_ref()
                    .ok_or_else(|| AdminError::ServiceNotConfigured("command bus".into()))?;
                bus.dispatch_by_name(ctx, command, request.to_payload()).await
            }
            ActionTarget::Transition(transition) => {
                if request.ids.is_empty() {
                    return Err(AdminError::validation("ids", "a transition needs a record id"));
                }
                let mut updated = Vec::with_capacity(request.ids.len());
                for id in &request.ids {
                    updated.push(Value::Object(
                        self.transition_record(ctx, id, transition, &request.payload).await?,
                    ));
                }
                Ok(Some(match <[Value; 1]>::try_from(updated) {
                    Ok([single]) => single,
                    Err(many) => Value::Array(many),
                }))
            }
        }
    }

    /// Fire `transition` on record `id` and store the new state.
    pub async fn transition_record(
        &self,
        ctx: &AdminContext,
        id: &str,
        transition: &str,
        metadata: &Record,
    ) -> AdminResult<Record> {
        let workflow = self
            .workflow
            .as_ref()
            .ok_or_else(|| AdminError::unsupported(&self.name, "workflow transition"))?;
        let record = self.repository.get(ctx, id).await?;
        let current_state = record.string_field(&workflow.state_field).unwrap_or_default();
        let transition = normalize_key(transition);

        if let Some(policy) = &self.policy {
            let input = TranslationPolicyInput {
                entity_type: self.name.clone(),
                entity_id: id.to_string(),
                transition: transition.clone(),
                environment: ctx.environment().to_string(),
                requested_locale: ctx.locale().to_string(),
                metadata: metadata.clone(),
            };
            policy.check(ctx, &input).await?;
        }

        let result = workflow
            .engine
            .transition(
                ctx,
                TransitionInput {
                    entity_id: id.to_string(),
                    entity_type: workflow.workflow_id.clone(),
                    current_state,
                    transition: transition.clone(),
                    actor_id: ctx.user_id().to_string(),
                    metadata: metadata.clone(),
                },
            )
            .await?;

        let mut patch = Record::new();
        patch.insert(workflow.state_field.clone(), json!(result.to_state));
        self.hooks.before_update(ctx, id, &mut patch).await?;
        let updated = self.repository.update(ctx, id, patch).await?;
        self.hooks.after_update(ctx, &updated).await?;
        tracing::info!(
            panel = %self.name,
            id = %id,
            transition = %transition,
            from = %result.from_state,
            to = %result.to_state,
            "Workflow transition applied"
        );
        Ok(updated)
    }

    /// Row actions offered for `record`.
    ///
    /// Transition actions are kept only when the engine reports their
    /// transition as reachable from the record's state. Passive actions and
    /// actions without a transition are always offered.
    pub async fn available_actions(&self, ctx: &AdminContext, record: &Record) -> AdminResult<Vec<Action>> {
        let reachable: Option<HashSet<String>> = match &self.workflow {
            Some(workflow) => {
                let state = record.string_field(&workflow.state_field).unwrap_or_default();
                let transitions = workflow
                    .engine
                    .available_transitions(ctx, &workflow.workflow_id, &state)
                    .await?;
                Some(transitions.into_iter().map(|t| normalize_key(&t.name)).collect())
            }
            None => None,
        };

        let mut available = Vec::new();
        for action in &self.actions {
            let offered = match (action.transition_name(), &reachable) {
                _ if action.is_passive() => true,
                (Some(transition), Some(reachable)) => reachable.contains(&normalize_key(transition)),
                (Some(_), None) => false,
                (None, _) => true,
            };
            let permission = action.permission.as_deref().unwrap_or(&self.permissions.edit);
            if offered && self.authorize(ctx, permission).await.is_ok() {
                available.push(action.clone());
            }
        }
        Ok(available)
    }

    /// Form schema merging declared form fields over the content schema
    pub fn schema(&self) -> FormSchema {
        FormSchema::build(&self.fields.form, self.content_schema.as_ref())
    }

    pub fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "label": self.label,
            "fields": self.fields,
            "permissions": self.permissions,
            "actions": self.actions.iter().map(Action::describe).collect::<Vec<_>>(),
            "bulk_actions": self.bulk_actions.iter().map(Action::describe).collect::<Vec<_>>(),
            "traits": self.traits,
            "capabilities": {
                "use_blocks": self.use_blocks,
                "use_seo": self.use_seo,
                "tree_view": self.tree_view,
            },
            "workflow": self.workflow.as_ref().map(|w| w.workflow_id.clone()),
            "schema": self.schema(),
        })
    }
}

fn find_action<'a>(actions: &'a [Action], name: &str) -> Option<&'a Action> {
    let name = normalize_key(name);
    actions.iter().find(|a| normalize_key(&a.name) == name)
}

/// Builder for [`Panel`]
#[derive(Default)]
pub struct PanelBuilder {
    name: String,
    label: Option<String>,
    repository: Option<Arc<dyn Repository>>,
    fields: FieldSets,
    actions: Vec<Action>,
    bulk_actions: Vec<Action>,
    permissions: Option<PermissionSet>,
    workflow: Option<PanelWorkflow>,
    policy: Option<PolicyEnforcer>,
    content_schema: Option<Value>,
    traits: Vec<String>,
    use_blocks: bool,
    use_seo: bool,
    tree_view: bool,
    localized: bool,
    authorizer: Option<Arc<dyn Authorizer>>,
    hooks: Option<Arc<dyn PanelHooks>>,
    commands: Option<Arc<CommandBus>>,
}

impl PanelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_fields(mut self, fields: FieldSets) -> Self {
        self.fields = fields;
        self
    }

    /// Add a field to the list, form and detail sets.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.list.push(field.clone());
        self.fields.detail.push(field.clone());
        self.fields.form.push(field);
        self
    }

    pub fn with_filter(mut self, field: Field) -> Self {
        self.fields.filters.push(field);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_bulk_action(mut self, action: Action) -> Self {
        self.bulk_actions.push(action);
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_workflow(mut self, workflow: PanelWorkflow) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn with_policy(mut self, policy: PolicyEnforcer) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_content_schema(mut self, schema: Value) -> Self {
        self.content_schema = Some(schema);
        self
    }

    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits = traits.into_iter().map(|t| normalize_key(&t.into())).collect();
        self
    }

    pub fn with_blocks(mut self, enabled: bool) -> Self {
        self.use_blocks = enabled;
        self
    }

    pub fn with_seo(mut self, enabled: bool) -> Self {
        self.use_seo = enabled;
        self
    }

    pub fn with_tree_view(mut self, enabled: bool) -> Self {
        self.tree_view = enabled;
        self
    }

    /// Inject the request locale as a list filter.
    pub fn localized(mut self, localized: bool) -> Self {
        self.localized = localized;
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PanelHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_commands(mut self, commands: Arc<CommandBus>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn build(self) -> AdminResult<Panel> {
        let name = self.name.trim().to_lowercase();
        if name.is_empty() {
            return Err(AdminError::validation("name", "panel name is required"));
        }
        let repository = self
            .repository
            .ok_or_else(|| AdminError::validation("repository", format!("panel {name} has no repository")))?;

        for set in [&self.actions, &self.bulk_actions] {
            let mut seen = HashSet::new();
            for action in set {
                if !seen.insert(normalize_key(&action.name)) {
                    return Err(AdminError::validation(
                        "actions",
                        format!("duplicate action {} on panel {name}", action.name),
                    ));
                }
            }
        }

        let default_permissions = PermissionSet::from_base(&format!("admin.{name}"));
        let permissions = self
            .permissions
            .map(|p| p.or(&default_permissions))
            .unwrap_or(default_permissions);

        Ok(Panel {
            label: self.label.unwrap_or_else(|| name.clone()),
            name,
            repository,
            fields: self.fields,
            actions: self.actions,
            bulk_actions: self.bulk_actions,
            permissions,
            workflow: self.workflow,
            policy: self.policy,
            content_schema: self.content_schema,
            traits: self.traits,
            use_blocks: self.use_blocks,
            use_seo: self.use_seo,
            tree_view: self.tree_view,
            localized: self.localized,
            authorizer: self.authorizer.unwrap_or_else(|| Arc::new(AllowAll)),
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoHooks)),
            commands: self.commands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionHandler;
    use crate::authz::StaticAuthorizer;
    use crate::repository::InMemoryRepository;
    use crate::schema::FieldType;
    use async_trait::async_trait;
    use larch_command::CommandHandler;
    use larch_workflow::{
        InMemoryWorkflowEngine, LocaleLookup, RequiredLocalesPolicy, WorkflowDefinition, WorkflowMetrics,
        WorkflowRegistrar, WorkflowTransition,
    };
    use prometheus::Registry;
    use serde::Deserialize;
    use std::sync::Mutex;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn pages_panel() -> PanelBuilder {
        PanelBuilder::new("pages")
            .with_repository(Arc::new(InMemoryRepository::new("pages")))
            .with_field(Field::new("title", FieldType::Text).required())
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl PanelHooks for Recorder {
        async fn before_create(&self, _: &AdminContext, record: &mut Record) -> AdminResult<()> {
            self.0.lock().unwrap().push("before_create".into());
            if record.contains_key("reject") {
                return Err(AdminError::validation("reject", "rejected by hook"));
            }
            record.insert("slug".into(), json!("stamped"));
            Ok(())
        }

        async fn after_create(&self, _: &AdminContext, _: &Record) -> AdminResult<()> {
            self.0.lock().unwrap().push("after_create".into());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hooks_wrap_repository() {
        let hooks = Arc::new(Recorder::default());
        let panel = pages_panel().with_hooks(hooks.clone()).build().unwrap();
        let ctx = AdminContext::new();

        let created = panel.create(&ctx, record(json!({ "title": "a" }))).await.unwrap();
        assert_eq!(created["slug"], "stamped");
        assert_eq!(*hooks.0.lock().unwrap(), vec!["before_create", "after_create"]);

        let err = panel
            .create(&ctx, record(json!({ "title": "b", "reject": true })))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Validation { ref field, .. } if field == "reject"));
        assert_eq!(panel.list(&ctx, ListOptions::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_permissions_are_enforced() {
        let panel = pages_panel()
            .with_authorizer(Arc::new(StaticAuthorizer::new(["admin.pages.view"])))
            .build()
            .unwrap();
        let ctx = AdminContext::new();
        assert_eq!(panel.list(&ctx, ListOptions::default()).await.unwrap().total, 0);
        let err = panel.create(&ctx, record(json!({ "title": "x" }))).await.unwrap_err();
        assert!(matches!(err, AdminError::Forbidden { ref action, .. } if action == "admin.pages.create"));
    }

    #[tokio::test]
    async fn test_locale_and_search_injection() {
        let repo = Arc::new(InMemoryRepository::new("pages"));
        let ctx = AdminContext::new();
        for (title, locale) in [("Hello", "en"), ("Hola", "es"), ("Help", "en")] {
            repo.create(&ctx, record(json!({ "title": title, "locale": locale })))
                .await
                .unwrap();
        }
        let panel = PanelBuilder::new("pages")
            .with_repository(repo)
            .localized(true)
            .build()
            .unwrap();

        let en = ctx.clone().with_locale("en");
        assert_eq!(panel.list(&en, ListOptions::default()).await.unwrap().total, 2);
        let searched = panel
            .list(&en, ListOptions::default().search("hello"))
            .await
            .unwrap();
        assert_eq!(searched.total, 1);
        assert_eq!(panel.list(&ctx, ListOptions::default()).await.unwrap().total, 3);
    }

    struct Echo;

    #[async_trait]
    impl ActionHandler for Echo {
        async fn handle(&self, _: &AdminContext, request: ActionRequest) -> AdminResult<Option<Value>> {
            Ok(Some(json!({ "count": request.ids.len() })))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Archive {
        ids: Vec<String>,
    }

    struct ArchiveHandler(Mutex<Vec<String>>);

    #[async_trait]
    impl CommandHandler<Archive> for ArchiveHandler {
        async fn execute(&self, _: &AdminContext, command: Archive) -> AdminResult<()> {
            self.0.lock().unwrap().extend(command.ids);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_actions_by_handler_and_command() {
        let bus = Arc::new(CommandBus::new());
        let archive = Arc::new(ArchiveHandler(Mutex::new(Vec::new())));
        bus.register_named_command::<Archive, _>("pages.archive", archive.clone())
            .await
            .unwrap();

        let panel = pages_panel()
            .with_action(Action::handler("echo", Arc::new(Echo)))
            .with_bulk_action(Action::command("archive", "pages.archive"))
            .with_commands(bus)
            .build()
            .unwrap();
        let ctx = AdminContext::new();

        let echoed = panel.run_action(&ctx, "echo", ActionRequest::for_id("p1")).await.unwrap();
        assert_eq!(echoed, Some(json!({ "count": 1 })));

        let request = ActionRequest {
            ids: vec!["p1".into(), "p2".into()],
            payload: Record::new(),
        };
        assert_eq!(panel.run_bulk_action(&ctx, "archive", request).await.unwrap(), None);
        assert_eq!(*archive.0.lock().unwrap(), vec!["p1", "p2"]);

        let missing = panel.run_action(&ctx, "nope", ActionRequest::default()).await.unwrap_err();
        assert!(missing.is_not_found());
    }

    async fn editorial_engine() -> Arc<InMemoryWorkflowEngine> {
        let engine = Arc::new(InMemoryWorkflowEngine::new());
        let definition = WorkflowDefinition::new("draft")
            .with_transition(WorkflowTransition::new("submit", "draft", "review"))
            .with_transition(WorkflowTransition::new("publish", "review", "published"));
        engine.register_workflow("editorial", definition).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_available_actions_follow_state() {
        let engine = editorial_engine().await;
        let panel = pages_panel()
            .with_workflow(PanelWorkflow::new("editorial", engine))
            .with_action(Action::command("view", "pages.view"))
            .with_action(Action::transition("submit"))
            .with_action(Action::transition("publish"))
            .with_action(Action::handler("echo", Arc::new(Echo)))
            .build()
            .unwrap();
        let ctx = AdminContext::new();

        let names = |actions: Vec<Action>| actions.into_iter().map(|a| a.name).collect::<Vec<_>>();
        let draft = panel
            .available_actions(&ctx, &record(json!({ "status": "draft" })))
            .await
            .unwrap();
        assert_eq!(names(draft), vec!["view", "submit", "echo"]);

        let review = panel
            .available_actions(&ctx, &record(json!({ "status": "review" })))
            .await
            .unwrap();
        assert_eq!(names(review), vec!["view", "publish", "echo"]);
    }

    #[tokio::test]
    async fn test_transition_updates_state_field() {
        let engine = editorial_engine().await;
        let panel = pages_panel()
            .with_workflow(PanelWorkflow::new("editorial", engine))
            .build()
            .unwrap();
        let ctx = AdminContext::new();
        panel
            .create(&ctx, record(json!({ "id": "p1", "title": "t", "status": "draft" })))
            .await
            .unwrap();

        let result = panel.run_action(&ctx, "submit", ActionRequest::for_id("p1")).await.unwrap();
        assert_eq!(result.unwrap()["status"], "review");

        let err = panel
            .run_action(&ctx, "submit", ActionRequest::for_id("p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::InvalidTransition { .. }));
    }

    struct EnglishOnly;

    #[async_trait]
    impl LocaleLookup for EnglishOnly {
        async fn available_locales(&self, _: &AdminContext, _: &str, _: &str) -> AdminResult<Vec<String>> {
            Ok(vec!["en".into()])
        }
    }

    #[tokio::test]
    async fn test_blocked_publish_counts_once() {
        let engine = editorial_engine().await;
        let registry = Registry::new();
        let metrics = WorkflowMetrics::new(&registry).unwrap();
        let policy = RequiredLocalesPolicy::new(Arc::new(EnglishOnly))
            .for_transition("publish")
            .require("production", &["en", "es"]);
        let enforcer = PolicyEnforcer::new(metrics.clone()).with_policy(Arc::new(policy));

        let panel = pages_panel()
            .with_workflow(PanelWorkflow::new("editorial", engine))
            .with_policy(enforcer)
            .build()
            .unwrap();
        let ctx = AdminContext::new().with_locale("en").with_environment("production");
        panel
            .create(&ctx, record(json!({ "id": "page_123", "title": "t", "status": "review" })))
            .await
            .unwrap();

        let err = panel
            .run_action(&ctx, "publish", ActionRequest::for_id("page_123"))
            .await
            .unwrap_err();
        match err.root() {
            AdminError::MissingTranslations { missing_locales, .. } => {
                assert_eq!(missing_locales, &vec!["es".to_string()])
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(metrics.blocked_count("pages", "publish", "en", "production"), 1);
        let stored = panel.get(&ctx, "page_123").await.unwrap();
        assert_eq!(stored["status"], "review");
    }

    #[test]
    fn test_build_defaults_and_validation() {
        let panel = pages_panel().build().unwrap();
        assert_eq!(panel.permissions().edit, "admin.pages.edit");
        assert!(PanelBuilder::new(" ").build().is_err());
        assert!(PanelBuilder::new("x").build().is_err());
        let dup = pages_panel()
            .with_action(Action::command("a", "x"))
            .with_action(Action::command("A", "y"))
            .build();
        assert!(dup.is_err());
    }
}
