//! Content types
//!
//! A content type is a declarative record: JSON Schema, UI schema and a
//! free-form capability map. The panel factory reads the capabilities
//! through the accessors here so alias handling lives in one place.

use crate::permissions::PermissionSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use larch_types::{normalize_key, AdminContext, AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const EXPLICIT_WORKFLOW_KEYS: &[&str] = &["workflow_id", "workflowId", "workflow-id"];
const LEGACY_WORKFLOW_KEYS: &[&str] = &["workflow", "workflow_key", "workflowKey"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentTypeStatus {
    #[default]
    Draft,
    Active,
    Deprecated,
    Published,
}

impl ContentTypeStatus {
    /// Active and published content types both get a panel.
    pub fn exposes_panel(&self) -> bool {
        matches!(self, ContentTypeStatus::Active | ContentTypeStatus::Published)
    }
}

impl fmt::Display for ContentTypeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentTypeStatus::Draft => "draft",
            ContentTypeStatus::Active => "active",
            ContentTypeStatus::Deprecated => "deprecated",
            ContentTypeStatus::Published => "published",
        };
        f.write_str(s)
    }
}

/// The `permissions` capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionsCapability {
    /// `"cms.news"` expands to the `view|create|edit|delete` quad
    Base(String),
    Explicit(PermissionSet),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ContentTypeStatus,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub ui_schema: Value,
    #[serde(default)]
    pub capabilities: Map<String, Value>,
    #[serde(default)]
    pub environment: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ContentType {
    pub fn new(slug: impl Into<String>, schema: Value) -> Self {
        let slug = slug.into();
        let now = Utc::now();
        Self {
            id: String::new(),
            name: slug.clone(),
            slug,
            description: String::new(),
            status: ContentTypeStatus::Draft,
            schema,
            ui_schema: Value::Null,
            capabilities: Map::new(),
            environment: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: ContentTypeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_ui_schema(mut self, ui_schema: Value) -> Self {
        self.ui_schema = ui_schema;
        self
    }

    pub fn with_capability(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.capabilities.insert(key.into(), value.into());
        self
    }

    fn capability_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.capabilities.get(*k))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn capability_flag(&self, key: &str) -> bool {
        match self.capabilities.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
            Some(Value::Object(o)) => o.get("enabled").and_then(Value::as_bool).unwrap_or(true),
            _ => false,
        }
    }

    /// Panel slug: the `panel_slug` capability, else the content-type slug
    pub fn panel_slug(&self) -> String {
        self.capability_str(&["panel_slug", "panelSlug"])
            .map(|s| normalize_key(&s))
            .unwrap_or_else(|| normalize_key(&self.slug))
    }

    pub fn explicit_workflow(&self) -> Option<String> {
        self.capability_str(EXPLICIT_WORKFLOW_KEYS)
    }

    pub fn legacy_workflow(&self) -> Option<String> {
        self.capability_str(LEGACY_WORKFLOW_KEYS)
    }

    /// Panel traits in declaration order, normalized and deduplicated.
    ///
    /// Accepts an array of strings or a comma separated string.
    pub fn panel_traits(&self) -> Vec<String> {
        let raw: Vec<String> = match self.capabilities.get("panel_traits") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };
        let mut traits: Vec<String> = Vec::with_capacity(raw.len());
        for t in raw {
            let t = normalize_key(&t);
            if !t.is_empty() && !traits.contains(&t) {
                traits.push(t);
            }
        }
        traits
    }

    pub fn panel_preset(&self) -> Option<String> {
        self.capability_str(&["panel_preset"]).map(|p| normalize_key(&p))
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.panel_traits().iter().any(|t| t == name) || self.panel_preset().as_deref() == Some(name)
    }

    pub fn permissions(&self) -> Option<PermissionsCapability> {
        match self.capabilities.get("permissions")? {
            Value::String(base) if !base.trim().is_empty() => {
                Some(PermissionsCapability::Base(base.trim().to_string()))
            }
            Value::Object(map) => {
                let get = |k: &str| {
                    map.get(k)
                        .and_then(Value::as_str)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default()
                };
                Some(PermissionsCapability::Explicit(PermissionSet {
                    view: get("view"),
                    create: get("create"),
                    edit: get("edit"),
                    delete: get("delete"),
                }))
            }
            _ => None,
        }
    }

    pub fn uses_blocks(&self) -> bool {
        self.capability_flag("blocks")
    }

    pub fn uses_seo(&self) -> bool {
        self.capability_flag("seo")
    }

    pub fn tree_view(&self) -> bool {
        self.capability_flag("tree")
    }

    pub fn translatable(&self) -> bool {
        self.capability_flag("translations")
    }

    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.slug
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentTypeEvent {
    Created(ContentType),
    Updated(ContentType),
    Deleted(ContentType),
}

impl ContentTypeEvent {
    pub fn content_type(&self) -> &ContentType {
        match self {
            ContentTypeEvent::Created(ct) | ContentTypeEvent::Updated(ct) | ContentTypeEvent::Deleted(ct) => ct,
        }
    }
}

/// Receives content-type events after the write is stored
#[async_trait]
pub trait ContentTypeListener: Send + Sync {
    async fn on_content_type_event(&self, ctx: &AdminContext, event: &ContentTypeEvent) -> AdminResult<()>;
}

/// Checks a content-type schema before it is exposed
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn validate(&self, ctx: &AdminContext, content_type: &ContentType) -> AdminResult<()>;
}

/// Requires an object schema whose `properties` is a map
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralSchemaValidator;

#[async_trait]
impl SchemaValidator for StructuralSchemaValidator {
    async fn validate(&self, _ctx: &AdminContext, content_type: &ContentType) -> AdminResult<()> {
        let schema = &content_type.schema;
        if !schema.is_object() {
            return Err(AdminError::validation("schema", "schema must be a JSON object"));
        }
        if let Some(kind) = schema.get("type").and_then(Value::as_str) {
            if kind != "object" {
                return Err(AdminError::validation("schema", format!("schema type must be object, got {kind}")));
            }
        }
        match schema.get("properties") {
            None | Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(AdminError::validation("schema", "properties must be an object")),
        }
    }
}

#[async_trait]
pub trait ContentTypeService: Send + Sync {
    async fn create(&self, ctx: &AdminContext, content_type: ContentType) -> AdminResult<ContentType>;

    async fn update(&self, ctx: &AdminContext, content_type: ContentType) -> AdminResult<ContentType>;

    async fn delete(&self, ctx: &AdminContext, id: &str) -> AdminResult<()>;

    async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<ContentType>;

    async fn list(&self, ctx: &AdminContext) -> AdminResult<Vec<ContentType>>;
}

/// Content types in process memory; listeners run after each write.
#[derive(Default)]
pub struct InMemoryContentTypeService {
    types: RwLock<BTreeMap<String, ContentType>>,
    listeners: RwLock<Vec<Arc<dyn ContentTypeListener>>>,
}

impl InMemoryContentTypeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, listener: Arc<dyn ContentTypeListener>) {
        self.listeners.write().await.push(listener);
    }

    async fn emit(&self, ctx: &AdminContext, event: ContentTypeEvent) -> AdminResult<()> {
        let listeners = self.listeners.read().await.clone();
        for listener in listeners {
            if let Err(err) = listener.on_content_type_event(ctx, &event).await {
                tracing::error!(
                    content_type = %event.content_type().slug,
                    error = %err,
                    "Content type listener failed"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    fn check_slug(types: &BTreeMap<String, ContentType>, candidate: &ContentType) -> AdminResult<()> {
        let clash = types.values().any(|existing| {
            existing.id != candidate.id
                && existing.slug == candidate.slug
                && existing.environment == candidate.environment
        });
        if clash {
            return Err(AdminError::already_exists("content type", &candidate.slug));
        }
        Ok(())
    }
}

fn normalize(content_type: &mut ContentType) -> AdminResult<()> {
    content_type.slug = normalize_key(&content_type.slug);
    content_type.environment = normalize_key(&content_type.environment);
    if content_type.slug.is_empty() {
        return Err(AdminError::validation("slug", "content type slug is required"));
    }
    if content_type.name.trim().is_empty() {
        content_type.name = content_type.slug.clone();
    }
    Ok(())
}

#[async_trait]
impl ContentTypeService for InMemoryContentTypeService {
    async fn create(&self, ctx: &AdminContext, mut content_type: ContentType) -> AdminResult<ContentType> {
        ctx.ensure_active()?;
        normalize(&mut content_type)?;
        if content_type.id.trim().is_empty() {
            content_type.id = Uuid::new_v4().to_string();
        }
        let now = Utc::now();
        content_type.created_at = now;
        content_type.updated_at = now;
        {
            let mut types = self.types.write().await;
            if types.contains_key(&content_type.id) {
                return Err(AdminError::already_exists("content type", &content_type.id));
            }
            Self::check_slug(&types, &content_type)?;
            types.insert(content_type.id.clone(), content_type.clone());
        }
        tracing::info!(content_type = %content_type.slug, status = %content_type.status, "Content type created");
        self.emit(ctx, ContentTypeEvent::Created(content_type.clone())).await?;
        Ok(content_type)
    }

    async fn update(&self, ctx: &AdminContext, mut content_type: ContentType) -> AdminResult<ContentType> {
        ctx.ensure_active()?;
        normalize(&mut content_type)?;
        {
            let mut types = self.types.write().await;
            let current = types
                .get(&content_type.id)
                .ok_or_else(|| AdminError::not_found("content type", &content_type.id))?;
            content_type.created_at = current.created_at;
            content_type.updated_at = Utc::now();
            Self::check_slug(&types, &content_type)?;
            types.insert(content_type.id.clone(), content_type.clone());
        }
        tracing::info!(content_type = %content_type.slug, status = %content_type.status, "Content type updated");
        self.emit(ctx, ContentTypeEvent::Updated(content_type.clone())).await?;
        Ok(content_type)
    }

    async fn delete(&self, ctx: &AdminContext, id: &str) -> AdminResult<()> {
        ctx.ensure_active()?;
        let removed = self
            .types
            .write()
            .await
            .remove(id)
            .ok_or_else(|| AdminError::not_found("content type", id))?;
        tracing::info!(content_type = %removed.slug, "Content type deleted");
        self.emit(ctx, ContentTypeEvent::Deleted(removed)).await
    }

    async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<ContentType> {
        ctx.ensure_active()?;
        self.types
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AdminError::not_found("content type", id))
    }

    async fn list(&self, ctx: &AdminContext) -> AdminResult<Vec<ContentType>> {
        ctx.ensure_active()?;
        let mut types: Vec<ContentType> = self.types.read().await.values().cloned().collect();
        types.sort_by(|a, b| (&a.slug, &a.environment).cmp(&(&b.slug, &b.environment)));
        Ok(types)
    }
}
