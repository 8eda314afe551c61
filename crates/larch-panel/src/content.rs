//! Content records behind dynamic panels

use crate::content_type::ContentType;
use crate::repository::{InMemoryRepository, ListOptions, ListResult, Repository};
use async_trait::async_trait;
use larch_types::{AdminContext, AdminError, AdminResult, Record};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Content persistence, partitioned by content type.
///
/// Write methods default to `Unsupported` so read-only catalogues only
/// implement the reads.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn list(&self, ctx: &AdminContext, content_type: &ContentType, options: &ListOptions) -> AdminResult<ListResult>;

    async fn get(&self, ctx: &AdminContext, content_type: &ContentType, id: &str) -> AdminResult<Record>;

    async fn create(&self, _ctx: &AdminContext, content_type: &ContentType, _record: Record) -> AdminResult<Record> {
        Err(AdminError::unsupported(&content_type.slug, "create"))
    }

    async fn update(&self, _ctx: &AdminContext, content_type: &ContentType, _id: &str, _record: Record) -> AdminResult<Record> {
        Err(AdminError::unsupported(&content_type.slug, "update"))
    }

    async fn delete(&self, _ctx: &AdminContext, content_type: &ContentType, _id: &str) -> AdminResult<()> {
        Err(AdminError::unsupported(&content_type.slug, "delete"))
    }
}

/// One in-memory repository per content type id
#[derive(Default)]
pub struct InMemoryContentService {
    partitions: RwLock<HashMap<String, InMemoryRepository>>,
}

impl InMemoryContentService {
    pub fn new() -> Self {
        Self::default()
    }

    async fn partition(&self, content_type: &ContentType) -> InMemoryRepository {
        if let Some(repo) = self.partitions.read().await.get(&content_type.id) {
            return repo.clone();
        }
        self.partitions
            .write()
            .await
            .entry(content_type.id.clone())
            .or_insert_with(|| InMemoryRepository::new(content_type.slug.clone()))
            .clone()
    }
}

#[async_trait]
impl ContentService for InMemoryContentService {
    async fn list(&self, ctx: &AdminContext, content_type: &ContentType, options: &ListOptions) -> AdminResult<ListResult> {
        self.partition(content_type).await.list(ctx, options).await
    }

    async fn get(&self, ctx: &AdminContext, content_type: &ContentType, id: &str) -> AdminResult<Record> {
        self.partition(content_type).await.get(ctx, id).await
    }

    async fn create(&self, ctx: &AdminContext, content_type: &ContentType, record: Record) -> AdminResult<Record> {
        self.partition(content_type).await.create(ctx, record).await
    }

    async fn update(&self, ctx: &AdminContext, content_type: &ContentType, id: &str, record: Record) -> AdminResult<Record> {
        self.partition(content_type).await.update(ctx, id, record).await
    }

    async fn delete(&self, ctx: &AdminContext, content_type: &ContentType, id: &str) -> AdminResult<()> {
        self.partition(content_type).await.delete(ctx, id).await
    }
}

/// [`Repository`] adapter bound to one content type
pub struct ContentRepository {
    service: Arc<dyn ContentService>,
    content_type: ContentType,
}

impl ContentRepository {
    pub fn new(service: Arc<dyn ContentService>, content_type: ContentType) -> Self {
        Self { service, content_type }
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    fn check_required(&self, record: &Record) -> AdminResult<()> {
        let required = self
            .content_type
            .schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str);
        for field in required {
            let missing = match record.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            if missing {
                return Err(AdminError::validation(field, format!("{field} is required")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for ContentRepository {
    async fn list(&self, ctx: &AdminContext, options: &ListOptions) -> AdminResult<ListResult> {
        self.service.list(ctx, &self.content_type, options).await
    }

    async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<Record> {
        self.service.get(ctx, &self.content_type, id).await
    }

    async fn create(&self, ctx: &AdminContext, record: Record) -> AdminResult<Record> {
        self.check_required(&record)?;
        self.service.create(ctx, &self.content_type, record).await
    }

    async fn update(&self, ctx: &AdminContext, id: &str, record: Record) -> AdminResult<Record> {
        self.service.update(ctx, &self.content_type, id, record).await
    }

    async fn delete(&self, ctx: &AdminContext, id: &str) -> AdminResult<()> {
        self.service.delete(ctx, &self.content_type, id).await
    }
}
