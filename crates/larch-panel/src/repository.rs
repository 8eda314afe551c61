//! Repository contract and the in-memory reference store

use async_trait::async_trait;
use larch_types::{AdminContext, AdminError, AdminResult, Record, RecordExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Filter key carrying a free-text clause
pub const SEARCH_FILTER: &str = "_search";

/// Page size used when `per_page` is zero
pub const DEFAULT_PER_PAGE: u32 = 25;

/// Listing options; pages are 1-indexed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(default)]
    pub page: u32,
    /// Zero means the implementation default
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_desc: bool,
    #[serde(default)]
    pub filters: Record,
    #[serde(default)]
    pub search: String,
}

impl ListOptions {
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, desc: bool) -> Self {
        self.sort_by = Some(field.into());
        self.sort_desc = desc;
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// `(offset, limit)` after applying defaults
    pub fn window(&self, default_per_page: u32) -> (usize, usize) {
        let per_page = if self.per_page == 0 {
            default_per_page
        } else {
            self.per_page
        } as usize;
        let page = self.page.max(1) as usize;
        ((page - 1) * per_page, per_page)
    }
}

/// One page of records plus the unpaginated total
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    pub records: Vec<Record>,
    pub total: usize,
}

/// CRUD over string-keyed records
#[async_trait]
pub trait Repository: Send + Sync {
    async fn list(&self, ctx: &AdminContext, options: &ListOptions) -> AdminResult<ListResult>;

    async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<Record>;

    async fn create(&self, ctx: &AdminContext, record: Record) -> AdminResult<Record>;

    async fn update(&self, ctx: &AdminContext, id: &str, record: Record) -> AdminResult<Record>;

    async fn delete(&self, ctx: &AdminContext, id: &str) -> AdminResult<()>;
}

/// Records held in process memory, keyed by their `id` field
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    resource: String,
    records: Arc<RwLock<BTreeMap<String, Record>>>,
    default_per_page: u32,
}

impl InMemoryRepository {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            records: Arc::new(RwLock::new(BTreeMap::new())),
            default_per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn with_default_per_page(mut self, per_page: u32) -> Self {
        self.default_per_page = per_page.max(1);
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn matches_search(record: &Record, needle: &str) -> bool {
    record.values().any(|v| match v {
        Value::String(s) => s.to_lowercase().contains(needle),
        _ => false,
    })
}

fn matches_filter(record: &Record, key: &str, expected: &Value) -> bool {
    match (record.get(key), expected) {
        (Some(actual), Value::String(s)) => record
            .string_field(key)
            .map(|v| v.eq_ignore_ascii_case(s))
            .unwrap_or(actual == expected),
        (Some(actual), _) => actual == expected,
        (None, Value::Null) => true,
        (None, _) => false,
    }
}

fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => a.string_field(field).cmp(&b.string_field(field)),
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list(&self, ctx: &AdminContext, options: &ListOptions) -> AdminResult<ListResult> {
        ctx.ensure_active()?;
        let records = self.records.read().await;

        let mut search = options.search.trim().to_lowercase();
        if let Some(Value::String(s)) = options.filters.get(SEARCH_FILTER) {
            search = s.trim().to_lowercase();
        }

        let mut matched: Vec<&Record> = records
            .values()
            .filter(|r| search.is_empty() || matches_search(r, &search))
            .filter(|r| {
                options
                    .filters
                    .iter()
                    .filter(|(k, _)| k.as_str() != SEARCH_FILTER)
                    .all(|(k, v)| matches_filter(r, k, v))
            })
            .collect();

        if let Some(field) = options.sort_by.as_deref().filter(|f| !f.is_empty()) {
            matched.sort_by(|a, b| {
                let ord = compare_field(a, b, field);
                if options.sort_desc {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let total = matched.len();
        let (offset, limit) = options.window(self.default_per_page);
        let page = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(ListResult {
            records: page,
            total,
        })
    }

    async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<Record> {
        ctx.ensure_active()?;
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AdminError::not_found(&self.resource, id))
    }

    async fn create(&self, ctx: &AdminContext, mut record: Record) -> AdminResult<Record> {
        ctx.ensure_active()?;
        let id = record
            .record_id()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        record.insert("id".to_string(), Value::String(id.clone()));

        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(AdminError::already_exists(&self.resource, id));
        }
        records.insert(id, record.clone());
        Ok(record)
    }

    /// Merge `record` into the stored row; the id is immutable.
    async fn update(&self, ctx: &AdminContext, id: &str, record: Record) -> AdminResult<Record> {
        ctx.ensure_active()?;
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(id)
            .ok_or_else(|| AdminError::not_found(&self.resource, id))?;
        for (key, value) in record {
            if key != "id" {
                stored.insert(key, value);
            }
        }
        Ok(stored.clone())
    }

    async fn delete(&self, ctx: &AdminContext, id: &str) -> AdminResult<()> {
        ctx.ensure_active()?;
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AdminError::not_found(&self.resource, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    async fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new("pages");
        let ctx = AdminContext::new();
        for (id, title, locale, rank) in [
            ("p1", "Hello World", "en", 3),
            ("p2", "Hola Mundo", "es", 1),
            ("p3", "Hello Again", "en", 2),
        ] {
            repo.create(&ctx, record(json!({ "id": id, "title": title, "locale": locale, "rank": rank })))
                .await
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let repo = InMemoryRepository::new("pages");
        let ctx = AdminContext::new();
        let created = repo.create(&ctx, record(json!({ "title": "x" }))).await.unwrap();
        let id = created.record_id().unwrap();

        let updated = repo
            .update(&ctx, &id, record(json!({ "title": "y", "id": "other" })))
            .await
            .unwrap();
        assert_eq!(updated["title"], "y");
        assert_eq!(updated["id"], id.as_str());

        repo.delete(&ctx, &id).await.unwrap();
        assert!(repo.get(&ctx, &id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let repo = seeded().await;
        let err = repo
            .create(&AdminContext::new(), record(json!({ "id": "p1" })))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_filters_search_sort_and_pages() {
        let repo = seeded().await;
        let ctx = AdminContext::new();

        let en = repo
            .list(&ctx, &ListOptions::default().filter("locale", "en"))
            .await
            .unwrap();
        assert_eq!(en.total, 2);

        let search = repo
            .list(&ctx, &ListOptions::default().filter(SEARCH_FILTER, "hello"))
            .await
            .unwrap();
        assert_eq!(search.total, 2);

        let sorted = repo
            .list(&ctx, &ListOptions::default().sort_by("rank", true).per_page(2).page(1))
            .await
            .unwrap();
        assert_eq!(sorted.total, 3);
        let ids: Vec<String> = sorted.records.iter().filter_map(|r| r.record_id()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);

        let second = repo
            .list(&ctx, &ListOptions::default().sort_by("rank", true).per_page(2).page(2))
            .await
            .unwrap();
        assert_eq!(second.records.len(), 1);
    }

    #[test]
    fn test_window_defaults() {
        assert_eq!(ListOptions::default().window(25), (0, 25));
        assert_eq!(ListOptions::default().page(3).per_page(10).window(25), (20, 10));
    }
}
