//! Panel registry
//!
//! The registry is the only owner of panels. HTTP routes resolve panels by
//! name on every request, so unregistering a panel detaches its routes, its
//! search adapter and its navigation item in one call.

use crate::navigation::MenuService;
use crate::panel::Panel;
use crate::repository::ListOptions;
use async_trait::async_trait;
use larch_types::{AdminContext, AdminError, AdminResult, RecordExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub panel: String,
    pub id: String,
    pub title: String,
}

#[async_trait]
pub trait SearchAdapter: Send + Sync {
    async fn search(&self, ctx: &AdminContext, query: &str, limit: usize) -> AdminResult<Vec<SearchHit>>;
}

/// Searches a panel through its list operation
pub struct PanelSearchAdapter {
    panel: Arc<Panel>,
    title_field: String,
}

impl PanelSearchAdapter {
    pub fn new(panel: Arc<Panel>, title_field: impl Into<String>) -> Self {
        Self {
            panel,
            title_field: title_field.into(),
        }
    }
}

#[async_trait]
impl SearchAdapter for PanelSearchAdapter {
    async fn search(&self, ctx: &AdminContext, query: &str, limit: usize) -> AdminResult<Vec<SearchHit>> {
        let options = ListOptions::default()
            .search(query)
            .per_page(limit.clamp(1, u32::MAX as usize) as u32);
        let page = self.panel.list(ctx, options).await?;
        Ok(page
            .records
            .iter()
            .filter_map(|record| {
                let id = record.record_id()?;
                let title = record.string_field(&self.title_field).unwrap_or_else(|| id.clone());
                Some(SearchHit {
                    panel: self.panel.name().to_string(),
                    id,
                    title,
                })
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NavAttachment {
    menu_code: String,
    item_id: String,
}

#[derive(Default)]
pub struct PanelRegistry {
    panels: RwLock<BTreeMap<String, Arc<Panel>>>,
    search: RwLock<BTreeMap<String, Arc<dyn SearchAdapter>>>,
    navigation: RwLock<BTreeMap<String, NavAttachment>>,
    menus: Option<Arc<dyn MenuService>>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete navigation items through `menus` on unregister.
    pub fn with_menu_service(mut self, menus: Arc<dyn MenuService>) -> Self {
        self.menus = Some(menus);
        self
    }

    /// Register a panel; a name already in use is rejected.
    pub async fn register(&self, panel: Panel) -> AdminResult<Arc<Panel>> {
        let mut panels = self.panels.write().await;
        if panels.contains_key(panel.name()) {
            return Err(AdminError::already_exists("panel", panel.name()));
        }
        let panel = Arc::new(panel);
        panels.insert(panel.name().to_string(), panel.clone());
        tracing::info!(panel = %panel.name(), "Panel registered");
        Ok(panel)
    }

    /// Register a panel, replacing any panel of the same name.
    pub async fn register_or_replace(&self, panel: Panel) -> Arc<Panel> {
        let panel = Arc::new(panel);
        let previous = self
            .panels
            .write()
            .await
            .insert(panel.name().to_string(), panel.clone());
        tracing::info!(panel = %panel.name(), replaced = previous.is_some(), "Panel registered");
        panel
    }

    /// Remove a panel with its search adapter and navigation item.
    ///
    /// Returns whether a panel was registered under `name`. A navigation
    /// item that is already gone is not an error.
    pub async fn unregister(&self, ctx: &AdminContext, name: &str) -> AdminResult<bool> {
        let removed = self.panels.write().await.remove(name).is_some();
        self.search.write().await.remove(name);
        let attachment = self.navigation.write().await.remove(name);

        if let (Some(attachment), Some(menus)) = (attachment, &self.menus) {
            match menus.delete_item(ctx, &attachment.menu_code, &attachment.item_id).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        if removed {
            tracing::info!(panel = %name, "Panel unregistered");
        }
        Ok(removed)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Panel>> {
        self.panels.read().await.get(name).cloned()
    }

    pub async fn require(&self, name: &str) -> AdminResult<Arc<Panel>> {
        self.get(name)
            .await
            .ok_or_else(|| AdminError::not_found("panel", name))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.panels.read().await.contains_key(name)
    }

    /// Registered panel names, sorted
    pub async fn names(&self) -> Vec<String> {
        self.panels.read().await.keys().cloned().collect()
    }

    pub async fn list(&self) -> Vec<Arc<Panel>> {
        self.panels.read().await.values().cloned().collect()
    }

    pub async fn register_search_adapter(&self, panel: &str, adapter: Arc<dyn SearchAdapter>) {
        self.search.write().await.insert(panel.to_string(), adapter);
    }

    pub async fn has_search_adapter(&self, panel: &str) -> bool {
        self.search.read().await.contains_key(panel)
    }

    /// Remember which menu item points at `panel`.
    pub async fn attach_navigation(&self, panel: &str, menu_code: &str, item_id: &str) {
        self.navigation.write().await.insert(
            panel.to_string(),
            NavAttachment {
                menu_code: menu_code.to_string(),
                item_id: item_id.to_string(),
            },
        );
    }

    /// `(menu_code, item_id)` attached to `panel`
    pub async fn navigation_for(&self, panel: &str) -> Option<(String, String)> {
        self.navigation
            .read()
            .await
            .get(panel)
            .map(|a| (a.menu_code.clone(), a.item_id.clone()))
    }

    /// Search every adapter whose panel the actor may view.
    pub async fn search(&self, ctx: &AdminContext, query: &str, limit: usize) -> AdminResult<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let adapters: Vec<(String, Arc<dyn SearchAdapter>)> = self
            .search
            .read()
            .await
            .iter()
            .map(|(name, adapter)| (name.clone(), adapter.clone()))
            .collect();

        let mut hits = Vec::new();
        for (name, adapter) in adapters {
            ctx.ensure_active()?;
            let visible = match self.get(&name).await {
                Some(panel) => panel.can_view(ctx).await,
                None => true,
            };
            if !visible {
                continue;
            }
            hits.extend(adapter.search(ctx, query, limit - hits.len()).await?);
            if hits.len() >= limit {
                hits.truncate(limit);
                break;
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::StaticAuthorizer;
    use crate::navigation::{InMemoryMenuService, MenuItem, MenuTarget};
    use crate::panel::PanelBuilder;
    use crate::repository::{InMemoryRepository, Repository};
    use serde_json::json;

    async fn panel(name: &str, titles: &[&str]) -> Panel {
        let repo = Arc::new(InMemoryRepository::new(name));
        for title in titles {
            repo.create(&AdminContext::new(), json!({ "title": title }).as_object().cloned().unwrap())
                .await
                .unwrap();
        }
        PanelBuilder::new(name).with_repository(repo).build().unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let registry = PanelRegistry::new();
        registry.register(panel("pages", &[]).await).await.unwrap();
        let err = registry.register(panel("pages", &[]).await).await.unwrap_err();
        assert!(err.is_already_exists());
        registry.register_or_replace(panel("pages", &[]).await).await;
        assert_eq!(registry.names().await, vec!["pages"]);
    }

    #[tokio::test]
    async fn test_unregister_detaches_everything() {
        let menus = Arc::new(InMemoryMenuService::new());
        let ctx = AdminContext::new();
        menus.create_menu(&ctx, "admin").await.unwrap();
        let item = menus
            .add_item(
                &ctx,
                MenuItem::new("admin", "Pages", MenuTarget::panel("/admin/pages", "pages", "pages")),
            )
            .await
            .unwrap();

        let registry = PanelRegistry::new().with_menu_service(menus.clone());
        let pages = registry.register(panel("pages", &["Hello"]).await).await.unwrap();
        registry
            .register_search_adapter("pages", Arc::new(PanelSearchAdapter::new(pages, "title")))
            .await;
        registry.attach_navigation("pages", "admin", &item.id).await;

        assert!(registry.unregister(&ctx, "pages").await.unwrap());
        assert!(registry.get("pages").await.is_none());
        assert!(!registry.has_search_adapter("pages").await);
        assert!(registry.navigation_for("pages").await.is_none());
        assert!(menus.list_items(&ctx, "admin").await.unwrap().is_empty());
        assert!(registry.search(&ctx, "hello", 10).await.unwrap().is_empty());

        assert!(!registry.unregister(&ctx, "pages").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_respects_view_permission() {
        let registry = PanelRegistry::new();
        let ctx = AdminContext::new();
        let open = registry.register(panel("pages", &["Hello pages"]).await).await.unwrap();
        let locked = PanelBuilder::new("secrets")
            .with_repository(Arc::new(InMemoryRepository::new("secrets")))
            .with_authorizer(Arc::new(StaticAuthorizer::deny_all()))
            .build()
            .unwrap();
        let locked = registry.register(locked).await.unwrap();
        locked
            .repository()
            .create(&ctx, json!({ "title": "Hello secret" }).as_object().cloned().unwrap())
            .await
            .unwrap();
        registry
            .register_search_adapter("pages", Arc::new(PanelSearchAdapter::new(open, "title")))
            .await;
        registry
            .register_search_adapter("secrets", Arc::new(PanelSearchAdapter::new(locked, "title")))
            .await;

        let hits = registry.search(&ctx, "hello", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].panel, "pages");
        assert_eq!(hits[0].title, "Hello pages");
    }
}
