//! Navigation menus
//!
//! Menu item ids are canonical keys: a sha256 over the menu code, the
//! normalized label, the target and the parent id. Reconcilers that agree
//! on those inputs agree on the id, so repeated upserts converge.

use async_trait::async_trait;
use larch_types::{normalize_key, AdminContext, AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Hex characters kept from the digest
const CANONICAL_KEY_LEN: usize = 32;

/// Where a menu item points
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuTarget {
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_key: Option<String>,
}

impl MenuTarget {
    pub fn panel(path: impl Into<String>, key: impl Into<String>, panel_key: impl Into<String>) -> Self {
        Self {
            target_type: "panel".into(),
            path: path.into(),
            key: key.into(),
            panel_key: Some(panel_key.into()),
        }
    }

    pub fn url(path: impl Into<String>) -> Self {
        Self {
            target_type: "url".into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn group(key: impl Into<String>) -> Self {
        Self {
            target_type: "group".into(),
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn is_group(&self) -> bool {
        normalize_key(&self.target_type) == "group"
    }

    fn normalized(&self) -> String {
        format!(
            "{}:{}:{}",
            normalize_key(&self.target_type),
            self.path.trim().trim_end_matches('/'),
            normalize_key(&self.key)
        )
    }
}

/// Deterministic id for a menu item.
pub fn canonical_key(menu_code: &str, label: &str, target: &MenuTarget, parent_id: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    for part in [
        normalize_key(menu_code),
        normalize_key(label),
        target.normalized(),
        parent_id.map(str::trim).unwrap_or_default().to_string(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    let mut key = hex::encode(hasher.finalize());
    key.truncate(CANONICAL_KEY_LEN);
    key
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(default)]
    pub id: String,
    pub label: String,
    pub target: MenuTarget,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub menu_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl MenuItem {
    pub fn new(menu_code: impl Into<String>, label: impl Into<String>, target: MenuTarget) -> Self {
        Self {
            menu_code: menu_code.into(),
            label: label.into(),
            target,
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn canonical_key(&self) -> String {
        canonical_key(&self.menu_code, &self.label, &self.target, self.parent_id.as_deref())
    }

    /// Fill an empty id with the canonical key.
    pub fn with_canonical_id(mut self) -> Self {
        if self.id.trim().is_empty() {
            self.id = self.canonical_key();
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub code: String,
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

impl Menu {
    pub fn item(&self, id: &str) -> Option<&MenuItem> {
        self.items.iter().find(|i| i.id == id)
    }

    fn sort(&mut self) {
        self.items.sort_by(|a, b| {
            (a.position.unwrap_or(i32::MAX), &a.label, &a.id).cmp(&(
                b.position.unwrap_or(i32::MAX),
                &b.label,
                &b.id,
            ))
        });
    }
}

/// Menu persistence
#[async_trait]
pub trait MenuService: Send + Sync {
    async fn get_menu(&self, ctx: &AdminContext, code: &str) -> AdminResult<Menu>;

    async fn create_menu(&self, ctx: &AdminContext, code: &str) -> AdminResult<Menu>;

    /// Insert an item; an empty id is replaced by the canonical key.
    async fn add_item(&self, ctx: &AdminContext, item: MenuItem) -> AdminResult<MenuItem>;

    async fn update_item(&self, ctx: &AdminContext, item: MenuItem) -> AdminResult<MenuItem>;

    async fn delete_item(&self, ctx: &AdminContext, menu_code: &str, id: &str) -> AdminResult<()>;

    async fn list_items(&self, ctx: &AdminContext, menu_code: &str) -> AdminResult<Vec<MenuItem>> {
        Ok(self.get_menu(ctx, menu_code).await?.items)
    }
}

/// Menus held in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryMenuService {
    menus: Arc<RwLock<BTreeMap<String, Menu>>>,
}

impl InMemoryMenuService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MenuService for InMemoryMenuService {
    async fn get_menu(&self, ctx: &AdminContext, code: &str) -> AdminResult<Menu> {
        ctx.ensure_active()?;
        self.menus
            .read()
            .await
            .get(&normalize_key(code))
            .cloned()
            .ok_or_else(|| AdminError::not_found("menu", code))
    }

    async fn create_menu(&self, ctx: &AdminContext, code: &str) -> AdminResult<Menu> {
        ctx.ensure_active()?;
        let code = normalize_key(code);
        if code.is_empty() {
            return Err(AdminError::validation("code", "menu code is required"));
        }
        let mut menus = self.menus.write().await;
        if menus.contains_key(&code) {
            return Err(AdminError::already_exists("menu", code));
        }
        let menu = Menu {
            code: code.clone(),
            items: Vec::new(),
        };
        menus.insert(code, menu.clone());
        Ok(menu)
    }

    async fn add_item(&self, ctx: &AdminContext, item: MenuItem) -> AdminResult<MenuItem> {
        ctx.ensure_active()?;
        if item.label.trim().is_empty() {
            return Err(AdminError::validation("label", "menu item label is required"));
        }
        let item = item.with_canonical_id();
        let mut menus = self.menus.write().await;
        let menu = menus
            .get_mut(&normalize_key(&item.menu_code))
            .ok_or_else(|| AdminError::not_found("menu", &item.menu_code))?;
        if menu.item(&item.id).is_some() {
            return Err(AdminError::already_exists("menu item", &item.id));
        }
        menu.items.push(item.clone());
        menu.sort();
        Ok(item)
    }

    async fn update_item(&self, ctx: &AdminContext, item: MenuItem) -> AdminResult<MenuItem> {
        ctx.ensure_active()?;
        let mut menus = self.menus.write().await;
        let menu = menus
            .get_mut(&normalize_key(&item.menu_code))
            .ok_or_else(|| AdminError::not_found("menu", &item.menu_code))?;
        let slot = menu
            .items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| AdminError::not_found("menu item", &item.id))?;
        *slot = item.clone();
        menu.sort();
        Ok(item)
    }

    async fn delete_item(&self, ctx: &AdminContext, menu_code: &str, id: &str) -> AdminResult<()> {
        ctx.ensure_active()?;
        let mut menus = self.menus.write().await;
        let menu = menus
            .get_mut(&normalize_key(menu_code))
            .ok_or_else(|| AdminError::not_found("menu", menu_code))?;
        let before = menu.items.len();
        menu.items.retain(|i| i.id != id);
        if menu.items.len() == before {
            return Err(AdminError::not_found("menu item", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key_is_normalized() {
        let target = MenuTarget::panel("/admin/news", "news", "news");
        let a = canonical_key("admin", "News", &target, None);
        let b = canonical_key(" Admin ", "news ", &MenuTarget::panel("/admin/news/", "NEWS", "news"), Some(""));
        assert_eq!(a, b);
        assert_eq!(a.len(), CANONICAL_KEY_LEN);

        let nested = canonical_key("admin", "News", &target, Some("content"));
        assert_ne!(a, nested);
    }

    #[tokio::test]
    async fn test_menu_lifecycle() {
        let menus = InMemoryMenuService::new();
        let ctx = AdminContext::new();
        assert!(menus.get_menu(&ctx, "admin").await.unwrap_err().is_not_found());
        menus.create_menu(&ctx, "admin").await.unwrap();
        assert!(menus.create_menu(&ctx, "admin").await.unwrap_err().is_already_exists());

        let item = MenuItem::new("admin", "Pages", MenuTarget::panel("/admin/pages", "pages", "pages"))
            .with_position(2);
        let added = menus.add_item(&ctx, item.clone()).await.unwrap();
        assert_eq!(added.id, item.canonical_key());
        assert!(menus.add_item(&ctx, item).await.unwrap_err().is_already_exists());

        let mut moved = added.clone();
        moved.position = Some(1);
        menus.update_item(&ctx, moved).await.unwrap();
        assert_eq!(menus.list_items(&ctx, "admin").await.unwrap()[0].position, Some(1));

        menus.delete_item(&ctx, "admin", &added.id).await.unwrap();
        assert!(menus
            .delete_item(&ctx, "admin", &added.id)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
