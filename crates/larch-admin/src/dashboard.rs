//! Dashboard widgets and per-user layout preferences

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use larch_panel::Authorizer;
use larch_translation::{AssignmentFilter, AssignmentStatus, TranslationQueue};
use larch_types::{normalize_key, AdminContext, AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resource name used for widget permission checks
pub const DASHBOARD_RESOURCE: &str = "dashboard";

/// A widget source
#[async_trait]
pub trait DashboardProvider: Send + Sync {
    fn code(&self) -> &str;

    fn title(&self) -> &str;

    /// Permission required to see the widget; `None` means visible to all.
    fn permission(&self) -> Option<&str> {
        None
    }

    async fn render(&self, ctx: &AdminContext) -> AdminResult<Value>;
}

/// A rendered widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub code: String,
    pub title: String,
    pub data: Value,
}

/// Per-user layout: explicit order plus hidden widget codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardPreferences {
    #[serde(default)]
    pub layout: Vec<String>,
    #[serde(default)]
    pub hidden: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DashboardPreferences {
    fn normalized(mut self) -> Self {
        for codes in [&mut self.layout, &mut self.hidden] {
            let mut seen = Vec::with_capacity(codes.len());
            for code in codes.drain(..).map(|c| normalize_key(&c)) {
                if !code.is_empty() && !seen.contains(&code) {
                    seen.push(code);
                }
            }
            *codes = seen;
        }
        self
    }
}

/// Provider registry and preference store
pub struct Dashboard {
    providers: RwLock<Vec<Arc<dyn DashboardProvider>>>,
    preferences: RwLock<HashMap<String, DashboardPreferences>>,
    authorizer: Arc<dyn Authorizer>,
}

impl Dashboard {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            preferences: RwLock::new(HashMap::new()),
            authorizer,
        }
    }

    /// Register a provider; codes are unique.
    pub async fn register(&self, provider: Arc<dyn DashboardProvider>) -> AdminResult<()> {
        let code = normalize_key(provider.code());
        if code.is_empty() {
            return Err(AdminError::validation("code", "widget code is required"));
        }
        let mut providers = self.providers.write().await;
        if providers.iter().any(|p| normalize_key(p.code()) == code) {
            return Err(AdminError::already_exists("dashboard widget", code));
        }
        tracing::debug!(widget = %code, "Registered dashboard provider");
        providers.push(provider);
        Ok(())
    }

    /// Registered codes in registration order
    pub async fn codes(&self) -> Vec<String> {
        self.providers
            .read()
            .await
            .iter()
            .map(|p| normalize_key(p.code()))
            .collect()
    }

    /// Render every visible widget, ordered by the actor's layout.
    pub async fn render(&self, ctx: &AdminContext) -> AdminResult<Vec<Widget>> {
        ctx.ensure_active()?;
        let prefs = self.preferences_for(ctx.user_id()).await;
        let mut providers: Vec<Arc<dyn DashboardProvider>> = self.providers.read().await.clone();

        let rank = |code: &str| {
            prefs
                .layout
                .iter()
                .position(|c| c == code)
                .unwrap_or(usize::MAX)
        };
        // stable sort keeps registration order for unlisted widgets
        providers.sort_by_key(|p| rank(&normalize_key(p.code())));

        let mut widgets = Vec::with_capacity(providers.len());
        for provider in providers {
            let code = normalize_key(provider.code());
            if prefs.hidden.contains(&code) {
                continue;
            }
            if let Some(permission) = provider.permission() {
                if !self.authorizer.can(ctx, permission, DASHBOARD_RESOURCE).await {
                    continue;
                }
            }
            widgets.push(Widget {
                code,
                title: provider.title().to_string(),
                data: provider.render(ctx).await?,
            });
        }
        Ok(widgets)
    }

    pub async fn preferences(&self, ctx: &AdminContext) -> AdminResult<DashboardPreferences> {
        let actor = ctx.require_actor()?;
        Ok(self.preferences_for(&actor.id).await)
    }

    /// Replace the actor's preferences. Unknown widget codes are rejected.
    pub async fn save_preferences(
        &self,
        ctx: &AdminContext,
        prefs: DashboardPreferences,
    ) -> AdminResult<DashboardPreferences> {
        ctx.ensure_active()?;
        let actor = ctx.require_actor()?.id.clone();
        let prefs = prefs.normalized();
        let known = self.codes().await;
        if let Some(unknown) = prefs
            .layout
            .iter()
            .chain(prefs.hidden.iter())
            .find(|code| !known.contains(code))
        {
            return Err(AdminError::validation("layout", format!("unknown widget: {unknown}")));
        }

        let saved = DashboardPreferences {
            updated_at: Some(Utc::now()),
            ..prefs
        };
        self.preferences.write().await.insert(actor, saved.clone());
        Ok(saved)
    }

    async fn preferences_for(&self, user_id: &str) -> DashboardPreferences {
        if user_id.is_empty() {
            return DashboardPreferences::default();
        }
        self.preferences
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Counts of translation assignments per status
pub struct TranslationQueueWidget {
    queue: Arc<TranslationQueue>,
    permission: String,
}

impl TranslationQueueWidget {
    pub const CODE: &'static str = "translation_queue";

    pub fn new(queue: Arc<TranslationQueue>, permission: impl Into<String>) -> Self {
        Self {
            queue,
            permission: permission.into(),
        }
    }
}

#[async_trait]
impl DashboardProvider for TranslationQueueWidget {
    fn code(&self) -> &str {
        Self::CODE
    }

    fn title(&self) -> &str {
        "Translation queue"
    }

    fn permission(&self) -> Option<&str> {
        Some(&self.permission)
    }

    async fn render(&self, ctx: &AdminContext) -> AdminResult<Value> {
        let assignments = self.queue.list(ctx, &AssignmentFilter::default()).await?;
        let mut by_status = Map::new();
        for status in AssignmentStatus::ALL {
            let count = assignments.iter().filter(|a| a.status == status).count();
            by_status.insert(status.as_str().to_string(), json!(count));
        }
        let mine = match ctx.actor() {
            Some(actor) => assignments
                .iter()
                .filter(|a| a.assignee_id.as_deref() == Some(actor.id.as_str()) && !a.status.is_terminal())
                .count(),
            None => 0,
        };
        Ok(json!({
            "total": assignments.len(),
            "by_status": by_status,
            "assigned_to_me": mine,
        }))
    }
}
