//! Server setup and lifecycle management

use crate::admin::{Admin, Dependencies};
use crate::api::{create_router, AppState};
use crate::config::AdminConfig;
use crate::error::{DaemonError, DaemonResult};
use larch_panel::{ContentTypeListener, InMemoryContentTypeService};
use larch_types::AdminContext;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Larch admin daemon server
pub struct Server {
    config: AdminConfig,
    admin: Arc<Admin>,
}

impl Server {
    /// Build the admin with in-memory collaborators and load its modules
    pub async fn new(config: AdminConfig) -> DaemonResult<Self> {
        let content_types = Arc::new(InMemoryContentTypeService::new());
        let deps = Dependencies::default().with_content_types(content_types.clone());
        Self::with_dependencies(config, deps, Some(content_types)).await
    }

    /// Build the admin from host-supplied collaborators.
    ///
    /// When `events` is given, the dynamic panel factory follows its
    /// content type lifecycle.
    pub async fn with_dependencies(
        config: AdminConfig,
        deps: Dependencies,
        events: Option<Arc<InMemoryContentTypeService>>,
    ) -> DaemonResult<Self> {
        let admin = Arc::new(Admin::new(config.clone(), deps).await?);

        if let Some(events) = events {
            let listener: Arc<dyn ContentTypeListener> = admin.panel_factory().clone();
            events.subscribe(listener).await;
        }

        let report = admin.load(&AdminContext::system()).await?;
        tracing::info!(
            loaded = ?report.loaded,
            skipped = report.skipped.len(),
            menu_items = report.menu_items_added,
            "Modules loaded"
        );
        for skipped in &report.skipped {
            tracing::warn!(module = %skipped.module_id, reason = %skipped.message, "Module skipped");
        }

        Ok(Self { config, admin })
    }

    pub fn admin(&self) -> &Arc<Admin> {
        &self.admin
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let app = create_router(AppState::new(self.admin.clone()));

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Larch admin listening on {}{}", addr, self.config.base());

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Larch admin shutting down");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
