//! Larch Admin
//!
//! The administrative root controller and its HTTP surface:
//!
//! - [`Admin`]: owns the feature gate, panel registry, command bus, workflow
//!   runtime, translation queue and dashboard, and loads modules
//! - [`ModuleLoader`]: feature-gated module registration with navigation
//!   merging into a persistent menu or the fallback navigation
//! - [`ErrorPresenter`]: maps every error category to a status code, text
//!   code and payload, with production redaction
//! - [`create_router`]: axum routes for panels, workflows, the translation
//!   queue, dashboard, features, commands, search and metrics
//! - [`Server`]: the `larchd` daemon lifecycle

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod admin;
pub mod api;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod module;
pub mod modules;
pub mod presenter;
pub mod server;

pub use admin::{Admin, Dependencies};
pub use api::{create_router, AppState};
pub use config::AdminConfig;
pub use context::{Anonymous, Authenticator, ContextResolver, HeaderAuthenticator};
pub use dashboard::{Dashboard, DashboardPreferences, DashboardProvider, Widget};
pub use error::{ApiError, ApiResult, DaemonError, DaemonResult};
pub use module::{LoadReport, Module, ModuleContext, ModuleLoader, ModuleManifest, SkippedModule};
pub use presenter::ErrorPresenter;
pub use server::Server;
