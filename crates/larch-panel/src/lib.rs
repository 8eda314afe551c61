//! Larch Panels
//!
//! A panel is a CRUD surface over a [`Repository`]: permission checks via an
//! [`Authorizer`], before/after hooks, named actions backed by inline
//! handlers or command-bus names, and a JSON-Schema form export.
//!
//! - [`PanelRegistry`]: process-wide panel table with search adapters and
//!   navigation attachments
//! - [`navigation`]: menu items with deterministic canonical keys
//! - [`content_type`]: declarative content types and their capabilities
//! - [`DynamicPanelFactory`]: keeps one panel per published content type,
//!   reconciling panels, workflows and navigation as content types change

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod action;
pub mod authz;
pub mod content;
pub mod content_type;
pub mod factory;
pub mod hooks;
pub mod navigation;
pub mod panel;
pub mod permissions;
pub mod registry;
pub mod repository;
pub mod schema;

pub use action::{Action, ActionHandler, ActionRequest, ActionTarget, PASSIVE_ACTIONS};
pub use authz::{AllowAll, Authorizer, StaticAuthorizer};
pub use content::{ContentRepository, ContentService, InMemoryContentService};
pub use content_type::{
    ContentType, ContentTypeEvent, ContentTypeListener, ContentTypeService, ContentTypeStatus,
    InMemoryContentTypeService, PermissionsCapability, SchemaValidator, StructuralSchemaValidator,
};
pub use factory::{DynamicPanelFactory, WorkflowResolution, WorkflowSource};
pub use hooks::{NoHooks, PanelHooks};
pub use navigation::{canonical_key, InMemoryMenuService, Menu, MenuItem, MenuService, MenuTarget};
pub use panel::{Panel, PanelBuilder, PanelWorkflow, DEFAULT_STATE_FIELD};
pub use permissions::PermissionSet;
pub use registry::{PanelRegistry, PanelSearchAdapter, SearchAdapter, SearchHit};
pub use repository::{InMemoryRepository, ListOptions, ListResult, Repository, SEARCH_FILTER};
pub use schema::{Field, FieldSets, FieldType, FormSchema};
