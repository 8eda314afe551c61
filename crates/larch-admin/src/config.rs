//! Configuration for the admin root controller and `larchd`

use larch_features::{check_alias, keys};
use larch_types::{normalize_key, AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::{Ipv4Addr, SocketAddr};

/// Main admin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_title")]
    pub title: String,

    /// Mount point of every route, e.g. `/admin`
    #[serde(default = "default_base_path")]
    pub base_path: String,

    #[serde(default = "default_locale")]
    pub default_locale: String,

    #[serde(default)]
    pub theme: String,

    #[serde(default)]
    pub theme_variant: String,

    #[serde(default)]
    pub urls: UrlsConfig,

    /// Seed values for the feature gate
    #[serde(default = "default_feature_flags")]
    pub feature_flags: HashMap<String, bool>,

    /// Typed switches merged over `feature_flags`
    #[serde(default)]
    pub features: FeaturesConfig,

    #[serde(default)]
    pub permissions: PermissionsConfig,

    #[serde(default)]
    pub debug: DebugConfig,

    /// Menu receiving module-declared navigation
    #[serde(default = "default_nav_menu_code")]
    pub nav_menu_code: String,

    /// Environment used when a request names none
    #[serde(default)]
    pub default_environment: String,

    /// Include stack details and internal messages in error payloads
    #[serde(default)]
    pub dev_mode: bool,

    /// Trait name -> workflow id fallback for dynamic panels
    #[serde(default)]
    pub workflow_trait_defaults: BTreeMap<String, String>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            base_path: default_base_path(),
            default_locale: default_locale(),
            theme: String::new(),
            theme_variant: String::new(),
            urls: UrlsConfig::default(),
            feature_flags: default_feature_flags(),
            features: FeaturesConfig::default(),
            permissions: PermissionsConfig::default(),
            debug: DebugConfig::default(),
            nav_menu_code: default_nav_menu_code(),
            default_environment: String::new(),
            dev_mode: false,
            workflow_trait_defaults: BTreeMap::new(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// API prefix composition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlsConfig {
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Appended after the prefix when set, e.g. `v1`
    #[serde(default)]
    pub api_version: String,
}

impl Default for UrlsConfig {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            api_version: String::new(),
        }
    }
}

/// Typed feature switches; `None` leaves `feature_flags` in charge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_queue: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenants: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizations: Option<bool>,
}

impl FeaturesConfig {
    fn entries(&self) -> [(&'static str, Option<bool>); 11] {
        [
            (keys::DASHBOARD, self.dashboard),
            (keys::CMS, self.cms),
            (keys::COMMANDS, self.commands),
            (keys::SEARCH, self.search),
            (keys::BULK, self.bulk),
            (keys::PREFERENCES, self.preferences),
            (keys::WORKFLOWS, self.workflows),
            (keys::TRANSLATION_QUEUE, self.translation_queue),
            (keys::DEBUG, self.debug),
            (keys::TENANTS, self.tenants),
            (keys::ORGANIZATIONS, self.organizations),
        ]
    }
}

/// Permission strings, one per action class.
///
/// Empty values fall back to `admin.<area>.<verb>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default)]
    pub dashboard_view: String,
    #[serde(default)]
    pub dashboard_preferences: String,
    #[serde(default)]
    pub workflows_view: String,
    #[serde(default)]
    pub workflows_edit: String,
    #[serde(default)]
    pub translations_view: String,
    #[serde(default)]
    pub translations_claim: String,
    #[serde(default)]
    pub translations_assign: String,
    #[serde(default)]
    pub translations_review: String,
    #[serde(default)]
    pub translations_manage: String,
    #[serde(default)]
    pub features_view: String,
    #[serde(default)]
    pub features_edit: String,
    #[serde(default)]
    pub commands_view: String,
    #[serde(default)]
    pub commands_execute: String,
    #[serde(default)]
    pub metrics_view: String,
}

impl PermissionsConfig {
    /// Copy with every empty permission replaced by its default.
    pub fn with_defaults(&self) -> Self {
        fn or(value: &str, area: &str, verb: &str) -> String {
            if value.trim().is_empty() {
                format!("admin.{area}.{verb}")
            } else {
                value.trim().to_string()
            }
        }
        Self {
            dashboard_view: or(&self.dashboard_view, "dashboard", "view"),
            dashboard_preferences: or(&self.dashboard_preferences, "dashboard", "update"),
            workflows_view: or(&self.workflows_view, "workflows", "view"),
            workflows_edit: or(&self.workflows_edit, "workflows", "edit"),
            translations_view: or(&self.translations_view, "translations", "view"),
            translations_claim: or(&self.translations_claim, "translations", "claim"),
            translations_assign: or(&self.translations_assign, "translations", "assign"),
            translations_review: or(&self.translations_review, "translations", "review"),
            translations_manage: or(&self.translations_manage, "translations", "manage"),
            features_view: or(&self.features_view, "features", "view"),
            features_edit: or(&self.features_edit, "features", "edit"),
            commands_view: or(&self.commands_view, "commands", "view"),
            commands_execute: or(&self.commands_execute, "commands", "execute"),
            metrics_view: or(&self.metrics_view, "metrics", "view"),
        }
    }
}

/// Debug subsystem settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub panels: Vec<String>,
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
    #[serde(default = "default_max_sql_queries")]
    pub max_sql_queries: usize,
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,
    /// Empty allows every address
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    /// Field type -> mask applied in captured payloads
    #[serde(default)]
    pub mask_field_types: HashMap<String, String>,
    #[serde(default = "default_toolbar_mode")]
    pub toolbar_mode: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            panels: Vec::new(),
            max_log_entries: default_max_log_entries(),
            max_sql_queries: default_max_sql_queries(),
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
            allowed_ips: Vec::new(),
            mask_field_types: HashMap::new(),
            toolbar_mode: default_toolbar_mode(),
        }
    }
}

impl DebugConfig {
    pub fn allows_ip(&self, ip: &str) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.iter().any(|allowed| allowed.trim() == ip)
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            enable_cors: true,
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_title() -> String {
    "Larch Admin".to_string()
}

fn default_base_path() -> String {
    "/admin".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_api_prefix() -> String {
    "api".to_string()
}

fn default_nav_menu_code() -> String {
    "admin".to_string()
}

fn default_feature_flags() -> HashMap<String, bool> {
    [
        keys::DASHBOARD,
        keys::CMS,
        keys::COMMANDS,
        keys::SEARCH,
        keys::BULK,
        keys::PREFERENCES,
        keys::WORKFLOWS,
        keys::TRANSLATION_QUEUE,
    ]
    .into_iter()
    .map(|key| (key.to_string(), true))
    .collect()
}

fn default_max_log_entries() -> usize {
    500
}

fn default_max_sql_queries() -> usize {
    200
}

fn default_slow_query_threshold_ms() -> u64 {
    50
}

fn default_toolbar_mode() -> String {
    "collapsed".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AdminConfig {
    /// Load configuration: defaults, then the optional file, then `LARCH_*`
    /// environment variables (`__` separates nested keys).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&AdminConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LARCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Defaults for local development: dev-mode errors and debug logging.
    pub fn development() -> Self {
        Self {
            dev_mode: true,
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
            ..Default::default()
        }
    }

    /// Reject settings the root controller cannot run with.
    pub fn validate(&self) -> AdminResult<()> {
        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            return Err(AdminError::validation("base_path", "base_path must start with '/'"));
        }
        if self.default_locale.trim().is_empty() {
            return Err(AdminError::validation("default_locale", "default_locale is required"));
        }
        if self.nav_menu_code.trim().is_empty() {
            return Err(AdminError::validation("nav_menu_code", "nav_menu_code is required"));
        }
        for key in self.feature_flags.keys() {
            check_alias(key)?;
        }
        if self.debug.enabled && self.debug.max_log_entries == 0 {
            return Err(AdminError::validation(
                "debug.max_log_entries",
                "max_log_entries must be positive when debug is enabled",
            ));
        }
        Ok(())
    }

    /// Feature defaults: `feature_flags` with typed `features` merged over.
    pub fn feature_defaults(&self) -> HashMap<String, bool> {
        let mut flags: HashMap<String, bool> = self
            .feature_flags
            .iter()
            .map(|(key, value)| (normalize_key(key), *value))
            .collect();
        for (key, value) in self.features.entries() {
            if let Some(value) = value {
                flags.insert(key.to_string(), value);
            }
        }
        flags
    }

    /// `{base_path}` without a trailing slash; empty at the root.
    pub fn base(&self) -> String {
        self.base_path.trim().trim_end_matches('/').to_string()
    }

    /// Path of the JSON API relative to the base, e.g. `/api` or `/api/v1`
    pub fn api_path(&self) -> String {
        let prefix = self.urls.api_prefix.trim().trim_matches('/');
        let version = self.urls.api_version.trim().trim_matches('/');
        match (prefix.is_empty(), version.is_empty()) {
            (true, true) => String::new(),
            (false, true) => format!("/{prefix}"),
            (true, false) => format!("/{version}"),
            (false, false) => format!("/{prefix}/{version}"),
        }
    }

    pub fn permissions(&self) -> PermissionsConfig {
        self.permissions.with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdminConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.base(), "/admin");
        assert_eq!(config.api_path(), "/api");
        assert!(config.validate().is_ok());
        assert!(!config.dev_mode);
    }

    #[test]
    fn test_api_path_composition() {
        let mut config = AdminConfig::default();
        config.urls.api_version = "v1".into();
        assert_eq!(config.api_path(), "/api/v1");
        config.urls.api_prefix = "/".into();
        assert_eq!(config.api_path(), "/v1");
        config.base_path = "/".into();
        assert_eq!(config.base(), "");
    }

    #[test]
    fn test_typed_features_override_flags() {
        let mut config = AdminConfig::default();
        config.feature_flags.insert("Search".into(), true);
        config.features.search = Some(false);
        config.features.debug = Some(true);
        let flags = config.feature_defaults();
        assert_eq!(flags.get("search"), Some(&false));
        assert_eq!(flags.get("debug"), Some(&true));
        assert_eq!(flags.get("dashboard"), Some(&true));
    }

    #[test]
    fn test_permission_defaults() {
        let mut config = AdminConfig::default();
        config.permissions.workflows_edit = "workflows.write".into();
        let permissions = config.permissions();
        assert_eq!(permissions.dashboard_view, "admin.dashboard.view");
        assert_eq!(permissions.translations_review, "admin.translations.review");
        assert_eq!(permissions.workflows_edit, "workflows.write");
    }

    #[test]
    fn test_validation() {
        let mut config = AdminConfig::default();
        config.base_path = "admin".into();
        assert!(config.validate().is_err());

        let mut config = AdminConfig::default();
        config.debug.enabled = true;
        config.debug.max_log_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_ip_allow_list() {
        let mut debug = DebugConfig::default();
        assert!(debug.allows_ip("10.0.0.1"));
        debug.allowed_ips = vec!["127.0.0.1".into()];
        assert!(debug.allows_ip("127.0.0.1"));
        assert!(!debug.allows_ip("10.0.0.1"));
    }
}
