//! Request context and authentication
//!
//! The authenticator runs once per request and leaves the [`Actor`] in the
//! request extensions; [`ContextResolver`] then builds the [`AdminContext`]
//! from the actor, the `locale` query parameter, the environment header or
//! query parameter, and the configured defaults.

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::extract::Query;
use axum::http::{HeaderMap, Uri};
use larch_types::{non_empty, normalize_key, Actor, AdminContext, AdminResult, RenderMode};
use std::collections::HashMap;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const ORG_ID_HEADER: &str = "x-org-id";
pub const ROLES_HEADER: &str = "x-user-roles";
pub const ENVIRONMENT_HEADER: &str = "x-admin-environment";

/// Identifies the caller of a request
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` means anonymous; errors reject the request.
    async fn authenticate(&self, parts: &Parts) -> AdminResult<Option<Actor>>;
}

/// Development authenticator trusting identity headers
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderAuthenticator;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    non_empty(headers.get(name).and_then(|v| v.to_str().ok()))
}

#[async_trait]
impl Authenticator for HeaderAuthenticator {
    async fn authenticate(&self, parts: &Parts) -> AdminResult<Option<Actor>> {
        let Some(user_id) = header(&parts.headers, USER_ID_HEADER) else {
            return Ok(None);
        };
        let mut actor = Actor::new(user_id);
        actor.tenant_id = header(&parts.headers, TENANT_ID_HEADER);
        actor.org_id = header(&parts.headers, ORG_ID_HEADER);
        actor.roles = header(&parts.headers, ROLES_HEADER)
            .map(|roles| {
                roles
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(actor))
    }
}

/// Treats every request as anonymous
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

#[async_trait]
impl Authenticator for Anonymous {
    async fn authenticate(&self, _parts: &Parts) -> AdminResult<Option<Actor>> {
        Ok(None)
    }
}

/// Builds [`AdminContext`] values from request parts
#[derive(Debug, Clone)]
pub struct ContextResolver {
    default_locale: String,
    default_environment: String,
}

impl ContextResolver {
    pub fn new(default_locale: impl Into<String>, default_environment: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            default_environment: default_environment.into(),
        }
    }

    /// Locale: `?locale=` then the configured default.
    pub fn locale(&self, query: &HashMap<String, String>) -> String {
        non_empty(query.get("locale").map(String::as_str)).unwrap_or_else(|| self.default_locale.clone())
    }

    /// Environment: header, then `?env=` / `?environment=`, then the default.
    pub fn environment(&self, headers: &HeaderMap, query: &HashMap<String, String>) -> String {
        header(headers, ENVIRONMENT_HEADER)
            .or_else(|| non_empty(query.get("env").map(String::as_str)))
            .or_else(|| non_empty(query.get("environment").map(String::as_str)))
            .map(|env| normalize_key(&env))
            .unwrap_or_else(|| self.default_environment.clone())
    }

    pub fn resolve(
        &self,
        headers: &HeaderMap,
        query: &HashMap<String, String>,
        actor: Option<Actor>,
    ) -> AdminResult<AdminContext> {
        let mut ctx = AdminContext::new()
            .with_locale(self.locale(query))
            .with_environment(self.environment(headers, query));
        if let Some(mode) = non_empty(query.get("render_mode").map(String::as_str)) {
            ctx = ctx.with_render_mode(mode.parse::<RenderMode>()?);
        } else {
            ctx = ctx.with_render_mode(RenderMode::Json);
        }
        if let Some(actor) = actor {
            ctx = ctx.with_actor(actor);
        }
        Ok(ctx)
    }
}

/// Query parameters of a request URI; malformed queries yield an empty map.
pub fn query_params(uri: &Uri) -> HashMap<String, String> {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(params)| params)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_header_authenticator() {
        let p = parts(
            Request::builder()
                .uri("/admin/api/pages")
                .header("X-User-Id", "u-1")
                .header("X-Tenant-Id", "t-1")
                .header("X-User-Roles", "editor, admin"),
        );
        let actor = HeaderAuthenticator.authenticate(&p).await.unwrap().unwrap();
        assert_eq!(actor.id, "u-1");
        assert_eq!(actor.tenant_id.as_deref(), Some("t-1"));
        assert!(actor.org_id.is_none());
        assert_eq!(actor.roles, vec!["editor", "admin"]);

        let anonymous = parts(Request::builder().uri("/"));
        assert!(HeaderAuthenticator.authenticate(&anonymous).await.unwrap().is_none());
    }

    #[test]
    fn test_context_resolution_order() {
        let resolver = ContextResolver::new("en", "production");
        let query = query_params(&"/x?locale=es&env=staging".parse().unwrap());
        let mut headers = HeaderMap::new();

        let ctx = resolver.resolve(&headers, &query, None).unwrap();
        assert_eq!(ctx.locale(), "es");
        assert_eq!(ctx.environment(), "staging");

        headers.insert(ENVIRONMENT_HEADER, "Preview".parse().unwrap());
        let ctx = resolver.resolve(&headers, &query, Some(Actor::new("u"))).unwrap();
        assert_eq!(ctx.environment(), "preview");
        assert_eq!(ctx.user_id(), "u");

        let ctx = resolver.resolve(&HeaderMap::new(), &HashMap::new(), None).unwrap();
        assert_eq!(ctx.locale(), "en");
        assert_eq!(ctx.environment(), "production");
        assert_eq!(ctx.render_mode(), Some(RenderMode::Json));
    }

    #[test]
    fn test_bad_render_mode_rejected() {
        let resolver = ContextResolver::new("en", "");
        let query = query_params(&"/x?render_mode=pdf".parse().unwrap());
        assert!(resolver.resolve(&HeaderMap::new(), &query, None).is_err());
    }

    #[test]
    fn test_query_decoding() {
        let query = query_params(&"/x?q=hello+world&locale=pt%2DBR".parse().unwrap());
        assert_eq!(query["q"], "hello world");
        assert_eq!(query["locale"], "pt-BR");
        assert!(query_params(&"/x".parse().unwrap()).is_empty());
    }
}
