//! Route access guard.

use crate::AuthResult;
use crate::error::AuthError;
use crate::policy::{AuthorizationContext, PolicyRegistry};
use crate::resolution::{Requirement, route_decorators};

/// Decides whether the identity in a route-level context may invoke the
/// route's action.
pub struct RouteGuard<'a> {
    registry: &'a PolicyRegistry,
    global_policies: Option<&'a [String]>,
    denied_message: Option<&'a str>,
}

impl<'a> RouteGuard<'a> {
    #[must_use]
    pub fn new(registry: &'a PolicyRegistry) -> Self {
        Self {
            registry,
            global_policies: None,
            denied_message: None,
        }
    }

    /// Policies used when neither the action nor the controller declares any.
    #[must_use]
    pub fn with_global_policies(mut self, policies: Option<&'a [String]>) -> Self {
        self.global_policies = policies;
        self
    }

    /// Message used instead of the generic `Forbidden` / `Unauthorized`.
    #[must_use]
    pub fn with_denied_message(mut self, message: Option<&'a str>) -> Self {
        self.denied_message = message;
        self
    }

    /// Checks route access.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` (no identity) or
    /// `AuthError::Unauthorized` (identity present) when no decorator grants
    /// access, and propagates policy and configuration errors unchanged.
    pub async fn check(&self, ctx: &AuthorizationContext) -> AuthResult<()> {
        let decorators = route_decorators(&ctx.route, self.global_policies);
        let allowed = match Requirement::compile(self.registry, &decorators) {
            Some(requirement) => requirement.authorize(ctx).await?,
            None => false,
        };

        if allowed {
            tracing::debug!(
                route = %ctx.route.url,
                action = %ctx.route.qualified_action(),
                "Route access granted"
            );
            return Ok(());
        }

        tracing::debug!(
            route = %ctx.route.url,
            action = %ctx.route.qualified_action(),
            authenticated = ctx.is_authenticated(),
            "Route access denied"
        );
        Err(AuthError::denied(
            ctx.is_authenticated(),
            self.denied_message.map(str::to_string),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::metadata::{AuthorizeDecorator, ClassMeta, MethodMeta, RouteMeta, TypeCatalog};

    fn registry() -> PolicyRegistry {
        PolicyRegistry::builder()
            .define_policy("admin", |ctx| Ok(ctx.user_claim("role") == Some(&json!("admin"))))
            .build()
            .unwrap()
    }

    fn context(action: MethodMeta, user: Option<serde_json::Value>) -> AuthorizationContext {
        let route = RouteMeta::new("get", "/users", ClassMeta::new("UsersController"), action);
        AuthorizationContext::new(Arc::new(route), Arc::new(TypeCatalog::new())).with_user(user)
    }

    #[tokio::test]
    async fn test_implicit_authenticated() {
        let registry = registry();
        let guard = RouteGuard::new(&registry);

        let err = guard
            .check(&context(MethodMeta::new("list"), None))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        guard
            .check(&context(MethodMeta::new("list"), Some(json!({}))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_policy_denial_status() {
        let registry = registry();
        let guard = RouteGuard::new(&registry);
        let action = MethodMeta::new("list").authorize(AuthorizeDecorator::route(["admin"]));

        let err = guard
            .check(&context(action.clone(), Some(json!({ "role": "user" }))))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));

        let err = guard.check(&context(action.clone(), None)).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));

        guard
            .check(&context(action, Some(json!({ "role": "admin" }))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_global_policies_and_custom_message() {
        let registry = registry();
        let global = vec!["admin".to_string()];
        let guard = RouteGuard::new(&registry)
            .with_global_policies(Some(&global))
            .with_denied_message(Some("Admins only"));

        let err = guard
            .check(&context(MethodMeta::new("list"), Some(json!({ "role": "user" }))))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized: Admins only");
    }
}
