//! Request-facing authorization service.
//!
//! [`Authorization`] bundles the frozen policy registry, the type catalog and
//! the configuration. The host calls [`Authorization::check`] before the
//! action runs and [`Authorization::filter`] on its result.
//!
//! ```ignore
//! let auth = Authorization::new(registry, catalog, config);
//!
//! let invocation = Invocation::new(route.clone())
//!     .with_user(Some(json!({ "role": "admin" })))
//!     .with_parameters(vec![json!(1), body]);
//!
//! auth.check(&invocation).await?;
//! let result = handler(&invocation).await;
//! let body = auth.filter(&invocation, result).await?;
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::AuthResult;
use crate::analysis::RouteAnalysis;
use crate::config::AuthConfig;
use crate::filter::{FieldTransform, FilterCache, ResponseFilter};
use crate::guard::{ParameterGuard, RouteGuard};
use crate::metadata::{RouteMeta, TypeCatalog};
use crate::policy::{AuthorizationContext, PolicyRegistry, RequestInfo};

// =============================================================================
// Invocation
// =============================================================================

/// One call of a routed action.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub route: Arc<RouteMeta>,
    /// Identity attached by the authentication layer.
    pub user: Option<Value>,
    /// Bound arguments in parameter declaration order.
    pub parameters: Vec<Value>,
    /// Framework request; defaults to the route's method and URL.
    pub request: Option<RequestInfo>,
}

impl Invocation {
    pub fn new(route: Arc<RouteMeta>) -> Self {
        Self {
            route,
            user: None,
            parameters: Vec::new(),
            request: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: Option<Value>) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn with_request(mut self, request: RequestInfo) -> Self {
        self.request = Some(request);
        self
    }
}

// =============================================================================
// Authorization
// =============================================================================

/// Route, parameter and response authorization for one application.
pub struct Authorization {
    registry: Arc<PolicyRegistry>,
    catalog: Arc<TypeCatalog>,
    config: AuthConfig,
    transform: Option<FieldTransform>,
    filters: FilterCache,
}

impl Authorization {
    pub fn new(registry: PolicyRegistry, catalog: TypeCatalog, config: AuthConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            catalog: Arc::new(catalog),
            config,
            transform: None,
            filters: FilterCache::new(),
        }
    }

    /// Installs a hook applied to every field kept in filtered responses.
    #[must_use]
    pub fn with_transform(mut self, transform: FieldTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    #[must_use]
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Route-level context for an invocation.
    #[must_use]
    pub fn context(&self, invocation: &Invocation) -> AuthorizationContext {
        let ctx = AuthorizationContext::new(invocation.route.clone(), self.catalog.clone())
            .with_user(invocation.user.clone())
            .with_parameters(invocation.parameters.clone());
        match &invocation.request {
            Some(request) => ctx.with_request(request.clone()),
            None => ctx,
        }
    }

    /// Authorizes an invocation before its action runs: route access first,
    /// then the bound payload unless the request method is read-only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` / `Unauthorized` on denial, and configuration or
    /// policy execution errors unchanged.
    pub async fn check(&self, invocation: &Invocation) -> AuthResult<()> {
        let ctx = self.context(invocation);

        RouteGuard::new(&self.registry)
            .with_global_policies(self.config.global_policies.as_deref())
            .with_denied_message(self.config.denied_message.as_deref())
            .check(&ctx)
            .await?;

        ParameterGuard::new(&self.registry)
            .with_read_only_methods(&self.config.read_only_methods)
            .check(&ctx)
            .await
    }

    /// Removes response fields the invocation's identity may not read.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` when the value contradicts the declared
    /// response type, and configuration or policy execution errors unchanged.
    pub async fn filter(&self, invocation: &Invocation, value: Value) -> AuthResult<Value> {
        if !self.config.filter_responses {
            return Ok(value);
        }
        let Some(shape) = invocation.route.action.response_shape() else {
            return Ok(value);
        };

        let node = self
            .filters
            .get_or_compile(shape, &self.registry, &self.catalog)
            .await?;
        let ctx = self.context(invocation);
        ResponseFilter::new(&self.registry)
            .with_transform(self.transform.as_ref())
            .filter_with(&ctx, &node, value)
            .await
    }

    /// Effective route policies of one route.
    #[must_use]
    pub fn analyze(&self, route: &RouteMeta) -> RouteAnalysis {
        RouteAnalysis::of(route, &self.registry, self.config.global_policies.as_deref())
    }

    /// Effective route policies of every route, in the given order.
    pub fn analyze_all<'r, I>(&self, routes: I) -> Vec<RouteAnalysis>
    where
        I: IntoIterator<Item = &'r RouteMeta>,
    {
        routes.into_iter().map(|route| self.analyze(route)).collect()
    }
}
