//! # tollgate-auth
//!
//! Policy-based authorization for routed controller actions.
//!
//! This crate provides:
//! - Named policies, entity-scoped policies and the built-ins
//!   (`Public`, `Authenticated`, read-only / write-only sentinels)
//! - A startup-time policy registry with conflict detection
//! - Route access checks with method > class > global > implicit resolution
//! - Request payload write checks reporting every denied field path
//! - Response read filtering over possibly cyclic domain models
//! - Route policy summaries for developer tooling
//!
//! ## Modules
//!
//! - [`config`] - Authorization configuration and loader
//! - [`error`] - Error types and status mapping
//! - [`metadata`] - Class, method, parameter and property descriptors
//! - [`policy`] - Policy definitions, registry and evaluation context
//! - [`resolution`] - Decorator selection and compilation
//! - [`guard`] - Route and parameter write guards
//! - [`filter`] - Response read filter
//! - [`analysis`] - Route policy summaries
//! - [`service`] - Request-facing authorization service
//! - [`http`] - Axum response mapping for errors

pub mod analysis;
pub mod config;
pub mod error;
pub mod filter;
pub mod guard;
pub mod http;
pub mod metadata;
pub mod policy;
pub mod resolution;
pub mod service;

pub use analysis::RouteAnalysis;
pub use config::{AuthConfig, ConfigError, LoggingConfig};
pub use error::{AuthError, ErrorCategory};
pub use filter::{FieldTransform, FilterCache, FilterNode, ResponseFilter};
pub use guard::{ParameterGuard, RouteGuard};
pub use metadata::{
    AccessModifier, AuthorizeDecorator, ClassMeta, Decorator, DecoratorLocation, EntityProvider,
    MethodMeta, ParameterMeta, PropertyMeta, RouteMeta, TypeCatalog, TypeRef,
};
pub use policy::{
    AUTHENTICATED, AuthorizationContext, Authorizer, CurrentMeta, EntityPolicyHandler, EntityRef,
    PUBLIC, Policy, PolicyHandler, PolicyRegistry, PolicyRegistryBuilder, READONLY, RequestInfo,
    WRITEONLY, check_conflicts, define_async_entity_policy, define_async_policy,
    define_entity_policy, define_policy, resolve_entity, resolve_entity_and_id,
};
pub use resolution::{Requirement, route_decorators};
pub use service::{Authorization, Invocation};

/// Type alias for authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tollgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::metadata::{
        AccessModifier, AuthorizeDecorator, ClassMeta, MethodMeta, ParameterMeta, PropertyMeta,
        RouteMeta, TypeCatalog, TypeRef,
    };
    pub use crate::policy::{
        AuthorizationContext, EntityPolicyHandler, Policy, PolicyHandler, PolicyRegistry,
        RequestInfo, define_async_entity_policy, define_async_policy, define_entity_policy,
        define_policy,
    };
    pub use crate::service::{Authorization, Invocation};
}
