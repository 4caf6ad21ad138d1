//! Policy variants and evaluator traits.
//!
//! A policy is a named rule that turns an [`AuthorizationContext`] into an
//! allow/deny verdict. Custom policies apply wherever their name is
//! requested; entity policies additionally require the context to resolve to
//! their entity type, and receive the resolved identifier.
//!
//! ```ignore
//! let admin = define_policy("admin", |ctx| {
//!     Ok(ctx.user_claim("role") == Some(&json!("admin")))
//! });
//!
//! let owner = define_entity_policy("User", "owner", |ctx, id| {
//!     Ok(ctx.user_claim("userId") == Some(id))
//! });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::AuthResult;
use crate::error::AuthError;
use crate::policy::context::AuthorizationContext;
use crate::policy::entity::{resolve_entity, resolve_entity_and_id};

/// Allows every request, with or without identity.
pub const PUBLIC: &str = "Public";

/// Allows any request that carries an identity.
pub const AUTHENTICATED: &str = "Authenticated";

/// Internal write-scoped sentinel; always denies.
pub const READONLY: &str = "tollgate::readonly";

/// Internal read-scoped sentinel; always denies.
pub const WRITEONLY: &str = "tollgate::writeonly";

// =============================================================================
// Evaluator Traits
// =============================================================================

/// Evaluator of a custom policy.
#[async_trait]
pub trait PolicyHandler: Send + Sync {
    async fn authorize(&self, ctx: &AuthorizationContext) -> anyhow::Result<bool>;
}

/// Evaluator of an entity policy, called with the resolved identifier.
#[async_trait]
pub trait EntityPolicyHandler: Send + Sync {
    async fn authorize(&self, ctx: &AuthorizationContext, id: &Value) -> anyhow::Result<bool>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> PolicyHandler for FnHandler<F>
where
    F: Fn(&AuthorizationContext) -> anyhow::Result<bool> + Send + Sync,
{
    async fn authorize(&self, ctx: &AuthorizationContext) -> anyhow::Result<bool> {
        (self.0)(ctx)
    }
}

struct AsyncFnHandler<F>(F);

#[async_trait]
impl<F, Fut> PolicyHandler for AsyncFnHandler<F>
where
    F: Fn(AuthorizationContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    async fn authorize(&self, ctx: &AuthorizationContext) -> anyhow::Result<bool> {
        (self.0)(ctx.clone()).await
    }
}

struct EntityFnHandler<F>(F);

#[async_trait]
impl<F> EntityPolicyHandler for EntityFnHandler<F>
where
    F: Fn(&AuthorizationContext, &Value) -> anyhow::Result<bool> + Send + Sync,
{
    async fn authorize(&self, ctx: &AuthorizationContext, id: &Value) -> anyhow::Result<bool> {
        (self.0)(ctx, id)
    }
}

struct AsyncEntityFnHandler<F>(F);

#[async_trait]
impl<F, Fut> EntityPolicyHandler for AsyncEntityFnHandler<F>
where
    F: Fn(AuthorizationContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    async fn authorize(&self, ctx: &AuthorizationContext, id: &Value) -> anyhow::Result<bool> {
        (self.0)(ctx.clone(), id.clone()).await
    }
}

// =============================================================================
// Policy
// =============================================================================

/// A named authorization rule.
#[derive(Clone)]
pub enum Policy {
    /// Always allows.
    Public,
    /// Allows when an identity is present.
    Authenticated,
    /// Always denies; backs write-protected fields.
    ReadOnly,
    /// Always denies; backs read-protected fields.
    WriteOnly,
    /// User-defined rule.
    Custom {
        name: String,
        handler: Arc<dyn PolicyHandler>,
    },
    /// User-defined rule scoped to one entity type.
    Entity {
        name: String,
        entity: String,
        handler: Arc<dyn EntityPolicyHandler>,
    },
}

impl Policy {
    /// Creates a custom policy from an evaluator object.
    pub fn custom(name: impl Into<String>, handler: impl PolicyHandler + 'static) -> Self {
        Self::Custom {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }

    /// Creates an entity policy from an evaluator object.
    pub fn entity(
        entity: impl Into<String>,
        name: impl Into<String>,
        handler: impl EntityPolicyHandler + 'static,
    ) -> Self {
        Self::Entity {
            name: name.into(),
            entity: entity.into(),
            handler: Arc::new(handler),
        }
    }

    /// Policy name as requested by decorators.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Public => PUBLIC,
            Self::Authenticated => AUTHENTICATED,
            Self::ReadOnly => READONLY,
            Self::WriteOnly => WRITEONLY,
            Self::Custom { name, .. } | Self::Entity { name, .. } => name,
        }
    }

    /// Entity type for entity policies.
    #[must_use]
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Self::Entity { entity, .. } => Some(entity),
            _ => None,
        }
    }

    /// Whether this policy answers a request for `name` in this context.
    ///
    /// # Errors
    ///
    /// Entity policies propagate entity resolution errors.
    pub fn matches(&self, name: &str, ctx: &AuthorizationContext) -> AuthResult<bool> {
        if self.name() != name {
            return Ok(false);
        }
        match self {
            Self::Entity { entity, .. } => Ok(resolve_entity(ctx)? == *entity),
            _ => Ok(true),
        }
    }

    /// Whether both policies claim the same name in the same scope.
    ///
    /// Entity policies only conflict with each other when bound to the same
    /// entity; any other same-named pair conflicts.
    #[must_use]
    pub fn conflicts_with(&self, other: &Policy) -> bool {
        if self.name() != other.name() {
            return false;
        }
        match (self, other) {
            (Self::Entity { entity: a, .. }, Self::Entity { entity: b, .. }) => a == b,
            _ => true,
        }
    }

    /// Evaluates the policy.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PolicyExecution` when the evaluator fails, and
    /// entity resolution errors for entity policies.
    pub async fn evaluate(&self, ctx: &AuthorizationContext) -> AuthResult<bool> {
        match self {
            Self::Public => Ok(true),
            Self::Authenticated => Ok(ctx.is_authenticated()),
            Self::ReadOnly | Self::WriteOnly => Ok(false),
            Self::Custom { name, handler } => handler
                .authorize(ctx)
                .await
                .map_err(|e| execution_error(name, None, ctx, &e)),
            Self::Entity {
                name,
                entity,
                handler,
            } => {
                let Some(resolved) = resolve_entity_and_id(ctx)? else {
                    tracing::debug!(
                        policy = %name,
                        entity = %entity,
                        location = %ctx.current,
                        "Entity policy denied: instance has no identifier"
                    );
                    return Ok(false);
                };
                handler
                    .authorize(ctx, &resolved.id)
                    .await
                    .map_err(|e| execution_error(name, Some(entity), ctx, &e))
            }
        }
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity { name, entity, .. } => f
                .debug_struct("Entity")
                .field("name", name)
                .field("entity", entity)
                .finish_non_exhaustive(),
            Self::Custom { name, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .finish_non_exhaustive(),
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity { name, entity, .. } => write!(f, "entity policy {name} ({entity})"),
            Self::Custom { name, .. } => write!(f, "policy {name}"),
            other => write!(f, "built-in policy {}", other.name()),
        }
    }
}

fn execution_error(
    name: &str,
    entity: Option<&str>,
    ctx: &AuthorizationContext,
    cause: &anyhow::Error,
) -> AuthError {
    let entity = entity
        .map(|e| format!(" for entity {e}"))
        .unwrap_or_default();
    tracing::error!(
        policy = %name,
        location = %ctx.current,
        error = %cause,
        "Authorization policy failed"
    );
    AuthError::policy_execution(format!(
        "Error occur inside authorization policy {name}{entity} on {}\n{cause:#}",
        ctx.current
    ))
}

// =============================================================================
// Definition Helpers
// =============================================================================

/// Defines a custom policy from a synchronous closure.
pub fn define_policy<F>(name: impl Into<String>, evaluator: F) -> Policy
where
    F: Fn(&AuthorizationContext) -> anyhow::Result<bool> + Send + Sync + 'static,
{
    Policy::custom(name, FnHandler(evaluator))
}

/// Defines a custom policy from an async closure.
pub fn define_async_policy<F, Fut>(name: impl Into<String>, evaluator: F) -> Policy
where
    F: Fn(AuthorizationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Policy::custom(name, AsyncFnHandler(evaluator))
}

/// Defines an entity policy from a synchronous closure.
pub fn define_entity_policy<F>(
    entity: impl Into<String>,
    name: impl Into<String>,
    evaluator: F,
) -> Policy
where
    F: Fn(&AuthorizationContext, &Value) -> anyhow::Result<bool> + Send + Sync + 'static,
{
    Policy::entity(entity, name, EntityFnHandler(evaluator))
}

/// Defines an entity policy from an async closure.
pub fn define_async_entity_policy<F, Fut>(
    entity: impl Into<String>,
    name: impl Into<String>,
    evaluator: F,
) -> Policy
where
    F: Fn(AuthorizationContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Policy::entity(entity, name, AsyncEntityFnHandler(evaluator))
}
