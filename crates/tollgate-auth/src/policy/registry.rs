//! Policy registry.
//!
//! Policies are collected during application setup with a
//! [`PolicyRegistryBuilder`]; [`PolicyRegistryBuilder::build`] runs the
//! pairwise conflict check and freezes the set. The resulting
//! [`PolicyRegistry`] is read-only and shared across requests.
//!
//! ```ignore
//! let registry = PolicyRegistry::builder()
//!     .define_policy("admin", |ctx| Ok(ctx.user_claim("role") == Some(&json!("admin"))))
//!     .define_entity_policy("Post", "owner", |ctx, id| Ok(ctx.user_claim("userId") == Some(id)))
//!     .build()?;
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::AuthResult;
use crate::error::AuthError;
use crate::policy::authorizer::Authorizer;
use crate::policy::context::AuthorizationContext;
use crate::policy::definition::{Policy, define_entity_policy, define_policy};

/// Collects policies before the conflict check.
///
/// Built-in policies (`Public`, `Authenticated` and the read/write-only
/// sentinels) are registered first.
pub struct PolicyRegistryBuilder {
    policies: Vec<Arc<Policy>>,
}

impl Default for PolicyRegistryBuilder {
    fn default() -> Self {
        Self {
            policies: vec![
                Arc::new(Policy::Public),
                Arc::new(Policy::Authenticated),
                Arc::new(Policy::ReadOnly),
                Arc::new(Policy::WriteOnly),
            ],
        }
    }
}

impl PolicyRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a policy.
    #[must_use]
    pub fn register(mut self, policy: impl Into<Arc<Policy>>) -> Self {
        self.policies.push(policy.into());
        self
    }

    /// Appends every policy of an explicit list.
    #[must_use]
    pub fn register_all<I, P>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Arc<Policy>>,
    {
        self.policies.extend(policies.into_iter().map(Into::into));
        self
    }

    /// Defines and appends a custom policy.
    #[must_use]
    pub fn define_policy<F>(self, name: impl Into<String>, evaluator: F) -> Self
    where
        F: Fn(&AuthorizationContext) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.register(define_policy(name, evaluator))
    }

    /// Defines and appends an entity policy.
    #[must_use]
    pub fn define_entity_policy<F>(
        self,
        entity: impl Into<String>,
        name: impl Into<String>,
        evaluator: F,
    ) -> Self
    where
        F: Fn(&AuthorizationContext, &Value) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.register(define_entity_policy(entity, name, evaluator))
    }

    /// Checks for conflicts and freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PolicyConflict` naming the first conflicting pair.
    pub fn build(self) -> AuthResult<PolicyRegistry> {
        check_conflicts(&self.policies)?;
        tracing::debug!(count = self.policies.len(), "Policy registry built");
        Ok(PolicyRegistry {
            policies: self.policies,
        })
    }
}

/// Tests every unordered pair of `policies` for a name conflict.
///
/// The same policy instance registered twice is not a conflict.
///
/// # Errors
///
/// Returns `AuthError::PolicyConflict` naming both policies.
pub fn check_conflicts(policies: &[Arc<Policy>]) -> AuthResult<()> {
    for (i, a) in policies.iter().enumerate() {
        for b in &policies[i + 1..] {
            if !Arc::ptr_eq(a, b) && a.conflicts_with(b) {
                return Err(AuthError::policy_conflict(a.to_string(), b.to_string()));
            }
        }
    }
    Ok(())
}

/// Frozen, conflict-free set of policies in registration order.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: Vec<Arc<Policy>>,
}

impl PolicyRegistry {
    #[must_use]
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::new()
    }

    /// Builds an authorizer for the requested policy names.
    ///
    /// Each name keeps its candidates in registration order; names without
    /// any candidate are kept and never vote.
    #[must_use]
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Authorizer {
        Authorizer::new(
            names
                .iter()
                .map(|name| {
                    let name = name.as_ref();
                    let candidates = self
                        .policies
                        .iter()
                        .filter(|p| p.name() == name)
                        .cloned()
                        .collect();
                    (name.to_string(), candidates)
                })
                .collect(),
        )
    }

    /// Returns `true` if any policy answers to `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.policies.iter().any(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
