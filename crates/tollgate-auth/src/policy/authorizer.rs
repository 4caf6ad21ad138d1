//! Verdict aggregation over a list of requested policy names.
//!
//! Requested names are evaluated concurrently and ORed. Within one name the
//! candidates are tried last-registered first, stopping at the first allow.
//! Errors are reported in requested-name order regardless of completion
//! order.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::AuthResult;
use crate::policy::context::AuthorizationContext;
use crate::policy::definition::Policy;

#[derive(Debug, Clone)]
struct PolicyGroup {
    name: String,
    candidates: Vec<Arc<Policy>>,
}

impl PolicyGroup {
    async fn authorize(&self, ctx: &AuthorizationContext) -> AuthResult<bool> {
        for policy in self.candidates.iter().rev() {
            if policy.matches(&self.name, ctx)? && policy.evaluate(ctx).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Decision function for one OR-group of policy names.
#[derive(Debug, Clone)]
pub struct Authorizer {
    groups: Vec<PolicyGroup>,
}

impl Authorizer {
    pub(crate) fn new(groups: Vec<(String, Vec<Arc<Policy>>)>) -> Self {
        Self {
            groups: groups
                .into_iter()
                .map(|(name, candidates)| PolicyGroup { name, candidates })
                .collect(),
        }
    }

    /// Requested names in order.
    #[must_use]
    pub fn policy_ids(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Requested names with no registered policy.
    #[must_use]
    pub fn unresolved(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| g.candidates.is_empty())
            .map(|g| g.name.as_str())
            .collect()
    }

    /// Returns `true` if at least one requested policy allows.
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error in requested-name order.
    pub async fn authorize(&self, ctx: &AuthorizationContext) -> AuthResult<bool> {
        let ctx = ctx.clone().with_policy_ids(
            self.policy_ids().into_iter().map(str::to_string).collect(),
        );
        let verdicts = join_all(self.groups.iter().map(|g| g.authorize(&ctx))).await;

        let mut allowed = false;
        for verdict in verdicts {
            allowed |= verdict?;
        }
        tracing::trace!(
            policies = ?ctx.policy_ids,
            access = %ctx.access,
            location = %ctx.current,
            allowed,
            "Policies evaluated"
        );
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::error::AuthError;
    use crate::metadata::{
        ClassMeta, MethodMeta, ParameterMeta, RouteMeta, TypeCatalog, TypeRef,
    };
    use crate::policy::definition::{define_entity_policy, define_policy};
    use crate::policy::registry::PolicyRegistry;

    fn context(action: MethodMeta) -> AuthorizationContext {
        let route = RouteMeta::new("get", "/items", ClassMeta::new("ItemsController"), action);
        AuthorizationContext::new(Arc::new(route), Arc::new(TypeCatalog::new()))
    }

    #[tokio::test]
    async fn test_or_across_names() {
        let registry = PolicyRegistry::builder()
            .define_policy("deny", |_| Ok(false))
            .define_policy("allow", |_| Ok(true))
            .build()
            .unwrap();
        let ctx = context(MethodMeta::new("list"));
        assert!(registry.resolve(&["deny", "allow"]).authorize(&ctx).await.unwrap());
        assert!(!registry.resolve(&["deny"]).authorize(&ctx).await.unwrap());
        assert!(!registry.resolve(&["ghost"]).authorize(&ctx).await.unwrap());
        assert!(!registry.resolve::<&str>(&[]).authorize(&ctx).await.unwrap());
    }

    #[tokio::test]
    async fn test_candidates_run_last_registered_first() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let first = calls.clone();
        let second = calls.clone();
        let registry = PolicyRegistry::builder()
            .define_entity_policy("Item", "owner", move |_, _| {
                first.lock().unwrap().push("Item");
                Ok(true)
            })
            .define_entity_policy("Other", "owner", move |_, _| {
                second.lock().unwrap().push("Other");
                Ok(true)
            })
            .build()
            .unwrap();
        let ctx = context(
            MethodMeta::new("get")
                .parameter(ParameterMeta::new("id", TypeRef::Value))
                .entity_provider("Item", "id"),
        )
        .with_parameters(vec![json!(1)]);

        assert!(registry.resolve(&["owner"]).authorize(&ctx).await.unwrap());
        // "Other" is tried first but does not match the resolved entity
        assert_eq!(*calls.lock().unwrap(), vec!["Item"]);
    }

    #[tokio::test]
    async fn test_error_takes_precedence_in_name_order() {
        let registry = PolicyRegistry::builder()
            .define_policy("allow", |_| Ok(true))
            .define_policy("broken", |_| Err(anyhow::anyhow!("boom")))
            .build()
            .unwrap();
        let ctx = context(MethodMeta::new("list"));
        let err = registry
            .resolve(&["allow", "broken"])
            .authorize(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PolicyExecution { .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn test_policy_ids_are_visible_to_evaluators() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let registry = PolicyRegistry::builder()
            .register(define_policy("inspect", move |ctx| {
                sink.lock().unwrap().extend(ctx.policy_ids.clone());
                Ok(false)
            }))
            .build()
            .unwrap();
        let ctx = context(MethodMeta::new("list"));
        registry
            .resolve(&["inspect", "Public"])
            .authorize(&ctx)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["inspect", "Public"]);
    }

    #[tokio::test]
    async fn test_entity_policy_without_provider_fails() {
        let registry = PolicyRegistry::builder()
            .register(define_entity_policy("Item", "owner", |_, _| Ok(true)))
            .build()
            .unwrap();
        let ctx = context(MethodMeta::new("list"));
        let err = registry.resolve(&["owner"]).authorize(&ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }
}
