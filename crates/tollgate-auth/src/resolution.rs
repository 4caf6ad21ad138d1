//! Decorator selection and compilation.
//!
//! Route access uses exactly one level of decorators: the action's own
//! (including controller decorators narrowed to it with `applies_to`), else
//! the controller's, else the configured global policies, else implicit
//! `Authenticated`. Levels are never merged.

use futures_util::future::join_all;

use crate::AuthResult;
use crate::metadata::{AccessModifier, AuthorizeDecorator, DecoratorLocation, RouteMeta};
use crate::policy::{AuthorizationContext, Authorizer, PolicyRegistry};

/// Route-scoped decorators that govern access to `route`.
#[must_use]
pub fn route_decorators(
    route: &RouteMeta,
    global_policies: Option<&[String]>,
) -> Vec<AuthorizeDecorator> {
    let narrowed = route
        .controller
        .authorize_decorators(AccessModifier::Route)
        .filter(|d| d.applies_to.iter().any(|a| *a == route.action.name));

    let method_level: Vec<_> = route
        .action
        .authorize_decorators(AccessModifier::Route)
        .chain(narrowed)
        .cloned()
        .collect();
    if !method_level.is_empty() {
        return method_level;
    }

    let class_level: Vec<_> = route
        .controller
        .authorize_decorators(AccessModifier::Route)
        .filter(|d| d.applies_to.is_empty())
        .cloned()
        .collect();
    if !class_level.is_empty() {
        return class_level;
    }

    match global_policies {
        Some(policies) => vec![AuthorizeDecorator::route(policies.iter().cloned())],
        None => vec![AuthorizeDecorator::authenticated()],
    }
}

/// Compiled set of decorators on one target; granted when any decorator is.
#[derive(Debug, Clone)]
pub struct Requirement {
    checks: Vec<(DecoratorLocation, Authorizer)>,
}

impl Requirement {
    /// Compiles decorators against the registry. Returns `None` when there
    /// are no decorators, meaning the target is unrestricted.
    pub fn compile<'a, I>(registry: &PolicyRegistry, decorators: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a AuthorizeDecorator>,
    {
        let checks: Vec<_> = decorators
            .into_iter()
            .map(|d| (d.location, registry.resolve(&d.policies)))
            .collect();
        (!checks.is_empty()).then_some(Self { checks })
    }

    /// Requested policy names across all decorators, de-duplicated in order.
    #[must_use]
    pub fn policy_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.checks.iter().flat_map(|(_, a)| a.policy_ids()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Requested names with no registered policy, de-duplicated in order.
    #[must_use]
    pub fn unresolved(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.checks.iter().flat_map(|(_, a)| a.unresolved()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Evaluates every decorator and ORs the verdicts.
    ///
    /// Route-level contexts are re-anchored to the decorator's location so
    /// policy errors name the class or method the decorator sits on.
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error in decorator order.
    pub async fn authorize(&self, ctx: &AuthorizationContext) -> AuthResult<bool> {
        let contexts: Vec<_> = self
            .checks
            .iter()
            .map(|(location, _)| match ctx.access {
                AccessModifier::Route => ctx.anchored_at(*location),
                AccessModifier::Read | AccessModifier::Write => ctx.clone(),
            })
            .collect();
        let verdicts = join_all(
            self.checks
                .iter()
                .zip(&contexts)
                .map(|((_, authorizer), ctx)| authorizer.authorize(ctx)),
        )
        .await;

        let mut allowed = false;
        for verdict in verdicts {
            allowed |= verdict?;
        }
        Ok(allowed)
    }
}
