//! Route analysis for developer tooling.
//!
//! Summarizes which policies govern each route so startup logs and the CLI
//! can show them, and flags requested names that no registered policy
//! answers to.

use serde::Serialize;

use crate::metadata::RouteMeta;
use crate::policy::PolicyRegistry;
use crate::resolution::{Requirement, route_decorators};

/// Effective route policies of one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteAnalysis {
    pub method: String,
    pub url: String,
    /// `Controller.action`.
    pub action: String,
    /// Effective policy names in decorator order, de-duplicated.
    pub policies: Vec<String>,
    /// Pipe-joined `policies`, e.g. `admin|user`.
    pub summary: String,
    /// Requested names with no registered policy.
    pub unresolved: Vec<String>,
}

impl RouteAnalysis {
    /// Analyzes one route. Unresolved names are logged as warnings.
    #[must_use]
    pub fn of(
        route: &RouteMeta,
        registry: &PolicyRegistry,
        global_policies: Option<&[String]>,
    ) -> Self {
        let decorators = route_decorators(route, global_policies);
        let (policies, unresolved) = match Requirement::compile(registry, &decorators) {
            Some(requirement) => (
                to_owned(requirement.policy_names()),
                to_owned(requirement.unresolved()),
            ),
            None => (Vec::new(), Vec::new()),
        };

        let analysis = Self {
            method: route.method.clone(),
            url: route.url.clone(),
            action: route.qualified_action(),
            summary: policies.join("|"),
            policies,
            unresolved,
        };
        if !analysis.unresolved.is_empty() {
            tracing::warn!(
                method = %analysis.method,
                url = %analysis.url,
                action = %analysis.action,
                unresolved = ?analysis.unresolved,
                "Route requests policies that are not registered"
            );
        }
        analysis
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.unresolved.is_empty()
    }
}

fn to_owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AuthorizeDecorator, ClassMeta, MethodMeta};
    use crate::policy::AUTHENTICATED;

    fn registry() -> PolicyRegistry {
        PolicyRegistry::builder()
            .define_policy("admin", |_| Ok(true))
            .define_policy("user", |_| Ok(true))
            .build()
            .unwrap()
    }

    #[test]
    fn test_summary_is_pipe_joined() {
        let route = RouteMeta::new(
            "get",
            "/users",
            ClassMeta::new("UsersController"),
            MethodMeta::new("list")
                .authorize(AuthorizeDecorator::route(["admin"]))
                .authorize(AuthorizeDecorator::route(["user", "admin"])),
        );
        let analysis = RouteAnalysis::of(&route, &registry(), None);
        assert_eq!(analysis.summary, "admin|user");
        assert_eq!(analysis.action, "UsersController.list");
        assert!(!analysis.has_warnings());
    }

    #[test]
    fn test_implicit_authentication_is_reported() {
        let route = RouteMeta::new(
            "get",
            "/me",
            ClassMeta::new("UsersController"),
            MethodMeta::new("me"),
        );
        let analysis = RouteAnalysis::of(&route, &registry(), None);
        assert_eq!(analysis.summary, AUTHENTICATED);
    }

    #[test]
    fn test_unresolved_names_are_flagged() {
        let route = RouteMeta::new(
            "delete",
            "/users/:id",
            ClassMeta::new("UsersController"),
            MethodMeta::new("delete"),
        );
        let global = vec!["admin".to_string(), "superuser".to_string()];
        let analysis = RouteAnalysis::of(&route, &registry(), Some(&global));
        assert_eq!(analysis.summary, "admin|superuser");
        assert_eq!(analysis.unresolved, vec!["superuser".to_string()]);
        assert!(analysis.has_warnings());
    }
}
