//! Parameter write guard.
//!
//! Walks every bound argument depth-first in declaration order. A value whose
//! parameter or property carries a write decorator is authorized before its
//! children; a denied value contributes its path and is not descended into.
//! Relation properties are checked but never descended into, and null or
//! absent values are skipped entirely.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use serde_json::Value;

use crate::AuthResult;
use crate::config::{DEFAULT_READ_ONLY_METHODS, is_read_only_method};
use crate::error::AuthError;
use crate::metadata::{AccessModifier, AuthorizeDecorator, TypeRef};
use crate::policy::{AuthorizationContext, CurrentMeta, PolicyRegistry};
use crate::resolution::Requirement;

/// A parameter or property as seen by the walk.
struct Field<'m> {
    decorators: Vec<&'m AuthorizeDecorator>,
    type_ref: &'m TypeRef,
    relation: bool,
    current: CurrentMeta,
}

/// Rejects request payloads that populate fields the identity may not write.
pub struct ParameterGuard<'a> {
    registry: &'a PolicyRegistry,
    read_only_methods: Option<&'a [String]>,
}

impl<'a> ParameterGuard<'a> {
    #[must_use]
    pub fn new(registry: &'a PolicyRegistry) -> Self {
        Self {
            registry,
            read_only_methods: None,
        }
    }

    /// HTTP methods whose requests are not checked. Defaults to `GET`.
    #[must_use]
    pub fn with_read_only_methods(mut self, methods: &'a [String]) -> Self {
        self.read_only_methods = Some(methods);
        self
    }

    fn skips(&self, method: &str) -> bool {
        match self.read_only_methods {
            Some(methods) => is_read_only_method(methods, method),
            None => is_read_only_method(DEFAULT_READ_ONLY_METHODS, method),
        }
    }

    /// Checks every bound argument.
    ///
    /// # Errors
    ///
    /// Returns a single `Forbidden` / `Unauthorized` error listing every
    /// denied path in walk order, or the first policy or configuration error.
    pub async fn check(&self, ctx: &AuthorizationContext) -> AuthResult<()> {
        if self.skips(&ctx.request.method) {
            tracing::trace!(method = %ctx.request.method, "Parameter write check skipped");
            return Ok(());
        }

        let paths = self.unauthorized_paths(ctx).await?;
        if paths.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            action = %ctx.route.qualified_action(),
            paths = ?paths,
            "Parameter write denied"
        );
        Err(AuthError::denied(
            ctx.is_authenticated(),
            Some(format!(
                "Unauthorized to populate parameter paths ({})",
                paths.join(", ")
            )),
        ))
    }

    /// Paths the identity may not populate, in depth-first pre-order.
    ///
    /// # Errors
    ///
    /// Returns the first policy or configuration error in walk order.
    pub async fn unauthorized_paths(&self, ctx: &AuthorizationContext) -> AuthResult<Vec<String>> {
        let route = &ctx.route;
        let walks = route.action.parameters.iter().enumerate().map(|(index, param)| {
            let field = Field {
                decorators: param.authorize_decorators(AccessModifier::Write).collect(),
                type_ref: &param.type_ref,
                relation: false,
                current: CurrentMeta::parameter(
                    &route.controller.name,
                    &route.action.name,
                    &param.name,
                ),
            };
            let value = ctx.parameters.get(index).unwrap_or(&Value::Null);
            self.walk(ctx, field, value, None, param.name.clone())
        });
        concat(join_all(walks).await)
    }

    fn walk<'s>(
        &'s self,
        ctx: &'s AuthorizationContext,
        field: Field<'s>,
        value: &'s Value,
        parent: Option<&'s Value>,
        path: String,
    ) -> BoxFuture<'s, AuthResult<Vec<String>>> {
        async move {
            if value.is_null() {
                return Ok(Vec::new());
            }

            if let Some(requirement) =
                Requirement::compile(self.registry, field.decorators.iter().copied())
            {
                let field_ctx = ctx.for_field(
                    AccessModifier::Write,
                    field.current.clone(),
                    Some(value.clone()),
                    parent.cloned(),
                );
                if !requirement.authorize(&field_ctx).await? {
                    return Ok(vec![path]);
                }
            }

            if field.relation {
                return Ok(Vec::new());
            }
            self.descend(ctx, field.type_ref, value, path).await
        }
        .boxed()
    }

    fn descend<'s>(
        &'s self,
        ctx: &'s AuthorizationContext,
        type_ref: &'s TypeRef,
        value: &'s Value,
        path: String,
    ) -> BoxFuture<'s, AuthResult<Vec<String>>> {
        async move {
            match (type_ref, value) {
                (TypeRef::Array { of }, Value::Array(items)) => {
                    let walks = items.iter().enumerate().map(|(i, item)| {
                        let path = format!("{path}.{i}");
                        async move {
                            if item.is_null() {
                                return Ok(Vec::new());
                            }
                            self.descend(ctx, of, item, path).await
                        }
                    });
                    concat(join_all(walks).await)
                }
                (TypeRef::Class { name }, Value::Object(object)) => {
                    let class = ctx.catalog().require(name)?;
                    let walks = class.properties.iter().filter_map(|prop| {
                        let child = object.get(&prop.name)?;
                        let field = Field {
                            decorators: prop.authorize_decorators(AccessModifier::Write).collect(),
                            type_ref: &prop.type_ref,
                            relation: prop.is_relation(),
                            current: CurrentMeta::property(&class.name, &prop.name),
                        };
                        let path = format!("{path}.{}", prop.name);
                        Some(self.walk(ctx, field, child, Some(value), path))
                    });
                    concat(join_all(walks).await)
                }
                _ => Ok(Vec::new()),
            }
        }
        .boxed()
    }
}

fn concat(results: Vec<AuthResult<Vec<String>>>) -> AuthResult<Vec<String>> {
    let mut paths = Vec::new();
    for result in results {
        paths.extend(result?);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::config::AuthConfig;
    use crate::metadata::{
        AuthorizeDecorator, ClassMeta, MethodMeta, ParameterMeta, PropertyMeta, RouteMeta,
        TypeCatalog,
    };
    use crate::policy::RequestInfo;

    fn catalog() -> Arc<TypeCatalog> {
        Arc::new(
            TypeCatalog::new()
                .with(
                    ClassMeta::new("Item")
                        .property(
                            PropertyMeta::new("id", TypeRef::Value)
                                .authorize(AuthorizeDecorator::write(["admin"])),
                        )
                        .property(PropertyMeta::new("name", TypeRef::Value))
                        .property(
                            PropertyMeta::new("owner", TypeRef::class("User"))
                                .relation()
                                .authorize(AuthorizeDecorator::write(["Authenticated"])),
                        )
                        .property(PropertyMeta::new("entity", TypeRef::class("Item"))),
                )
                .with(
                    ClassMeta::new("User").property(
                        PropertyMeta::new("role", TypeRef::Value)
                            .authorize(AuthorizeDecorator::write(["admin"])),
                    ),
                ),
        )
    }

    fn registry() -> PolicyRegistry {
        PolicyRegistry::builder()
            .define_policy("admin", |ctx| Ok(ctx.user_claim("role") == Some(&json!("admin"))))
            .build()
            .unwrap()
    }

    fn context(method: &str, data: TypeRef, value: serde_json::Value) -> AuthorizationContext {
        let route = RouteMeta::new(
            method,
            "/items",
            ClassMeta::new("ItemsController"),
            MethodMeta::new("save").parameter(ParameterMeta::new("data", data)),
        );
        AuthorizationContext::new(Arc::new(route), catalog())
            .with_user(Some(json!({ "role": "user" })))
            .with_parameters(vec![value])
    }

    #[tokio::test]
    async fn test_nested_paths_are_reported() {
        let registry = registry();
        let guard = ParameterGuard::new(&registry);
        let ctx = context(
            "post",
            TypeRef::class("Item"),
            json!({ "id": 1, "name": "x", "entity": { "id": 2, "name": "y" } }),
        );
        assert_eq!(
            guard.unauthorized_paths(&ctx).await.unwrap(),
            vec!["data.id", "data.entity.id"]
        );

        let err = guard.check(&ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));
        assert_eq!(
            err.to_string(),
            "Unauthorized: Unauthorized to populate parameter paths (data.id, data.entity.id)"
        );
    }

    #[tokio::test]
    async fn test_array_paths_are_indexed() {
        let registry = registry();
        let guard = ParameterGuard::new(&registry);
        let ctx = context(
            "post",
            TypeRef::array(TypeRef::class("Item")),
            json!([{ "name": "a" }, { "id": 5 }, null]),
        );
        assert_eq!(guard.unauthorized_paths(&ctx).await.unwrap(), vec!["data.1.id"]);
    }

    #[tokio::test]
    async fn test_relations_are_not_descended() {
        let registry = registry();
        let guard = ParameterGuard::new(&registry);
        let ctx = context(
            "post",
            TypeRef::class("Item"),
            json!({ "owner": { "role": "admin" } }),
        );
        assert!(guard.unauthorized_paths(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_denied_parameter_stops_descent() {
        let registry = registry();
        let guard = ParameterGuard::new(&registry);
        let route = RouteMeta::new(
            "post",
            "/items",
            ClassMeta::new("ItemsController"),
            MethodMeta::new("save").parameter(
                ParameterMeta::new("data", TypeRef::class("Item"))
                    .authorize(AuthorizeDecorator::write(["admin"])),
            ),
        );
        let ctx = AuthorizationContext::new(Arc::new(route), catalog())
            .with_parameters(vec![json!({ "id": 1 })]);

        assert_eq!(guard.unauthorized_paths(&ctx).await.unwrap(), vec!["data"]);
        let err = guard.check(&ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_null_values_do_not_invoke_policies() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let registry = PolicyRegistry::builder()
            .define_policy("admin", move |_| {
                *counter.lock().unwrap() += 1;
                Ok(false)
            })
            .build()
            .unwrap();
        let guard = ParameterGuard::new(&registry);
        let ctx = context("post", TypeRef::class("Item"), json!({ "id": null, "name": "x" }));

        guard.check(&ctx).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_only_methods_skip_checks() {
        let registry = registry();
        let ctx = context("get", TypeRef::class("Item"), json!({ "id": 1 }));
        ParameterGuard::new(&registry).check(&ctx).await.unwrap();

        let methods = vec!["HEAD".to_string()];
        let guard = ParameterGuard::new(&registry).with_read_only_methods(&methods);
        assert!(guard.check(&ctx).await.is_err());

        let ctx = ctx.with_request(RequestInfo::new("head", "/items"));
        guard.check(&ctx).await.unwrap();
    }

    #[test]
    fn test_skipped_methods_follow_config() {
        let registry = registry();
        let methods = ["get", "GET", "head", "POST", "put"];

        let config = AuthConfig::default();
        let guard = ParameterGuard::new(&registry);
        for method in methods {
            assert_eq!(guard.skips(method), config.is_read_only(method), "{method}");
        }

        let config = AuthConfig {
            read_only_methods: vec!["GET".to_string(), "HEAD".to_string()],
            ..AuthConfig::default()
        };
        let guard =
            ParameterGuard::new(&registry).with_read_only_methods(&config.read_only_methods);
        for method in methods {
            assert_eq!(guard.skips(method), config.is_read_only(method), "{method}");
        }
        assert!(guard.skips("head"));
    }

    #[tokio::test]
    async fn test_unknown_class_is_configuration_error() {
        let registry = registry();
        let guard = ParameterGuard::new(&registry);
        let ctx = context("post", TypeRef::class("Ghost"), json!({ "id": 1 }));
        let err = guard.check(&ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }
}
