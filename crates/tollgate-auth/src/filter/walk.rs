//! Response read filter.
//!
//! Projects a handler result through its compiled [`FilterNode`]: gated
//! properties are evaluated against a context carrying the property value
//! and its parent object, denied or null properties are omitted, and objects
//! left without properties collapse so the enclosing array or object drops
//! them. The top-level value is returned even when it ends up empty.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use serde_json::{Map, Value};

use crate::AuthResult;
use crate::error::AuthError;
use crate::filter::node::{ClassNode, FilterNode, PropertyNode};
use crate::metadata::{AccessModifier, PropertyMeta};
use crate::policy::{AuthorizationContext, CurrentMeta, PolicyRegistry};

/// Post-processes every field kept in a filtered response.
pub type FieldTransform = Arc<dyn Fn(&PropertyMeta, Value) -> Value + Send + Sync>;

/// Removes response fields the identity may not read.
pub struct ResponseFilter<'a> {
    registry: &'a PolicyRegistry,
    transform: Option<&'a FieldTransform>,
}

impl<'a> ResponseFilter<'a> {
    #[must_use]
    pub fn new(registry: &'a PolicyRegistry) -> Self {
        Self {
            registry,
            transform: None,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Option<&'a FieldTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Filters `value` against the action's response shape. Actions without
    /// a declared type are passed through.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TypeMismatch` when the value does not have the
    /// declared shape, and policy or configuration errors unchanged.
    pub async fn filter(&self, ctx: &AuthorizationContext, value: Value) -> AuthResult<Value> {
        let Some(shape) = ctx.route.action.response_shape() else {
            return Ok(value);
        };
        let node = FilterNode::compile(shape, self.registry, ctx.catalog())?;
        self.filter_with(ctx, &node, value).await
    }

    /// Filters `value` against an already compiled node.
    ///
    /// # Errors
    ///
    /// Same as [`ResponseFilter::filter`].
    pub async fn filter_with(
        &self,
        ctx: &AuthorizationContext,
        node: &FilterNode,
        value: Value,
    ) -> AuthResult<Value> {
        match (node, value) {
            (_, Value::Null) => Ok(Value::Null),
            (FilterNode::Class(class), Value::Object(object)) => {
                Ok(Value::Object(self.filter_object(ctx, class, object).await?))
            }
            (node, value) => Ok(self.walk(ctx, node, value).await?.unwrap_or(Value::Null)),
        }
    }

    fn walk<'s>(
        &'s self,
        ctx: &'s AuthorizationContext,
        node: &'s FilterNode,
        value: Value,
    ) -> BoxFuture<'s, AuthResult<Option<Value>>> {
        async move {
            match (node, value) {
                (FilterNode::Value, value) => Ok(Some(value)),
                (FilterNode::Array(child), Value::Array(items)) => {
                    if items.is_empty() {
                        return Ok(Some(Value::Array(items)));
                    }
                    let filtered =
                        join_all(items.into_iter().map(|item| self.walk(ctx, child, item))).await;
                    let mut kept = Vec::with_capacity(filtered.len());
                    for item in filtered {
                        kept.extend(item?);
                    }
                    Ok(Some(Value::Array(kept)))
                }
                (FilterNode::Array(_), Value::Null) => Ok(Some(Value::Null)),
                (FilterNode::Class(_), Value::Null) => Ok(None),
                (FilterNode::Class(class), Value::Object(object)) => {
                    let object = self.filter_object(ctx, class, object).await?;
                    Ok((!object.is_empty()).then_some(Value::Object(object)))
                }
                (node, value) => Err(type_mismatch(ctx, node, &value)),
            }
        }
        .boxed()
    }

    async fn filter_object(
        &self,
        ctx: &AuthorizationContext,
        class: &ClassNode,
        object: Map<String, Value>,
    ) -> AuthResult<Map<String, Value>> {
        if class.terminal {
            return Ok(Map::new());
        }

        let parent = Value::Object(object);
        let fields = join_all(
            class
                .properties
                .iter()
                .map(|prop| self.filter_property(ctx, class, prop, &parent)),
        )
        .await;

        let mut output = Map::new();
        for (prop, field) in class.properties.iter().zip(fields) {
            if let Some(value) = field? {
                let value = match self.transform {
                    Some(transform) => transform(&prop.meta, value),
                    None => value,
                };
                output.insert(prop.meta.name.clone(), value);
            }
        }
        Ok(output)
    }

    async fn filter_property(
        &self,
        ctx: &AuthorizationContext,
        class: &ClassNode,
        prop: &PropertyNode,
        parent: &Value,
    ) -> AuthResult<Option<Value>> {
        let raw = match parent.get(&prop.meta.name) {
            None | Some(Value::Null) => return Ok(None),
            Some(raw) => raw,
        };

        if let Some(requirement) = &prop.requirement {
            let field_ctx = ctx.for_field(
                AccessModifier::Read,
                CurrentMeta::property(&class.class.name, &prop.meta.name),
                Some(raw.clone()),
                Some(parent.clone()),
            );
            if !requirement.authorize(&field_ctx).await? {
                tracing::trace!(
                    class = %class.class.name,
                    property = %prop.meta.name,
                    "Response field omitted"
                );
                return Ok(None);
            }
        }

        self.walk(ctx, &prop.node, raw.clone()).await
    }
}

fn type_mismatch(ctx: &AuthorizationContext, node: &FilterNode, value: &Value) -> AuthError {
    AuthError::type_mismatch(format!(
        "Action {} expects a value of type {} but got {}",
        ctx.route.qualified_action(),
        node.type_name(),
        runtime_type(value)
    ))
}

fn runtime_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::metadata::{
        AuthorizeDecorator, ClassMeta, MethodMeta, RouteMeta, TypeCatalog, TypeRef,
    };

    fn catalog() -> Arc<TypeCatalog> {
        Arc::new(
            TypeCatalog::new()
                .with(
                    ClassMeta::new("User")
                        .property(PropertyMeta::new("id", TypeRef::Value).primary_id())
                        .property(PropertyMeta::new("name", TypeRef::Value))
                        .property(
                            PropertyMeta::new("email", TypeRef::Value)
                                .authorize(AuthorizeDecorator::read(["admin"])),
                        )
                        .property(
                            PropertyMeta::new("password", TypeRef::Value)
                                .authorize(AuthorizeDecorator::writeonly()),
                        )
                        .property(PropertyMeta::new(
                            "friends",
                            TypeRef::array(TypeRef::class("User")),
                        )),
                )
                .with(
                    ClassMeta::new("Secret").property(
                        PropertyMeta::new("code", TypeRef::Value)
                            .authorize(AuthorizeDecorator::read(["admin"])),
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

    fn context(returns: TypeRef, role: &str) -> AuthorizationContext {
        let route = RouteMeta::new(
            "get",
            "/users",
            ClassMeta::new("UsersController"),
            MethodMeta::new("list").returns(returns),
        );
        AuthorizationContext::new(Arc::new(route), catalog())
            .with_user(Some(json!({ "role": role })))
    }

    fn user() -> Value {
        json!({ "id": 1, "name": "Ann", "email": "ann@x.io", "password": "hash", "extra": true })
    }

    #[tokio::test]
    async fn test_gated_field_visibility() {
        let registry = registry();
        let filter = ResponseFilter::new(&registry);

        let filtered = filter
            .filter(&context(TypeRef::class("User"), "user"), user())
            .await
            .unwrap();
        assert_eq!(filtered, json!({ "id": 1, "name": "Ann" }));

        let filtered = filter
            .filter(&context(TypeRef::class("User"), "admin"), user())
            .await
            .unwrap();
        assert_eq!(filtered, json!({ "id": 1, "name": "Ann", "email": "ann@x.io" }));
    }

    #[tokio::test]
    async fn test_empty_objects_collapse_except_top_level() {
        let registry = registry();
        let filter = ResponseFilter::new(&registry);

        let ctx = context(TypeRef::class("Secret"), "user");
        assert_eq!(filter.filter(&ctx, json!({ "code": 1 })).await.unwrap(), json!({}));

        let ctx = context(TypeRef::array(TypeRef::class("Secret")), "user");
        let filtered = filter
            .filter(&ctx, json!([{ "code": 1 }, { "code": 2 }]))
            .await
            .unwrap();
        assert_eq!(filtered, json!([]));
    }

    #[tokio::test]
    async fn test_cyclic_branch_is_omitted() {
        let registry = registry();
        let filter = ResponseFilter::new(&registry);
        let mut value = user();
        value["friends"] = json!([user()]);

        let filtered = filter
            .filter(&context(TypeRef::class("User"), "admin"), value)
            .await
            .unwrap();
        assert_eq!(
            filtered,
            json!({ "id": 1, "name": "Ann", "email": "ann@x.io", "friends": [] })
        );
    }

    #[tokio::test]
    async fn test_null_fields_skip_policies() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let registry = PolicyRegistry::builder()
            .define_policy("admin", move |_| {
                *counter.lock().unwrap() += 1;
                Ok(true)
            })
            .build()
            .unwrap();
        let filter = ResponseFilter::new(&registry);

        let filtered = filter
            .filter(
                &context(TypeRef::class("User"), "admin"),
                json!({ "id": 1, "email": null }),
            )
            .await
            .unwrap();
        assert_eq!(filtered, json!({ "id": 1 }));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_array_type_mismatch() {
        let registry = registry();
        let filter = ResponseFilter::new(&registry);
        let err = filter
            .filter(&context(TypeRef::array(TypeRef::class("User")), "admin"), user())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TypeMismatch { .. }));
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("UsersController.list"));
        assert!(err.to_string().contains("but got object"));
    }

    #[tokio::test]
    async fn test_declared_response_type_wins() {
        let registry = registry();
        let filter = ResponseFilter::new(&registry);
        let route = RouteMeta::new(
            "get",
            "/users/1",
            ClassMeta::new("UsersController"),
            MethodMeta::new("get")
                .returns(TypeRef::Value)
                .response_type(TypeRef::class("User")),
        );
        let ctx = AuthorizationContext::new(Arc::new(route), catalog());
        assert_eq!(
            filter.filter(&ctx, user()).await.unwrap(),
            json!({ "id": 1, "name": "Ann" })
        );
    }

    #[tokio::test]
    async fn test_transform_hook() {
        let registry = registry();
        let transform: FieldTransform = Arc::new(|meta: &PropertyMeta, value: Value| {
            if meta.name == "name" {
                json!(value.as_str().unwrap_or_default().to_uppercase())
            } else {
                value
            }
        });
        let filter = ResponseFilter::new(&registry).with_transform(Some(&transform));
        let filtered = filter
            .filter(&context(TypeRef::class("User"), "user"), user())
            .await
            .unwrap();
        assert_eq!(filtered, json!({ "id": 1, "name": "ANN" }));
    }

    #[tokio::test]
    async fn test_untyped_action_passes_through() {
        let registry = registry();
        let route = RouteMeta::new(
            "get",
            "/raw",
            ClassMeta::new("RawController"),
            MethodMeta::new("raw"),
        );
        let ctx = AuthorizationContext::new(Arc::new(route), catalog());
        let value = json!({ "anything": [1, 2, 3] });
        assert_eq!(
            ResponseFilter::new(&registry).filter(&ctx, value.clone()).await.unwrap(),
            value
        );
    }
}
