//! Descriptor model consumed by the authorization core.
//!
//! Classes, methods, parameters and properties are described as plain data
//! with an ordered decorator list. Authorize decorators record where they
//! are attached; the builders (and [`TypeCatalog::insert`] /
//! [`RouteMeta::new`] for deserialized descriptors) keep that location
//! consistent with the owning descriptor.
//!
//! ```ignore
//! use tollgate_auth::metadata::*;
//!
//! let user = ClassMeta::new("User")
//!     .property(PropertyMeta::new("id", TypeRef::Value).primary_id())
//!     .property(PropertyMeta::new("email", TypeRef::Value)
//!         .authorize(AuthorizeDecorator::read(["admin", "owner"])))
//!     .property(PropertyMeta::new("role", TypeRef::Value)
//!         .authorize(AuthorizeDecorator::write(["admin"])));
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::error::AuthError;
use crate::policy::{AUTHENTICATED, PUBLIC, READONLY, WRITEONLY};

// =============================================================================
// Access & Location
// =============================================================================

/// What an authorize decorator guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessModifier {
    /// Invoking the action.
    Route,
    /// Observing a field in a response.
    Read,
    /// Setting a field in a request payload.
    Write,
}

impl fmt::Display for AccessModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route => write!(f, "route"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Kind of descriptor a decorator is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoratorLocation {
    Class,
    #[default]
    Method,
    Parameter,
    Property,
}

// =============================================================================
// Types
// =============================================================================

/// Declared type of a parameter, property or action result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeRef {
    /// Scalar or opaque value, passed through untouched.
    Value,
    /// Array whose elements all have the same declared type.
    Array { of: Box<TypeRef> },
    /// Custom class registered in the [`TypeCatalog`].
    Class { name: String },
}

impl TypeRef {
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class { name: name.into() }
    }

    #[must_use]
    pub fn array(of: TypeRef) -> Self {
        Self::Array { of: Box::new(of) }
    }

    /// Human-readable name used in diagnostics.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Value => "Value".to_string(),
            Self::Array { of } => format!("Array<{}>", of.display_name()),
            Self::Class { name } => name.clone(),
        }
    }
}

// =============================================================================
// Decorators
// =============================================================================

/// Policy requirement attached to a class, method, parameter or property.
///
/// The listed policies form one OR-group: the decorator grants access when
/// any of them allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeDecorator {
    pub policies: Vec<String>,
    pub access: AccessModifier,
    #[serde(default)]
    pub location: DecoratorLocation,
    /// Restricts a class-level route decorator to the named actions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,
}

impl AuthorizeDecorator {
    fn with_policies<I, S>(access: AccessModifier, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            policies: policies.into_iter().map(Into::into).collect(),
            access,
            location: DecoratorLocation::default(),
            applies_to: Vec::new(),
        }
    }

    /// Route access requirement.
    pub fn route<I, S>(policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_policies(AccessModifier::Route, policies)
    }

    /// Response read requirement.
    pub fn read<I, S>(policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_policies(AccessModifier::Read, policies)
    }

    /// Request write requirement.
    pub fn write<I, S>(policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_policies(AccessModifier::Write, policies)
    }

    /// Route open to everyone, with or without identity.
    #[must_use]
    pub fn public() -> Self {
        Self::route([PUBLIC])
    }

    /// Route open to any identity.
    #[must_use]
    pub fn authenticated() -> Self {
        Self::route([AUTHENTICATED])
    }

    /// Field that can be read but never written.
    #[must_use]
    pub fn readonly() -> Self {
        Self::write([READONLY])
    }

    /// Field that can be written but never read back.
    #[must_use]
    pub fn writeonly() -> Self {
        Self::read([WRITEONLY])
    }

    /// Limits a class-level route decorator to the given action names.
    pub fn applies_to<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applies_to = actions.into_iter().map(Into::into).collect();
        self
    }
}

/// Names the entity type and the bound parameter that carries its identifier
/// for entity policies evaluated at route or write level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProvider {
    pub entity: String,
    pub parameter: String,
}

/// Ordered metadata attached to a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Decorator {
    Authorize(AuthorizeDecorator),
    EntityProvider(EntityProvider),
    /// Property is a relation that may be set by identifier alone.
    Relation,
    /// Property holds the entity's primary identifier.
    PrimaryId,
}

fn authorize_decorators(
    decorators: &[Decorator],
    access: AccessModifier,
) -> impl Iterator<Item = &AuthorizeDecorator> {
    decorators.iter().filter_map(move |d| match d {
        Decorator::Authorize(a) if a.access == access => Some(a),
        _ => None,
    })
}

fn anchor(decorators: &mut [Decorator], location: DecoratorLocation) {
    for decorator in decorators {
        if let Decorator::Authorize(a) = decorator {
            a.location = location;
        }
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// A declared property of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub decorators: Vec<Decorator>,
}

impl PropertyMeta {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            decorators: Vec::new(),
        }
    }

    #[must_use]
    pub fn authorize(mut self, mut decorator: AuthorizeDecorator) -> Self {
        decorator.location = DecoratorLocation::Property;
        self.decorators.push(Decorator::Authorize(decorator));
        self
    }

    #[must_use]
    pub fn relation(mut self) -> Self {
        self.decorators.push(Decorator::Relation);
        self
    }

    #[must_use]
    pub fn primary_id(mut self) -> Self {
        self.decorators.push(Decorator::PrimaryId);
        self
    }

    #[must_use]
    pub fn is_relation(&self) -> bool {
        self.decorators.contains(&Decorator::Relation)
    }

    #[must_use]
    pub fn is_primary_id(&self) -> bool {
        self.decorators.contains(&Decorator::PrimaryId)
    }

    pub fn authorize_decorators(
        &self,
        access: AccessModifier,
    ) -> impl Iterator<Item = &AuthorizeDecorator> {
        authorize_decorators(&self.decorators, access)
    }
}

/// A declared action parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub decorators: Vec<Decorator>,
}

impl ParameterMeta {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            decorators: Vec::new(),
        }
    }

    #[must_use]
    pub fn authorize(mut self, mut decorator: AuthorizeDecorator) -> Self {
        decorator.location = DecoratorLocation::Parameter;
        self.decorators.push(Decorator::Authorize(decorator));
        self
    }

    pub fn authorize_decorators(
        &self,
        access: AccessModifier,
    ) -> impl Iterator<Item = &AuthorizeDecorator> {
        authorize_decorators(&self.decorators, access)
    }
}

/// A controller action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMeta {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterMeta>,
    #[serde(default)]
    pub decorators: Vec<Decorator>,
    /// Type the handler returns.
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    /// Wire shape of the response when it differs from the return type.
    #[serde(default)]
    pub response_type: Option<TypeRef>,
}

impl MethodMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            decorators: Vec::new(),
            return_type: None,
            response_type: None,
        }
    }

    #[must_use]
    pub fn parameter(mut self, parameter: ParameterMeta) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn authorize(mut self, mut decorator: AuthorizeDecorator) -> Self {
        decorator.location = DecoratorLocation::Method;
        self.decorators.push(Decorator::Authorize(decorator));
        self
    }

    #[must_use]
    pub fn entity_provider(
        mut self,
        entity: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        self.decorators.push(Decorator::EntityProvider(EntityProvider {
            entity: entity.into(),
            parameter: parameter.into(),
        }));
        self
    }

    #[must_use]
    pub fn returns(mut self, type_ref: TypeRef) -> Self {
        self.return_type = Some(type_ref);
        self
    }

    #[must_use]
    pub fn response_type(mut self, type_ref: TypeRef) -> Self {
        self.response_type = Some(type_ref);
        self
    }

    /// Entity provider declaration, if any.
    #[must_use]
    pub fn find_entity_provider(&self) -> Option<&EntityProvider> {
        self.decorators.iter().find_map(|d| match d {
            Decorator::EntityProvider(p) => Some(p),
            _ => None,
        })
    }

    /// The type responses are filtered against: the declared response type
    /// when present, otherwise the return type.
    #[must_use]
    pub fn response_shape(&self) -> Option<&TypeRef> {
        self.response_type.as_ref().or(self.return_type.as_ref())
    }

    pub fn authorize_decorators(
        &self,
        access: AccessModifier,
    ) -> impl Iterator<Item = &AuthorizeDecorator> {
        authorize_decorators(&self.decorators, access)
    }

    fn anchor(&mut self) {
        anchor(&mut self.decorators, DecoratorLocation::Method);
        for parameter in &mut self.parameters {
            anchor(&mut parameter.decorators, DecoratorLocation::Parameter);
        }
    }
}

/// A controller or domain class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMeta {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyMeta>,
    #[serde(default)]
    pub decorators: Vec<Decorator>,
}

impl ClassMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            decorators: Vec::new(),
        }
    }

    #[must_use]
    pub fn property(mut self, property: PropertyMeta) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn authorize(mut self, mut decorator: AuthorizeDecorator) -> Self {
        decorator.location = DecoratorLocation::Class;
        self.decorators.push(Decorator::Authorize(decorator));
        self
    }

    #[must_use]
    pub fn find_property(&self, name: &str) -> Option<&PropertyMeta> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The property flagged as primary identifier.
    #[must_use]
    pub fn primary_id(&self) -> Option<&PropertyMeta> {
        self.properties.iter().find(|p| p.is_primary_id())
    }

    pub fn authorize_decorators(
        &self,
        access: AccessModifier,
    ) -> impl Iterator<Item = &AuthorizeDecorator> {
        authorize_decorators(&self.decorators, access)
    }

    fn anchor(&mut self) {
        anchor(&mut self.decorators, DecoratorLocation::Class);
        for property in &mut self.properties {
            anchor(&mut property.decorators, DecoratorLocation::Property);
        }
    }
}

/// A routed controller action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMeta {
    pub method: String,
    pub url: String,
    pub controller: ClassMeta,
    pub action: MethodMeta,
}

impl RouteMeta {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        mut controller: ClassMeta,
        mut action: MethodMeta,
    ) -> Self {
        controller.anchor();
        action.anchor();
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            controller,
            action,
        }
    }

    /// `Controller.action`, used in diagnostics.
    #[must_use]
    pub fn qualified_action(&self) -> String {
        format!("{}.{}", self.controller.name, self.action.name)
    }
}

// =============================================================================
// Type Catalog
// =============================================================================

/// Lookup of class descriptors by name.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    classes: IndexMap<String, Arc<ClassMeta>>,
}

impl TypeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class, replacing any previous class with the same name.
    pub fn insert(&mut self, mut class: ClassMeta) -> &mut Self {
        class.anchor();
        self.classes.insert(class.name.clone(), Arc::new(class));
        self
    }

    #[must_use]
    pub fn with(mut self, class: ClassMeta) -> Self {
        self.insert(class);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ClassMeta>> {
        self.classes.get(name)
    }

    /// Looks up a class that metadata refers to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the class is not registered.
    pub fn require(&self, name: &str) -> AuthResult<&Arc<ClassMeta>> {
        self.classes
            .get(name)
            .ok_or_else(|| AuthError::configuration(format!("Type {name} is not registered")))
    }

    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassMeta>> {
        self.classes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_anchor_decorators() {
        let class = ClassMeta::new("UsersController")
            .authorize(AuthorizeDecorator::route(["admin"]))
            .property(
                PropertyMeta::new("email", TypeRef::Value)
                    .authorize(AuthorizeDecorator::read(["admin"])),
            );
        let route_decorator = class.authorize_decorators(AccessModifier::Route).next().unwrap();
        assert_eq!(route_decorator.location, DecoratorLocation::Class);
        let read = class.properties[0]
            .authorize_decorators(AccessModifier::Read)
            .next()
            .unwrap();
        assert_eq!(read.location, DecoratorLocation::Property);
        assert_eq!(class.properties[0].authorize_decorators(AccessModifier::Write).count(), 0);
    }

    #[test]
    fn test_sentinel_decorators() {
        let readonly = AuthorizeDecorator::readonly();
        assert_eq!(readonly.access, AccessModifier::Write);
        assert_eq!(readonly.policies, vec![READONLY.to_string()]);

        let writeonly = AuthorizeDecorator::writeonly();
        assert_eq!(writeonly.access, AccessModifier::Read);
        assert_eq!(writeonly.policies, vec![WRITEONLY.to_string()]);
    }

    #[test]
    fn test_deserialized_descriptors_get_anchored() {
        let json = serde_json::json!({
            "name": "Item",
            "properties": [{
                "name": "secret",
                "type": { "kind": "value" },
                "decorators": [{ "kind": "authorize", "policies": ["admin"], "access": "read" }]
            }, {
                "name": "id",
                "type": { "kind": "value" },
                "decorators": [{ "kind": "primaryId" }]
            }]
        });
        let class: ClassMeta = serde_json::from_value(json).unwrap();
        let catalog = TypeCatalog::new().with(class);

        let item = catalog.require("Item").unwrap();
        let decorator = item.properties[0]
            .authorize_decorators(AccessModifier::Read)
            .next()
            .unwrap();
        assert_eq!(decorator.location, DecoratorLocation::Property);
        assert_eq!(item.primary_id().map(|p| p.name.as_str()), Some("id"));
    }

    #[test]
    fn test_response_shape_prefers_declared_type() {
        let method = MethodMeta::new("list")
            .returns(TypeRef::array(TypeRef::class("UserEntity")))
            .response_type(TypeRef::array(TypeRef::class("UserDto")));
        assert_eq!(
            method.response_shape(),
            Some(&TypeRef::array(TypeRef::class("UserDto")))
        );
        assert_eq!(
            method.response_shape().unwrap().display_name(),
            "Array<UserDto>"
        );
    }

    #[test]
    fn test_unknown_type_is_configuration_error() {
        let catalog = TypeCatalog::new();
        let err = catalog.require("Ghost").unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_route_meta_normalizes_method() {
        let route = RouteMeta::new(
            "post",
            "/users",
            ClassMeta::new("UsersController"),
            MethodMeta::new("save").entity_provider("User", "id"),
        );
        assert_eq!(route.method, "POST");
        assert_eq!(route.qualified_action(), "UsersController.save");
        assert_eq!(route.action.find_entity_provider().unwrap().parameter, "id");
    }
}
