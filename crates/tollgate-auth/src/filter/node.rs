//! Compiled response shapes.
//!
//! A [`FilterNode`] mirrors a declared type: values pass through, arrays
//! apply one child node to every element and classes carry one compiled read
//! requirement per declared property. A class that is already being compiled
//! higher up the same branch becomes a terminal node with no properties, so
//! self- and mutually-referential models compile to a finite tree.

use std::sync::Arc;

use crate::AuthResult;
use crate::metadata::{AccessModifier, ClassMeta, PropertyMeta, TypeCatalog, TypeRef};
use crate::policy::PolicyRegistry;
use crate::resolution::Requirement;

/// How a value of a declared type is authorized and projected.
#[derive(Debug, Clone)]
pub enum FilterNode {
    Value,
    Array(Box<FilterNode>),
    Class(ClassNode),
}

/// Compiled class shape.
#[derive(Debug, Clone)]
pub struct ClassNode {
    pub class: Arc<ClassMeta>,
    pub properties: Vec<PropertyNode>,
    /// Cut at a repeated ancestor type; filters every value down to nothing.
    pub terminal: bool,
}

/// Compiled property: its read requirement and the shape of its value.
#[derive(Debug, Clone)]
pub struct PropertyNode {
    pub meta: PropertyMeta,
    /// `None` when the property has no read decorator.
    pub requirement: Option<Requirement>,
    pub node: FilterNode,
}

impl FilterNode {
    /// Compiles `type_ref` into a filter tree.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if a class is not in the catalog.
    pub fn compile(
        type_ref: &TypeRef,
        registry: &PolicyRegistry,
        catalog: &TypeCatalog,
    ) -> AuthResult<Self> {
        let mut ancestors = Vec::new();
        compile_type(type_ref, registry, catalog, &mut ancestors)
    }

    /// Name used in type mismatch diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Value => "Value",
            Self::Array(_) => "Array",
            Self::Class(class) => &class.class.name,
        }
    }
}

fn compile_type(
    type_ref: &TypeRef,
    registry: &PolicyRegistry,
    catalog: &TypeCatalog,
    ancestors: &mut Vec<String>,
) -> AuthResult<FilterNode> {
    match type_ref {
        TypeRef::Value => Ok(FilterNode::Value),
        TypeRef::Array { of } => Ok(FilterNode::Array(Box::new(compile_type(
            of, registry, catalog, ancestors,
        )?))),
        TypeRef::Class { name } => {
            let class = catalog.require(name)?;
            if ancestors.iter().any(|a| a == name) {
                tracing::trace!(class = %name, "Cyclic type reference cut");
                return Ok(FilterNode::Class(ClassNode {
                    class: class.clone(),
                    properties: Vec::new(),
                    terminal: true,
                }));
            }

            ancestors.push(name.clone());
            let properties = class
                .properties
                .iter()
                .map(|prop| {
                    Ok(PropertyNode {
                        meta: prop.clone(),
                        requirement: Requirement::compile(
                            registry,
                            prop.authorize_decorators(AccessModifier::Read),
                        ),
                        node: compile_type(&prop.type_ref, registry, catalog, ancestors)?,
                    })
                })
                .collect::<AuthResult<Vec<_>>>();
            ancestors.pop();

            Ok(FilterNode::Class(ClassNode {
                class: class.clone(),
                properties: properties?,
                terminal: false,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::metadata::AuthorizeDecorator;

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with(
                ClassMeta::new("User")
                    .property(PropertyMeta::new("id", TypeRef::Value).primary_id())
                    .property(
                        PropertyMeta::new("email", TypeRef::Value)
                            .authorize(AuthorizeDecorator::read(["admin"])),
                    )
                    .property(PropertyMeta::new("friends", TypeRef::array(TypeRef::class("User"))))
                    .property(PropertyMeta::new("team", TypeRef::class("Team"))),
            )
            .with(
                ClassMeta::new("Team")
                    .property(PropertyMeta::new("name", TypeRef::Value))
                    .property(PropertyMeta::new("lead", TypeRef::class("User"))),
            )
    }

    fn class(node: &FilterNode) -> &ClassNode {
        match node {
            FilterNode::Class(class) => class,
            other => panic!("expected class node, got {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_is_cut() {
        let registry = PolicyRegistry::builder().build().unwrap();
        let node = FilterNode::compile(&TypeRef::class("User"), &registry, &catalog()).unwrap();
        let user = class(&node);
        assert!(!user.terminal);
        assert!(user.properties[0].requirement.is_none());
        assert!(user.properties[1].requirement.is_some());

        let FilterNode::Array(friend) = &user.properties[2].node else {
            panic!("friends should compile to an array");
        };
        assert!(class(friend).terminal);
        assert!(class(friend).properties.is_empty());
    }

    #[test]
    fn test_mutual_reference_is_cut() {
        let registry = PolicyRegistry::builder().build().unwrap();
        let node = FilterNode::compile(&TypeRef::class("Team"), &registry, &catalog()).unwrap();
        let team = class(&node);
        let lead = class(&team.properties[1].node);
        assert!(!lead.terminal);
        // User.team points back to Team
        let team_again = class(&lead.properties[3].node);
        assert!(team_again.terminal);
    }

    #[test]
    fn test_unknown_class_fails() {
        let registry = PolicyRegistry::builder().build().unwrap();
        let err = FilterNode::compile(&TypeRef::class("Ghost"), &registry, &catalog()).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_type_names() {
        let registry = PolicyRegistry::builder().build().unwrap();
        let node = FilterNode::compile(
            &TypeRef::array(TypeRef::class("Team")),
            &registry,
            &catalog(),
        )
        .unwrap();
        assert_eq!(node.type_name(), "Array");
        assert_eq!(FilterNode::Value.type_name(), "Value");
    }
}
