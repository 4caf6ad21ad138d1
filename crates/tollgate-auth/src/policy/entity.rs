//! Entity and identifier resolution for entity-scoped policies.
//!
//! Route and write checks take the entity from the action's entity provider
//! and the identifier from the bound parameter it names. Read checks take
//! the entity from the class owning the property being filtered and the
//! identifier from the live parent object's primary-id property.

use serde_json::Value;

use crate::AuthResult;
use crate::error::AuthError;
use crate::metadata::{AccessModifier, EntityProvider};
use crate::policy::context::{AuthorizationContext, CurrentMeta};

/// Entity type and identifier an entity policy is evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRef {
    pub entity: String,
    pub id: Value,
}

/// Resolves only the entity type, enough to decide whether a policy applies.
///
/// # Errors
///
/// Returns `AuthError::Configuration` for a route or write check on an
/// action without an entity provider.
pub fn resolve_entity(ctx: &AuthorizationContext) -> AuthResult<String> {
    match ctx.access {
        AccessModifier::Route | AccessModifier::Write => {
            entity_provider(ctx).map(|p| p.entity.clone())
        }
        AccessModifier::Read => read_owner(ctx).map(str::to_string),
    }
}

/// Resolves the entity type and the identifier of the instance under test.
///
/// Returns `None` for a read check whose parent object carries no primary-id
/// value; there is no instance to evaluate the policy against.
///
/// # Errors
///
/// Returns `AuthError::Configuration` if the action lacks an entity
/// provider, the provider names an undeclared parameter, or the owning
/// entity has no primary-id property.
pub fn resolve_entity_and_id(ctx: &AuthorizationContext) -> AuthResult<Option<EntityRef>> {
    match ctx.access {
        AccessModifier::Route | AccessModifier::Write => {
            let provider = entity_provider(ctx)?;
            let id = ctx.parameter(&provider.parameter).cloned().ok_or_else(|| {
                AuthError::configuration(format!(
                    "Action {} has no parameter named {} required by its Entity Policy Provider",
                    ctx.route.qualified_action(),
                    provider.parameter
                ))
            })?;
            Ok(Some(EntityRef {
                entity: provider.entity.clone(),
                id,
            }))
        }
        AccessModifier::Read => {
            let owner = read_owner(ctx)?;
            let class = ctx.catalog().require(owner)?;
            let primary = class.primary_id().ok_or_else(|| {
                AuthError::configuration(format!(
                    "Entity {} doesn't have primary ID information required for entity policy",
                    class.name
                ))
            })?;
            let id = ctx
                .parent
                .as_ref()
                .and_then(|p| p.get(&primary.name))
                .filter(|id| !id.is_null());
            Ok(id.map(|id| EntityRef {
                entity: class.name.clone(),
                id: id.clone(),
            }))
        }
    }
}

fn entity_provider(ctx: &AuthorizationContext) -> AuthResult<&EntityProvider> {
    ctx.route.action.find_entity_provider().ok_or_else(|| {
        AuthError::configuration(format!(
            "Action {} doesn't have Entity Policy Provider information",
            ctx.route.qualified_action()
        ))
    })
}

fn read_owner(ctx: &AuthorizationContext) -> AuthResult<&str> {
    match &ctx.current {
        CurrentMeta::Property { class, .. } => Ok(class),
        other => Err(AuthError::internal(format!(
            "read access must be anchored to a property, got {other}"
        ))),
    }
}
