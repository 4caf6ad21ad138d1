//! Policy definitions, registry and evaluation.
//!
//! - [`definition`] - policy variants, evaluator traits and `define_*` helpers
//! - [`registry`] - startup-time collection with conflict detection
//! - [`authorizer`] - OR aggregation over requested policy names
//! - [`context`] - the per-request / per-field authorization context
//! - [`entity`] - entity type and identifier resolution for entity policies

pub mod authorizer;
pub mod context;
pub mod definition;
pub mod entity;
pub mod registry;

pub use authorizer::Authorizer;
pub use context::{AuthorizationContext, CurrentMeta, RequestInfo};
pub use definition::{
    AUTHENTICATED, EntityPolicyHandler, PUBLIC, Policy, PolicyHandler, READONLY, WRITEONLY,
    define_async_entity_policy, define_async_policy, define_entity_policy, define_policy,
};
pub use entity::{EntityRef, resolve_entity, resolve_entity_and_id};
pub use registry::{PolicyRegistry, PolicyRegistryBuilder, check_conflicts};
