//! Request-time guards run before the action executes.
//!
//! - [`route`] - may the identity invoke the action at all
//! - [`parameter`] - may it populate every field of the bound payload

pub mod parameter;
pub mod route;

pub use parameter::ParameterGuard;
pub use route::RouteGuard;
