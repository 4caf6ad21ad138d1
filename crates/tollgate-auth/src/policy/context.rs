//! Authorization context handed to policy evaluators.
//!
//! One context is created per request for the route check; parameter and
//! response checks derive a field-level copy that carries the value under
//! test, its parent object and the descriptor being evaluated.
//!
//! ```ignore
//! let ctx = AuthorizationContext::new(route, catalog)
//!     .with_user(Some(json!({ "role": "admin", "userId": 1 })))
//!     .with_parameters(vec![json!(1), json!({ "email": "a@b.c" })]);
//!
//! let field = ctx.for_field(
//!     AccessModifier::Read,
//!     CurrentMeta::property("User", "email"),
//!     Some(json!("a@b.c")),
//!     Some(json!({ "id": 1, "email": "a@b.c" })),
//! );
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::metadata::{AccessModifier, DecoratorLocation, RouteMeta, TypeCatalog};

// =============================================================================
// Request Info
// =============================================================================

/// Framework request data exposed to policies.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// Upper-case HTTP method.
    pub method: String,

    /// Request path.
    pub path: String,

    /// Request headers (lower-case names).
    pub headers: HashMap<String, String>,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

// =============================================================================
// Current Metadata
// =============================================================================

/// The descriptor an evaluation is anchored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentMeta {
    Class {
        name: String,
    },
    Method {
        class: String,
        name: String,
    },
    Parameter {
        class: String,
        method: String,
        name: String,
    },
    Property {
        class: String,
        name: String,
    },
}

impl CurrentMeta {
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class { name: name.into() }
    }

    pub fn method(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Method {
            class: class.into(),
            name: name.into(),
        }
    }

    pub fn parameter(
        class: impl Into<String>,
        method: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Parameter {
            class: class.into(),
            method: method.into(),
            name: name.into(),
        }
    }

    pub fn property(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Property {
            class: class.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CurrentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class { name } => write!(f, "class {name}"),
            Self::Method { class, name } => write!(f, "method {class}.{name}"),
            Self::Parameter { class, name, .. } => write!(f, "parameter {class}.{name}"),
            Self::Property { class, name } => write!(f, "property {class}.{name}"),
        }
    }
}

// =============================================================================
// Authorization Context
// =============================================================================

/// Everything a policy may inspect while deciding.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    /// Authenticated identity, `None` for anonymous requests.
    pub user: Option<Value>,

    /// Route being invoked.
    pub route: Arc<RouteMeta>,

    /// Framework request data.
    pub request: Arc<RequestInfo>,

    /// Bound action arguments in parameter declaration order.
    pub parameters: Arc<Vec<Value>>,

    /// What is being authorized.
    pub access: AccessModifier,

    /// Value under test (parameter or property checks).
    pub value: Option<Value>,

    /// Object holding `value`.
    pub parent: Option<Value>,

    /// Policy names requested by the decorator being evaluated.
    pub policy_ids: Vec<String>,

    /// Descriptor the evaluation is anchored to.
    pub current: CurrentMeta,

    catalog: Arc<TypeCatalog>,
}

impl AuthorizationContext {
    /// Creates a route-level context anchored to the route's action.
    pub fn new(route: Arc<RouteMeta>, catalog: Arc<TypeCatalog>) -> Self {
        let current = CurrentMeta::method(&route.controller.name, &route.action.name);
        let request = Arc::new(RequestInfo::new(&route.method, &route.url));
        Self {
            user: None,
            route,
            request,
            parameters: Arc::new(Vec::new()),
            access: AccessModifier::Route,
            value: None,
            parent: None,
            policy_ids: Vec::new(),
            current,
            catalog,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: Option<Value>) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn with_request(mut self, request: RequestInfo) -> Self {
        self.request = Arc::new(request);
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = Arc::new(parameters);
        self
    }

    #[must_use]
    pub fn with_policy_ids(mut self, policy_ids: Vec<String>) -> Self {
        self.policy_ids = policy_ids;
        self
    }

    /// Derives a field-level context for a parameter or property check.
    #[must_use]
    pub fn for_field(
        &self,
        access: AccessModifier,
        current: CurrentMeta,
        value: Option<Value>,
        parent: Option<Value>,
    ) -> Self {
        Self {
            access,
            current,
            value,
            parent,
            policy_ids: Vec::new(),
            ..self.clone()
        }
    }

    /// Re-anchors a route-level context to where a decorator was found.
    #[must_use]
    pub fn anchored_at(&self, location: DecoratorLocation) -> Self {
        let mut ctx = self.clone();
        match location {
            DecoratorLocation::Class => {
                ctx.current = CurrentMeta::class(&self.route.controller.name);
            }
            DecoratorLocation::Method => {
                ctx.current =
                    CurrentMeta::method(&self.route.controller.name, &self.route.action.name);
            }
            DecoratorLocation::Parameter | DecoratorLocation::Property => {}
        }
        ctx
    }

    /// Returns `true` if the request carries an identity.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Reads a top-level claim of the identity, e.g. `role`.
    #[must_use]
    pub fn user_claim(&self, key: &str) -> Option<&Value> {
        self.user.as_ref().and_then(|u| u.get(key))
    }

    /// Bound argument for the action parameter with the given name.
    ///
    /// Returns `None` when the action declares no such parameter; a declared
    /// but unbound parameter reads as `Value::Null`.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        let index = self
            .route
            .action
            .parameters
            .iter()
            .position(|p| p.name == name)?;
        Some(self.parameters.get(index).unwrap_or(&Value::Null))
    }

    /// Class descriptors available to this request.
    #[must_use]
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }
}
