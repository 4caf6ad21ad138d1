//! Route manifest: the policies, classes and routes of one application.
//!
//! ```json
//! {
//!   "policies": [{ "name": "admin" }, { "name": "owner", "entity": "User" }],
//!   "classes": [{ "name": "User", "properties": [] }],
//!   "routes": [{
//!     "method": "GET",
//!     "url": "/users",
//!     "controller": { "name": "UsersController" },
//!     "action": { "name": "list" }
//!   }]
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tollgate_auth::{
    ClassMeta, MethodMeta, Policy, PolicyRegistry, RouteMeta, TypeCatalog, define_entity_policy,
    define_policy,
};

/// Declared policy. Only its name and scope matter for analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDecl {
    pub name: String,
    #[serde(default)]
    pub entity: Option<String>,
}

impl PolicyDecl {
    /// Inert stand-in carrying the declared name and scope; never allows.
    fn placeholder(&self) -> Policy {
        match &self.entity {
            Some(entity) => define_entity_policy(entity, &self.name, |_, _| Ok(false)),
            None => define_policy(&self.name, |_| Ok(false)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteDecl {
    pub method: String,
    pub url: String,
    pub controller: ClassMeta,
    pub action: MethodMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub policies: Vec<PolicyDecl>,
    #[serde(default)]
    pub classes: Vec<ClassMeta>,
    #[serde(default)]
    pub routes: Vec<RouteDecl>,
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    /// Registers every declared policy and runs the conflict check.
    pub fn registry(&self) -> Result<PolicyRegistry> {
        let registry = PolicyRegistry::builder()
            .register_all(self.policies.iter().map(PolicyDecl::placeholder))
            .build()?;
        Ok(registry)
    }

    pub fn catalog(&self) -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        for class in &self.classes {
            catalog.insert(class.clone());
        }
        catalog
    }

    pub fn routes(&self) -> Vec<RouteMeta> {
        self.routes
            .iter()
            .map(|r| RouteMeta::new(&r.method, &r.url, r.controller.clone(), r.action.clone()))
            .collect()
    }
}
