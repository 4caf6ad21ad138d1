//! Compiled filter node cache.
//!
//! Registry and catalog are fixed once the application is configured, so a
//! declared type always compiles to the same tree. Nodes are compiled on
//! first use and shared afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::AuthResult;
use crate::filter::node::FilterNode;
use crate::metadata::{TypeCatalog, TypeRef};
use crate::policy::PolicyRegistry;

/// Compiled [`FilterNode`]s keyed by declared type.
#[derive(Default)]
pub struct FilterCache {
    nodes: RwLock<HashMap<String, Arc<FilterNode>>>,
}

impl FilterCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled node for `type_ref`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns compilation errors; failures are not cached.
    pub async fn get_or_compile(
        &self,
        type_ref: &TypeRef,
        registry: &PolicyRegistry,
        catalog: &TypeCatalog,
    ) -> AuthResult<Arc<FilterNode>> {
        let key = type_ref.display_name();
        if let Some(node) = self.nodes.read().await.get(&key) {
            return Ok(node.clone());
        }

        let node = Arc::new(FilterNode::compile(type_ref, registry, catalog)?);
        let mut nodes = self.nodes.write().await;
        let node = nodes.entry(key).or_insert(node).clone();
        tracing::debug!(
            shape = %type_ref.display_name(),
            cached = nodes.len(),
            "Filter node compiled"
        );
        Ok(node)
    }

    /// Number of cached nodes.
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// Drops every cached node.
    pub async fn clear(&self) {
        self.nodes.write().await.clear();
    }
}
