use std::sync::Arc;

use super::NodeLocator;
use crate::error::{ClientError, Result};
use crate::pool::Node;

/// Sends every key to the first node. Only meant for a single server setup.
#[derive(Default)]
pub struct SingleNodeLocator {
    node: Option<Arc<Node>>,
    initialized: bool,
}

impl NodeLocator for SingleNodeLocator {
    fn initialize(&mut self, nodes: &[Arc<Node>]) -> Result<()> {
        if self.initialized {
            return Err(ClientError::AlreadyInitialized);
        }

        self.node = nodes.first().cloned();
        self.initialized = true;
        Ok(())
    }

    fn locate(&self, _key: &str) -> Option<Arc<Node>> {
        self.node.clone()
    }
}
