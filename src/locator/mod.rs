mod ketama;
mod single;

pub use ketama::KetamaNodeLocator;
pub use single::SingleNodeLocator;

use std::sync::Arc;

use crate::error::Result;
use crate::pool::Node;

/// An instance is initialized exactly once with the working nodes; when that list changes
/// a new instance is built instead. `locate` must not mutate anything, several threads call it
/// at the same time.
pub trait NodeLocator: Send + Sync {
    fn initialize(&mut self, nodes: &[Arc<Node>]) -> Result<()>;

    fn locate(&self, key: &str) -> Option<Arc<Node>>;
}
