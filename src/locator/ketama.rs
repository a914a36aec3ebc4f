use std::collections::BTreeMap;
use std::hash::Hasher;
use std::sync::Arc;

use fnv::FnvHasher;

use super::NodeLocator;
use crate::error::{ClientError, Result};
use crate::pool::Node;

const POINTS_PER_NODE: usize = 160;

/// FNV-1a followed by the murmur3 finalizer. Plain FNV of short, similar strings ("addr-1",
/// "addr-2", ...) leaves the high bits clustered, which skews the ring.
fn ring_hash(data: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(data);

    let mut hash = hasher.finish();
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51_afd7_ed55_8ccd);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    hash ^= hash >> 33;
    hash
}

/// Consistent hash ring. Every node owns `POINTS_PER_NODE` points; a key belongs to the first
/// point at or after its own hash, wrapping around at the end of the ring.
#[derive(Default)]
pub struct KetamaNodeLocator {
    ring: BTreeMap<u64, Arc<Node>>,
    initialized: bool,
}

impl NodeLocator for KetamaNodeLocator {
    fn initialize(&mut self, nodes: &[Arc<Node>]) -> Result<()> {
        if self.initialized {
            return Err(ClientError::AlreadyInitialized);
        }

        for node in nodes {
            for index in 0..POINTS_PER_NODE {
                let point = format!("{}-{}", node.address(), index);
                self.ring
                    .entry(ring_hash(point.as_bytes()))
                    .or_insert_with(|| node.clone());
            }
        }

        self.initialized = true;
        Ok(())
    }

    fn locate(&self, key: &str) -> Option<Arc<Node>> {
        let hash = ring_hash(key.as_bytes());

        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, node)| node.clone())
    }
}
