use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, info};

use super::{NodePool, PooledSocket};
use crate::config::SocketPoolConfig;
use crate::error::Result;

/// One cache server: its address and the connection pool currently serving it.
pub struct Node {
    address: SocketAddr,
    config: SocketPoolConfig,
    pool: Mutex<Arc<NodePool>>,
    disposed: AtomicBool,
}

impl Node {
    pub fn new(address: SocketAddr, config: SocketPoolConfig) -> Result<Node> {
        let pool = NodePool::new(address, config)?;

        Ok(Node {
            address,
            config,
            pool: Mutex::new(pool),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    fn lock_pool(&self) -> MutexGuard<Arc<NodePool>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pool(&self) -> Arc<NodePool> {
        self.lock_pool().clone()
    }

    pub fn is_alive(&self) -> bool {
        self.pool().is_alive()
    }

    pub fn acquire(&self) -> Result<Option<PooledSocket>> {
        let pool = self.pool();
        pool.acquire()
    }

    /// Decides whether a dead node is worth another try. Once `dead_timeout` has passed since
    /// the node died, its pool is thrown away and replaced by a fresh one, and `true` is
    /// returned. That does not mean the server is back: the next `acquire` may kill it again.
    pub fn ping(&self) -> bool {
        if self.disposed.load(Ordering::SeqCst) {
            return false;
        }

        let pool = self.pool();
        if pool.is_alive() {
            return true;
        }

        // zero means a dead server stays dead
        if self.config.dead_timeout.as_nanos() == 0 {
            return false;
        }

        match pool.dead_since() {
            Some(since) if since.elapsed() >= self.config.dead_timeout => {}
            _ => return false,
        }

        let mut current = self.lock_pool();
        if current.is_alive() {
            return true;
        }
        if !Arc::ptr_eq(&current, &pool) {
            // replaced by another thread in the meantime
            return true;
        }

        current.dispose();
        match NodePool::new(self.address, self.config) {
            Ok(fresh) => {
                info!("Retrying dead server {}", self.address);
                *current = fresh;
                true
            }
            Err(err) => {
                error!("Cannot recreate the pool for {}: {}", self.address, err);
                false
            }
        }
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.pool().dispose();
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        self.address == other.address
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Node({})", self.address)
    }
}
