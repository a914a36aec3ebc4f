use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use crossbeam::queue::SegQueue;
use log::{debug, info, warn};

use gurdulu_protocol::{Connection, ConnectionOptions};

use crate::config::SocketPoolConfig;
use crate::error::{ClientError, Result};

/// Bounded pool of connections to one server. The first connection that fails marks the whole
/// pool dead; a dead pool is never repaired, the owning `Node` replaces it.
pub struct NodePool {
    address: SocketAddr,
    config: SocketPoolConfig,
    options: ConnectionOptions,

    free: SegQueue<Connection>,
    slot_sender: Sender<()>,
    slot_receiver: Receiver<()>,
    working_count: AtomicUsize,

    alive: AtomicBool,
    dead_since: AtomicCell<Option<Instant>>,
}

impl NodePool {
    pub fn new(address: SocketAddr, config: SocketPoolConfig) -> Result<Arc<NodePool>> {
        config.validate()?;

        let (slot_sender, slot_receiver) = channel::bounded(config.max_pool_size);
        for _ in 0..config.max_pool_size {
            let _ = slot_sender.try_send(());
        }

        let pool = Arc::new(NodePool {
            address,
            config,
            options: config.connection_options(),

            free: SegQueue::new(),
            slot_sender,
            slot_receiver,
            working_count: AtomicUsize::new(0),

            alive: AtomicBool::new(true),
            dead_since: AtomicCell::new(None),
        });

        for _ in 0..config.min_pool_size {
            match Connection::connect(address, pool.options) {
                Ok(connection) => pool.free.push(connection),
                Err(err) => {
                    warn!("Cannot open connection to {}: {}", address, err);
                    pool.mark_dead();
                    break;
                }
            }
        }

        debug!(
            "Pool for {} created with {} idle connection(s)",
            address,
            pool.free.len()
        );
        Ok(pool)
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn dead_since(&self) -> Option<Instant> {
        self.dead_since.load()
    }

    pub fn working_count(&self) -> usize {
        self.working_count.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.free.len()
    }

    pub fn mark_dead(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.dead_since.store(Some(Instant::now()));
            warn!("Server {} is marked as dead", self.address);
        }
    }

    fn take_slot(&self) -> Result<()> {
        if self.slot_receiver.try_recv().is_ok() {
            return Ok(());
        }

        debug!("Pool for {} is exhausted, waiting for a connection", self.address);
        match self.config.connection_timeout {
            Some(timeout) => match self.slot_receiver.recv_timeout(timeout) {
                Ok(()) => Ok(()),
                Err(RecvTimeoutError::Timeout) => Err(ClientError::PoolTimeout(self.address)),
                Err(RecvTimeoutError::Disconnected) => Err(ClientError::PoolDisposed),
            },
            None => self
                .slot_receiver
                .recv()
                .map_err(|_| ClientError::PoolDisposed),
        }
    }

    fn give_slot(&self) {
        // holds at most max_pool_size slots, so this never fails
        let _ = self.slot_sender.try_send(());
    }

    /// Checks out a connection. `Ok(None)` means the server is considered unreachable; a full
    /// pool that stays full for the whole connection timeout is an error.
    pub fn acquire(self: &Arc<Self>) -> Result<Option<PooledSocket>> {
        if !self.is_alive() {
            return Ok(None);
        }

        self.take_slot()?;

        // the pool may have died while this thread was waiting
        if !self.is_alive() {
            self.give_slot();
            return Ok(None);
        }

        let connection = match self.free.pop() {
            Some(mut connection) => match connection.reset() {
                Ok(()) => connection,
                Err(err) => {
                    warn!(
                        "Resetting connection {} to {} failed: {}",
                        connection.id(),
                        self.address,
                        err
                    );
                    connection.destroy();
                    self.mark_dead();
                    self.give_slot();
                    return Ok(None);
                }
            },
            None => match Connection::connect(self.address, self.options) {
                Ok(connection) => connection,
                Err(err) => {
                    warn!("Cannot open connection to {}: {}", self.address, err);
                    self.mark_dead();
                    self.give_slot();
                    return Ok(None);
                }
            },
        };

        self.working_count.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Connection {} to {} checked out",
            connection.id(),
            self.address
        );

        Ok(Some(PooledSocket {
            connection: Some(connection),
            owner: Arc::downgrade(self),
        }))
    }

    fn release(&self, connection: Connection) {
        if !connection.is_alive() {
            info!(
                "Connection {} to {} died while in use, destroying it",
                connection.id(),
                self.address
            );
            connection.destroy();
            self.mark_dead();
        } else if !self.is_alive() {
            connection.destroy();
        } else {
            debug!("Connection {} to {} released", connection.id(), self.address);
            self.free.push(connection);
        }

        self.discard();
    }

    fn discard(&self) {
        self.working_count.fetch_sub(1, Ordering::SeqCst);
        self.give_slot();
    }

    pub fn dispose(&self) {
        self.alive.store(false, Ordering::SeqCst);

        while let Some(connection) = self.free.pop() {
            connection.destroy();
        }
        debug!("Pool for {} disposed", self.address);
    }
}

impl Drop for NodePool {
    fn drop(&mut self) {
        while let Some(connection) = self.free.pop() {
            connection.destroy();
        }
    }
}

/// Dropping it hands the connection back to its pool.
pub struct PooledSocket {
    connection: Option<Connection>,
    owner: Weak<NodePool>,
}

impl PooledSocket {
    pub fn destroy(mut self) {
        if let Some(connection) = self.connection.take() {
            connection.destroy();
            if let Some(pool) = self.owner.upgrade() {
                pool.discard();
            }
        }
    }
}

impl Deref for PooledSocket {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection
            .as_ref()
            .expect("connection is only taken when the socket is consumed")
    }
}

impl DerefMut for PooledSocket {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection
            .as_mut()
            .expect("connection is only taken when the socket is consumed")
    }
}

impl Drop for PooledSocket {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            match self.owner.upgrade() {
                Some(pool) => pool.release(connection),
                None => connection.destroy(),
            }
        }
    }
}
