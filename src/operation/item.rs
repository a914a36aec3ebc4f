use crate::error::{ClientError, Result};
use crate::pool::{PooledSocket, ServerPool};

/// The key is transformed once, up front, so a key the transformer rejects fails before any
/// I/O. The connection is acquired on first use and returned when the target is dropped.
pub(crate) struct ItemTarget<'a> {
    pool: &'a ServerPool,
    key: String,
    hashed_key: String,
    socket: Option<PooledSocket>,
}

impl<'a> ItemTarget<'a> {
    pub fn new(pool: &'a ServerPool, key: &str) -> Result<ItemTarget<'a>> {
        let hashed_key = pool.key_transformer().transform(key)?;

        Ok(ItemTarget {
            pool,
            key: key.to_string(),
            hashed_key,
            socket: None,
        })
    }

    pub fn pool(&self) -> &'a ServerPool {
        self.pool
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn hashed_key(&self) -> &str {
        &self.hashed_key
    }

    /// `None` when no live server takes the key.
    pub fn socket(&mut self) -> Result<Option<&mut PooledSocket>> {
        if self.socket.is_none() {
            match self.pool.acquire(&self.hashed_key) {
                Ok(socket) => self.socket = Some(socket),
                Err(ClientError::NoLiveNode) => return Ok(None),
                Err(err) => return Err(err),
            }
        }

        Ok(self.socket.as_mut())
    }
}
