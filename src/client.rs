use std::collections::HashMap;
use std::net::SocketAddr;

use gurdulu_protocol::StoreCommand;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::operation::{
    DeleteOperation, Direction, Expiration, FlushOperation, GetOperation, IncrementOperation,
    MultiGetOperation, MultiGetResult, Operation, ServerStats, StatsOperation, StoreOperation,
};
use crate::pool::ServerPool;
use crate::transcoder::Value;

/// Misses, dead servers and timeouts show up as `None`/`false`, never as `Err`. `Err` is kept
/// for bad arguments (rejected keys, conflicting expirations) and for a server that does not
/// understand a command.
pub struct CacheClient {
    pool: ServerPool,
}

impl CacheClient {
    pub fn new(config: ClientConfig) -> Result<CacheClient> {
        Ok(CacheClient {
            pool: ServerPool::new(config)?,
        })
    }

    pub fn server_pool(&self) -> &ServerPool {
        &self.pool
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(GetOperation::new(&self.pool, key)?.execute()?.success())
    }

    pub fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        Ok(self.get_multi_with_cas(keys)?.values)
    }

    pub fn get_multi_with_cas(&self, keys: &[&str]) -> Result<MultiGetResult> {
        let outcome = MultiGetOperation::new(&self.pool, keys)?.execute()?;
        Ok(outcome.success().unwrap_or_default())
    }

    pub fn store<V: Into<Value>>(&self, command: StoreCommand, key: &str, value: V) -> Result<bool> {
        self.store_with_expiration(command, key, value, Expiration::never())
    }

    pub fn store_with_expiration<V: Into<Value>>(
        &self,
        command: StoreCommand,
        key: &str,
        value: V,
        expiration: Expiration,
    ) -> Result<bool> {
        let value = value.into();
        let operation = StoreOperation::new(&self.pool, command, key, &value, 0, expiration)?;
        Ok(operation.execute()?.is_success())
    }

    /// Stores only if nobody changed the item since `cas` was read with `get_multi_with_cas`.
    pub fn check_and_set<V: Into<Value>>(
        &self,
        key: &str,
        value: V,
        cas: u64,
        expiration: Expiration,
    ) -> Result<bool> {
        let value = value.into();
        let operation = StoreOperation::new(
            &self.pool,
            StoreCommand::CheckAndSet,
            key,
            &value,
            cas,
            expiration,
        )?;
        Ok(operation.execute()?.is_success())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        Ok(DeleteOperation::new(&self.pool, key)?.execute()?.is_success())
    }

    /// The new counter value, or `None` when the counter does not exist.
    pub fn increment(&self, key: &str, amount: u64) -> Result<Option<u64>> {
        self.change_counter(key, Direction::Increment, amount)
    }

    pub fn decrement(&self, key: &str, amount: u64) -> Result<Option<u64>> {
        self.change_counter(key, Direction::Decrement, amount)
    }

    fn change_counter(&self, key: &str, direction: Direction, amount: u64) -> Result<Option<u64>> {
        let operation = IncrementOperation::new(&self.pool, key, direction, amount)?;
        Ok(operation.execute()?.success())
    }

    pub fn stats(&self) -> Result<ServerStats> {
        let outcome = StatsOperation::new(&self.pool).execute()?;
        Ok(outcome.success().unwrap_or_default())
    }

    pub fn flush_all(&self) -> Result<usize> {
        let outcome = FlushOperation::new(&self.pool).execute()?;
        Ok(outcome.success().unwrap_or(0))
    }

    pub fn working_servers(&self) -> Result<Vec<SocketAddr>> {
        Ok(self
            .pool
            .working_servers()?
            .iter()
            .map(|node| node.address())
            .collect())
    }

    pub fn dispose(&self) {
        self.pool.dispose();
    }
}
