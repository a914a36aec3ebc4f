use std::collections::HashMap;

use log::{error, warn};

use gurdulu_protocol::{read_item, Command};

use super::Operation;
use crate::error::Result;
use crate::pool::{Node, PooledSocket, ServerPool};
use crate::transcoder::{CacheItem, Value};

#[derive(Debug, Default, PartialEq)]
pub struct MultiGetResult {
    pub values: HashMap<String, Value>,
    pub cas: HashMap<String, u64>,
}

/// A server failing in the middle only costs its own keys; the operation still succeeds with
/// whatever the other servers returned.
pub struct MultiGetOperation<'a> {
    pool: &'a ServerPool,
    // hashed key -> original key
    keys: HashMap<String, String>,
    result: MultiGetResult,
}

impl<'a> MultiGetOperation<'a> {
    pub fn new(pool: &'a ServerPool, keys: &[&str]) -> Result<MultiGetOperation<'a>> {
        let transformer = pool.key_transformer();

        let mut hashed_keys = HashMap::with_capacity(keys.len());
        for key in keys {
            hashed_keys.insert(transformer.transform(key)?, key.to_string());
        }

        Ok(MultiGetOperation {
            pool,
            keys: hashed_keys,
            result: MultiGetResult::default(),
        })
    }

    fn send_to(node: &Node, hashed_keys: &[String]) -> Result<Option<PooledSocket>> {
        let mut socket = match node.acquire()? {
            Some(socket) => socket,
            None => {
                warn!(
                    "Server {} is unreachable, skipping {} key(s)",
                    node.address(),
                    hashed_keys.len()
                );
                return Ok(None);
            }
        };

        let keys: Vec<&str> = hashed_keys.iter().map(String::as_str).collect();
        socket.send_command(&String::from(Command::Gets { keys: &keys }))?;
        Ok(Some(socket))
    }

    fn read_from(&mut self, node: &Node, socket: &mut PooledSocket) -> Result<()> {
        while let Some(item) = read_item(socket)? {
            let key = match self.keys.get(&item.key) {
                Some(key) => key.clone(),
                None => {
                    warn!("Server {} returned unrequested key {}", node.address(), item.key);
                    continue;
                }
            };

            match self
                .pool
                .transcoder()
                .deserialize(CacheItem::new(item.flags, item.data))
            {
                Ok(value) => {
                    self.result.values.insert(key.clone(), value);
                    self.result.cas.insert(key, item.cas);
                }
                Err(err) => warn!("Cannot decode {}: {}", key, err),
            }
        }

        Ok(())
    }
}

impl<'a> Operation for MultiGetOperation<'a> {
    type Output = MultiGetResult;

    fn name(&self) -> &'static str {
        "gets"
    }

    fn execute_action(&mut self) -> Result<Option<MultiGetResult>> {
        let hashed_keys: Vec<String> = self.keys.keys().cloned().collect();
        let groups = self.pool.split_keys(&hashed_keys)?;

        // every server gets its request before any reply is read
        let mut pending = Vec::with_capacity(groups.len());
        for (node, keys) in groups {
            match MultiGetOperation::send_to(&node, &keys) {
                Ok(Some(socket)) => pending.push((node, socket)),
                Ok(None) => {}
                Err(err) => error!("Sending to {} failed: {}", node.address(), err),
            }
        }

        for (node, mut socket) in pending {
            if let Err(err) = self.read_from(&node, &mut socket) {
                if err.is_unsupported() {
                    return Err(err);
                }
                error!("Fetching from {} failed: {}", node.address(), err);
            }
        }

        Ok(Some(std::mem::replace(
            &mut self.result,
            MultiGetResult::default(),
        )))
    }
}
