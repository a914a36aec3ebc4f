use log::debug;

use gurdulu_protocol::{finish_item, read_item, Command, ProtocolError};

use super::item::ItemTarget;
use super::Operation;
use crate::error::Result;
use crate::pool::ServerPool;
use crate::transcoder::{CacheItem, Value};

pub struct GetOperation<'a> {
    target: ItemTarget<'a>,
}

impl<'a> GetOperation<'a> {
    pub fn new(pool: &'a ServerPool, key: &str) -> Result<GetOperation<'a>> {
        Ok(GetOperation {
            target: ItemTarget::new(pool, key)?,
        })
    }
}

impl<'a> Operation for GetOperation<'a> {
    type Output = Value;

    fn name(&self) -> &'static str {
        "get"
    }

    fn execute_action(&mut self) -> Result<Option<Value>> {
        let hashed_key = self.target.hashed_key().to_string();
        let socket = match self.target.socket()? {
            Some(socket) => socket,
            None => return Ok(None),
        };

        socket.send_command(&String::from(Command::Get { key: &hashed_key }))?;

        let item = match read_item(socket)? {
            Some(item) => item,
            None => {
                debug!("Cache miss for {}", self.target.key());
                return Ok(None);
            }
        };
        finish_item(socket)?;

        if item.key != hashed_key {
            return Err(ProtocolError::UnexpectedResponse(format!(
                "asked for {} but got {}",
                hashed_key, item.key
            ))
            .into());
        }

        let value = self
            .target
            .pool()
            .transcoder()
            .deserialize(CacheItem::new(item.flags, item.data))?;
        Ok(Some(value))
    }
}
