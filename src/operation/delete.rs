use log::debug;

use gurdulu_protocol::{Command, DELETED};

use super::item::ItemTarget;
use super::Operation;
use crate::error::Result;
use crate::pool::ServerPool;

pub struct DeleteOperation<'a> {
    target: ItemTarget<'a>,
}

impl<'a> DeleteOperation<'a> {
    pub fn new(pool: &'a ServerPool, key: &str) -> Result<DeleteOperation<'a>> {
        Ok(DeleteOperation {
            target: ItemTarget::new(pool, key)?,
        })
    }
}

impl<'a> Operation for DeleteOperation<'a> {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete"
    }

    fn execute_action(&mut self) -> Result<Option<()>> {
        let line = String::from(Command::Delete {
            key: self.target.hashed_key(),
        });

        let socket = match self.target.socket()? {
            Some(socket) => socket,
            None => return Ok(None),
        };
        socket.send_command(&line)?;

        let response = socket.read_response()?;
        if response == DELETED {
            Ok(Some(()))
        } else {
            debug!("Delete of {} answered {}", self.target.key(), response);
            Ok(None)
        }
    }
}
