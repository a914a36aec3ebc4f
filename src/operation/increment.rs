use log::debug;

use gurdulu_protocol::{Command, ProtocolError, NOT_FOUND};

use super::item::ItemTarget;
use super::Operation;
use crate::error::Result;
use crate::pool::ServerPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Increment,
    Decrement,
}

/// `incr` and `decr`. The server keeps counters as unsigned 64 bit integers; decrementing below
/// zero stops at zero.
pub struct IncrementOperation<'a> {
    target: ItemTarget<'a>,
    direction: Direction,
    amount: u64,
}

impl<'a> IncrementOperation<'a> {
    pub fn new(
        pool: &'a ServerPool,
        key: &str,
        direction: Direction,
        amount: u64,
    ) -> Result<IncrementOperation<'a>> {
        Ok(IncrementOperation {
            target: ItemTarget::new(pool, key)?,
            direction,
            amount,
        })
    }
}

impl<'a> Operation for IncrementOperation<'a> {
    type Output = u64;

    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Increment => "incr",
            Direction::Decrement => "decr",
        }
    }

    fn execute_action(&mut self) -> Result<Option<u64>> {
        let key = self.target.hashed_key();
        let line = String::from(match self.direction {
            Direction::Increment => Command::Increment {
                key,
                amount: self.amount,
            },
            Direction::Decrement => Command::Decrement {
                key,
                amount: self.amount,
            },
        });

        let socket = match self.target.socket()? {
            Some(socket) => socket,
            None => return Ok(None),
        };
        socket.send_command(&line)?;

        let response = socket.read_response()?;
        if response == NOT_FOUND {
            debug!("Counter {} does not exist", self.target.key());
            return Ok(None);
        }

        let value = response.parse::<u64>().map_err(ProtocolError::from)?;
        Ok(Some(value))
    }
}
