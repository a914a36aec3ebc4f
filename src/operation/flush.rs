use log::{error, info, warn};

use gurdulu_protocol::{Command, OK};

use super::Operation;
use crate::error::Result;
use crate::pool::{Node, ServerPool};

/// `flush_all` on every working server. Servers that cannot be reached are skipped.
pub struct FlushOperation<'a> {
    pool: &'a ServerPool,
}

impl<'a> FlushOperation<'a> {
    pub fn new(pool: &'a ServerPool) -> FlushOperation<'a> {
        FlushOperation { pool }
    }
}

fn flush(node: &Node) -> Result<bool> {
    let mut socket = match node.acquire()? {
        Some(socket) => socket,
        None => return Ok(false),
    };
    socket.send_command(&String::from(Command::FlushAll))?;

    let response = socket.read_response()?;
    if response != OK {
        warn!("Server {} answered {} to flush_all", node.address(), response);
        return Ok(false);
    }
    Ok(true)
}

impl<'a> Operation for FlushOperation<'a> {
    /// Number of servers that confirmed the flush.
    type Output = usize;

    fn name(&self) -> &'static str {
        "flush_all"
    }

    fn execute_action(&mut self) -> Result<Option<usize>> {
        let mut flushed = 0;

        for node in self.pool.working_servers()?.iter() {
            match flush(node) {
                Ok(true) => flushed += 1,
                Ok(false) => {}
                Err(err) => {
                    if err.is_unsupported() {
                        return Err(err);
                    }
                    error!("Flushing {} failed: {}", node.address(), err);
                }
            }
        }

        info!("Flushed {} server(s)", flushed);
        Ok(Some(flushed))
    }
}
