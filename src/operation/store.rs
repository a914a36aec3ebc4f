use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::debug;

use gurdulu_protocol::{command_buffer, Command, StoreCommand, STORED, TERMINATOR};

use super::item::ItemTarget;
use super::Operation;
use crate::error::{ClientError, Result};
use crate::pool::ServerPool;
use crate::transcoder::{CacheItem, Value};

/// Longer relative expirations are read by the server as unix timestamps.
pub const MAX_RELATIVE_EXPIRATION: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// When a stored item expires. At most one of the two may be set; neither means never.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Expiration {
    pub valid_for: Option<Duration>,
    pub expires_at: Option<SystemTime>,
}

impl Expiration {
    pub fn never() -> Expiration {
        Expiration::default()
    }

    pub fn valid_for(duration: Duration) -> Expiration {
        Expiration {
            valid_for: Some(duration),
            expires_at: None,
        }
    }

    pub fn at(time: SystemTime) -> Expiration {
        Expiration {
            valid_for: None,
            expires_at: Some(time),
        }
    }

    pub fn exptime(&self) -> Result<u64> {
        match (self.valid_for, self.expires_at) {
            (Some(_), Some(_)) => Err(ClientError::InvalidArgument(String::from(
                "only one of valid_for and expires_at may be set",
            ))),
            (Some(valid_for), None) => {
                if valid_for >= MAX_RELATIVE_EXPIRATION {
                    return Err(ClientError::InvalidArgument(format!(
                        "valid_for must be less than {} seconds",
                        MAX_RELATIVE_EXPIRATION.as_secs()
                    )));
                }
                // zero would mean "never expires"
                if valid_for.as_secs() == 0 && valid_for.subsec_nanos() > 0 {
                    return Ok(1);
                }
                Ok(valid_for.as_secs())
            }
            (None, Some(expires_at)) => expires_at
                .duration_since(UNIX_EPOCH)
                .map(|since_epoch| since_epoch.as_secs())
                .map_err(|_| {
                    ClientError::InvalidArgument(String::from(
                        "expires_at is earlier than the unix epoch",
                    ))
                }),
            (None, None) => Ok(0),
        }
    }
}

pub struct StoreOperation<'a> {
    target: ItemTarget<'a>,
    command: StoreCommand,
    item: CacheItem,
    exptime: u64,
    cas: u64,
}

impl<'a> StoreOperation<'a> {
    /// Argument errors (both expirations, a too long `valid_for`, a key the transformer
    /// refuses, a value the transcoder refuses) are reported here, before anything is sent.
    pub fn new(
        pool: &'a ServerPool,
        command: StoreCommand,
        key: &str,
        value: &Value,
        cas: u64,
        expiration: Expiration,
    ) -> Result<StoreOperation<'a>> {
        let exptime = expiration.exptime()?;
        let target = ItemTarget::new(pool, key)?;
        let item = pool.transcoder().serialize(value)?;

        Ok(StoreOperation {
            target,
            command,
            item,
            exptime,
            cas,
        })
    }
}

impl<'a> Operation for StoreOperation<'a> {
    type Output = ();

    fn name(&self) -> &'static str {
        self.command.verb()
    }

    fn execute_action(&mut self) -> Result<Option<()>> {
        let line = String::from(Command::Store {
            command: self.command,
            key: self.target.hashed_key(),
            flags: self.item.flags,
            expires: self.exptime,
            length: self.item.data.len(),
            cas: self.cas,
        });
        let header = command_buffer(&line);

        let socket = match self.target.socket()? {
            Some(socket) => socket,
            None => return Ok(None),
        };
        socket.write(&[header.as_slice(), self.item.data.as_slice(), TERMINATOR])?;

        let response = socket.read_response()?;
        if response == STORED {
            Ok(Some(()))
        } else {
            debug!(
                "{} {} was not stored: {}",
                self.command.verb(),
                self.target.key(),
                response
            );
            Ok(None)
        }
    }
}
