use super::command::TERMINATOR;
use super::{Connection, ProtocolError, Result};

pub const END: &str = "END";
pub const STORED: &str = "STORED";
pub const DELETED: &str = "DELETED";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const OK: &str = "OK";

/// Largest item a server hands out with its default slab settings.
pub const MAX_ITEM_SIZE: usize = 1024 * 1024;

const VALUE_PREFIX: &str = "VALUE";
const STAT_PREFIX: &str = "STAT ";

/// `VALUE <key> <flags> <bytes> [<cas>]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemHeader {
    pub key: String,
    pub flags: u16,
    pub length: usize,
    pub cas: u64,
}

impl ItemHeader {
    pub fn parse(line: &str) -> Result<ItemHeader> {
        let mut parts = line.split(' ');

        if parts.next() != Some(VALUE_PREFIX) {
            return Err(ProtocolError::UnexpectedResponse(line.to_string()));
        }

        let key = parts
            .next()
            .ok_or(ProtocolError::GrammarCheckFailed("item header should contain a key"))?;
        let flags = parts
            .next()
            .ok_or(ProtocolError::GrammarCheckFailed("item header should contain flags"))?
            .parse::<u16>()?;
        let length = parts
            .next()
            .ok_or(ProtocolError::GrammarCheckFailed("item header should contain a length"))?
            .parse::<usize>()?;
        if length > MAX_ITEM_SIZE {
            return Err(ProtocolError::GrammarCheckFailed(
                "item length exceeds the maximum item size",
            ));
        }
        let cas = match parts.next() {
            Some(cas) => cas.parse::<u64>()?,
            None => 0,
        };

        if parts.next().is_some() {
            return Err(ProtocolError::GrammarCheckFailed(
                "item header has too many fields",
            ));
        }

        Ok(ItemHeader {
            key: key.to_string(),
            flags,
            length,
            cas,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub flags: u16,
    pub data: Vec<u8>,
    pub cas: u64,
}

/// Reads the next item of a fetch response, or `None` once the `END` line shows up.
pub fn read_item(connection: &mut Connection) -> Result<Option<Item>> {
    let line = connection.read_response()?;
    if line == END {
        return Ok(None);
    }

    let header = ItemHeader::parse(&line)?;
    let data = connection.read_exact(header.length)?;

    let terminator = connection.read_exact(TERMINATOR.len())?;
    if terminator != TERMINATOR {
        return Err(ProtocolError::GrammarCheckFailed(
            "item data should be followed by CRLF",
        ));
    }

    Ok(Some(Item {
        key: header.key,
        flags: header.flags,
        data,
        cas: header.cas,
    }))
}

/// Consumes the `END` line closing a single item fetch.
pub fn finish_item(connection: &mut Connection) -> Result<()> {
    let line = connection.read_response()?;
    if line == END {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedResponse(line))
    }
}

/// Splits `STAT <name> <value>`; anything else is `None`.
pub fn parse_stat(line: &str) -> Option<(&str, &str)> {
    if !line.starts_with(STAT_PREFIX) {
        return None;
    }

    let parts: Vec<&str> = line[STAT_PREFIX.len()..].split(' ').collect();
    if parts.len() != 2 {
        return None;
    }
    Some((parts[0], parts[1]))
}
