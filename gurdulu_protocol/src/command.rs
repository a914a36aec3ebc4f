pub const TERMINATOR: &[u8] = b"\r\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreCommand {
    Set,
    Add,
    Replace,
    Append,
    Prepend,
    CheckAndSet,
}

impl StoreCommand {
    pub fn verb(self) -> &'static str {
        match self {
            StoreCommand::Set => "set",
            StoreCommand::Add => "add",
            StoreCommand::Replace => "replace",
            StoreCommand::Append => "append",
            StoreCommand::Prepend => "prepend",
            StoreCommand::CheckAndSet => "cas",
        }
    }
}

#[derive(Clone, Debug)]
pub enum Command<'a> {
    Get {
        key: &'a str,
    },
    Gets {
        keys: &'a [&'a str],
    },
    Store {
        command: StoreCommand,
        key: &'a str,
        flags: u16,
        expires: u64,
        length: usize,
        cas: u64,
    },
    Delete {
        key: &'a str,
    },
    Increment {
        key: &'a str,
        amount: u64,
    },
    Decrement {
        key: &'a str,
        amount: u64,
    },
    Stats,
    FlushAll,
}

/// A command line without its terminator.
impl<'a> From<Command<'a>> for String {
    fn from(command: Command<'a>) -> String {
        match command {
            Command::Get { key } => format!("get {}", key),
            Command::Gets { keys } => format!("gets {}", keys.join(" ")),
            Command::Store {
                command,
                key,
                flags,
                expires,
                length,
                cas,
            } => {
                let mut line = format!("{} {} {} {} {}", command.verb(), key, flags, expires, length);
                if command == StoreCommand::CheckAndSet {
                    line.push_str(&format!(" {}", cas));
                }
                line
            }
            Command::Delete { key } => format!("delete {}", key),
            Command::Increment { key, amount } => format!("incr {} {}", key, amount),
            Command::Decrement { key, amount } => format!("decr {} {}", key, amount),
            Command::Stats => String::from("stats"),
            Command::FlushAll => String::from("flush_all"),
        }
    }
}

/// The bytes of a command line including the terminator, ready to be sent together with
/// other segments in a single write.
pub fn command_buffer(line: &str) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(line.len() + TERMINATOR.len());
    buffer.extend_from_slice(line.as_bytes());
    buffer.extend_from_slice(TERMINATOR);
    buffer
}
