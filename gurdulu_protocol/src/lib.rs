#[macro_use]
extern crate quick_error;

pub mod command;
pub mod error;
pub mod response;

mod buffer;
mod connection;

pub use command::*;
pub use response::*;

pub use buffer::SocketBuffer;
pub use connection::{Connection, ConnectionOptions};
pub use error::{ProtocolError, Result};
