#[macro_use]
extern crate quick_error;

mod client;
mod config;
mod error;
mod key_transform;
mod locator;
mod operation;
mod pool;
mod transcoder;

pub use client::CacheClient;
pub use config::{ClientConfig, KeyTransformerKind, LocatorKind, SocketPoolConfig};
pub use error::{ClientError, Result};
pub use key_transform::{
    Base64KeyTransformer, DefaultKeyTransformer, KeyTransformer, Sha256KeyTransformer,
};
pub use locator::{KetamaNodeLocator, NodeLocator, SingleNodeLocator};
pub use operation::*;
pub use pool::{Node, NodePool, PooledSocket, ServerPool};
pub use transcoder::{CacheItem, DefaultTranscoder, Transcoder, Value};

pub use gurdulu_protocol::StoreCommand;
