use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use gurdulu_protocol::ConnectionOptions;

use crate::error::{ClientError, Result};
use crate::key_transform::{
    Base64KeyTransformer, DefaultKeyTransformer, KeyTransformer, Sha256KeyTransformer,
};
use crate::locator::{KetamaNodeLocator, NodeLocator, SingleNodeLocator};
use crate::transcoder::{DefaultTranscoder, Transcoder};

pub const MAX_POOL_SIZE_LIMIT: usize = 1000;

/// `None` timeouts never expire. A zero `dead_timeout` means a dead server is never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocketPoolConfig {
    pub min_pool_size: usize,
    pub max_pool_size: usize,
    pub connection_timeout: Option<Duration>,
    pub receive_timeout: Option<Duration>,
    pub dead_timeout: Duration,
}

impl Default for SocketPoolConfig {
    fn default() -> SocketPoolConfig {
        SocketPoolConfig {
            min_pool_size: 10,
            max_pool_size: 200,
            connection_timeout: Some(Duration::from_secs(10)),
            receive_timeout: Some(Duration::from_secs(10)),
            dead_timeout: Duration::from_secs(2 * 60),
        }
    }
}

impl SocketPoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_pool_size == 0 {
            return Err(ClientError::InvalidConfiguration(String::from(
                "max_pool_size must be at least 1",
            )));
        }
        if self.max_pool_size > MAX_POOL_SIZE_LIMIT || self.min_pool_size > MAX_POOL_SIZE_LIMIT {
            return Err(ClientError::InvalidConfiguration(format!(
                "pool sizes must not exceed {}",
                MAX_POOL_SIZE_LIMIT
            )));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(ClientError::InvalidConfiguration(format!(
                "min_pool_size ({}) is larger than max_pool_size ({})",
                self.min_pool_size, self.max_pool_size
            )));
        }
        Ok(())
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            connect_timeout: self.connection_timeout,
            receive_timeout: self.receive_timeout,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocatorKind {
    SingleNode,
    Ketama,
}

impl Default for LocatorKind {
    fn default() -> LocatorKind {
        LocatorKind::Ketama
    }
}

impl LocatorKind {
    pub fn create(self) -> Box<dyn NodeLocator> {
        match self {
            LocatorKind::SingleNode => Box::new(SingleNodeLocator::default()),
            LocatorKind::Ketama => Box::new(KetamaNodeLocator::default()),
        }
    }
}

impl FromStr for LocatorKind {
    type Err = ClientError;

    fn from_str(name: &str) -> Result<LocatorKind> {
        match name {
            "single" | "single-node" => Ok(LocatorKind::SingleNode),
            "ketama" => Ok(LocatorKind::Ketama),
            _ => Err(ClientError::InvalidConfiguration(format!(
                "unknown node locator {}",
                name
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyTransformerKind {
    Default,
    Base64,
    Sha256,
}

impl Default for KeyTransformerKind {
    fn default() -> KeyTransformerKind {
        KeyTransformerKind::Default
    }
}

impl KeyTransformerKind {
    pub fn create(self) -> Arc<dyn KeyTransformer> {
        match self {
            KeyTransformerKind::Default => Arc::new(DefaultKeyTransformer),
            KeyTransformerKind::Base64 => Arc::new(Base64KeyTransformer),
            KeyTransformerKind::Sha256 => Arc::new(Sha256KeyTransformer),
        }
    }
}

impl FromStr for KeyTransformerKind {
    type Err = ClientError;

    fn from_str(name: &str) -> Result<KeyTransformerKind> {
        match name {
            "default" => Ok(KeyTransformerKind::Default),
            "base64" => Ok(KeyTransformerKind::Base64),
            "sha256" => Ok(KeyTransformerKind::Sha256),
            _ => Err(ClientError::InvalidConfiguration(format!(
                "unknown key transformer {}",
                name
            ))),
        }
    }
}

/// Built with consuming setters:
///
/// ```no_run
/// use gurdulu::{ClientConfig, LocatorKind};
///
/// let config = ClientConfig::default()
///     .add_server("127.0.0.1:11211")
///     .unwrap()
///     .locator(LocatorKind::Ketama);
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    servers: Vec<SocketAddr>,
    socket_pool: SocketPoolConfig,
    locator: LocatorKind,
    key_transformer: KeyTransformerKind,
    transcoder: Arc<dyn Transcoder>,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            servers: Vec::new(),
            socket_pool: SocketPoolConfig::default(),
            locator: LocatorKind::default(),
            key_transformer: KeyTransformerKind::default(),
            transcoder: Arc::new(DefaultTranscoder),
        }
    }
}

impl ClientConfig {
    pub fn add_server(mut self, address: &str) -> Result<Self> {
        let resolved = address.to_socket_addrs()?.next().ok_or_else(|| {
            ClientError::InvalidConfiguration(format!("{} does not resolve to an address", address))
        })?;
        self.servers.push(resolved);
        Ok(self)
    }

    pub fn servers(mut self, servers: Vec<SocketAddr>) -> Self {
        self.servers = servers;
        self
    }

    pub fn socket_pool(mut self, socket_pool: SocketPoolConfig) -> Self {
        self.socket_pool = socket_pool;
        self
    }

    pub fn locator(mut self, locator: LocatorKind) -> Self {
        self.locator = locator;
        self
    }

    pub fn key_transformer(mut self, key_transformer: KeyTransformerKind) -> Self {
        self.key_transformer = key_transformer;
        self
    }

    pub fn transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn server_list(&self) -> &[SocketAddr] {
        &self.servers
    }

    pub fn socket_pool_config(&self) -> &SocketPoolConfig {
        &self.socket_pool
    }

    pub fn locator_kind(&self) -> LocatorKind {
        self.locator
    }

    pub fn key_transformer_kind(&self) -> KeyTransformerKind {
        self.key_transformer
    }

    pub fn transcoder_ref(&self) -> &Arc<dyn Transcoder> {
        &self.transcoder
    }

    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(ClientError::InvalidConfiguration(String::from(
                "at least one server must be configured",
            )));
        }
        self.socket_pool.validate()
    }
}
