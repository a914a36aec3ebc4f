use std::net::SocketAddr;

quick_error! {
    #[derive(Debug)]
    pub enum ClientError {
        AddressError(err: std::net::AddrParseError) {
            from()
            display("invalid server address: {}", err)
        }
        IOError(err: std::io::Error) {
            from()
            display("{}", err)
        }
        ProtocolError(err: gurdulu_protocol::ProtocolError) {
            from()
            display("{}", err)
        }
        InvalidConfiguration(message: String) {
            display("invalid configuration: {}", message)
        }
        InvalidArgument(message: String) {
            display("invalid argument: {}", message)
        }
        PoolTimeout(address: SocketAddr) {
            display("timed out waiting for a free connection to {}", address)
        }
        PoolDisposed {
            display("the server pool has been disposed")
        }
        NoLiveNode {
            display("no live server is available")
        }
        AlreadyInitialized {
            display("the node locator is already initialized")
        }
        Transcoder(message: String) {
            display("cannot transcode item: {}", message)
        }
    }
}

impl ClientError {
    /// The server rejected the command itself. This points at a bug rather than a transient
    /// condition, so it is never swallowed.
    pub fn is_unsupported(&self) -> bool {
        match self {
            ClientError::ProtocolError(gurdulu_protocol::ProtocolError::NotSupported) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
