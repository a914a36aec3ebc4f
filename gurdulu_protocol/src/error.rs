quick_error! {
    #[derive(Debug)]
    pub enum ProtocolError {
        GrammarCheckFailed(s: &'static str) {
            display("{}", s)
        }
        ConnectionClosed {
            display("connection closed by the server")
        }
        EmptyResponse {
            display("empty response received")
        }
        NotSupported {
            display("operation is not supported by the server or the request was malformed")
        }
        ClientError(message: String) {
            display("client error: {}", message)
        }
        ServerError(message: String) {
            display("server error: {}", message)
        }
        UnexpectedResponse(line: String) {
            display("unexpected response: {}", line)
        }
        Utf8Error(err: std::str::Utf8Error) {
            from()
            display("{}", err)
        }
        ParseError(err: std::num::ParseIntError) {
            from()
            display("{}", err)
        }
        IOError(err: std::io::Error) {
            from()
            display("{}", err)
        }
    }
}

impl ProtocolError {
    /// Transport faults. The connection that produced one cannot be trusted anymore.
    pub fn is_fatal(&self) -> bool {
        match self {
            ProtocolError::IOError(_) | ProtocolError::ConnectionClosed => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
