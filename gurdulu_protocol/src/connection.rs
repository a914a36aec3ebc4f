use std::io::{self, IoSlice, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::{debug, warn};

use super::command::command_buffer;
use super::{ProtocolError, Result, SocketBuffer};

const GENERIC_ERROR_RESPONSE: &str = "ERROR";
const CLIENT_ERROR_RESPONSE: &str = "CLIENT_ERROR ";
const SERVER_ERROR_RESPONSE: &str = "SERVER_ERROR ";

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

/// Socket level timeouts. `None` and zero both mean "wait forever".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub connect_timeout: Option<Duration>,
    pub receive_timeout: Option<Duration>,
}

fn finite(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|timeout| *timeout > Duration::from_secs(0))
}

/// Any transport failure flips `is_alive` to false before the error is returned. The owner
/// decides what to do with a dead connection; nothing here stops further calls.
pub struct Connection {
    id: usize,
    address: SocketAddr,
    buffer: SocketBuffer<TcpStream>,
    alive: bool,
}

impl Connection {
    pub fn connect(address: SocketAddr, options: ConnectionOptions) -> Result<Connection> {
        let stream = match finite(options.connect_timeout) {
            Some(timeout) => TcpStream::connect_timeout(&address, timeout)?,
            None => TcpStream::connect(address)?,
        };

        stream.set_write_timeout(finite(options.connect_timeout))?;
        stream.set_read_timeout(finite(options.receive_timeout))?;
        // every command is flushed as a whole, never in small chunks
        stream.set_nodelay(true)?;

        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        debug!("Connection {} opened to {}", id, address);

        Ok(Connection {
            id,
            address,
            buffer: SocketBuffer::new(stream),
            alive: true,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref err) = result {
            if err.is_fatal() {
                self.alive = false;
            }
        }
        result
    }

    pub fn send_command(&mut self, line: &str) -> Result<()> {
        debug!("Connection {} send: {}", self.id, line);

        let buffer = command_buffer(line);
        self.write(&[buffer.as_slice()])
    }

    pub fn write(&mut self, segments: &[&[u8]]) -> Result<()> {
        debug!("Connection {} writing {} segment(s)", self.id, segments.len());

        let result = write_segments(self.buffer.get_mut(), segments).map_err(ProtocolError::from);
        self.track(result)
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        debug!("Connection {} reading {} bytes", self.id, buf.len());

        let result = self.buffer.read_into(buf);
        self.track(result)
    }

    pub fn read_exact(&mut self, size: usize) -> Result<Vec<u8>> {
        let result = self.buffer.read_exact(size);
        self.track(result)
    }

    pub fn read_line(&mut self) -> Result<String> {
        let result = self.buffer.read_line();
        let line = self.track(result)?;
        let line = std::str::from_utf8(&line)?.to_string();

        debug!("Connection {} read line: {}", self.id, line);
        Ok(line)
    }

    /// Reads one response line and turns the error lines into errors. Anything else is handed
    /// back verbatim for the caller to compare against the keyword it expects.
    pub fn read_response(&mut self) -> Result<String> {
        let response = self.read_line()?;

        if response.is_empty() {
            return Err(ProtocolError::EmptyResponse);
        }
        if response == GENERIC_ERROR_RESPONSE {
            return Err(ProtocolError::NotSupported);
        }
        if response.starts_with(CLIENT_ERROR_RESPONSE) {
            return Err(ProtocolError::ClientError(
                response[CLIENT_ERROR_RESPONSE.len()..].to_string(),
            ));
        }
        if response.starts_with(SERVER_ERROR_RESPONSE) {
            return Err(ProtocolError::ServerError(
                response[SERVER_ERROR_RESPONSE.len()..].to_string(),
            ));
        }

        Ok(response)
    }

    /// Throws away whatever a previous user left unread, both in the buffer and on the socket.
    pub fn reset(&mut self) -> Result<()> {
        let mut leftover = self.buffer.take_buffered();
        let result = drain(self.buffer.get_mut(), &mut leftover);
        self.track(result)?;

        if !leftover.is_empty() {
            warn!(
                "Connection {} to {} had {} unread bytes, discarding: {}",
                self.id,
                self.address,
                leftover.len(),
                String::from_utf8_lossy(&leftover)
            );
        }

        debug!("Connection {} was reset", self.id);
        Ok(())
    }

    pub fn destroy(self) {
        debug!("Connection {} to {} destroyed", self.id, self.address);

        // the peer may be gone already
        let _ = self.buffer.get_ref().shutdown(Shutdown::Both);
    }
}

fn drain(stream: &mut TcpStream, leftover: &mut Vec<u8>) -> Result<()> {
    stream.set_nonblocking(true)?;

    let mut chunk = [0u8; 1024];
    let result = loop {
        match stream.read(&mut chunk) {
            Ok(0) => break Err(ProtocolError::ConnectionClosed),
            Ok(read) => leftover.extend_from_slice(&chunk[..read]),
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break Ok(()),
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => break Err(err.into()),
        }
    };

    stream.set_nonblocking(false)?;
    result
}

fn write_segments(stream: &mut TcpStream, segments: &[&[u8]]) -> io::Result<()> {
    let total: usize = segments.iter().map(|segment| segment.len()).sum();
    let slices: Vec<IoSlice> = segments.iter().map(|segment| IoSlice::new(segment)).collect();

    let mut written = loop {
        match stream.write_vectored(&slices) {
            Ok(0) if total > 0 => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write the command",
                ))
            }
            Ok(written) => break written,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    };

    // short vectored send, push the rest segment by segment
    for segment in segments {
        if written >= segment.len() {
            written -= segment.len();
            continue;
        }
        stream.write_all(&segment[written..])?;
        written = 0;
    }

    stream.flush()
}
