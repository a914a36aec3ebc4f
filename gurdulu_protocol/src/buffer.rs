use super::{ProtocolError, Result};
use std::io::{self, Read};

pub const DEFAULT_BUF_SIZE: usize = 8 * 1024;

/// Buffered reader over a blocking stream. Lines are terminated by `\r\n`; a lone `\r` or `\n`
/// is part of the line.
pub struct SocketBuffer<T: Read> {
    stream: T,
    read_buffer: Vec<u8>,

    read_pos: usize,
    read_cap: usize,
}

impl<T: Read> SocketBuffer<T> {
    pub fn new(stream: T) -> SocketBuffer<T> {
        SocketBuffer::with_capacity(stream, DEFAULT_BUF_SIZE)
    }

    pub fn with_capacity(stream: T, capacity: usize) -> SocketBuffer<T> {
        SocketBuffer {
            stream,
            read_buffer: vec![0; capacity],

            read_cap: 0,
            read_pos: 0,
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.stream
    }

    /// Drops everything already pulled from the stream but not consumed yet.
    pub fn take_buffered(&mut self) -> Vec<u8> {
        let buffered = self.read_buffer[self.read_pos..self.read_cap].to_vec();
        self.read_pos = 0;
        self.read_cap = 0;
        buffered
    }

    pub fn fill_buf(&mut self) -> Result<&[u8]> {
        if self.read_pos >= self.read_cap {
            debug_assert_eq!(self.read_pos, self.read_cap);
            self.read_cap = loop {
                match self.stream.read(&mut self.read_buffer) {
                    Ok(read) => break read,
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err.into()),
                }
            };
            self.read_pos = 0;
            if self.read_cap == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
        }
        Ok(&self.read_buffer[self.read_pos..self.read_cap])
    }

    pub fn consume(&mut self, amt: usize) {
        self.read_pos = std::cmp::min(self.read_pos + amt, self.read_cap);
    }

    /// Reads one line and strips the trailing `\r\n`.
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();

        loop {
            let (done, used) = {
                let available = self.fill_buf()?;

                match memchr::memchr(b'\n', available) {
                    Some(index) => {
                        buf.extend_from_slice(&available[..=index]);
                        (buf.len() >= 2 && buf[buf.len() - 2] == b'\r', index + 1)
                    }
                    None => {
                        buf.extend_from_slice(available);
                        (false, available.len())
                    }
                }
            };
            self.consume(used);

            if done {
                buf.truncate(buf.len() - 2);
                return Ok(buf);
            }
        }
    }

    /// Blocks until `out` is completely filled.
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<()> {
        let mut read = 0;
        while read < out.len() {
            let used = {
                let available = self.fill_buf()?;
                let used = std::cmp::min(available.len(), out.len() - read);
                out[read..read + used].copy_from_slice(&available[..used]);
                used
            };
            self.consume(used);
            read += used;
        }
        Ok(())
    }

    /// Reads `size` bytes, growing the result as data arrives.
    pub fn read_exact(&mut self, size: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(std::cmp::min(size, self.read_buffer.len()));
        while buf.len() < size {
            let used = {
                let available = self.fill_buf()?;
                let used = std::cmp::min(available.len(), size - buf.len());
                buf.extend_from_slice(&available[..used]);
                used
            };
            self.consume(used);
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn buffer(data: &[u8], capacity: usize) -> SocketBuffer<Cursor<Vec<u8>>> {
        SocketBuffer::with_capacity(Cursor::new(data.to_vec()), capacity)
    }

    #[test]
    fn read_line() {
        let mut buffer = buffer(b"TEST LINE 1\r\nTESTTESTTEST\r\n", DEFAULT_BUF_SIZE);

        assert_eq!(buffer.read_line().unwrap(), b"TEST LINE 1".to_vec());
        assert_eq!(buffer.read_line().unwrap(), b"TESTTESTTEST".to_vec());
    }

    #[test]
    fn read_line_across_small_buffers() {
        let mut buffer = buffer(b"VALUE key 0 5\r\nEND\r\n", 3);

        assert_eq!(buffer.read_line().unwrap(), b"VALUE key 0 5".to_vec());
        assert_eq!(buffer.read_line().unwrap(), b"END".to_vec());
    }

    #[test]
    fn lone_line_feed_stays_in_line() {
        let mut buffer = buffer(b"a\nb\rc\r\nnext\r\n", 4);

        assert_eq!(buffer.read_line().unwrap(), b"a\nb\rc".to_vec());
        assert_eq!(buffer.read_line().unwrap(), b"next".to_vec());
    }

    #[test]
    fn read_exact() {
        let mut buffer = buffer(b"TEST LINE 1\r\nTESTTESTTEST\r\n", 5);

        assert_eq!(buffer.read_exact(8).unwrap(), b"TEST LIN".to_vec());
        buffer.read_line().unwrap();
        assert_eq!(buffer.read_exact(8).unwrap(), b"TESTTEST".to_vec());
        assert_eq!(buffer.read_line().unwrap(), b"TEST".to_vec());
    }

    #[test]
    fn read_exact_stops_at_closed_stream() {
        let mut buffer = buffer(b"short", 2);

        match buffer.read_exact(usize::max_value()) {
            Err(ProtocolError::ConnectionClosed) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn closed_stream() {
        let mut buffer = buffer(b"HALF A LI", DEFAULT_BUF_SIZE);

        match buffer.read_line() {
            Err(ProtocolError::ConnectionClosed) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn take_buffered() {
        let mut buffer = buffer(b"STORED\r\nleftover", DEFAULT_BUF_SIZE);

        buffer.read_line().unwrap();
        assert_eq!(buffer.take_buffered(), b"leftover".to_vec());
        assert!(buffer.take_buffered().is_empty());
    }
}
