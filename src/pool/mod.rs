mod node;
mod node_pool;
mod server_pool;

pub use node::Node;
pub use node_pool::{NodePool, PooledSocket};
pub use server_pool::ServerPool;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SocketPoolConfig;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::{Arc, Once};
    use std::thread;
    use std::time::Duration;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            env_logger::init();
        });
    }

    pub fn test_config(min_pool_size: usize, max_pool_size: usize) -> SocketPoolConfig {
        SocketPoolConfig {
            min_pool_size,
            max_pool_size,
            connection_timeout: Some(Duration::from_millis(300)),
            receive_timeout: Some(Duration::from_secs(2)),
            dead_timeout: Duration::from_millis(200),
        }
    }

    /// Nodes that never open a connection because their pools start empty.
    pub fn idle_nodes(count: usize) -> Vec<Arc<Node>> {
        (0..count)
            .map(|index| {
                let address: SocketAddr = format!("127.0.0.1:{}", 40_000 + index).parse().unwrap();
                Arc::new(Node::new(address, test_config(0, 4)).unwrap())
            })
            .collect()
    }

    /// An address nothing listens on.
    pub fn closed_address() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    fn hold(stream: TcpStream) {
        let mut stream = stream;
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink);
    }

    /// Accepts every connection and keeps it open until the client hangs up.
    pub fn accepting_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        serve_on(listener);
        address
    }

    pub fn serve_on(listener: TcpListener) {
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        thread::spawn(move || hold(stream));
                    }
                    Err(_) => return,
                }
            }
        });
    }

    /// Hangs up on every connection right after accepting it.
    pub fn hanging_up_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => drop(stream),
                    Err(_) => return,
                }
            }
        });

        address
    }

    /// Writes an unrequested line on every new connection, then keeps it open.
    pub fn chatty_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => return,
                };
                thread::spawn(move || {
                    let _ = stream.write_all(b"STORED\r\n");
                    hold(stream);
                });
            }
        });

        address
    }

    /// Closes every connection as soon as the first command line arrives.
    pub fn closing_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => return,
                };
                thread::spawn(move || {
                    let mut reader = BufReader::new(stream);
                    let mut line = String::new();
                    let _ = reader.read_line(&mut line);
                });
            }
        });

        address
    }
}
