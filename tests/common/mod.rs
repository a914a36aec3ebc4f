#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::Duration;

use gurdulu::{ClientConfig, SocketPoolConfig};

static INIT: Once = Once::new();

pub fn init() {
    INIT.call_once(|| {
        env_logger::init();
    });
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Answers every command with a bare `ERROR`.
    RejectAll,
    /// Answers every command with `SERVER_ERROR`.
    Failing,
}

struct Entry {
    flags: u16,
    data: Vec<u8>,
    cas: u64,
}

struct Store {
    items: HashMap<String, Entry>,
    next_cas: u64,
}

impl Store {
    fn bump(&mut self) -> u64 {
        self.next_cas += 1;
        self.next_cas
    }
}

/// A tiny in-process cache server speaking the text protocol. Expiration times are accepted
/// and ignored.
pub struct FakeServer {
    address: SocketAddr,
    commands: Arc<AtomicUsize>,
}

impl FakeServer {
    pub fn start() -> FakeServer {
        FakeServer::with_mode(Mode::Normal)
    }

    pub fn with_mode(mode: Mode) -> FakeServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let commands = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(Mutex::new(Store {
            items: HashMap::new(),
            next_cas: 0,
        }));

        {
            let commands = commands.clone();
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(_) => return,
                    };
                    let commands = commands.clone();
                    let store = store.clone();
                    thread::spawn(move || {
                        let _ = serve(stream, mode, &commands, &store);
                    });
                }
            });
        }

        FakeServer { address, commands }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Commands received so far, over all connections.
    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }
}

/// An address nothing listens on.
pub fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn pool_config() -> SocketPoolConfig {
    SocketPoolConfig {
        min_pool_size: 1,
        max_pool_size: 8,
        connection_timeout: Some(Duration::from_secs(1)),
        receive_timeout: Some(Duration::from_secs(2)),
        dead_timeout: Duration::from_secs(60),
    }
}

pub fn config(servers: Vec<SocketAddr>) -> ClientConfig {
    ClientConfig::default()
        .servers(servers)
        .socket_pool(pool_config())
}

fn read_data(reader: &mut BufReader<TcpStream>, length: usize) -> std::io::Result<Vec<u8>> {
    let mut data = vec![0; length + 2];
    reader.read_exact(&mut data)?;
    data.truncate(length);
    Ok(data)
}

fn write_item(out: &mut Vec<u8>, key: &str, entry: &Entry, with_cas: bool) {
    if with_cas {
        out.extend_from_slice(
            format!("VALUE {} {} {} {}\r\n", key, entry.flags, entry.data.len(), entry.cas)
                .as_bytes(),
        );
    } else {
        out.extend_from_slice(
            format!("VALUE {} {} {}\r\n", key, entry.flags, entry.data.len()).as_bytes(),
        );
    }
    out.extend_from_slice(&entry.data);
    out.extend_from_slice(b"\r\n");
}

fn serve(
    stream: TcpStream,
    mode: Mode,
    commands: &AtomicUsize,
    store: &Mutex<Store>,
) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end_matches("\r\n").to_string();
        let parts: Vec<&str> = line.split(' ').collect();
        commands.fetch_add(1, Ordering::SeqCst);

        let is_storage = match parts[0] {
            "set" | "add" | "replace" | "append" | "prepend" | "cas" => true,
            _ => false,
        };
        let data = if is_storage && parts.len() >= 5 {
            Some(read_data(&mut reader, parts[4].parse().unwrap_or(0))?)
        } else {
            None
        };

        match mode {
            Mode::RejectAll => {
                writer.write_all(b"ERROR\r\n")?;
                continue;
            }
            Mode::Failing => {
                writer.write_all(b"SERVER_ERROR out of memory\r\n")?;
                continue;
            }
            Mode::Normal => {}
        }

        let mut out = Vec::new();
        let mut store = store.lock().unwrap();
        match parts[0] {
            "get" | "gets" => {
                for key in &parts[1..] {
                    if let Some(entry) = store.items.get(*key) {
                        write_item(&mut out, key, entry, parts[0] == "gets");
                    }
                }
                out.extend_from_slice(b"END\r\n");
            }
            "set" | "add" | "replace" | "append" | "prepend" | "cas" => {
                let key = parts[1].to_string();
                let flags: u16 = parts[2].parse().unwrap_or(0);
                let data = data.unwrap_or_default();
                let exists = store.items.contains_key(&key);

                let stored = match parts[0] {
                    "set" => true,
                    "add" => !exists,
                    "replace" | "append" | "prepend" => exists,
                    _ => {
                        let expected: u64 = parts
                            .get(5)
                            .and_then(|cas| cas.parse().ok())
                            .unwrap_or(0);
                        match store.items.get(&key) {
                            Some(entry) if entry.cas == expected => true,
                            Some(_) => {
                                out.extend_from_slice(b"EXISTS\r\n");
                                false
                            }
                            None => {
                                out.extend_from_slice(b"NOT_FOUND\r\n");
                                false
                            }
                        }
                    }
                };

                if stored {
                    let cas = store.bump();
                    let entry = match parts[0] {
                        "append" | "prepend" => {
                            let old = store.items.remove(&key).unwrap();
                            let mut combined = Vec::new();
                            if parts[0] == "append" {
                                combined.extend_from_slice(&old.data);
                                combined.extend_from_slice(&data);
                            } else {
                                combined.extend_from_slice(&data);
                                combined.extend_from_slice(&old.data);
                            }
                            Entry {
                                flags: old.flags,
                                data: combined,
                                cas,
                            }
                        }
                        _ => Entry { flags, data, cas },
                    };
                    store.items.insert(key, entry);
                    out.extend_from_slice(b"STORED\r\n");
                } else if out.is_empty() {
                    out.extend_from_slice(b"NOT_STORED\r\n");
                }
            }
            "delete" => {
                if store.items.remove(parts[1]).is_some() {
                    out.extend_from_slice(b"DELETED\r\n");
                } else {
                    out.extend_from_slice(b"NOT_FOUND\r\n");
                }
            }
            "incr" | "decr" => {
                let amount: u64 = parts[2].parse().unwrap_or(0);
                let cas = store.bump();
                match store.items.get_mut(parts[1]) {
                    Some(entry) => match String::from_utf8_lossy(&entry.data).parse::<u64>() {
                        Ok(current) => {
                            let next = if parts[0] == "incr" {
                                current.wrapping_add(amount)
                            } else {
                                current.saturating_sub(amount)
                            };
                            entry.data = next.to_string().into_bytes();
                            entry.cas = cas;
                            out.extend_from_slice(format!("{}\r\n", next).as_bytes());
                        }
                        Err(_) => out.extend_from_slice(
                            b"CLIENT_ERROR cannot increment or decrement non-numeric value\r\n",
                        ),
                    },
                    None => out.extend_from_slice(b"NOT_FOUND\r\n"),
                }
            }
            "stats" => {
                out.extend_from_slice(b"STAT pid 4242\r\n");
                out.extend_from_slice(
                    format!("STAT curr_items {}\r\n", store.items.len()).as_bytes(),
                );
                out.extend_from_slice(b"STAT threads 4 extra\r\n");
                out.extend_from_slice(b"STAT version 1.6.9\r\n");
                out.extend_from_slice(b"END\r\n");
            }
            "flush_all" => {
                store.items.clear();
                out.extend_from_slice(b"OK\r\n");
            }
            _ => out.extend_from_slice(b"ERROR\r\n"),
        }
        drop(store);

        writer.write_all(&out)?;
    }
}
