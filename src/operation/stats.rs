use std::collections::HashMap;
use std::net::SocketAddr;

use log::{error, warn};

use gurdulu_protocol::{parse_stat, Command, END};

use super::Operation;
use crate::error::Result;
use crate::pool::{Node, ServerPool};

/// `stats` output of every server that answered, by server address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    stats: HashMap<SocketAddr, HashMap<String, String>>,
}

impl ServerStats {
    pub fn servers(&self) -> Vec<SocketAddr> {
        let mut servers: Vec<SocketAddr> = self.stats.keys().cloned().collect();
        servers.sort();
        servers
    }

    pub fn server(&self, address: &SocketAddr) -> Option<&HashMap<String, String>> {
        self.stats.get(address)
    }

    pub fn get_raw(&self, address: &SocketAddr, name: &str) -> Option<&str> {
        self.stats
            .get(address)
            .and_then(|stats| stats.get(name))
            .map(String::as_str)
    }

    pub fn get_u64(&self, address: &SocketAddr, name: &str) -> Option<u64> {
        self.get_raw(address, name)
            .and_then(|value| value.parse().ok())
    }

    /// Sum of a numeric stat over all servers. Servers without it count as zero.
    pub fn total(&self, name: &str) -> u64 {
        self.stats
            .keys()
            .filter_map(|address| self.get_u64(address, name))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

pub struct StatsOperation<'a> {
    pool: &'a ServerPool,
}

impl<'a> StatsOperation<'a> {
    pub fn new(pool: &'a ServerPool) -> StatsOperation<'a> {
        StatsOperation { pool }
    }
}

fn read_stats(node: &Node) -> Result<Option<HashMap<String, String>>> {
    let mut socket = match node.acquire()? {
        Some(socket) => socket,
        None => return Ok(None),
    };
    socket.send_command(&String::from(Command::Stats))?;

    let mut stats = HashMap::new();
    loop {
        let line = socket.read_response()?;
        if line == END {
            break;
        }

        match parse_stat(&line) {
            Some((name, value)) => {
                stats.insert(name.to_string(), value.to_string());
            }
            None => warn!("Skipping malformed stat line from {}: {}", node.address(), line),
        }
    }

    Ok(Some(stats))
}

impl<'a> Operation for StatsOperation<'a> {
    type Output = ServerStats;

    fn name(&self) -> &'static str {
        "stats"
    }

    fn execute_action(&mut self) -> Result<Option<ServerStats>> {
        let mut result = ServerStats::default();

        for node in self.pool.working_servers()?.iter() {
            match read_stats(node) {
                Ok(Some(stats)) => {
                    result.stats.insert(node.address(), stats);
                }
                Ok(None) => warn!("Server {} is unreachable, no stats", node.address()),
                Err(err) => {
                    if err.is_unsupported() {
                        return Err(err);
                    }
                    error!("Reading stats of {} failed: {}", node.address(), err);
                }
            }
        }

        Ok(Some(result))
    }
}
