use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use crossbeam::sync::{ShardedLock, ShardedLockReadGuard, ShardedLockWriteGuard};
use fnv::FnvHashMap;
use log::{debug, error, info, warn};

use super::{Node, PooledSocket};
use crate::config::{ClientConfig, LocatorKind, SocketPoolConfig};
use crate::error::{ClientError, Result};
use crate::key_transform::KeyTransformer;
use crate::locator::NodeLocator;
use crate::transcoder::Transcoder;

struct ServerState {
    working: Vec<Arc<Node>>,
    dead: Vec<Arc<Node>>,
    locator: Box<dyn NodeLocator>,
    snapshot: Option<Arc<Vec<Arc<Node>>>>,
}

impl ServerState {
    /// Builds a fresh locator for the current working list. Has to run after every change of
    /// `working`, before the write lock is given up.
    fn rebuild(&mut self, kind: LocatorKind) -> Result<()> {
        let mut locator = kind.create();
        locator.initialize(&self.working)?;

        self.locator = locator;
        self.snapshot = None;
        Ok(())
    }
}

struct Inner {
    servers: Vec<SocketAddr>,
    socket_pool: SocketPoolConfig,
    locator_kind: LocatorKind,
    key_transformer: Arc<dyn KeyTransformer>,
    transcoder: Arc<dyn Transcoder>,

    state: ShardedLock<Option<ServerState>>,
}

impl Inner {
    fn read_state(&self) -> ShardedLockReadGuard<Option<ServerState>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> ShardedLockWriteGuard<Option<ServerState>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn configured_index(&self, node: &Node) -> usize {
        self.servers
            .iter()
            .position(|address| *address == node.address())
            .unwrap_or(usize::max_value())
    }

    fn mark_as_dead(&self, node: &Arc<Node>) -> Result<()> {
        let mut guard = self.write_state();
        let state = guard.as_mut().ok_or(ClientError::PoolDisposed)?;

        // another thread may have moved it already
        if let Some(position) = state.working.iter().position(|n| Arc::ptr_eq(n, node)) {
            let node = state.working.remove(position);
            warn!(
                "Server {} is unreachable, {} server(s) left",
                node.address(),
                state.working.len()
            );
            state.dead.push(node);
            state.rebuild(self.locator_kind)?;
        }
        Ok(())
    }

    fn locate_node(&self, key: &str) -> Result<Option<Arc<Node>>> {
        let attempts = {
            let guard = self.read_state();
            guard.as_ref().ok_or(ClientError::PoolDisposed)?.working.len() + 1
        };

        for _ in 0..attempts {
            let node = {
                let guard = self.read_state();
                let state = guard.as_ref().ok_or(ClientError::PoolDisposed)?;
                match state.locator.locate(key) {
                    Some(node) => node,
                    None => return Ok(None),
                }
            };

            if node.is_alive() {
                return Ok(Some(node));
            }
            self.mark_as_dead(&node)?;
        }

        Ok(None)
    }

    fn check_dead_nodes(&self) {
        let dead: Vec<Arc<Node>> = match self.read_state().as_ref() {
            Some(state) => state.dead.clone(),
            None => return,
        };
        if dead.is_empty() {
            return;
        }

        // pings may connect, so they run without the lock
        let revived: Vec<Arc<Node>> = dead.into_iter().filter(|node| node.ping()).collect();
        if revived.is_empty() {
            return;
        }

        let mut guard = self.write_state();
        let state = match guard.as_mut() {
            Some(state) => state,
            None => return,
        };

        for node in revived {
            if let Some(position) = state.dead.iter().position(|n| Arc::ptr_eq(n, &node)) {
                info!("Server {} is back in the working list", node.address());
                state.dead.remove(position);
                state.working.push(node);
            }
        }
        state
            .working
            .sort_by_key(|node| self.configured_index(node));

        if let Err(err) = state.rebuild(self.locator_kind) {
            error!("Cannot rebuild the node locator: {}", err);
        }
    }
}

struct Timer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// A background thread wakes up every `dead_timeout` and gives dead servers another try.
pub struct ServerPool {
    inner: Arc<Inner>,
    timer: Mutex<Option<Timer>>,
}

impl ServerPool {
    pub fn new(config: ClientConfig) -> Result<ServerPool> {
        config.validate()?;

        let socket_pool = *config.socket_pool_config();
        let working = config
            .server_list()
            .iter()
            .map(|address| Node::new(*address, socket_pool).map(Arc::new))
            .collect::<Result<Vec<Arc<Node>>>>()?;

        let mut state = ServerState {
            working,
            dead: Vec::new(),
            locator: config.locator_kind().create(),
            snapshot: None,
        };
        state.rebuild(config.locator_kind())?;

        let inner = Arc::new(Inner {
            servers: config.server_list().to_vec(),
            socket_pool,
            locator_kind: config.locator_kind(),
            key_transformer: config.key_transformer_kind().create(),
            transcoder: config.transcoder_ref().clone(),

            state: ShardedLock::new(Some(state)),
        });

        let timer = if socket_pool.dead_timeout.as_nanos() > 0 {
            Some(start_timer(Arc::downgrade(&inner), socket_pool)?)
        } else {
            None
        };

        info!("Server pool started with {} server(s)", inner.servers.len());
        Ok(ServerPool {
            inner,
            timer: Mutex::new(timer),
        })
    }

    pub fn key_transformer(&self) -> &dyn KeyTransformer {
        self.inner.key_transformer.as_ref()
    }

    pub fn transcoder(&self) -> &dyn Transcoder {
        self.inner.transcoder.as_ref()
    }

    pub fn locate_node(&self, key: &str) -> Result<Option<Arc<Node>>> {
        self.inner.locate_node(key)
    }

    pub fn acquire(&self, key: &str) -> Result<PooledSocket> {
        let node = self.locate_node(key)?.ok_or(ClientError::NoLiveNode)?;

        node.acquire()?.ok_or(ClientError::NoLiveNode)
    }

    pub fn working_servers(&self) -> Result<Arc<Vec<Arc<Node>>>> {
        {
            let guard = self.inner.read_state();
            let state = guard.as_ref().ok_or(ClientError::PoolDisposed)?;
            if let Some(snapshot) = &state.snapshot {
                return Ok(snapshot.clone());
            }
        }

        let mut guard = self.inner.write_state();
        let state = guard.as_mut().ok_or(ClientError::PoolDisposed)?;
        let working = &state.working;
        let snapshot = state
            .snapshot
            .get_or_insert_with(|| Arc::new(working.clone()));
        Ok(snapshot.clone())
    }

    /// Groups keys by the node they live on. Keys no live node can take are left out.
    pub fn split_keys(&self, keys: &[String]) -> Result<FnvHashMap<Arc<Node>, Vec<String>>> {
        let mut groups: FnvHashMap<Arc<Node>, Vec<String>> = FnvHashMap::default();

        for key in keys {
            match self.locate_node(key)? {
                Some(node) => groups.entry(node).or_insert_with(Vec::new).push(key.clone()),
                None => debug!("No live server for key {}", key),
            }
        }
        Ok(groups)
    }

    pub fn check_dead_nodes(&self) {
        self.inner.check_dead_nodes();
    }

    pub fn dispose(&self) {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Timer { stop, handle }) = timer {
            drop(stop);
            if handle.join().is_err() {
                error!("The dead server check thread panicked");
            }
        }

        let state = self.inner.write_state().take();
        if let Some(state) = state {
            for node in state.working.iter().chain(state.dead.iter()) {
                node.dispose();
            }
            info!("Server pool disposed");
        }
    }
}

impl Drop for ServerPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn start_timer(inner: Weak<Inner>, config: SocketPoolConfig) -> Result<Timer> {
    let (stop, stopped) = channel::bounded::<()>(0);
    let interval = config.dead_timeout;

    let handle = thread::Builder::new()
        .name(String::from("gurdulu-dead-check"))
        .spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => match inner.upgrade() {
                    Some(inner) => inner.check_dead_nodes(),
                    None => break,
                },
                _ => break,
            }
        })?;

    Ok(Timer { stop, handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::tests::*;
    use std::net::TcpListener;
    use std::time::Duration;

    fn server_pool(servers: Vec<SocketAddr>, config: SocketPoolConfig) -> ServerPool {
        let config = ClientConfig::default().servers(servers).socket_pool(config);
        ServerPool::new(config).unwrap()
    }

    fn quiet_config(min_pool_size: usize, max_pool_size: usize) -> SocketPoolConfig {
        SocketPoolConfig {
            dead_timeout: Duration::from_secs(60),
            ..test_config(min_pool_size, max_pool_size)
        }
    }

    fn keys(count: usize) -> Vec<String> {
        (0..count).map(|index| format!("key:{}", index)).collect()
    }

    #[test]
    fn acquire_from_located_node() {
        init();
        let pool = server_pool(
            vec![accepting_server(), accepting_server()],
            quiet_config(0, 4),
        );

        for key in keys(20) {
            let node = pool.locate_node(&key).unwrap().unwrap();
            let socket = pool.acquire(&key).unwrap();
            assert_eq!(socket.address(), node.address());
        }
        assert_eq!(pool.working_servers().unwrap().len(), 2);
    }

    #[test]
    fn dead_node_is_moved_out() {
        init();
        let live = accepting_server();
        let pool = server_pool(vec![live, closed_address()], quiet_config(1, 4));

        let before = pool.working_servers().unwrap();
        assert_eq!(before.len(), 2);

        for key in keys(50) {
            assert_eq!(pool.locate_node(&key).unwrap().unwrap().address(), live);
        }

        let after = pool.working_servers().unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].address(), live);
        // handed out snapshots never change
        assert_eq!(before.len(), 2);
    }

    #[test]
    fn dead_node_comes_back() {
        init();
        let down = closed_address();
        let pool = server_pool(vec![accepting_server(), down], test_config(1, 4));

        for key in keys(20) {
            pool.locate_node(&key).unwrap();
        }
        assert_eq!(pool.working_servers().unwrap().len(), 1);

        serve_on(TcpListener::bind(down).unwrap());
        std::thread::sleep(Duration::from_millis(300));
        pool.check_dead_nodes();

        let working = pool.working_servers().unwrap();
        assert_eq!(working.len(), 2);
        assert_eq!(working[1].address(), down);
    }

    #[test]
    fn no_live_node() {
        init();
        let pool = server_pool(vec![closed_address(), closed_address()], quiet_config(1, 2));

        match pool.acquire("key") {
            Err(ClientError::NoLiveNode) => {}
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("a dead server handed out a connection"),
        }
        assert!(pool.working_servers().unwrap().is_empty());
        assert!(pool.split_keys(&keys(10)).unwrap().is_empty());
    }

    #[test]
    fn split_keys_by_node() {
        init();
        let pool = server_pool(
            vec![accepting_server(), accepting_server()],
            quiet_config(0, 4),
        );

        let keys = keys(100);
        let groups = pool.split_keys(&keys).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups.values().map(Vec::len).sum::<usize>(), 100);
        for (node, keys) in groups {
            for key in keys {
                assert_eq!(pool.locate_node(&key).unwrap().unwrap(), node);
            }
        }
    }

    #[test]
    fn single_node_locator() {
        init();
        let first = accepting_server();
        let config = ClientConfig::default()
            .servers(vec![first, accepting_server()])
            .socket_pool(quiet_config(0, 2))
            .locator(LocatorKind::SingleNode);
        let pool = ServerPool::new(config).unwrap();

        for key in keys(10) {
            assert_eq!(pool.acquire(&key).unwrap().address(), first);
        }
    }

    #[test]
    fn disposed_pool_fails_fast() {
        init();
        let pool = server_pool(vec![accepting_server()], quiet_config(1, 2));
        pool.dispose();

        match pool.acquire("key") {
            Err(ClientError::PoolDisposed) => {}
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("a disposed pool handed out a connection"),
        }
        assert!(pool.working_servers().is_err());
        pool.check_dead_nodes();
        pool.dispose();
    }

    #[test]
    fn empty_server_list() {
        match ServerPool::new(ClientConfig::default()) {
            Err(ClientError::InvalidConfiguration(_)) => {}
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("pool without servers"),
        }
    }
}
