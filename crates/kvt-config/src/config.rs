use std::fmt;

use kvt_types::DynamicValue;
use serde::{Deserialize, Serialize};

use crate::lookup::HostLookup;

/// Port assumed when a host entry names only an address.
pub const DEFAULT_PORT: u16 = 3000;

/// One cluster seed as written in the configuration tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    pub addr: Option<String>,
    pub port: Option<u16>,
}

impl Host {
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: Some(addr.into()),
            port: Some(port),
        }
    }

    /// Identity used to recognize equivalent seeds: `addr`, then `:port`
    /// when a port was given.
    pub fn lookup_key(&self) -> String {
        let mut key = self.addr.clone().unwrap_or_default();
        if let Some(port) = self.port {
            key.push(':');
            key.push_str(&port.to_string());
        }
        key
    }

    /// The port a client would connect to.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Shared-memory cluster tending parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShmConfig {
    pub key: u32,
    pub max_nodes: u32,
    pub max_namespaces: u32,
    pub takeover_threshold_sec: u32,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            key: 0xA500_0000,
            max_nodes: 16,
            max_namespaces: 8,
            takeover_threshold_sec: 30,
        }
    }
}

/// Strongly typed datastore client configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Seeds in input order, duplicates included.
    pub hosts: Vec<Host>,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub max_conns_per_node: u32,
    pub thread_pool_size: u32,
    pub use_shm: bool,
    pub shm: ShmConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            user: None,
            password: None,
            max_conns_per_node: 300,
            thread_pool_size: 16,
            use_shm: false,
            shm: ShmConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Deduplicated view of the seed list.
    pub fn host_lookup(&self) -> HostLookup {
        self.hosts.iter().collect()
    }

    /// Render back to a dynamic tree. Credentials are never included.
    pub fn to_dynamic(&self) -> DynamicValue {
        let hosts = self
            .hosts
            .iter()
            .map(|h| {
                let mut entry = Vec::with_capacity(2);
                if let Some(addr) = &h.addr {
                    entry.push(("addr", DynamicValue::String(addr.clone())));
                }
                if let Some(port) = h.port {
                    entry.push(("port", DynamicValue::Int(i64::from(port))));
                }
                DynamicValue::map(entry)
            })
            .collect();
        let mut tree = vec![
            ("hosts", DynamicValue::List(hosts)),
            ("max_threads", DynamicValue::Int(i64::from(self.max_conns_per_node))),
            ("thread_pool_size", DynamicValue::Int(i64::from(self.thread_pool_size))),
        ];
        if self.use_shm {
            tree.push((
                "shm",
                DynamicValue::map([
                    ("key", DynamicValue::Int(i64::from(self.shm.key))),
                    ("max_nodes", DynamicValue::Int(i64::from(self.shm.max_nodes))),
                    ("max_namespaces", DynamicValue::Int(i64::from(self.shm.max_namespaces))),
                    (
                        "takeover_threshold_sec",
                        DynamicValue::Int(i64::from(self.shm.takeover_threshold_sec)),
                    ),
                ]),
            ));
        }
        DynamicValue::map(tree)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("hosts", &self.hosts)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_conns_per_node", &self.max_conns_per_node)
            .field("thread_pool_size", &self.thread_pool_size)
            .field("use_shm", &self.use_shm)
            .field("shm", &self.shm)
            .finish()
    }
}
