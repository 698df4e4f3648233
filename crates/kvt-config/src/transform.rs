use kvt_types::{CodecError, CodecResult, DynamicValue};
use tracing::debug;

use crate::config::{ClientConfig, Host, ShmConfig};
use crate::lookup::HostLookup;

/// What the caller is building the configuration for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransformMode {
    /// Build a client configuration, credentials included.
    #[default]
    Construct,
    /// Build a view for inspection. Credentials are validated but never
    /// copied into the result.
    Inspect,
}

/// Top-level keys the configuration tree may contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConfigKey {
    Hosts,
    User,
    Password,
    MaxThreads,
    ThreadPoolSize,
    Shm,
}

impl ConfigKey {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "hosts" => Self::Hosts,
            "user" => Self::User,
            "password" => Self::Password,
            "max_threads" => Self::MaxThreads,
            "thread_pool_size" => Self::ThreadPoolSize,
            "shm" => Self::Shm,
            _ => return None,
        })
    }

    fn expected(self) -> &'static str {
        match self {
            Self::Hosts => "list",
            Self::User | Self::Password => "string",
            Self::MaxThreads | Self::ThreadPoolSize => "int",
            Self::Shm => "map",
        }
    }

    fn accepts(self, value: &DynamicValue) -> bool {
        matches!(
            (self, value),
            (Self::Hosts, DynamicValue::List(_))
                | (Self::User | Self::Password, DynamicValue::String(_))
                | (Self::MaxThreads | Self::ThreadPoolSize, DynamicValue::Int(_))
                | (Self::Shm, DynamicValue::Map(_))
        )
    }
}

/// Validates a dynamic configuration tree and flattens it into a
/// [`ClientConfig`].
///
/// The schema is closed. Every top-level key is checked for name and kind
/// before any of them is applied, so a rejected tree never yields a partially
/// populated configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigTransform {
    mode: TransformMode,
}

impl ConfigTransform {
    pub fn new(mode: TransformMode) -> Self {
        Self { mode }
    }

    pub fn construct() -> Self {
        Self::new(TransformMode::Construct)
    }

    pub fn inspect() -> Self {
        Self::new(TransformMode::Inspect)
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn build(&self, tree: &DynamicValue) -> CodecResult<ClientConfig> {
        let entries = self.check_schema(tree)?;

        let mut config = ClientConfig::default();
        for (key, value) in entries {
            match key {
                ConfigKey::Hosts => config.hosts = parse_hosts(value)?,
                ConfigKey::User if self.mode == TransformMode::Construct => {
                    config.user = value.as_str().map(str::to_string);
                }
                ConfigKey::Password if self.mode == TransformMode::Construct => {
                    config.password = value.as_str().map(str::to_string);
                }
                ConfigKey::User | ConfigKey::Password => {}
                ConfigKey::MaxThreads => {
                    config.max_conns_per_node = non_negative("max_threads", value)?;
                }
                ConfigKey::ThreadPoolSize => {
                    config.thread_pool_size = non_negative("thread_pool_size", value)?;
                }
                ConfigKey::Shm => {
                    config.shm = parse_shm(value)?;
                    config.use_shm = true;
                }
            }
        }

        debug!(
            mode = ?self.mode,
            hosts = config.hosts.len(),
            use_shm = config.use_shm,
            "client config built"
        );
        Ok(config)
    }

    /// Reject unknown or mistyped keys and a missing host list.
    fn check_schema<'t>(
        &self,
        tree: &'t DynamicValue,
    ) -> CodecResult<Vec<(ConfigKey, &'t DynamicValue)>> {
        let map = tree.as_map().ok_or_else(|| {
            CodecError::parameter(format!("config must be a map, got {}", tree.kind_name()))
        })?;

        let mut entries = Vec::with_capacity(map.len());
        for (name, value) in map {
            let name = name.as_str().ok_or_else(|| {
                CodecError::parameter(format!("config key must be a string, got {}", name.kind_name()))
            })?;
            let key = ConfigKey::parse(name)
                .ok_or_else(|| CodecError::parameter(format!("unknown config key '{name}'")))?;
            if !key.accepts(value) {
                return Err(CodecError::parameter(format!(
                    "config key '{name}' must be {}, got {}",
                    key.expected(),
                    value.kind_name()
                )));
            }
            entries.push((key, value));
        }

        if !entries.iter().any(|(k, _)| *k == ConfigKey::Hosts) {
            return Err(CodecError::parameter("config must contain 'hosts'"));
        }
        Ok(entries)
    }
}

/// Build a client configuration from `tree`.
pub fn build_config(tree: &DynamicValue) -> CodecResult<ClientConfig> {
    ConfigTransform::construct().build(tree)
}

/// Validate `tree` and return its deduplicated seed view.
pub fn host_lookup(tree: &DynamicValue) -> CodecResult<HostLookup> {
    let config = ConfigTransform::inspect().build(tree)?;
    let lookup = config.host_lookup();
    debug!(hosts = config.hosts.len(), unique = lookup.len(), "host lookup built");
    Ok(lookup)
}

fn parse_hosts(value: &DynamicValue) -> CodecResult<Vec<Host>> {
    let items = value.as_list().unwrap_or_default();
    if items.is_empty() {
        return Err(CodecError::parameter("'hosts' must contain at least one entry"));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_host(item).map_err(|e| e.context(format!("hosts[{i}]"))))
        .collect()
}

fn parse_host(item: &DynamicValue) -> CodecResult<Host> {
    let fields = item.as_map().ok_or_else(|| {
        CodecError::parameter(format!("host entry must be a map, got {}", item.kind_name()))
    })?;

    let mut host = Host {
        addr: None,
        port: None,
    };
    for (name, value) in fields {
        match name.as_str() {
            Some("addr") => match value {
                DynamicValue::String(addr) => host.addr = Some(addr.clone()),
                other => {
                    return Err(CodecError::parameter(format!(
                        "'addr' must be a string, got {}",
                        other.kind_name()
                    )))
                }
            },
            Some("port") => host.port = Some(parse_port(value)?),
            Some(other) => {
                return Err(CodecError::parameter(format!("unknown host key '{other}'")))
            }
            None => {
                return Err(CodecError::parameter(format!(
                    "host key must be a string, got {}",
                    name.kind_name()
                )))
            }
        }
    }

    if host.addr.is_none() && host.port.is_none() {
        return Err(CodecError::parameter("host entry needs an 'addr' or a 'port'"));
    }
    Ok(host)
}

fn parse_port(value: &DynamicValue) -> CodecResult<u16> {
    let raw = match value {
        DynamicValue::Int(n) => *n,
        DynamicValue::String(s) => s
            .parse::<i64>()
            .map_err(|_| CodecError::parameter(format!("port '{s}' is not a number")))?,
        other => {
            return Err(CodecError::parameter(format!(
                "'port' must be an int or a numeric string, got {}",
                other.kind_name()
            )))
        }
    };
    u16::try_from(raw)
        .map_err(|_| CodecError::parameter(format!("port {raw} is outside 0..=65535")))
}

fn parse_shm(value: &DynamicValue) -> CodecResult<ShmConfig> {
    let mut shm = ShmConfig::default();
    for (name, field) in value.as_map().unwrap_or_default() {
        let name = name.as_str().ok_or_else(|| {
            CodecError::parameter(format!("shm key must be a string, got {}", name.kind_name()))
        })?;
        let slot = match name {
            "key" => &mut shm.key,
            "max_nodes" => &mut shm.max_nodes,
            "max_namespaces" => &mut shm.max_namespaces,
            "takeover_threshold_sec" | "takeover_threshold_seconds" => {
                &mut shm.takeover_threshold_sec
            }
            _ => return Err(CodecError::parameter(format!("unknown shm key '{name}'"))),
        };
        *slot = non_negative(name, field).map_err(|e| e.context("shm"))?;
    }
    Ok(shm)
}

fn non_negative(name: &str, value: &DynamicValue) -> CodecResult<u32> {
    let n = value
        .as_int()
        .ok_or_else(|| CodecError::parameter(format!("'{name}' must be an int, got {}", value.kind_name())))?;
    if n < 0 {
        return Err(CodecError::parameter(format!("'{name}' must not be negative, got {n}")));
    }
    u32::try_from(n).map_err(|_| CodecError::parameter(format!("'{name}' is too large: {n}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvt_types::ErrorKind;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> DynamicValue {
        DynamicValue::from_json(value)
    }

    fn seed(addr: &str, port: i64) -> serde_json::Value {
        json!({"addr": addr, "port": port})
    }

    // -----------------------------------------------------------------------
    // Hosts
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_hosts_kept_in_table_but_deduplicated_in_lookup() {
        let t = tree(json!({"hosts": [seed("127.0.0.1", 3000), seed("127.0.0.1", 3000)]}));
        let config = build_config(&t).unwrap();
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.host_lookup().len(), 1);

        let lookup = host_lookup(&t).unwrap();
        assert_eq!(lookup.keys().collect::<Vec<_>>(), vec!["127.0.0.1:3000"]);
    }

    #[test]
    fn numeric_string_port_is_accepted() {
        let t = tree(json!({"hosts": [{"addr": "db", "port": "3100"}]}));
        let config = build_config(&t).unwrap();
        assert_eq!(config.hosts, vec![Host::new("db", 3100)]);
    }

    #[test]
    fn bad_ports_are_rejected() {
        for port in [json!(70000), json!(-1), json!("abc"), json!(true)] {
            let t = tree(json!({"hosts": [{"addr": "db", "port": port}]}));
            let err = build_config(&t).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parameter, "port {port}");
        }
    }

    #[test]
    fn host_entry_needs_addr_or_port() {
        let err = build_config(&tree(json!({"hosts": [{}]}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(err.message().contains("hosts[0]"));

        let port_only = build_config(&tree(json!({"hosts": [{"port": 4000}]}))).unwrap();
        assert_eq!(port_only.hosts[0].addr, None);
        assert_eq!(port_only.hosts[0].lookup_key(), ":4000");
    }

    #[test]
    fn unknown_host_key_is_rejected() {
        let t = tree(json!({"hosts": [{"addr": "db", "weight": 2}]}));
        assert_eq!(build_config(&t).unwrap_err().kind(), ErrorKind::Parameter);
    }

    #[test]
    fn hosts_are_required_and_non_empty() {
        assert_eq!(build_config(&tree(json!({}))).unwrap_err().kind(), ErrorKind::Parameter);
        assert_eq!(
            build_config(&tree(json!({"hosts": []}))).unwrap_err().kind(),
            ErrorKind::Parameter
        );
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let t = tree(json!({"hosts": [seed("db", 3000)], "timeout": 5}));
        let err = build_config(&t).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(err.message().contains("timeout"));
    }

    #[test]
    fn unknown_key_is_caught_before_valid_keys_are_applied() {
        // A malformed host list ordered first would fail while being applied;
        // the unknown key must win because the schema check runs first.
        let t = DynamicValue::map([
            ("hosts", DynamicValue::List(vec![DynamicValue::Int(1)])),
            ("bogus", DynamicValue::Null),
        ]);
        let err = build_config(&t).unwrap_err();
        assert!(err.message().contains("unknown config key 'bogus'"));
    }

    #[test]
    fn mistyped_keys_are_rejected() {
        for bad in [
            json!({"hosts": "db:3000"}),
            json!({"hosts": [seed("db", 3000)], "user": 7}),
            json!({"hosts": [seed("db", 3000)], "max_threads": "many"}),
            json!({"hosts": [seed("db", 3000)], "shm": true}),
        ] {
            assert_eq!(build_config(&tree(bad.clone())).unwrap_err().kind(), ErrorKind::Parameter, "{bad}");
        }
        assert!(build_config(&DynamicValue::List(vec![])).is_err());
    }

    #[test]
    fn thread_settings_are_applied() {
        let t = tree(json!({"hosts": [seed("db", 3000)], "max_threads": 64, "thread_pool_size": 4}));
        let config = build_config(&t).unwrap();
        assert_eq!(config.max_conns_per_node, 64);
        assert_eq!(config.thread_pool_size, 4);

        let negative = tree(json!({"hosts": [seed("db", 3000)], "thread_pool_size": -4}));
        assert_eq!(build_config(&negative).unwrap_err().kind(), ErrorKind::Parameter);
    }

    // -----------------------------------------------------------------------
    // Shared memory
    // -----------------------------------------------------------------------

    #[test]
    fn empty_shm_block_enables_shm_with_defaults() {
        let config = build_config(&tree(json!({"hosts": [seed("db", 3000)], "shm": {}}))).unwrap();
        assert!(config.use_shm);
        assert_eq!(config.shm, ShmConfig::default());
    }

    #[test]
    fn shm_fields_override_defaults() {
        let t = tree(json!({
            "hosts": [seed("db", 3000)],
            "shm": {"key": 1234, "max_nodes": 32, "takeover_threshold_sec": 10}
        }));
        let shm = build_config(&t).unwrap().shm;
        assert_eq!(shm.key, 1234);
        assert_eq!(shm.max_nodes, 32);
        assert_eq!(shm.max_namespaces, 8);
        assert_eq!(shm.takeover_threshold_sec, 10);
    }

    #[test]
    fn bad_shm_fields_are_rejected() {
        for shm in [json!({"size": 1}), json!({"max_nodes": "16"}), json!({"key": -1})] {
            let t = tree(json!({"hosts": [seed("db", 3000)], "shm": shm}));
            assert_eq!(build_config(&t).unwrap_err().kind(), ErrorKind::Parameter, "{shm}");
        }
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    #[test]
    fn credentials_set_when_constructing() {
        let t = tree(json!({"hosts": [seed("db", 3000)], "user": "admin", "password": "pw"}));
        let config = build_config(&t).unwrap();
        assert_eq!(config.user.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("pw"));
    }

    #[test]
    fn credentials_skipped_when_inspecting() {
        let t = tree(json!({"hosts": [seed("db", 3000)], "user": "admin", "password": "pw"}));
        let config = ConfigTransform::inspect().build(&t).unwrap();
        assert_eq!(config.user, None);
        assert_eq!(config.password, None);
        assert_eq!(config.hosts.len(), 1);
    }
}
