//! Client configuration transform for kvt.
//!
//! Turns a dynamic configuration tree such as
//!
//! ```text
//! { hosts: [{addr, port}, ...], user, password, max_threads,
//!   thread_pool_size, shm: {key, max_nodes, max_namespaces, takeover_threshold_sec} }
//! ```
//!
//! into a typed [`ClientConfig`]. The schema is closed: an unknown or
//! mistyped key is a parameter error and nothing is applied.
//!
//! ```
//! use kvt_config::build_config;
//! use kvt_types::DynamicValue;
//!
//! let tree = DynamicValue::map([(
//!     "hosts",
//!     DynamicValue::List(vec![DynamicValue::map([
//!         ("addr", DynamicValue::from("127.0.0.1")),
//!         ("port", DynamicValue::from(3000_i64)),
//!     ])]),
//! )]);
//! let config = build_config(&tree).unwrap();
//! assert_eq!(config.hosts[0].lookup_key(), "127.0.0.1:3000");
//! ```

pub mod config;
pub mod lookup;
pub mod transform;

pub use config::{ClientConfig, Host, ShmConfig, DEFAULT_PORT};
pub use lookup::HostLookup;
pub use transform::{build_config, host_lookup, ConfigTransform, TransformMode};
