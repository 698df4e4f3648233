use kvt_types::{CodecError, CodecResult, KeyPolicy, SerializerPolicy};
use serde::{Deserialize, Serialize};

/// Nesting limit used when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Tuning for transcoding calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Deepest container nesting accepted in either direction.
    pub max_depth: usize,
    /// Upper bound on pool nodes a single call may allocate.
    pub pool_node_limit: usize,
    /// Serializer policy used when a call does not pick one.
    pub default_serializer: SerializerPolicy,
    /// Key policy used on reads when a call does not pick one.
    pub key_policy: KeyPolicy,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            pool_node_limit: 1 << 20,
            default_serializer: SerializerPolicy::Builtin,
            key_policy: KeyPolicy::Digest,
        }
    }
}

impl CodecConfig {
    /// Parse from TOML. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> CodecResult<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| CodecError::parameter(format!("invalid codec config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> CodecResult<String> {
        toml::to_string(self)
            .map_err(|e| CodecError::client(format!("cannot render codec config: {e}")))
    }

    pub fn validate(&self) -> CodecResult<()> {
        if self.max_depth == 0 {
            return Err(CodecError::parameter("max_depth must be at least 1"));
        }
        if self.pool_node_limit == 0 {
            return Err(CodecError::parameter("pool_node_limit must be at least 1"));
        }
        Ok(())
    }
}
