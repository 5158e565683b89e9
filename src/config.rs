// engine configuration: build-time on-cache default plus runtime settings loadable from json

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::policy::{ParallelPolicy, PolicyKind, Rayon, Scoped, Sequential};
use crate::qubit::BitInteger;

// build.rs has already range-checked the value, so this only needs digits
const fn parse_num_on_cache_qubits(value: &str) -> BitInteger {
    let bytes = value.as_bytes();
    let mut result: BitInteger = 0;
    let mut position = 0;
    while position < bytes.len() {
        let digit = bytes[position];
        assert!(digit.is_ascii_digit(), "QTILE_DEFAULT_NUM_ON_CACHE_QUBITS must be decimal");
        result = result * 10 + (digit - b'0') as BitInteger;
        position += 1;
    }
    result
}

/// On-cache qubits used when nothing else is configured (set with `QTILE_NUM_ON_CACHE_QUBITS` at build time, 16 otherwise)
pub const DEFAULT_NUM_ON_CACHE_QUBITS: BitInteger = parse_num_on_cache_qubits(env!("QTILE_DEFAULT_NUM_ON_CACHE_QUBITS"));

// on-cache staging settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub num_on_cache_qubits: BitInteger,
    pub enabled: bool,
}

// default implementation for cacheconfig.
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            num_on_cache_qubits: DEFAULT_NUM_ON_CACHE_QUBITS,
            enabled: cfg!(feature = "cache-aware"),
        }
    }
}

impl CacheConfig {
    pub fn with_num_on_cache_qubits(num_on_cache_qubits: BitInteger) -> Self {
        Self {
            num_on_cache_qubits,
            ..Self::default()
        }
    }

    /// Always take the no-cache path
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

// full engine settings, as read by the binary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub policy: PolicyKind,
    // 0 = every logical core
    pub num_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            policy: PolicyKind::Sequential,
            num_threads: 0,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a json document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // keep 2^num_on_cache_qubits addressable
        if self.cache.num_on_cache_qubits >= usize::BITS {
            return Err(GateError::InvalidConfig(format!(
                "num_on_cache_qubits {} does not fit a {}-bit index",
                self.cache.num_on_cache_qubits,
                usize::BITS
            )));
        }
        Ok(())
    }

    pub fn effective_num_threads(&self) -> usize {
        match self.policy {
            PolicyKind::Sequential => 1,
            _ if self.num_threads == 0 => num_cpus::get(),
            _ => self.num_threads,
        }
    }

    pub fn build_policy(&self) -> Result<Box<dyn ParallelPolicy + Send>> {
        self.validate()?;
        let num_threads = self.effective_num_threads();
        Ok(match self.policy {
            PolicyKind::Sequential => Box::new(Sequential),
            PolicyKind::Rayon => Box::new(Rayon::with_threads(num_threads)?),
            PolicyKind::Scoped => Box::new(Scoped::new(num_threads)?),
        })
    }
}
