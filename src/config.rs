//! Analysis configuration.
//!
//! [`AnalysisConfig`] is built once (defaults, optionally a JSON file, then
//! CLI overrides) and handed to the [`crate::core::Analyzer`]. It is read-only
//! afterwards and shared by every pipeline run.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trust_dns_resolver::proto::rr::RecordType;

use crate::error::ConfigError;

pub const DEFAULT_TLDS: &[&str] = &["com", "net", "org"];

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "login", "secure", "account", "verify", "support", "update", "billing", "pay", "bank",
    "online", "service", "help", "portal", "mail", "app", "auth", "signin", "wallet",
];

/// Google public DNS, used for the A-record stage.
pub const PRIMARY_RESOLVER: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53);
/// Quad9, used for the independent confirmation stage.
pub const SECONDARY_RESOLVER: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)), 53);

pub const LOOKUP_TIMEOUT_MS: u64 = 5_000;
pub const MAX_CONCURRENT_LOOKUPS: usize = 32;
pub const QUERIES_PER_MINUTE: usize = 1_200;
pub const BATCH_SIZE: usize = 50;
pub const FLUSH_RETRIES: u32 = 3;
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Default confusable table: Latin letters to Cyrillic/Greek look-alikes,
/// digits, and multi-letter shapes.
pub fn default_confusables() -> BTreeMap<char, Vec<String>> {
    let table: &[(char, &[&str])] = &[
        ('a', &["а", "α", "4"]),
        ('b', &["d", "6"]),
        ('c', &["с"]),
        ('d', &["cl", "b"]),
        ('e', &["е", "3"]),
        ('g', &["9", "q"]),
        ('h', &["һ"]),
        ('i', &["і", "1", "l"]),
        ('j', &["ј"]),
        ('k', &["κ"]),
        ('l', &["1", "i"]),
        ('m', &["rn", "nn"]),
        ('n', &["п"]),
        ('o', &["о", "ο", "0"]),
        ('p', &["р", "ρ"]),
        ('q', &["g"]),
        ('s', &["ѕ", "5"]),
        ('t', &["7"]),
        ('u', &["υ", "v"]),
        ('v', &["ν", "u"]),
        ('w', &["vv", "ω"]),
        ('x', &["х"]),
        ('y', &["у"]),
        ('z', &["2"]),
    ];

    table
        .iter()
        .map(|(from, subs)| (*from, subs.iter().map(|s| s.to_string()).collect()))
        .collect()
}

/// Settings shared by every pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Target TLDs every generator emits candidates for
    pub tlds: Vec<String>,
    /// Combosquat keywords
    pub keywords: Vec<String>,
    /// Character to visually confusable substitutes
    pub confusables: BTreeMap<char, Vec<String>>,
    pub primary_resolver: SocketAddr,
    pub secondary_resolver: SocketAddr,
    /// Per-lookup time budget in milliseconds
    pub lookup_timeout_ms: u64,
    /// Record type queried at the secondary resolver
    pub secondary_record_type: String,
    /// Verifier worker-pool width
    pub max_concurrent_lookups: usize,
    /// Query budget per resolver per minute
    pub queries_per_minute: usize,
    /// Confirmed entries between intermediate flushes
    pub batch_size: usize,
    /// Flush attempts before a storage failure is reported
    pub flush_retries: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tlds: DEFAULT_TLDS.iter().map(|s| s.to_string()).collect(),
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            confusables: default_confusables(),
            primary_resolver: PRIMARY_RESOLVER,
            secondary_resolver: SECONDARY_RESOLVER,
            lookup_timeout_ms: LOOKUP_TIMEOUT_MS,
            secondary_record_type: "A".to_string(),
            max_concurrent_lookups: MAX_CONCURRENT_LOOKUPS,
            queries_per_minute: QUERIES_PER_MINUTE,
            batch_size: BATCH_SIZE,
            flush_retries: FLUSH_RETRIES,
        }
    }
}

impl AnalysisConfig {
    /// Loads a JSON config file; absent fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tlds.is_empty() {
            return Err(ConfigError::Invalid("tlds must not be empty".into()));
        }
        if let Some(tld) = self
            .tlds
            .iter()
            .find(|t| t.is_empty() || t.starts_with('.') || t.ends_with('.'))
        {
            return Err(ConfigError::Invalid(format!("malformed tld {:?}", tld)));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.max_concurrent_lookups == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_lookups must be at least 1".into(),
            ));
        }
        if self.queries_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "queries_per_minute must be at least 1".into(),
            ));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ConfigError::Invalid("lookup_timeout_ms must be positive".into()));
        }
        if self.flush_retries == 0 {
            return Err(ConfigError::Invalid("flush_retries must be at least 1".into()));
        }
        self.secondary_record_type()?;
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn secondary_record_type(&self) -> Result<RecordType, ConfigError> {
        RecordType::from_str(&self.secondary_record_type.to_ascii_uppercase()).map_err(|_| {
            ConfigError::Invalid(format!(
                "unknown record type {:?}",
                self.secondary_record_type
            ))
        })
    }
}
