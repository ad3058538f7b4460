//! swarm.toml configuration.
//!
//! Every section has working defaults, so an empty file (or
//! `SwarmConfig::default()`) yields a hierarchical swarm with
//! best-effort consensus. Durations are written as strings
//! (`"500ms"`, `"5s"`, `"2m"`) and checked by `validate()`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Connectivity structure of the swarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum TopologyKind {
    #[default]
    Hierarchical,
    Mesh,
    Hybrid,
}

impl FromStr for TopologyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hierarchical" => Ok(Self::Hierarchical),
            "mesh" => Ok(Self::Mesh),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ConfigError::UnknownTopology(other.to_string())),
        }
    }
}

/// Consensus algorithm id. Decides which proposals need a quorum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum ConsensusAlgorithm {
    /// Every change is applied unilaterally.
    None,
    /// Eventually consistent; no change waits for a quorum.
    Gossip,
    /// Membership, topology and config changes need a quorum.
    #[default]
    Raft,
    /// Every change, task assignment included, needs a quorum.
    Pbft,
}

impl FromStr for ConsensusAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "gossip" => Ok(Self::Gossip),
            "raft" => Ok(Self::Raft),
            "pbft" | "byzantine" => Ok(Self::Pbft),
            other => Err(ConfigError::UnknownConsensus(other.to_string())),
        }
    }
}

/// What happens to a failed node's tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum RecoveryStrategy {
    /// Strip the node from its tasks and schedule them elsewhere.
    #[default]
    Reassign,
    /// Keep assignments and wait for the node to recover or be removed.
    Wait,
}

impl FromStr for RecoveryStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reassign" => Ok(Self::Reassign),
            "wait" => Ok(Self::Wait),
            other => Err(ConfigError::UnknownRecoveryStrategy(other.to_string())),
        }
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = ConfigError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = serde_json::to_value(self)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                f.write_str(&name)
            }
        }
    )*};
}

string_conversions!(TopologyKind, ConsensusAlgorithm, RecoveryStrategy);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustModel {
    Centralized,
    #[default]
    Distributed,
    ZeroTrust,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessControl {
    None,
    #[default]
    Rbac,
    Abac,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub algorithm: ConsensusAlgorithm,
    /// How long an active proposal may collect votes.
    pub proposal_timeout: String,
    /// Reject changes whose proposal aborted instead of applying them anyway.
    pub strict: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            algorithm: ConsensusAlgorithm::default(),
            proposal_timeout: "30s".to_string(),
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultToleranceConfig {
    pub heartbeat_interval: String,
    pub heartbeat_timeout: String,
    /// Scheduling attempts for a rescheduled task before it is failed.
    pub max_retries: u32,
    pub recovery_strategy: RecoveryStrategy,
    /// Runner-up candidates remembered per task and preferred on reschedule.
    pub backup_nodes: u32,
    /// Health below this marks an active node degraded.
    pub degraded_threshold: f64,
}

impl Default for FaultToleranceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: "5s".to_string(),
            heartbeat_timeout: "15s".to_string(),
            max_retries: 3,
            recovery_strategy: RecoveryStrategy::default(),
            backup_nodes: 1,
            degraded_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub load_balancing: bool,
    pub optimization_interval: String,
    /// Rebalance when load standard deviation exceeds this.
    pub load_variance_threshold: f64,
    /// Adjust topology when connectivity falls below this.
    pub topology_efficiency_threshold: f64,
    /// Hold tasks pending until their dependencies complete.
    pub enforce_dependencies: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            load_balancing: true,
            optimization_interval: "30s".to_string(),
            load_variance_threshold: 0.3,
            topology_efficiency_threshold: 0.8,
            enforce_dependencies: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub authentication: bool,
    pub encryption: bool,
    pub trust_model: TrustModel,
    pub access_control: AccessControl,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub topology: TopologyKind,
    pub max_nodes: usize,
    pub max_depth: u32,
    /// Children a hierarchical parent may hold.
    pub max_fanout: u32,
    /// Peers a new mesh node connects to.
    pub mesh_degree: usize,
    /// Extra mesh edges a hybrid node gets after hierarchical placement.
    pub hybrid_extra_links: usize,
    /// Minimum number of nodes each task is assigned to.
    pub replication_factor: u32,
    pub consensus: ConsensusConfig,
    pub fault_tolerance: FaultToleranceConfig,
    pub performance: PerformanceConfig,
    pub security: SecurityConfig,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            topology: TopologyKind::default(),
            max_nodes: 100,
            max_depth: 3,
            max_fanout: 8,
            mesh_degree: 3,
            hybrid_extra_links: 2,
            replication_factor: 1,
            consensus: ConsensusConfig::default(),
            fault_tolerance: FaultToleranceConfig::default(),
            performance: PerformanceConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl SwarmConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: SwarmConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn heartbeat_interval(&self) -> ConfigResult<Duration> {
        parse_duration("fault_tolerance.heartbeat_interval", &self.fault_tolerance.heartbeat_interval)
    }

    pub fn heartbeat_timeout(&self) -> ConfigResult<Duration> {
        parse_duration("fault_tolerance.heartbeat_timeout", &self.fault_tolerance.heartbeat_timeout)
    }

    pub fn optimization_interval(&self) -> ConfigResult<Duration> {
        parse_duration("performance.optimization_interval", &self.performance.optimization_interval)
    }

    pub fn proposal_timeout(&self) -> ConfigResult<Duration> {
        parse_duration("consensus.proposal_timeout", &self.consensus.proposal_timeout)
    }

    /// Check every field; called by `Initialize` before anything starts.
    pub fn validate(&self) -> ConfigResult<()> {
        let interval = self.heartbeat_interval()?;
        let timeout = self.heartbeat_timeout()?;
        let optimization = self.optimization_interval()?;
        let proposal = self.proposal_timeout()?;

        for (field, value) in [
            ("fault_tolerance.heartbeat_interval", interval),
            ("performance.optimization_interval", optimization),
            ("consensus.proposal_timeout", proposal),
        ] {
            if value.is_zero() {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if timeout <= interval {
            return Err(invalid(
                "fault_tolerance.heartbeat_timeout",
                "must be longer than the heartbeat interval",
            ));
        }
        if self.max_nodes == 0 {
            return Err(invalid("max_nodes", "must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(invalid("max_depth", "must be at least 1"));
        }
        if self.max_fanout == 0 {
            return Err(invalid("max_fanout", "must be at least 1"));
        }
        if self.mesh_degree == 0 {
            return Err(invalid("mesh_degree", "must be at least 1"));
        }
        if self.replication_factor == 0 {
            return Err(invalid("replication_factor", "must be at least 1"));
        }
        let unit = 0.0..=1.0;
        if !unit.contains(&self.fault_tolerance.degraded_threshold) {
            return Err(invalid("fault_tolerance.degraded_threshold", "must be within 0.0..=1.0"));
        }
        if !unit.contains(&self.performance.topology_efficiency_threshold) {
            return Err(invalid(
                "performance.topology_efficiency_threshold",
                "must be within 0.0..=1.0",
            ));
        }
        if self.performance.load_variance_threshold < 0.0 {
            return Err(invalid("performance.load_variance_threshold", "must not be negative"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Parse a duration string like "250ms", "5s", "2m" or "1h".
pub fn parse_duration(field: &'static str, s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let err = || ConfigError::InvalidDuration {
        field,
        value: s.to_string(),
    };
    let (digits, scale_ms) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else {
        return Err(err());
    };
    let value: u64 = digits.trim().parse().map_err(|_| err())?;
    value
        .checked_mul(scale_ms)
        .map(Duration::from_millis)
        .ok_or_else(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SwarmConfig::default();
        config.validate().unwrap();
        assert_eq!(config.topology, TopologyKind::Hierarchical);
        assert_eq!(config.heartbeat_interval().unwrap(), Duration::from_secs(5));
        assert_eq!(config.proposal_timeout().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parse_minimal_toml() {
        let config = SwarmConfig::from_toml(
            r#"
topology = "mesh"
max_depth = 4

[consensus]
algorithm = "pbft"
strict = true

[fault_tolerance]
heartbeat_interval = "50ms"
heartbeat_timeout = "100ms"
"#,
        )
        .unwrap();

        assert_eq!(config.topology, TopologyKind::Mesh);
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.consensus.algorithm, ConsensusAlgorithm::Pbft);
        assert!(config.consensus.strict);
        assert_eq!(config.heartbeat_timeout().unwrap(), Duration::from_millis(100));
        // Untouched sections keep their defaults.
        assert_eq!(config.mesh_degree, 3);
    }

    #[test]
    fn unknown_topology_is_config_error() {
        let result = SwarmConfig::from_toml(r#"topology = "torus""#);
        assert!(result.is_err());

        let parsed: Result<TopologyKind, _> = "torus".parse();
        assert!(matches!(parsed, Err(ConfigError::UnknownTopology(k)) if k == "torus"));
    }

    #[test]
    fn unknown_consensus_is_config_error() {
        let parsed: Result<ConsensusAlgorithm, _> = "paxos-ish".parse();
        assert!(matches!(parsed, Err(ConfigError::UnknownConsensus(_))));
    }

    #[test]
    fn timeout_must_exceed_interval() {
        let mut config = SwarmConfig::default();
        config.fault_tolerance.heartbeat_timeout = "5s".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("f", "250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("f", "5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("f", "2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("f", "1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("f", "soon").is_err());
        assert!(parse_duration("f", "").is_err());
        assert!(matches!(
            parse_duration("f", "18446744073709551615h"),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn zero_durations_are_rejected() {
        let cases: [fn(&mut SwarmConfig); 3] = [
            |c| c.fault_tolerance.heartbeat_interval = "0ms".to_string(),
            |c| c.performance.optimization_interval = "0s".to_string(),
            |c| c.consensus.proposal_timeout = "0ms".to_string(),
        ];
        for set in cases {
            let mut config = SwarmConfig::default();
            set(&mut config);
            assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
        }
    }

    #[test]
    fn toml_round_trips_enum_names() {
        let text = SwarmConfig::default().to_toml_string().unwrap();
        assert!(text.contains("topology = \"hierarchical\""));
        assert!(text.contains("algorithm = \"raft\""));
        assert_eq!(TopologyKind::Hybrid.to_string(), "hybrid");
    }
}
