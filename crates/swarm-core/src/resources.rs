//! Resource and capability model.
//!
//! Value types describing what a node can do (`Capabilities`) and what it
//! has to spend (`Resources`), plus the matching request side used by task
//! requirements. Nothing here mutates shared state; owners call
//! `validate()` when a value enters the swarm.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Seniority of a node, compared against a task's minimum tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceTier {
    #[default]
    Novice,
    Intermediate,
    Advanced,
    Expert,
}

/// Security classification of a task, and clearance of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    #[default]
    Public,
    Internal,
    Confidential,
    Restricted,
}

/// What a node is able to work on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub domains: BTreeSet<String>,
    pub specializations: BTreeSet<String>,
    pub tools: BTreeSet<String>,
    /// Upper bound on simultaneously assigned tasks.
    pub max_concurrent_tasks: u32,
    /// Quality rating in `0.0..=1.0`.
    pub quality_rating: f64,
    pub experience: ExperienceTier,
    pub clearance: SecurityLevel,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            domains: BTreeSet::new(),
            specializations: BTreeSet::new(),
            tools: BTreeSet::new(),
            max_concurrent_tasks: 4,
            quality_rating: 0.8,
            experience: ExperienceTier::Intermediate,
            clearance: SecurityLevel::Internal,
        }
    }
}

impl Capabilities {
    /// Whether `tag` is one of the node's domains, specializations or tools.
    pub fn covers(&self, tag: &str) -> bool {
        self.domains.contains(tag) || self.specializations.contains(tag) || self.tools.contains(tag)
    }

    /// Whether every tag in `required` is covered.
    pub fn covers_all<'a>(&self, required: impl IntoIterator<Item = &'a String>) -> bool {
        required.into_iter().all(|tag| self.covers(tag))
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(ValidationError::new("capabilities.max_concurrent_tasks", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.quality_rating) {
            return Err(ValidationError::new("capabilities.quality_rating", "must be within 0.0..=1.0"));
        }
        Ok(())
    }
}

/// A consumable resource with a fixed total and a running reservation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub total: f64,
    pub used: f64,
}

impl ResourcePool {
    pub fn new(total: f64) -> Self {
        Self { total, used: 0.0 }
    }

    pub fn available(&self) -> f64 {
        (self.total - self.used).max(0.0)
    }

    /// Fraction of the pool still free. An empty pool counts as fully free.
    pub fn available_ratio(&self) -> f64 {
        if self.total > 0.0 {
            self.available() / self.total
        } else {
            1.0
        }
    }

    /// Fraction of the pool in use.
    pub fn utilization(&self) -> f64 {
        if self.total > 0.0 {
            (self.used / self.total).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn reserve(&mut self, amount: f64) {
        self.used += amount;
    }

    pub fn release(&mut self, amount: f64) {
        self.used = (self.used - amount).max(0.0);
    }

    fn validate(&self, field: &'static str) -> ValidationResult<()> {
        if self.total < 0.0 || self.used < 0.0 {
            return Err(ValidationError::new(field, "must not be negative"));
        }
        if self.used > self.total {
            return Err(ValidationError::new(field, "used exceeds total"));
        }
        Ok(())
    }
}

/// Network characteristics reported for a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkResources {
    pub bandwidth_mbps: f64,
    pub bandwidth_used_mbps: f64,
    pub latency_ms: f64,
    /// Link quality in `0.0..=1.0`.
    pub quality: f64,
}

impl Default for NetworkResources {
    fn default() -> Self {
        Self {
            bandwidth_mbps: 1000.0,
            bandwidth_used_mbps: 0.0,
            latency_ms: 1.0,
            quality: 1.0,
        }
    }
}

impl NetworkResources {
    pub fn utilization(&self) -> f64 {
        if self.bandwidth_mbps > 0.0 {
            (self.bandwidth_used_mbps / self.bandwidth_mbps).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Hard caps on reservations, independent of physical totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceQuotas {
    pub max_cpu: Option<f64>,
    pub max_memory: Option<f64>,
    pub max_storage: Option<f64>,
}

/// The full resource budget of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// CPU in cores.
    pub cpu: ResourcePool,
    /// Memory in MiB.
    pub memory: ResourcePool,
    /// Storage in MiB.
    pub storage: ResourcePool,
    pub network: NetworkResources,
    pub custom: BTreeMap<String, ResourcePool>,
    pub quotas: ResourceQuotas,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            cpu: ResourcePool::new(4.0),
            memory: ResourcePool::new(8192.0),
            storage: ResourcePool::new(65536.0),
            network: NetworkResources::default(),
            custom: BTreeMap::new(),
            quotas: ResourceQuotas::default(),
        }
    }
}

impl Resources {
    /// Whether `request` fits into what is currently free, quotas included.
    pub fn can_fit(&self, request: &ResourceRequest) -> bool {
        let fits = |pool: &ResourcePool, amount: f64, quota: Option<f64>| {
            pool.available() >= amount && quota.is_none_or(|q| pool.used + amount <= q)
        };
        fits(&self.cpu, request.cpu, self.quotas.max_cpu)
            && fits(&self.memory, request.memory, self.quotas.max_memory)
            && fits(&self.storage, request.storage, self.quotas.max_storage)
            && request.custom.iter().all(|(name, amount)| {
                self.custom
                    .get(name)
                    .is_some_and(|pool| pool.available() >= *amount)
            })
    }

    pub fn reserve(&mut self, request: &ResourceRequest) {
        self.cpu.reserve(request.cpu);
        self.memory.reserve(request.memory);
        self.storage.reserve(request.storage);
        for (name, amount) in &request.custom {
            if let Some(pool) = self.custom.get_mut(name) {
                pool.reserve(*amount);
            }
        }
    }

    pub fn release(&mut self, request: &ResourceRequest) {
        self.cpu.release(request.cpu);
        self.memory.release(request.memory);
        self.storage.release(request.storage);
        for (name, amount) in &request.custom {
            if let Some(pool) = self.custom.get_mut(name) {
                pool.release(*amount);
            }
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        self.cpu.validate("resources.cpu")?;
        self.memory.validate("resources.memory")?;
        self.storage.validate("resources.storage")?;
        for pool in self.custom.values() {
            pool.validate("resources.custom")?;
        }
        if !(0.0..=1.0).contains(&self.network.quality) {
            return Err(ValidationError::new("resources.network.quality", "must be within 0.0..=1.0"));
        }
        Ok(())
    }
}

/// Minimum resources a task needs on each node it runs on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRequest {
    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,
    pub custom: BTreeMap<String, f64>,
}

impl ResourceRequest {
    pub fn validate(&self) -> ValidationResult<()> {
        let negative = self.cpu < 0.0
            || self.memory < 0.0
            || self.storage < 0.0
            || self.custom.values().any(|v| *v < 0.0);
        if negative {
            return Err(ValidationError::new("requirements.resources", "must not be negative"));
        }
        Ok(())
    }
}
