//! Configuration types deserialized from `tessel.toml`.

use serde::Deserialize;

/// The top-level configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct TesselConfig {
    /// Settings for the elaboration pass.
    #[serde(default)]
    pub elaboration: ElaborationConfig,
}

/// Settings that steer how a transaction graph is turned into a netlist.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElaborationConfig {
    /// Arbiter emitted for each connected component of the conflict graph.
    pub scheduler: SchedulerKind,
    /// What to do when `schedule_before` contradicts definition order.
    pub schedule_order: OrderPolicy,
    /// Emit a warning for methods that are defined but never called.
    pub warn_unused_methods: bool,
    /// Prefix prepended to every generated signal name.
    pub name_prefix: String,
}

impl Default for ElaborationConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerKind::EagerDeterministic,
            schedule_order: OrderPolicy::Error,
            warn_unused_methods: true,
            name_prefix: String::new(),
        }
    }
}

/// The per-component arbiter style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SchedulerKind {
    /// Grant the maximal conflict-free runnable set in priority order.
    #[default]
    #[serde(rename = "eager")]
    EagerDeterministic,
    /// Grant at most one transaction per component, rotating priority.
    #[serde(rename = "round-robin")]
    RoundRobin,
}

/// Policy for `schedule_before(a, b)` where `b` was defined before `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPolicy {
    /// Reject the graph.
    #[default]
    Error,
    /// Honour the ordering but emit a warning.
    Warn,
    /// Honour the ordering silently.
    Allow,
}
