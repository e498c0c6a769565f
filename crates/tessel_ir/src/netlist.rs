//! The flat netlist and its structural checks.

use crate::arena::Arena;
use crate::expr::{mask, Expr, MAX_WIDTH};
use crate::ids::SignalId;
use crate::signal::{Signal, SignalKind};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tessel_common::{ContentHash, ContentHasher};

/// A single driver: `target` takes the value of `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assign {
    /// The driven signal.
    pub target: SignalId,
    /// The driving expression.
    pub value: Expr,
}

/// Structural problems detected by [`Netlist::validate`] and
/// [`Netlist::comb_order`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetlistError {
    /// A signal has more than one driver.
    #[error("signal `{0}` has more than one driver")]
    MultipleDrivers(String),
    /// An input is assigned inside the netlist.
    #[error("input `{0}` is driven inside the netlist")]
    DrivenInput(String),
    /// A register has a combinational driver, or a wire a clocked one.
    #[error("signal `{0}` is driven in the wrong domain")]
    WrongDomain(String),
    /// A signal or expression is wider than [`MAX_WIDTH`].
    #[error("signal `{name}` is {width} bits wide (at most {} supported)", MAX_WIDTH)]
    TooWide {
        /// The offending signal.
        name: String,
        /// Its width.
        width: u32,
    },
    /// Combinational assignments form a cycle.
    #[error("combinational loop through {}", .0.join(" -> "))]
    CombLoop(Vec<String>),
}

/// A flat, single-clock netlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netlist {
    /// The name of the top-level design.
    pub name: String,
    /// All signals, in creation order.
    pub signals: Arena<SignalId, Signal>,
    /// Combinational drivers of wires.
    pub comb: Vec<Assign>,
    /// Next-state drivers of registers.
    pub sync: Vec<Assign>,
}

impl Netlist {
    /// Creates an empty netlist.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a signal and returns its ID.
    pub fn add_signal(
        &mut self,
        name: impl Into<String>,
        width: u32,
        kind: SignalKind,
        init: u64,
    ) -> SignalId {
        let name = name.into();
        self.signals.alloc_with(|id| Signal {
            id,
            name,
            width,
            kind,
            init: init & mask(width),
        })
    }

    /// Returns an expression reading signal `id`.
    pub fn read(&self, id: SignalId) -> Expr {
        Expr::signal(id, self.signals[id].width)
    }

    /// Looks a signal up by name.
    pub fn find(&self, name: &str) -> Option<SignalId> {
        self.signals
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    /// Returns the combinational driver of `id`, if any.
    pub fn comb_driver(&self, id: SignalId) -> Option<&Expr> {
        self.comb.iter().find(|a| a.target == id).map(|a| &a.value)
    }

    /// Returns the next-state driver of register `id`, if any.
    pub fn sync_driver(&self, id: SignalId) -> Option<&Expr> {
        self.sync.iter().find(|a| a.target == id).map(|a| &a.value)
    }

    /// Checks single-driver, domain and width rules.
    pub fn validate(&self) -> Result<(), NetlistError> {
        for signal in self.signals.values() {
            if signal.width > MAX_WIDTH {
                return Err(NetlistError::TooWide {
                    name: signal.name.clone(),
                    width: signal.width,
                });
            }
        }
        let mut driven: HashSet<SignalId> = HashSet::new();
        for (assign, is_sync) in self
            .comb
            .iter()
            .map(|a| (a, false))
            .chain(self.sync.iter().map(|a| (a, true)))
        {
            let signal = &self.signals[assign.target];
            if !driven.insert(assign.target) {
                return Err(NetlistError::MultipleDrivers(signal.name.clone()));
            }
            match (signal.kind, is_sync) {
                (SignalKind::Input, _) => {
                    return Err(NetlistError::DrivenInput(signal.name.clone()))
                }
                (SignalKind::Wire, true) | (SignalKind::Reg, false) => {
                    return Err(NetlistError::WrongDomain(signal.name.clone()))
                }
                _ => {}
            }
            if assign.value.width() > MAX_WIDTH {
                return Err(NetlistError::TooWide {
                    name: signal.name.clone(),
                    width: assign.value.width(),
                });
            }
        }
        Ok(())
    }

    /// Orders the combinational assignments so that every assignment comes
    /// after the assignments of the wires it reads.
    ///
    /// Returns indices into [`comb`](Self::comb).
    pub fn comb_order(&self) -> Result<Vec<usize>, NetlistError> {
        let mut graph: DiGraphMap<SignalId, ()> = DiGraphMap::new();
        let mut index_of: HashMap<SignalId, usize> = HashMap::new();
        for (i, assign) in self.comb.iter().enumerate() {
            graph.add_node(assign.target);
            index_of.insert(assign.target, i);
        }
        for assign in &self.comb {
            for dep in assign.value.signals() {
                if index_of.contains_key(&dep) {
                    graph.add_edge(dep, assign.target, ());
                }
            }
        }
        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|id| index_of[&id]).collect()),
            Err(cycle) => {
                let culprit = cycle.node_id();
                let members = tarjan_scc(&graph)
                    .into_iter()
                    .find(|scc| scc.contains(&culprit))
                    .unwrap_or_else(|| vec![culprit]);
                let mut names: Vec<String> = members
                    .into_iter()
                    .map(|id| self.signals[id].name.clone())
                    .collect();
                names.sort();
                Err(NetlistError::CombLoop(names))
            }
        }
    }

    /// Hashes the netlist's structure, ignoring signal names.
    ///
    /// Two netlists built by the same deterministic procedure hash equal even
    /// if generated names differ.
    pub fn structural_hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new();
        hasher.write_u32(self.signals.len() as u32);
        for signal in self.signals.values() {
            hasher.write_tag(signal.kind as u8);
            hasher.write_u32(signal.width);
            hasher.write_u64(signal.init);
        }
        for (tag, assigns) in [(0u8, &self.comb), (1u8, &self.sync)] {
            hasher.write_tag(tag);
            hasher.write_u32(assigns.len() as u32);
            for assign in assigns {
                hasher.write_u32(assign.target.as_raw());
                assign.value.hash_into(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Returns `(inputs, wires, registers)` counts.
    pub fn stats(&self) -> (usize, usize, usize) {
        self.signals
            .values()
            .fold((0, 0, 0), |(i, w, r), s| match s.kind {
                SignalKind::Input => (i + 1, w, r),
                SignalKind::Wire => (i, w + 1, r),
                SignalKind::Reg => (i, w, r + 1),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adder() -> (Netlist, SignalId, SignalId, SignalId) {
        let mut n = Netlist::new("adder");
        let a = n.add_signal("a", 4, SignalKind::Input, 0);
        let sum = n.add_signal("sum", 4, SignalKind::Wire, 0);
        let acc = n.add_signal("acc", 4, SignalKind::Reg, 0);
        n.comb.push(Assign {
            target: sum,
            value: n.read(a) + n.read(acc),
        });
        n.sync.push(Assign {
            target: acc,
            value: n.read(sum),
        });
        (n, a, sum, acc)
    }

    #[test]
    fn find_by_name() {
        let (n, a, sum, _) = adder();
        assert_eq!(n.find("a"), Some(a));
        assert_eq!(n.find("sum"), Some(sum));
        assert_eq!(n.find("missing"), None);
    }

    #[test]
    fn init_is_masked() {
        let mut n = Netlist::new("t");
        let r = n.add_signal("r", 2, SignalKind::Reg, 0xff);
        assert_eq!(n.signals[r].init, 3);
    }

    #[test]
    fn validate_accepts_well_formed() {
        let (n, ..) = adder();
        assert_eq!(n.validate(), Ok(()));
        assert_eq!(n.stats(), (1, 1, 1));
    }

    #[test]
    fn validate_rejects_driven_input() {
        let (mut n, a, ..) = adder();
        n.comb.push(Assign {
            target: a,
            value: Expr::zero(4),
        });
        assert_eq!(n.validate(), Err(NetlistError::DrivenInput("a".into())));
    }

    #[test]
    fn validate_rejects_double_driver() {
        let (mut n, _, sum, _) = adder();
        n.comb.push(Assign {
            target: sum,
            value: Expr::zero(4),
        });
        assert_eq!(
            n.validate(),
            Err(NetlistError::MultipleDrivers("sum".into()))
        );
    }

    #[test]
    fn validate_rejects_comb_register() {
        let (mut n, _, _, acc) = adder();
        n.sync.clear();
        n.comb.push(Assign {
            target: acc,
            value: Expr::zero(4),
        });
        assert_eq!(n.validate(), Err(NetlistError::WrongDomain("acc".into())));
    }

    #[test]
    fn comb_order_respects_dependencies() {
        let mut n = Netlist::new("chain");
        let x = n.add_signal("x", 1, SignalKind::Input, 0);
        let c = n.add_signal("c", 1, SignalKind::Wire, 0);
        let b = n.add_signal("b", 1, SignalKind::Wire, 0);
        n.comb.push(Assign {
            target: c,
            value: !n.read(b),
        });
        n.comb.push(Assign {
            target: b,
            value: !n.read(x),
        });
        assert_eq!(n.comb_order(), Ok(vec![1, 0]));
    }

    #[test]
    fn comb_loop_is_reported() {
        let mut n = Netlist::new("loop");
        let p = n.add_signal("p", 1, SignalKind::Wire, 0);
        let q = n.add_signal("q", 1, SignalKind::Wire, 0);
        n.comb.push(Assign {
            target: p,
            value: !n.read(q),
        });
        n.comb.push(Assign {
            target: q,
            value: n.read(p) ^ Expr::one(),
        });
        assert_eq!(
            n.comb_order(),
            Err(NetlistError::CombLoop(vec!["p".into(), "q".into()]))
        );
    }

    #[test]
    fn register_breaks_loop() {
        let (n, ..) = adder();
        assert!(n.comb_order().is_ok());
    }

    #[test]
    fn structural_hash_ignores_names() {
        let (a, ..) = adder();
        let (mut b, ..) = adder();
        for id in b.signals.ids().collect::<Vec<_>>() {
            b.signals[id].name.push_str("_1");
        }
        assert_eq!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn structural_hash_sees_logic() {
        let (a, ..) = adder();
        let (mut b, ..) = adder();
        b.sync[0].value = Expr::zero(4);
        assert_ne!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn serde_roundtrip() {
        let (n, ..) = adder();
        let json = serde_json::to_string(&n).unwrap();
        let restored: Netlist = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.structural_hash(), n.structural_hash());
        assert_eq!(restored.find("acc"), n.find("acc"));
    }
}
