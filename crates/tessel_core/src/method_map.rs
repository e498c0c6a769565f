//! Flattening of the recorded call tree.
//!
//! [`MethodMap`] walks the calls of every transaction depth first and records
//! which methods each transaction reaches, through which chain of callers,
//! and under which readiness condition. Arguments are substituted along the
//! chain, so a readiness expression only refers to signals of the calling
//! transaction's side of the design.

use std::collections::HashMap;

use tessel_ir::{Expr, SignalId};

use crate::errors::ElabError;
use crate::ids::NodeId;
use crate::manager::TransactionManager;
use crate::node::CallSite;

/// The flattened call graph of a set of transactions.
#[derive(Debug, Default)]
pub struct MethodMap {
    methods_by_transaction: HashMap<NodeId, Vec<NodeId>>,
    transactions_by_method: HashMap<NodeId, Vec<NodeId>>,
    readiness_by_call: HashMap<(NodeId, NodeId), Expr>,
    ancestors_by_call: HashMap<(NodeId, NodeId), Vec<NodeId>>,
    /// Callers from the transaction down to the direct caller, per reach.
    chains: HashMap<(NodeId, NodeId), Vec<NodeId>>,
    method_parents: HashMap<NodeId, Vec<NodeId>>,
}

struct Walk<'a> {
    tm: &'a TransactionManager,
    map: MethodMap,
}

impl MethodMap {
    /// Builds the map for every current transaction of `tm`.
    pub fn build(tm: &TransactionManager) -> Result<Self, ElabError> {
        let mut walk = Walk {
            tm,
            map: MethodMap::default(),
        };
        for node in tm.nodes() {
            for (callee, _) in &node.calls {
                walk.map
                    .method_parents
                    .entry(*callee)
                    .or_default()
                    .push(node.id);
            }
        }
        for t in tm.transactions() {
            walk.map.methods_by_transaction.insert(t, Vec::new());
            let mut chain = vec![t];
            walk.visit(&mut chain, &HashMap::new())?;
        }
        log::trace!(
            "method map: {} transactions, {} reached methods",
            walk.map.methods_by_transaction.len(),
            walk.map.transactions_by_method.len()
        );
        Ok(walk.map)
    }

    /// Every method reached from `t`, in depth-first call order.
    pub fn methods_by_transaction(&self, t: NodeId) -> &[NodeId] {
        self.methods_by_transaction
            .get(&t)
            .map_or(&[], Vec::as_slice)
    }

    /// Every transaction reaching `m`, in creation order.
    pub fn transactions_by_method(&self, m: NodeId) -> &[NodeId] {
        self.transactions_by_method
            .get(&m)
            .map_or(&[], Vec::as_slice)
    }

    /// Condition under which `m` may be called on behalf of `t`.
    pub fn readiness_by_call(&self, t: NodeId, m: NodeId) -> Option<&Expr> {
        self.readiness_by_call.get(&(t, m))
    }

    /// The methods on the chain from `m` up to the transaction `t`,
    /// starting with `m` itself.
    pub fn ancestors_by_call(&self, t: NodeId, m: NodeId) -> &[NodeId] {
        self.ancestors_by_call
            .get(&(t, m))
            .map_or(&[], Vec::as_slice)
    }

    /// Every node whose body calls `m` directly.
    pub fn method_parents(&self, m: NodeId) -> &[NodeId] {
        self.method_parents.get(&m).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if some transaction reaches `m`.
    pub fn is_reached(&self, m: NodeId) -> bool {
        !self.transactions_by_method(m).is_empty()
    }

    /// The transactions an entity stands for: itself for a transaction,
    /// its reaching transactions for a method.
    pub fn transactions_for(&self, tm: &TransactionManager, id: NodeId) -> Vec<NodeId> {
        if tm.node(id).is_transaction() {
            vec![id]
        } else {
            self.transactions_by_method(id).to_vec()
        }
    }
}

impl Walk<'_> {
    /// Visits the callees of `chain.last()`, the chain starting at a
    /// transaction. `env` maps the argument buses of the methods on the
    /// chain to the arguments their callers pass.
    fn visit(
        &mut self,
        chain: &mut Vec<NodeId>,
        env: &HashMap<SignalId, Expr>,
    ) -> Result<(), ElabError> {
        let tm = self.tm;
        let t = chain[0];
        let caller = tm.node(chain[chain.len() - 1]);
        for (m, sites) in &caller.calls {
            let m = *m;
            let method = tm.node(m);
            if chain[1..].contains(&m) {
                let start = chain.iter().position(|n| *n == m).unwrap_or(0);
                let mut names: Vec<String> = chain[start..]
                    .iter()
                    .map(|n| tm.name(*n).to_string())
                    .collect();
                names.push(tm.name(m).to_string());
                return Err(ElabError::MethodRecursion {
                    name: tm.name(m).to_string(),
                    chain: names,
                    loc: method.loc,
                });
            }
            let Some(info) = method.as_method() else {
                continue;
            };

            let subst = |e: &Expr| e.substitute(&|id| env.get(&id).cloned());
            let effective: Vec<(Expr, Expr)> = sites
                .iter()
                .map(|s| (subst(&s.enable), subst(&s.arg)))
                .collect();

            let mut readiness = tm.read(info.ready);
            if let Some(validator) = &info.validator {
                for (enable, arg) in &effective {
                    readiness = readiness.and(enable.clone().not().or(validator.validate(arg)));
                }
            }

            let key = (t, m);
            if let Some(prev_chain) = self.map.chains.get(&key) {
                self.check_second_reach(t, m, prev_chain, chain)?;
                if let Some(prev) = self.map.readiness_by_call.get_mut(&key) {
                    *prev = prev.clone().and(readiness);
                }
            } else {
                self.map.readiness_by_call.insert(key, readiness);
                self.map.chains.insert(key, chain.clone());
                let mut ancestors = vec![m];
                ancestors.extend(chain[1..].iter().rev());
                self.map.ancestors_by_call.insert(key, ancestors);
                self.map
                    .methods_by_transaction
                    .entry(t)
                    .or_default()
                    .push(m);
                self.map.transactions_by_method.entry(m).or_default().push(t);
            }

            let mut inner = env.clone();
            if let Some(data_in) = info.data_in {
                inner.insert(data_in, merge_args(&effective, info.input.width()));
            }
            chain.push(m);
            self.visit(chain, &inner)?;
            chain.pop();
        }
        Ok(())
    }

    /// `t` reaches `m` a second time, through `chain`. This is allowed for
    /// nonexclusive methods and where the two chains part on mutually
    /// exclusive call sites.
    fn check_second_reach(
        &self,
        t: NodeId,
        m: NodeId,
        prev: &[NodeId],
        chain: &[NodeId],
    ) -> Result<(), ElabError> {
        if self.tm.node(m).is_nonexclusive() {
            return Ok(());
        }
        let common = prev
            .iter()
            .zip(chain)
            .take_while(|(a, b)| a == b)
            .count();
        let parent = self.tm.node(prev[common - 1]);
        let first = prev.get(common).copied().unwrap_or(m);
        let second = chain.get(common).copied().unwrap_or(m);
        let first_sites: &[CallSite] = parent.sites_to(first);
        let second_sites: &[CallSite] = parent.sites_to(second);
        for a in first_sites {
            for b in second_sites {
                if !a.path.exclusive_with(&b.path) {
                    return Err(ElabError::DuplicateCall {
                        caller: self.tm.name(t).to_string(),
                        method: self.tm.name(m).to_string(),
                        loc: b.loc,
                        prev_loc: a.loc,
                    });
                }
            }
        }
        Ok(())
    }
}

/// The argument a method sees from one caller with several mutually
/// exclusive call sites.
fn merge_args(sites: &[(Expr, Expr)], width: u32) -> Expr {
    match sites {
        [(_, arg)] => arg.clone(),
        _ => sites.iter().fold(Expr::zero(width), |acc, (enable, arg)| {
            acc.or(Expr::mux(enable.clone(), arg.clone(), Expr::zero(width)))
        }),
    }
}

/// Rejects missing bodies, over-shared `single_caller` methods and
/// nonexclusive methods that cannot merge their arguments.
pub(crate) fn check_methods(tm: &TransactionManager, map: &MethodMap) -> Result<(), ElabError> {
    for node in tm.nodes() {
        let Some(info) = node.as_method() else {
            continue;
        };
        if !node.is_defined() {
            return Err(ElabError::UndefinedMethod {
                name: tm.name(node.id).to_string(),
                loc: node.loc,
            });
        }
        let parents = map.method_parents(node.id);
        if info.single_caller && parents.len() > 1 {
            return Err(ElabError::SingleCallerViolated {
                name: tm.name(node.id).to_string(),
                callers: parents.iter().map(|p| tm.name(*p).to_string()).collect(),
                loc: node.loc,
            });
        }
        if info.nonexclusive && !info.input.is_empty() && info.combiner.is_none() {
            return Err(ElabError::MissingCombiner {
                name: tm.name(node.id).to_string(),
                loc: node.loc,
            });
        }
    }
    Ok(())
}
