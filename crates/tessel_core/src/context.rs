//! The body recorder.
//!
//! A [`ModuleCtx`] is handed to user code by [`TransactionManager::module`].
//! It creates module-local signals, records guarded assignments, tracks the
//! control-flow path through `if`/`switch`/FSM constructs and records the
//! method calls made inside transaction and method bodies.
//!
//! Every conditional arm is entered through a [`Scope`] guard, so the path
//! and condition stacks are restored on every exit, including early returns
//! through `?` and unwinding.

use std::ops::{Deref, DerefMut};

use tessel_ir::{Expr, SignalId, SignalKind, MAX_WIDTH};
use tessel_source::SrcLoc;

use crate::errors::ElabError;
use crate::ids::{ModuleId, NodeId};
use crate::manager::{Domain, GuardedAssign, Method, Transaction, TransactionManager};
use crate::node::{CallSite, NodeKind, Validator};
use crate::path::{CtrlPath, PathBuilder};

/// A module-local signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sig {
    id: SignalId,
    width: u32,
    kind: SignalKind,
}

impl Sig {
    /// The netlist signal.
    pub fn id(self) -> SignalId {
        self.id
    }

    /// Width in bits.
    pub fn width(self) -> u32 {
        self.width
    }

    /// A read of this signal.
    pub fn expr(self) -> Expr {
        Expr::signal(self.id, self.width)
    }
}

impl From<Sig> for Expr {
    fn from(sig: Sig) -> Expr {
        sig.expr()
    }
}

/// Options of a method body.
#[derive(Debug, Clone)]
pub struct MethodBody {
    ready: Expr,
    validator: Option<Validator>,
}

impl Default for MethodBody {
    fn default() -> Self {
        Self {
            ready: Expr::one(),
            validator: None,
        }
    }
}

impl MethodBody {
    /// An always-ready body without argument validation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `ready` condition.
    pub fn ready(mut self, ready: impl Into<Expr>) -> Self {
        self.ready = ready.into();
        self
    }

    /// Sets a per-call argument check.
    pub fn validate_arguments(mut self, f: impl Fn(&Expr) -> Expr + 'static) -> Self {
        self.validator = Some(Validator::new(f));
        self
    }
}

#[derive(Debug, Clone)]
struct BodyFrame {
    node: NodeId,
    activator: Expr,
}

/// Recording handle for one module.
pub struct ModuleCtx<'m> {
    tm: &'m mut TransactionManager,
    module: ModuleId,
    prefix: String,
    path: PathBuilder,
    conds: Vec<Expr>,
    body: Option<BodyFrame>,
}

impl TransactionManager {
    /// Records a module. Signal names created inside are prefixed with
    /// `name`.
    pub fn module<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut ModuleCtx<'_>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        let module = self.alloc_module();
        let prefix = if name.is_empty() {
            String::new()
        } else {
            format!("{name}_")
        };
        log::trace!("recording module `{name}` as {module:?}");
        let mut cx = ModuleCtx::new(self, module, prefix);
        f(&mut cx)
    }
}

impl<'m> ModuleCtx<'m> {
    fn new(tm: &'m mut TransactionManager, module: ModuleId, prefix: String) -> Self {
        Self {
            tm,
            module,
            prefix,
            path: PathBuilder::new(module),
            conds: Vec::new(),
            body: None,
        }
    }

    /// The manager this module records into.
    pub fn manager(&mut self) -> &mut TransactionManager {
        &mut *self.tm
    }

    /// This module's ID.
    pub fn module_id(&self) -> ModuleId {
        self.module
    }

    /// Records a nested module with its own control-flow paths.
    #[track_caller]
    pub fn submodule<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut ModuleCtx<'_>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        if let Some(frame) = &self.body {
            return Err(ElabError::Usage {
                message: format!(
                    "submodule `{name}` is created inside the body of `{}`",
                    self.tm.name(frame.node)
                ),
                loc: SrcLoc::caller(),
            });
        }
        let module = self.tm.alloc_module();
        let prefix = format!("{}{name}_", self.prefix);
        let mut sub = ModuleCtx::new(&mut *self.tm, module, prefix);
        f(&mut sub)
    }

    // ---- signals -------------------------------------------------------

    /// Creates a primary input.
    #[track_caller]
    pub fn input(&mut self, name: &str, width: u32) -> Result<Sig, ElabError> {
        self.signal(name, width, SignalKind::Input, 0, SrcLoc::caller())
    }

    /// Creates a combinational wire; it reads 0 where nothing drives it.
    #[track_caller]
    pub fn wire(&mut self, name: &str, width: u32) -> Result<Sig, ElabError> {
        self.signal(name, width, SignalKind::Wire, 0, SrcLoc::caller())
    }

    /// Creates a register with a reset value.
    #[track_caller]
    pub fn reg(&mut self, name: &str, width: u32, init: u64) -> Result<Sig, ElabError> {
        self.signal(name, width, SignalKind::Reg, init, SrcLoc::caller())
    }

    fn signal(
        &mut self,
        name: &str,
        width: u32,
        kind: SignalKind,
        init: u64,
        loc: SrcLoc,
    ) -> Result<Sig, ElabError> {
        if width > MAX_WIDTH {
            return Err(ElabError::TooWide {
                what: format!("signal `{name}`"),
                width,
                loc,
            });
        }
        let id = self
            .tm
            .new_signal(&format!("{}{name}", self.prefix), width, kind, init);
        Ok(Sig { id, width, kind })
    }

    // ---- assignments ---------------------------------------------------

    /// Drives a wire while the enclosing body runs and every enclosing
    /// condition holds.
    #[track_caller]
    pub fn comb(&mut self, target: Sig, value: impl Into<Expr>) -> Result<(), ElabError> {
        let guard = self.guard();
        self.assign(target, guard, value.into(), Domain::Comb, SrcLoc::caller())
    }

    /// Updates a register on the next clock edge while the enclosing body
    /// runs and every enclosing condition holds.
    #[track_caller]
    pub fn sync(&mut self, target: Sig, value: impl Into<Expr>) -> Result<(), ElabError> {
        let guard = self.guard();
        self.assign(target, guard, value.into(), Domain::Sync, SrcLoc::caller())
    }

    /// Drives a wire under the enclosing conditions only, whether or not
    /// the enclosing body runs.
    #[track_caller]
    pub fn av_comb(&mut self, target: Sig, value: impl Into<Expr>) -> Result<(), ElabError> {
        let guard = self.cond();
        self.assign(target, guard, value.into(), Domain::Comb, SrcLoc::caller())
    }

    /// Drives a wire unconditionally.
    #[track_caller]
    pub fn top_comb(&mut self, target: Sig, value: impl Into<Expr>) -> Result<(), ElabError> {
        self.assign(target, Expr::one(), value.into(), Domain::Comb, SrcLoc::caller())
    }

    fn assign(
        &mut self,
        target: Sig,
        guard: Expr,
        value: Expr,
        domain: Domain,
        loc: SrcLoc,
    ) -> Result<(), ElabError> {
        let expected = match domain {
            Domain::Comb => SignalKind::Wire,
            Domain::Sync => SignalKind::Reg,
        };
        if target.kind != expected {
            let (what, domain) = match domain {
                Domain::Comb => ("wire", "combinational"),
                Domain::Sync => ("register", "synchronous"),
            };
            return Err(ElabError::Usage {
                message: format!("{domain} assignment needs a {what} target"),
                loc,
            });
        }
        if value.width() > target.width {
            return Err(ElabError::WidthMismatch {
                what: "assigned value".to_string(),
                expected: target.width,
                found: value.width(),
                loc,
            });
        }
        self.tm.assigns.push(GuardedAssign {
            target: target.id,
            guard,
            value: value.resize(target.width),
            domain,
        });
        Ok(())
    }

    /// Conjunction of the enclosing branch conditions.
    fn cond(&self) -> Expr {
        Expr::all(self.conds.iter().cloned())
    }

    /// Conjunction of the enclosing body's activator and branch conditions.
    fn guard(&self) -> Expr {
        match &self.body {
            Some(frame) => frame.activator.clone().and(self.cond()),
            None => self.cond(),
        }
    }

    // ---- control flow --------------------------------------------------

    /// Enters a one-armed conditional. The returned guard dereferences to
    /// this context and leaves the arm when dropped.
    pub fn when(&mut self, cond: impl Into<Expr>) -> Scope<'_, 'm> {
        let parallel = self.path.new_chain();
        self.enter(parallel, 0, cond.into().any_bit())
    }

    /// Records the first arm of an `if`/`elif`/`else` chain.
    pub fn if_<R>(
        &mut self,
        cond: impl Into<Expr>,
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<IfChain<'_, 'm>, ElabError> {
        let parallel = self.path.new_chain();
        let mut chain = IfChain {
            cx: self,
            parallel,
            next_alternative: 0,
            taken: Expr::bit(false),
        };
        chain.arm(cond.into().any_bit(), f)?;
        Ok(chain)
    }

    /// Records a `switch` over `sel`.
    pub fn switch(
        &mut self,
        sel: impl Into<Expr>,
        f: impl FnOnce(&mut Switch<'_, 'm>) -> Result<(), ElabError>,
    ) -> Result<(), ElabError> {
        let parallel = self.path.new_chain();
        let mut switch = Switch {
            cx: self,
            sel: sel.into(),
            parallel,
            next_alternative: 0,
            taken: Expr::bit(false),
        };
        f(&mut switch)
    }

    /// Creates a state machine with a state register named `name`. The
    /// first state is the reset state.
    #[track_caller]
    pub fn fsm(&mut self, name: &str, states: &[&str]) -> Result<Fsm, ElabError> {
        let loc = SrcLoc::caller();
        if states.is_empty() {
            return Err(ElabError::Usage {
                message: format!("state machine `{name}` has no states"),
                loc,
            });
        }
        let width = (usize::BITS - (states.len() - 1).leading_zeros()).max(1);
        let state = self.signal(&format!("{name}_state"), width, SignalKind::Reg, 0, loc)?;
        Ok(Fsm {
            name: name.to_string(),
            states: states.iter().map(|s| s.to_string()).collect(),
            state,
            parallel: self.path.new_chain(),
            prefix: self.path.current(),
        })
    }

    /// Records the logic active in one state of `fsm`.
    #[track_caller]
    pub fn fsm_state<R>(
        &mut self,
        fsm: &Fsm,
        state: &str,
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        let loc = SrcLoc::caller();
        let index = fsm.index(state, loc)?;
        // The machine's chain index is only unique on the path it was
        // created on.
        if self.path.current() != fsm.prefix {
            return Err(ElabError::Usage {
                message: format!(
                    "state `{state}` of `{}` is recorded outside the branch that created the machine",
                    fsm.name
                ),
                loc,
            });
        }
        let mut scope = self.enter(fsm.parallel, index as u32, fsm.ongoing(state)?);
        f(&mut scope)
    }

    /// Moves `fsm` to `state` on the next clock edge.
    #[track_caller]
    pub fn next_state(&mut self, fsm: &Fsm, state: &str) -> Result<(), ElabError> {
        let loc = SrcLoc::caller();
        let index = fsm.index(state, loc)?;
        let guard = self.guard();
        self.assign(
            fsm.state,
            guard,
            Expr::constant(index as u64, fsm.state.width),
            Domain::Sync,
            loc,
        )
    }

    fn enter(&mut self, parallel: u32, alternative: u32, cond: Expr) -> Scope<'_, 'm> {
        self.path.push(parallel, alternative);
        self.conds.push(cond);
        Scope { cx: self }
    }

    // ---- bodies --------------------------------------------------------

    /// Records the body of transaction `t`. The transaction requests to run
    /// whenever `request` and the enclosing conditions hold.
    #[track_caller]
    pub fn transaction_body<R>(
        &mut self,
        t: Transaction,
        request: impl Into<Expr>,
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        let loc = SrcLoc::caller();
        self.open_body(t.0, loc)?;
        let info = match &self.tm.nodes[t.0].kind {
            NodeKind::Transaction(info) => info.clone(),
            NodeKind::Method(_) => {
                return Err(ElabError::Usage {
                    message: format!("`{}` is no longer a transaction", self.tm.name(t)),
                    loc,
                })
            }
        };
        let request = self.cond().and(request.into().any_bit());
        self.tm.drive(info.request, request);
        self.run_body(t.0, info.grant, f)
    }

    /// Records the body of method `m`. The closure receives the argument
    /// bus and returns the method's result.
    #[track_caller]
    pub fn method_body(
        &mut self,
        m: Method,
        options: MethodBody,
        f: impl FnOnce(&mut ModuleCtx<'m>, Expr) -> Result<Expr, ElabError>,
    ) -> Result<(), ElabError> {
        let loc = SrcLoc::caller();
        self.open_body(m.0, loc)?;
        let name = self.tm.name(m).to_string();
        let NodeKind::Method(info) = &mut self.tm.nodes[m.0].kind else {
            return Err(ElabError::Usage {
                message: format!("`{name}` is not a method"),
                loc,
            });
        };
        info.validator = options.validator;
        let info = info.clone();
        let ready = self.cond().and(options.ready.any_bit());
        self.tm.drive(info.ready, ready);
        let arg = self.tm.data_in(m);
        let output = self.run_body(m.0, info.run, |cx| f(cx, arg))?;
        if output.width() > info.output.width() {
            return Err(ElabError::WidthMismatch {
                what: format!("result of `{name}`"),
                expected: info.output.width(),
                found: output.width(),
                loc,
            });
        }
        if let Some(data_out) = info.data_out {
            let guard = self.cond();
            self.tm.assigns.push(GuardedAssign {
                target: data_out,
                guard,
                value: output.resize(info.output.width()),
                domain: Domain::Comb,
            });
        }
        Ok(())
    }

    /// Defines `m` as forwarding every call to `target`.
    #[track_caller]
    pub fn proxy(&mut self, m: Method, target: Method) -> Result<(), ElabError> {
        let ready = self.tm.ready(target);
        self.method_body(m, MethodBody::new().ready(ready), |cx, arg| {
            cx.call(target, arg)
        })
    }

    fn open_body(&mut self, id: NodeId, loc: SrcLoc) -> Result<(), ElabError> {
        if let Some(frame) = &self.body {
            return Err(ElabError::NestedBody {
                name: self.tm.name(id).to_string(),
                outer: self.tm.name(frame.node).to_string(),
                loc,
            });
        }
        if let Some(prev_loc) = self.tm.nodes[id].def_loc {
            return Err(ElabError::Redefinition {
                name: self.tm.name(id).to_string(),
                loc,
                prev_loc,
            });
        }
        let order = self.tm.alloc_def_order();
        let path = self.path.current();
        let node = &mut self.tm.nodes[id];
        node.def_order = Some(order);
        node.def_loc = Some(loc);
        node.ctrl_path = Some(path);
        Ok(())
    }

    fn run_body<R>(
        &mut self,
        id: NodeId,
        activator: SignalId,
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        self.body = Some(BodyFrame {
            node: id,
            activator: self.tm.read(activator),
        });
        let result = f(self);
        self.body = None;
        result
    }

    // ---- calls ---------------------------------------------------------

    /// Calls `m` with `arg` and returns its result.
    #[track_caller]
    pub fn call(&mut self, m: Method, arg: impl Into<Expr>) -> Result<Expr, ElabError> {
        self.record_call(m, arg.into(), Expr::one(), SrcLoc::caller())
    }

    /// Calls `m` with `arg` in the cycles where `enable` holds.
    #[track_caller]
    pub fn call_with(
        &mut self,
        m: Method,
        arg: impl Into<Expr>,
        enable: impl Into<Expr>,
    ) -> Result<Expr, ElabError> {
        self.record_call(m, arg.into(), enable.into(), SrcLoc::caller())
    }

    fn record_call(&mut self, m: Method, arg: Expr, enable: Expr, loc: SrcLoc) -> Result<Expr, ElabError> {
        let method_name = self.tm.name(m).to_string();
        let Some(frame) = &self.body else {
            return Err(ElabError::NoCurrentBody {
                name: method_name,
                loc,
            });
        };
        let caller = frame.node;
        let callee = &self.tm.nodes[m.0];
        let Some(info) = callee.as_method() else {
            return Err(ElabError::Usage {
                message: format!("`{method_name}` is not a method"),
                loc,
            });
        };
        if !callee.is_defined() {
            return Err(ElabError::CallUndefined {
                name: method_name,
                loc,
            });
        }
        let input_width = info.input.width();
        if arg.width() > input_width {
            return Err(ElabError::WidthMismatch {
                what: format!("argument of `{method_name}`"),
                expected: input_width,
                found: arg.width(),
                loc,
            });
        }

        let path = self.path.current();
        let site = CallSite {
            arg: arg.resize(input_width),
            enable: self.cond().and(enable.any_bit()),
            path,
            loc,
        };
        let caller_node = &mut self.tm.nodes[caller];
        let sites = match caller_node.calls.iter().position(|(id, _)| *id == m.0) {
            Some(i) => &mut caller_node.calls[i].1,
            None => {
                caller_node.calls.push((m.0, Vec::new()));
                let last = caller_node.calls.len() - 1;
                &mut caller_node.calls[last].1
            }
        };
        if let Some(prev) = sites.iter().find(|s| !s.path.exclusive_with(&site.path)) {
            let prev_loc = prev.loc;
            let caller = self.tm.name(caller).to_string();
            return Err(ElabError::DuplicateCall {
                caller,
                method: method_name,
                loc,
                prev_loc,
            });
        }
        sites.push(site);
        Ok(self.tm.data_out(m))
    }
}

/// An entered conditional arm. Leaves the arm when dropped.
pub struct Scope<'a, 'm> {
    cx: &'a mut ModuleCtx<'m>,
}

impl<'m> Deref for Scope<'_, 'm> {
    type Target = ModuleCtx<'m>;

    fn deref(&self) -> &ModuleCtx<'m> {
        &*self.cx
    }
}

impl<'m> DerefMut for Scope<'_, 'm> {
    fn deref_mut(&mut self) -> &mut ModuleCtx<'m> {
        &mut *self.cx
    }
}

impl Drop for Scope<'_, '_> {
    fn drop(&mut self) {
        self.cx.path.pop();
        self.cx.conds.pop();
    }
}

/// An `if` chain awaiting further `elif`/`else` arms.
pub struct IfChain<'a, 'm> {
    cx: &'a mut ModuleCtx<'m>,
    parallel: u32,
    next_alternative: u32,
    taken: Expr,
}

impl<'m> IfChain<'_, 'm> {
    fn arm<R>(
        &mut self,
        cond: Expr,
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        let alternative = self.next_alternative;
        self.next_alternative += 1;
        let active = self.taken.clone().not().and(cond.clone());
        self.taken = self.taken.clone().or(cond);
        let mut scope = self.cx.enter(self.parallel, alternative, active);
        f(&mut scope)
    }

    /// Records an `elif` arm.
    pub fn elif<R>(
        mut self,
        cond: impl Into<Expr>,
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<Self, ElabError> {
        self.arm(cond.into().any_bit(), f)?;
        Ok(self)
    }

    /// Records the `else` arm.
    pub fn else_<R>(
        mut self,
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        self.arm(Expr::one(), f)
    }
}

/// Arms of a `switch`. The first matching case wins.
pub struct Switch<'a, 'm> {
    cx: &'a mut ModuleCtx<'m>,
    sel: Expr,
    parallel: u32,
    next_alternative: u32,
    taken: Expr,
}

impl<'m> Switch<'_, 'm> {
    /// Records a case matching any of `values`.
    pub fn case<R>(
        &mut self,
        values: &[u64],
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        let width = self.sel.width();
        let cond = Expr::any(
            values
                .iter()
                .map(|&v| self.sel.clone().equals(Expr::constant(v, width))),
        );
        self.arm(cond, f)
    }

    /// Records the case taken when no other matches.
    pub fn default<R>(
        &mut self,
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        self.arm(Expr::one(), f)
    }

    fn arm<R>(
        &mut self,
        cond: Expr,
        f: impl FnOnce(&mut ModuleCtx<'m>) -> Result<R, ElabError>,
    ) -> Result<R, ElabError> {
        let alternative = self.next_alternative;
        self.next_alternative += 1;
        let active = self.taken.clone().not().and(cond.clone());
        self.taken = self.taken.clone().or(cond);
        let mut scope = self.cx.enter(self.parallel, alternative, active);
        f(&mut scope)
    }
}

/// A state machine created by [`ModuleCtx::fsm`].
#[derive(Debug, Clone)]
pub struct Fsm {
    name: String,
    states: Vec<String>,
    state: Sig,
    parallel: u32,
    prefix: CtrlPath,
}

impl Fsm {
    /// The state register.
    pub fn state(&self) -> Sig {
        self.state
    }

    /// Single-bit expression that holds while the machine is in `state`.
    #[track_caller]
    pub fn ongoing(&self, state: &str) -> Result<Expr, ElabError> {
        let index = self.index(state, SrcLoc::caller())?;
        Ok(self
            .state
            .expr()
            .equals(Expr::constant(index as u64, self.state.width)))
    }

    fn index(&self, state: &str, loc: SrcLoc) -> Result<usize, ElabError> {
        self.states
            .iter()
            .position(|s| s == state)
            .ok_or_else(|| ElabError::Usage {
                message: format!("state machine `{}` has no state `{state}`", self.name),
                loc,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{E301, E302, E303, E304, E305, E306, E307};
    use crate::layout::Layout;
    use crate::manager::MethodDecl;

    fn method(tm: &mut TransactionManager, name: &str) -> Method {
        tm.method(MethodDecl::new(name).input(Layout::bits(8)).output(Layout::bits(8)))
            .unwrap()
    }

    #[test]
    fn call_records_site() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let t = tm.transaction("t");
        tm.module("top", |cx| {
            cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
            cx.transaction_body(t, Expr::one(), |cx| {
                let out = cx.call(m, Expr::constant(3, 8))?;
                assert_eq!(out.width(), 8);
                Ok(())
            })
        })
        .unwrap();
        let sites = tm.node(t).sites_to(m.id());
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].arg, Expr::constant(3, 8));
        assert_eq!(sites[0].enable, Expr::one());
        assert_eq!(tm.node(m).def_order, Some(0));
        assert_eq!(tm.node(t).def_order, Some(1));
    }

    #[test]
    fn call_outside_body() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let err = tm
            .module("top", |cx| {
                cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
                cx.call(m, Expr::zero(8)).map(|_| ())
            })
            .unwrap_err();
        assert_eq!(err.code(), E303);
    }

    #[test]
    fn call_undefined() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let t = tm.transaction("t");
        let err = tm
            .module("top", |cx| {
                cx.transaction_body(t, Expr::one(), |cx| cx.call(m, Expr::zero(8)).map(|_| ()))
            })
            .unwrap_err();
        assert_eq!(err.code(), E302);
    }

    #[test]
    fn redefinition() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let err = tm
            .module("top", |cx| {
                cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
                cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))
            })
            .unwrap_err();
        assert_eq!(err.code(), E301);
        let diag = err.to_diagnostic();
        assert_eq!(diag.labels.len(), 1);
    }

    #[test]
    fn nested_body() {
        let mut tm = TransactionManager::new();
        let a = tm.transaction("a");
        let b = tm.transaction("b");
        let err = tm
            .module("top", |cx| {
                cx.transaction_body(a, Expr::one(), |cx| {
                    cx.transaction_body(b, Expr::one(), |_| Ok(()))
                })
            })
            .unwrap_err();
        assert_eq!(err.code(), E305);
    }

    #[test]
    fn duplicate_call_on_same_path() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let t = tm.transaction("t");
        let err = tm
            .module("top", |cx| {
                cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
                cx.transaction_body(t, Expr::one(), |cx| {
                    cx.call(m, Expr::zero(8))?;
                    cx.call(m, Expr::zero(8))?;
                    Ok(())
                })
            })
            .unwrap_err();
        assert_eq!(err.code(), E304);
    }

    #[test]
    fn exclusive_arms_may_call_twice() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let t = tm.transaction("t");
        tm.module("top", |cx| {
            let c = cx.input("c", 1)?;
            cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
            cx.transaction_body(t, Expr::one(), |cx| {
                cx.if_(c, |cx| cx.call(m, Expr::constant(1, 8)))?
                    .else_(|cx| cx.call(m, Expr::constant(2, 8)))?;
                Ok(())
            })
        })
        .unwrap();
        let sites = tm.node(t).sites_to(m.id());
        assert_eq!(sites.len(), 2);
        assert!(sites[0].path.exclusive_with(&sites[1].path));
        assert_ne!(sites[0].enable, Expr::one());
    }

    #[test]
    fn separate_ifs_are_not_exclusive() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let t = tm.transaction("t");
        let err = tm
            .module("top", |cx| {
                let c = cx.input("c", 1)?;
                cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
                cx.transaction_body(t, Expr::one(), |cx| {
                    cx.if_(c, |cx| cx.call(m, Expr::zero(8)))?;
                    cx.if_(c.expr().not(), |cx| cx.call(m, Expr::zero(8)))?;
                    Ok(())
                })
            })
            .unwrap_err();
        assert_eq!(err.code(), E304);
    }

    #[test]
    fn switch_cases_are_exclusive() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let t = tm.transaction("t");
        tm.module("top", |cx| {
            let sel = cx.input("sel", 2)?;
            cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
            cx.transaction_body(t, Expr::one(), |cx| {
                cx.switch(sel, |s| {
                    s.case(&[0, 1], |cx| cx.call(m, Expr::constant(1, 8)))?;
                    s.case(&[2], |cx| cx.call(m, Expr::constant(2, 8)))?;
                    s.default(|cx| cx.call(m, Expr::constant(3, 8)))?;
                    Ok(())
                })
            })
        })
        .unwrap();
        assert_eq!(tm.node(t).sites_to(m.id()).len(), 3);
    }

    #[test]
    fn scope_guard_restores_state_on_error() {
        let mut tm = TransactionManager::new();
        tm.module("top", |cx| {
            let c = cx.input("c", 1)?;
            let result = cx.if_(c, |_| {
                Err::<(), _>(ElabError::Usage {
                    message: "boom".into(),
                    loc: SrcLoc::DUMMY,
                })
            });
            assert!(result.is_err());
            assert_eq!(cx.path.depth(), 0);
            assert!(cx.conds.is_empty());
            {
                let inner = cx.when(c);
                assert_eq!(inner.path.depth(), 1);
            }
            assert_eq!(cx.path.depth(), 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn argument_too_wide() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let t = tm.transaction("t");
        let err = tm
            .module("top", |cx| {
                cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
                cx.transaction_body(t, Expr::one(), |cx| {
                    cx.call(m, Expr::zero(9)).map(|_| ())
                })
            })
            .unwrap_err();
        assert_eq!(err.code(), E306);
    }

    #[test]
    fn assignment_domain_checked() {
        let mut tm = TransactionManager::new();
        let err = tm
            .module("top", |cx| {
                let w = cx.wire("w", 4)?;
                cx.sync(w, Expr::zero(4))
            })
            .unwrap_err();
        assert_eq!(err.code(), E307);
    }

    #[test]
    fn module_signals_are_prefixed() {
        let mut tm = TransactionManager::new();
        tm.module("core", |cx| {
            cx.reg("count", 4, 0)?;
            cx.submodule("alu", |cx| cx.wire("out", 8).map(|_| ()))
        })
        .unwrap();
        assert!(tm.netlist.find("core_count").is_some());
        assert!(tm.netlist.find("core_alu_out").is_some());
    }

    #[test]
    fn fsm_states_are_exclusive() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let t = tm.transaction("t");
        tm.module("top", |cx| {
            cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
            let fsm = cx.fsm("ctl", &["idle", "busy", "done"])?;
            assert_eq!(fsm.state().width(), 2);
            cx.transaction_body(t, Expr::one(), |cx| {
                cx.fsm_state(&fsm, "idle", |cx| {
                    cx.call(m, Expr::constant(1, 8))?;
                    cx.next_state(&fsm, "busy")
                })?;
                cx.fsm_state(&fsm, "busy", |cx| {
                    cx.call(m, Expr::constant(2, 8))?;
                    cx.next_state(&fsm, "idle")
                })
            })
        })
        .unwrap();
        assert_eq!(tm.node(t).sites_to(m.id()).len(), 2);
    }

    #[test]
    fn fsm_state_outside_creating_branch() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        let t = tm.transaction("t");
        let err = tm
            .module("top", |cx| {
                let c = cx.input("c", 1)?;
                let d = cx.input("d", 1)?;
                let x = cx.input("x", 1)?;
                cx.method_body(m, MethodBody::new(), |_, arg| Ok(arg))?;
                let fsm = {
                    let mut arm = cx.when(c);
                    arm.fsm("ctl", &["a", "b"])?
                };
                let mut arm = cx.when(d);
                arm.transaction_body(t, Expr::one(), |cx| {
                    cx.when(x).call(m, Expr::constant(1, 8))?;
                    cx.fsm_state(&fsm, "b", |cx| cx.call(m, Expr::constant(2, 8)).map(|_| ()))
                })
            })
            .unwrap_err();
        assert_eq!(err.code(), E307);
        assert!(err.to_string().contains("outside the branch"));
    }

    #[test]
    fn fsm_unknown_state() {
        let mut tm = TransactionManager::new();
        let err = tm
            .module("top", |cx| {
                let fsm = cx.fsm("ctl", &["idle"])?;
                cx.next_state(&fsm, "gone")
            })
            .unwrap_err();
        assert_eq!(err.code(), E307);
    }

    #[test]
    fn method_result_too_wide() {
        let mut tm = TransactionManager::new();
        let m = tm
            .method(MethodDecl::new("m").output(Layout::bits(4)))
            .unwrap();
        let err = tm
            .module("top", |cx| {
                cx.method_body(m, MethodBody::new(), |_, _| Ok(Expr::zero(8)))
            })
            .unwrap_err();
        assert_eq!(err.code(), E306);
    }

    #[test]
    fn proxy_forwards_calls() {
        let mut tm = TransactionManager::new();
        let inner = method(&mut tm, "inner");
        let outer = method(&mut tm, "outer");
        tm.module("top", |cx| {
            cx.method_body(inner, MethodBody::new(), |_, arg| Ok(arg))?;
            cx.proxy(outer, inner)
        })
        .unwrap();
        assert_eq!(tm.node(outer).sites_to(inner.id()).len(), 1);
    }

    #[test]
    fn validator_is_stored() {
        let mut tm = TransactionManager::new();
        let m = method(&mut tm, "m");
        tm.module("top", |cx| {
            cx.method_body(
                m,
                MethodBody::new().validate_arguments(|arg| arg.clone().less_than(Expr::constant(4, 8))),
                |_, arg| Ok(arg),
            )
        })
        .unwrap();
        assert!(tm.node(m).as_method().unwrap().validator.is_some());
    }
}
