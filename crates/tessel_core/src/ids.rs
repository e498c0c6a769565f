//! Opaque ID newtypes for transaction-graph entities.

tessel_ir::define_id!(
    /// A transaction or method in a [`TransactionManager`](crate::TransactionManager).
    NodeId
);

tessel_ir::define_id!(
    /// A module-like scope that owns control-flow paths.
    ModuleId
);
