//! Opaque ID newtypes for netlist entities.

/// Declares a `u32` newtype usable as an [`ArenaId`](crate::ArenaId).
///
/// Callers must depend on `serde`.
///
/// The generated type is `Copy`, `Ord` and `Hash`, which makes it usable as a
/// `petgraph` `GraphMap` node and as an ordered-set key.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl $crate::arena::ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// A signal (input, wire or register) in a [`Netlist`](crate::Netlist).
    SignalId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn id_roundtrip() {
        assert_eq!(SignalId::from_raw(42).as_raw(), 42);
    }

    #[test]
    fn ids_order_by_index() {
        let set: BTreeSet<_> = [3, 1, 2].into_iter().map(SignalId::from_raw).collect();
        let raw: Vec<u32> = set.into_iter().map(SignalId::as_raw).collect();
        assert_eq!(raw, vec![1, 2, 3]);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = SignalId::from_raw(99);
        let json = serde_json::to_string(&id).unwrap();
        let restored: SignalId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
