//! Interned identifiers for transaction, method and module names.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// An interned name of a transaction, method, module or generated signal.
///
/// Identifiers are `u32` indices into an [`Interner`]. Equality and cloning
/// are O(1); resolving back to a string requires the interner that created it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Creates an `Ident` from a raw `u32` index.
    ///
    /// Intended for deserialization and testing. Normal code obtains
    /// identifiers from [`Interner::get_or_intern`] or [`Interner::fresh`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `Ident` wraps a `u32` which is always a valid `usize` on 32-bit and
// 64-bit platforms. `try_from_usize` rejects values that don't fit in `u32`.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// String interner backed by [`lasso::ThreadedRodeo`].
///
/// Besides plain interning it hands out *fresh* names: user code may create
/// two transactions called `fetch`, and the generated netlist still needs
/// distinct signal names for both.
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns a string, returning its [`Ident`]. Already interned strings
    /// return the existing identifier without allocating.
    pub fn get_or_intern(&self, s: &str) -> Ident {
        self.rodeo.get_or_intern(s)
    }

    /// Returns the identifier of `s` if it has been interned.
    pub fn get(&self, s: &str) -> Option<Ident> {
        self.rodeo.get(s)
    }

    /// Interns a name that has not been handed out before.
    ///
    /// Returns `base` itself when it is unused, otherwise the first free
    /// `base_N` with `N` counting from 1.
    pub fn fresh(&self, base: &str) -> Ident {
        if !self.rodeo.contains(base) {
            return self.rodeo.get_or_intern(base);
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.rodeo.contains(&candidate) {
                return self.rodeo.get_or_intern(candidate);
            }
            n += 1;
        }
    }

    /// Resolves an [`Ident`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the `Ident` was not created by this interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }

    /// Returns the number of distinct interned strings.
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    /// Returns `true` if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interner").field("len", &self.len()).finish()
    }
}
