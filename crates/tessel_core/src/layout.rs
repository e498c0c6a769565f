//! Method argument and result shapes.
//!
//! A [`Layout`] is an ordered list of named bit fields packed least
//! significant first. Methods use one layout for `data_in` and one for
//! `data_out`; an empty layout means the bus does not exist.

use serde::Serialize;
use tessel_ir::{Expr, MAX_WIDTH};

use crate::errors::ElabError;

/// One named field of a [`Layout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    /// Field name, unique within the layout.
    pub name: String,
    /// Width in bits.
    pub width: u32,
}

/// An ordered set of bit fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Layout {
    fields: Vec<Field>,
}

impl Layout {
    /// The empty layout.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A layout with a single anonymous field of `width` bits.
    pub fn bits(width: u32) -> Self {
        Self::empty().field("data", width)
    }

    /// Appends a field above the existing ones.
    pub fn field(mut self, name: impl Into<String>, width: u32) -> Self {
        self.fields.push(Field {
            name: name.into(),
            width,
        });
        self
    }

    /// Total width in bits.
    pub fn width(&self) -> u32 {
        self.fields.iter().map(|f| f.width).sum()
    }

    /// Returns `true` if the layout has zero width.
    pub fn is_empty(&self) -> bool {
        self.width() == 0
    }

    /// The fields, least significant first.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns `(low bit, width)` of the named field.
    pub fn offset(&self, name: &str) -> Option<(u32, u32)> {
        let mut low = 0;
        for field in &self.fields {
            if field.name == name {
                return Some((low, field.width));
            }
            low += field.width;
        }
        None
    }

    /// Extracts the named field from a packed value.
    pub fn get(&self, packed: &Expr, name: &str) -> Option<Expr> {
        let (low, width) = self.offset(name)?;
        if width == 0 {
            return Some(Expr::zero(0));
        }
        Some(packed.clone().resize(self.width()).slice(low + width - 1, low))
    }

    /// Packs field values into one bus. Missing fields are zero.
    #[track_caller]
    pub fn pack(&self, values: &[(&str, Expr)]) -> Result<Expr, ElabError> {
        for (name, _) in values {
            if self.offset(name).is_none() {
                return Err(ElabError::Usage {
                    message: format!("layout has no field `{name}`"),
                    loc: tessel_source::SrcLoc::caller(),
                });
            }
        }
        let parts = self
            .fields
            .iter()
            .filter(|f| f.width > 0)
            .map(|f| {
                values
                    .iter()
                    .find(|(name, _)| *name == f.name)
                    .map(|(_, v)| v.clone().resize(f.width))
                    .unwrap_or_else(|| Expr::zero(f.width))
            })
            .collect();
        Ok(Expr::concat(parts))
    }

    /// Checks the layout fits in a netlist signal.
    pub(crate) fn check_width(&self, what: &str, loc: tessel_source::SrcLoc) -> Result<(), ElabError> {
        let width = self.width();
        if width > MAX_WIDTH {
            return Err(ElabError::TooWide {
                what: what.to_string(),
                width,
                loc,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op_layout() -> Layout {
        Layout::empty().field("opcode", 3).field("imm", 5)
    }

    #[test]
    fn widths_and_offsets() {
        let l = op_layout();
        assert_eq!(l.width(), 8);
        assert_eq!(l.offset("opcode"), Some((0, 3)));
        assert_eq!(l.offset("imm"), Some((3, 5)));
        assert_eq!(l.offset("rd"), None);
        assert!(Layout::empty().is_empty());
        assert_eq!(Layout::bits(8).width(), 8);
    }

    #[test]
    fn pack_orders_fields() {
        let l = op_layout();
        let packed = l
            .pack(&[("imm", Expr::constant(1, 5)), ("opcode", Expr::constant(2, 3))])
            .unwrap();
        assert_eq!(packed.width(), 8);
        assert_eq!(
            packed,
            Expr::concat(vec![Expr::constant(2, 3), Expr::constant(1, 5)])
        );
    }

    #[test]
    fn pack_defaults_missing_to_zero() {
        let packed = op_layout().pack(&[("imm", Expr::constant(1, 5))]).unwrap();
        assert_eq!(
            packed,
            Expr::concat(vec![Expr::zero(3), Expr::constant(1, 5)])
        );
    }

    #[test]
    fn pack_rejects_unknown_field() {
        let err = op_layout().pack(&[("rd", Expr::one())]).unwrap_err();
        assert!(matches!(err, ElabError::Usage { .. }));
    }

    #[test]
    fn get_slices_field() {
        let l = op_layout();
        let bus = Expr::constant(0b10101_011, 8);
        assert_eq!(l.get(&bus, "imm").map(|e| e.width()), Some(5));
        assert!(l.get(&bus, "nope").is_none());
    }

    #[test]
    fn too_wide_layout() {
        let l = Layout::bits(40).field("more", 40);
        assert!(l.check_width("input", tessel_source::SrcLoc::DUMMY).is_err());
        assert!(Layout::bits(64)
            .check_width("input", tessel_source::SrcLoc::DUMMY)
            .is_ok());
    }
}
