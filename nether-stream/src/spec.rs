//! Declarative record layouts
//!
//! A [`RecordSpec`] is an ordered list of [`FieldSpec`]s with no padding and
//! no alignment. Layouts are validated once, when the spec is built, so a
//! bad width is a setup failure rather than a per-record one.

use std::sync::Arc;

use crate::cursor::is_valid_width;
use crate::error::{Result, StreamError};

/// Storage kind and byte size of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Unsigned little-endian integer of the given width
    Unsigned(usize),
    /// Two's-complement little-endian integer of the given width
    Signed(usize),
    /// Opaque byte array of the given length
    Bytes(usize),
}

impl FieldKind {
    /// Number of bytes the field occupies
    pub fn size(&self) -> usize {
        match *self {
            Self::Unsigned(w) | Self::Signed(w) | Self::Bytes(w) => w,
        }
    }
}

/// What a pointer field points at
#[derive(Debug, Clone, PartialEq)]
pub enum PointerTarget {
    /// A single fixed record
    Record(RecordSpec),
    /// A count-prefixed list of records
    List(RecordSpec),
    /// A fixed number of raw bytes
    Bytes(usize),
    /// A u32 byte length followed by that many bytes
    SizedBytes,
}

/// One named field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    is_offset: bool,
    target: Option<Arc<PointerTarget>>,
}

impl FieldSpec {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_offset: false,
            target: None,
        }
    }

    /// Unsigned integer field
    pub fn unsigned(name: impl Into<String>, width: usize) -> Self {
        Self::new(name, FieldKind::Unsigned(width))
    }

    /// Signed integer field
    pub fn signed(name: impl Into<String>, width: usize) -> Self {
        Self::new(name, FieldKind::Signed(width))
    }

    /// Byte-array field
    pub fn bytes(name: impl Into<String>, len: usize) -> Self {
        Self::new(name, FieldKind::Bytes(len))
    }

    /// Unsigned field holding a byte offset into the same buffer
    pub fn offset(name: impl Into<String>, width: usize) -> Self {
        Self {
            is_offset: true,
            ..Self::unsigned(name, width)
        }
    }

    /// Offset field with a default decoder for the bytes it points at
    pub fn pointer(name: impl Into<String>, width: usize, target: PointerTarget) -> Self {
        Self::offset(name, width).with_target(target)
    }

    /// Attach a target decoder; marks the field as an offset
    pub fn with_target(mut self, target: PointerTarget) -> Self {
        self.is_offset = true;
        self.target = Some(Arc::new(target));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Number of bytes the field occupies
    pub fn size(&self) -> usize {
        self.kind.size()
    }

    pub fn is_offset(&self) -> bool {
        self.is_offset
    }

    pub fn target(&self) -> Option<&Arc<PointerTarget>> {
        self.target.as_ref()
    }

    fn validate(&self) -> Result<()> {
        match self.kind {
            FieldKind::Unsigned(w) | FieldKind::Signed(w) if !is_valid_width(w) => {
                Err(StreamError::InvalidWidth {
                    field: self.name.clone(),
                    width: w,
                })
            }
            FieldKind::Bytes(0) => Err(StreamError::InvalidWidth {
                field: self.name.clone(),
                width: 0,
            }),
            FieldKind::Signed(_) | FieldKind::Bytes(_) if self.is_offset => {
                Err(StreamError::FieldType {
                    field: self.name.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Ordered field layout of a fixed-width record
///
/// Cloning is cheap; the field list is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSpec {
    fields: Arc<[FieldSpec]>,
    width: usize,
}

impl RecordSpec {
    /// Build a spec, rejecting unsupported widths
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        for field in &fields {
            field.validate()?;
        }
        let width = fields.iter().map(FieldSpec::size).sum();
        Ok(Self {
            fields: fields.into(),
            width,
        })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Total encoded size in bytes
    pub fn width(&self) -> usize {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_width_is_sum_of_fields() {
        let spec = RecordSpec::new(vec![
            FieldSpec::unsigned("a", 1),
            FieldSpec::signed("b", 2),
            FieldSpec::offset("c", 4),
            FieldSpec::unsigned("d", 8),
            FieldSpec::bytes("e", 3),
        ])
        .unwrap();
        assert_eq!(spec.width(), 18);
        assert_eq!(spec.fields().len(), 5);
        assert!(spec.field("c").unwrap().is_offset());
        assert!(spec.field("missing").is_none());
    }

    #[test]
    fn test_invalid_width_rejected_at_build() {
        let err = RecordSpec::new(vec![
            FieldSpec::unsigned("ok", 4),
            FieldSpec::unsigned("bad", 3),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            StreamError::InvalidWidth {
                field: "bad".to_string(),
                width: 3
            }
        );

        assert!(matches!(
            RecordSpec::new(vec![FieldSpec::bytes("empty", 0)]),
            Err(StreamError::InvalidWidth { width: 0, .. })
        ));
    }

    #[test]
    fn test_offset_must_be_unsigned() {
        let field = FieldSpec::signed("ptr", 4).with_target(PointerTarget::SizedBytes);
        assert!(matches!(
            RecordSpec::new(vec![field]),
            Err(StreamError::FieldType { .. })
        ));
    }

    #[test]
    fn test_empty_spec() {
        let spec = RecordSpec::new(Vec::new()).unwrap();
        assert_eq!(spec.width(), 0);
    }
}
