//! Deferred reads through offset fields
//!
//! A [`PointerRef`] is captured while a record is decoded, for every field
//! marked as an offset. Resolving it seeks to the offset, decodes there, and
//! always puts the cursor back. An offset of zero is the null pointer.

use std::sync::Arc;

use crate::NULL_OFFSET;
use crate::codec::{decode_list, decode_record};
use crate::cursor::ByteCursor;
use crate::error::{Result, StreamError};
use crate::record::Decoded;
use crate::spec::PointerTarget;

/// Offset value captured from a decoded record
#[derive(Debug, Clone, PartialEq)]
pub struct PointerRef {
    field: String,
    origin: usize,
    offset: u64,
    target: Option<Arc<PointerTarget>>,
}

impl PointerRef {
    pub fn new(
        field: impl Into<String>,
        origin: usize,
        offset: u64,
        target: Option<Arc<PointerTarget>>,
    ) -> Self {
        Self {
            field: field.into(),
            origin,
            offset,
            target,
        }
    }

    /// Name of the field this pointer was read from
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Cursor position at the start of the owning record
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Raw offset value
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_null(&self) -> bool {
        self.offset == NULL_OFFSET
    }

    pub fn target(&self) -> Option<&PointerTarget> {
        self.target.as_deref()
    }

    /// Decode the target with the decoder declared on the field
    ///
    /// Returns `Ok(None)` for a null pointer.
    pub fn resolve(&self, cursor: &mut ByteCursor<'_>) -> Result<Option<Decoded>> {
        if self.is_null() {
            return Ok(None);
        }
        let target = self
            .target
            .as_deref()
            .ok_or_else(|| StreamError::MissingTarget {
                field: self.field.clone(),
            })?;
        self.resolve_with(cursor, |c| decode_target(c, target))
    }

    /// Decode the target with a caller-supplied decoder instead
    pub fn resolve_with<'a, T>(
        &self,
        cursor: &mut ByteCursor<'a>,
        decoder: impl FnOnce(&mut ByteCursor<'a>) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.is_null() {
            return Ok(None);
        }
        tracing::trace!(
            field = %self.field,
            offset = self.offset,
            "resolving pointer"
        );
        cursor
            .with_position(self.seek_offset(), decoder)
            .map(Some)
    }

    /// Read `size` raw bytes at the target
    pub fn resolve_raw<'a>(
        &self,
        cursor: &mut ByteCursor<'a>,
        size: usize,
    ) -> Result<Option<&'a [u8]>> {
        self.resolve_with(cursor, |c| c.read(size))
    }

    fn seek_offset(&self) -> usize {
        // Offsets that don't fit usize are past any buffer; seek reports them
        usize::try_from(self.offset).unwrap_or(usize::MAX)
    }
}

/// Decode whatever a pointer target describes at the cursor position
pub fn decode_target(cursor: &mut ByteCursor<'_>, target: &PointerTarget) -> Result<Decoded> {
    match target {
        PointerTarget::Record(spec) => decode_record(cursor, spec).map(Decoded::Record),
        PointerTarget::List(spec) => decode_list(cursor, spec).map(Decoded::List),
        PointerTarget::Bytes(len) => Ok(Decoded::Bytes(cursor.read(*len)?.to_vec())),
        PointerTarget::SizedBytes => {
            let len = cursor.read_u32()? as usize;
            Ok(Decoded::Bytes(cursor.read(len)?.to_vec()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{FieldSpec, RecordSpec};

    /// 16-byte header whose first field points at a payload at offset 16
    fn header_with_payload() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(&0xCAFEu16.to_le_bytes());
        data.extend_from_slice(&7u16.to_le_bytes());
        data
    }

    fn payload_spec() -> RecordSpec {
        RecordSpec::new(vec![
            FieldSpec::unsigned("magic", 2),
            FieldSpec::unsigned("value", 2),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_record_restores_position() {
        let data = header_with_payload();
        let spec = RecordSpec::new(vec![
            FieldSpec::pointer("payload", 4, PointerTarget::Record(payload_spec())),
            FieldSpec::bytes("reserved", 12),
        ])
        .unwrap();

        let mut cursor = ByteCursor::new(&data);
        let record = decode_record(&mut cursor, &spec).unwrap();
        assert_eq!(cursor.position(), 16);

        let pointer = record.pointer("payload").unwrap();
        assert_eq!(pointer.origin(), 0);
        assert_eq!(pointer.offset(), 16);

        let Some(Decoded::Record(payload)) = pointer.resolve(&mut cursor).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(payload.uint("magic"), Some(0xCAFE));
        assert_eq!(payload.uint("value"), Some(7));
        assert_eq!(cursor.position(), 16);

        // Resolution is repeatable and leaves the raw value in place
        assert!(pointer.resolve(&mut cursor).unwrap().is_some());
        assert_eq!(record.uint("payload"), Some(16));
    }

    #[test]
    fn test_null_pointer() {
        let data = [0u8; 8];
        let pointer = PointerRef::new("ptr", 0, 0, None);
        let mut cursor = ByteCursor::new(&data);
        cursor.seek(5).unwrap();

        // No target declared, but null short-circuits before that matters
        assert_eq!(pointer.resolve(&mut cursor).unwrap(), None);
        assert_eq!(pointer.resolve_raw(&mut cursor, 4).unwrap(), None);
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_resolve_out_of_bounds_restores_position() {
        let data = [0u8; 8];
        let mut cursor = ByteCursor::new(&data);
        cursor.seek(3).unwrap();

        let past_end = PointerRef::new("ptr", 0, 100, Some(Arc::new(PointerTarget::Bytes(1))));
        assert!(matches!(
            past_end.resolve(&mut cursor),
            Err(StreamError::OutOfBounds { offset: 100, .. })
        ));
        assert_eq!(cursor.position(), 3);

        let straddles_end = PointerRef::new("ptr", 0, 6, None);
        assert!(matches!(
            straddles_end.resolve_raw(&mut cursor, 4),
            Err(StreamError::OutOfBounds { offset: 6, len: 4, .. })
        ));
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_missing_target() {
        let data = [0u8; 8];
        let mut cursor = ByteCursor::new(&data);
        let pointer = PointerRef::new("ptr", 0, 4, None);
        assert_eq!(
            pointer.resolve(&mut cursor).unwrap_err(),
            StreamError::MissingTarget {
                field: "ptr".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_with_override() {
        let data = header_with_payload();
        let mut cursor = ByteCursor::new(&data);
        let pointer = PointerRef::new("ptr", 0, 16, Some(Arc::new(PointerTarget::SizedBytes)));

        let magic = pointer
            .resolve_with(&mut cursor, |c| c.read_uint(2))
            .unwrap();
        assert_eq!(magic, Some(0xCAFE));
        assert_eq!(cursor.position(), 0);

        let err = pointer.resolve_with(&mut cursor, |c| c.read(100));
        assert!(err.is_err());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_sized_bytes_target() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(b"abc");

        let mut cursor = ByteCursor::new(&data);
        let pointer = PointerRef::new("name", 0, 4, Some(Arc::new(PointerTarget::SizedBytes)));
        assert_eq!(
            pointer.resolve(&mut cursor).unwrap(),
            Some(Decoded::Bytes(b"abc".to_vec()))
        );
        assert_eq!(pointer.resolve_raw(&mut cursor, 4).unwrap(), Some(&[3u8, 0, 0, 0][..]));
    }
}
