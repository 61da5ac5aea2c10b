//! Count-prefixed list decoding and encoding

use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

use crate::COUNT_SIZE;
use crate::cursor::ByteCursor;
use crate::error::{Result, StreamError};
use crate::record::Record;
use crate::spec::RecordSpec;

use super::fixed::{decode_record, write_record};

/// A homogeneous sequence of records
#[derive(Debug, Clone, PartialEq)]
pub struct ListStream {
    spec: RecordSpec,
    elements: Vec<Record>,
}

impl ListStream {
    pub fn new(spec: RecordSpec, elements: Vec<Record>) -> Self {
        Self { spec, elements }
    }

    pub fn spec(&self) -> &RecordSpec {
        &self.spec
    }

    /// Element count; this is what encode writes as the prefix
    pub fn count(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[Record] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut Vec<Record> {
        &mut self.elements
    }

    pub fn push(&mut self, record: Record) {
        self.elements.push(record);
    }

    /// Encoded size in bytes, including the count prefix
    pub fn encoded_len(&self) -> usize {
        COUNT_SIZE + self.elements.len() * self.spec.width()
    }
}

impl Serialize for ListStream {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ListStream", 2)?;
        state.serialize_field("count", &self.elements.len())?;
        state.serialize_field("elements", &self.elements)?;
        state.end()
    }
}

/// Decode a u32 count followed by that many records
///
/// The whole list must fit in the remaining buffer; a truncated list is an
/// `OutOfBounds` error, never a shorter list. A non-zero count over a
/// zero-width element layout is `InvalidWidth`. On error the cursor is left
/// at the start of the list.
pub fn decode_list(cursor: &mut ByteCursor<'_>, spec: &RecordSpec) -> Result<ListStream> {
    let start = cursor.position();
    let result = decode_elements(cursor, spec);
    if result.is_err() {
        cursor.seek(start)?;
    }
    result.map(|elements| ListStream::new(spec.clone(), elements))
}

fn decode_elements(cursor: &mut ByteCursor<'_>, spec: &RecordSpec) -> Result<Vec<Record>> {
    let count = cursor.read_u32()? as usize;
    if count > 0 && spec.width() == 0 {
        return Err(StreamError::InvalidWidth {
            field: "elements".to_string(),
            width: 0,
        });
    }

    // Check the declared size up front so a corrupt count can't drive a huge
    // allocation before the read fails
    let body_len = count.saturating_mul(spec.width());
    if body_len > cursor.remaining() {
        return Err(StreamError::OutOfBounds {
            offset: cursor.position(),
            len: body_len,
            buffer_len: cursor.len(),
        });
    }

    let mut elements = Vec::with_capacity(count.min(cursor.remaining() / spec.width().max(1)));
    for _ in 0..count {
        elements.push(decode_record(cursor, spec)?);
    }
    Ok(elements)
}

/// Encode a list into a fresh buffer
pub fn encode_list(list: &ListStream) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(list.encoded_len());
    write_list(&mut out, list.elements(), list.spec())?;
    Ok(out)
}

/// Append a count prefix and `elements` encoded with `spec`
///
/// The prefix is always recomputed from `elements.len()`. On error nothing
/// is appended.
pub fn write_list(out: &mut Vec<u8>, elements: &[Record], spec: &RecordSpec) -> Result<()> {
    let count = u32::try_from(elements.len()).map_err(|_| StreamError::FieldOverflow {
        field: "count".to_string(),
        value: elements.len().to_string(),
    })?;

    let start = out.len();
    out.extend_from_slice(&count.to_le_bytes());
    for element in elements {
        if let Err(e) = write_record(out, element, spec) {
            out.truncate(start);
            return Err(e);
        }
    }
    Ok(())
}
