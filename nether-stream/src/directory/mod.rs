//! Stream directory decoding and encoding
//!
//! A directory buffer starts with a header listing its streams:
//!
//! ```text
//! u32 stream_count
//! stream_count x { u32 tag, u32 data_size, u32 offset }
//! stream bodies
//! ```
//!
//! Each stream body is either a single fixed record or a count-prefixed list,
//! as declared by the [`DirectoryLayout`]. Offsets are absolute.

use std::ops::Range;

use hashbrown::HashMap;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::codec::{ListStream, decode_list, decode_record, write_list, write_record};
use crate::cursor::ByteCursor;
use crate::error::{Result, StreamError};
use crate::record::Record;
use crate::spec::RecordSpec;
use crate::{COUNT_SIZE, DIRECTORY_ENTRY_SIZE};


/// How a stream body is laid out
#[derive(Debug, Clone, PartialEq)]
pub enum StreamKind {
    /// One fixed record
    Record(RecordSpec),
    /// A count-prefixed list of records
    List(RecordSpec),
}

impl StreamKind {
    pub fn spec(&self) -> &RecordSpec {
        match self {
            Self::Record(spec) | Self::List(spec) => spec,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

/// Tag to stream layout table, in declaration order
///
/// Declaration order is the order streams are written on encode.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLayout {
    streams: Vec<(u32, StreamKind)>,
    index: HashMap<u32, usize>,
}

impl DirectoryLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layout from `(tag, kind)` pairs
    pub fn from_streams(streams: impl IntoIterator<Item = (u32, StreamKind)>) -> Result<Self> {
        let mut layout = Self::new();
        for (tag, kind) in streams {
            layout.insert(tag, kind)?;
        }
        Ok(layout)
    }

    /// Declare a stream; each tag may only be declared once
    ///
    /// List streams need elements of at least one byte.
    pub fn insert(&mut self, tag: u32, kind: StreamKind) -> Result<()> {
        if self.index.contains_key(&tag) {
            return Err(StreamError::DuplicateTag { tag });
        }
        if kind.is_list() && kind.spec().width() == 0 {
            return Err(StreamError::InvalidWidth {
                field: "elements".to_string(),
                width: 0,
            });
        }
        self.index.insert(tag, self.streams.len());
        self.streams.push((tag, kind));
        Ok(())
    }

    pub fn get(&self, tag: u32) -> Option<&StreamKind> {
        self.index.get(&tag).map(|&i| &self.streams[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &StreamKind)> {
        self.streams.iter().map(|(tag, kind)| (*tag, kind))
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// One row of the directory header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub tag: u32,
    pub range: Range<usize>,
}

impl DirectoryEntry {
    pub fn new(tag: u32, range: Range<usize>) -> Self {
        Self { tag, range }
    }
}

/// A decoded stream body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedStream {
    Record(Record),
    List(ListStream),
}

impl DecodedStream {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListStream> {
        match self {
            Self::List(l) => Some(l),
            Self::Record(_) => None,
        }
    }
}

/// Decoded streams keyed by tag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    streams: HashMap<u32, DecodedStream>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a stream, returning whatever was stored under the tag before
    pub fn insert(&mut self, tag: u32, stream: DecodedStream) -> Option<DecodedStream> {
        self.streams.insert(tag, stream)
    }

    pub fn get(&self, tag: u32) -> Option<&DecodedStream> {
        self.streams.get(&tag)
    }

    pub fn get_mut(&mut self, tag: u32) -> Option<&mut DecodedStream> {
        self.streams.get_mut(&tag)
    }

    pub fn record(&self, tag: u32) -> Option<&Record> {
        self.get(tag).and_then(DecodedStream::as_record)
    }

    pub fn list(&self, tag: u32) -> Option<&ListStream> {
        self.get(tag).and_then(DecodedStream::as_list)
    }

    pub fn contains(&self, tag: u32) -> bool {
        self.streams.contains_key(&tag)
    }

    /// Tags in ascending order
    pub fn tags(&self) -> Vec<u32> {
        let mut tags: Vec<u32> = self.streams.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl Serialize for Structure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.streams.len()))?;
        for tag in self.tags() {
            map.serialize_entry(&tag, &self.streams[&tag])?;
        }
        map.end()
    }
}

/// Decoder over one directory buffer
///
/// Holds the buffer read-only; every decode uses its own cursor, so one
/// directory can be decoded from several places at once.
#[derive(Debug, Clone)]
pub struct StreamDirectory<'a> {
    buffer: &'a [u8],
    layout: DirectoryLayout,
}

impl<'a> StreamDirectory<'a> {
    pub fn new(buffer: &'a [u8], layout: DirectoryLayout) -> Self {
        Self { buffer, layout }
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    /// Fresh cursor over the whole buffer, for resolving pointers
    pub fn cursor(&self) -> ByteCursor<'a> {
        ByteCursor::new(self.buffer)
    }

    /// Parse the directory header at the start of the buffer
    pub fn read_header(&self) -> Result<Vec<DirectoryEntry>> {
        read_header(self.buffer)
    }

    /// Read the header, then decode every stream it lists
    pub fn decode_all(&self) -> Result<Structure> {
        let entries = self.read_header()?;
        self.decode(&entries)
    }

    /// Decode the given entries
    ///
    /// Entries are independent of each other. The first failure aborts the
    /// whole decode; no partial structure is returned.
    pub fn decode(&self, entries: &[DirectoryEntry]) -> Result<Structure> {
        let mut structure = Structure::new();
        for entry in entries {
            let tag = entry.tag;
            if structure.contains(tag) {
                return Err(StreamError::DuplicateTag { tag });
            }
            let stream = self
                .decode_entry(entry)
                .map_err(|e| e.in_stream(tag, entry.range.start, entry.range.end))?;
            structure.insert(tag, stream);
        }
        Ok(structure)
    }

    fn decode_entry(&self, entry: &DirectoryEntry) -> Result<DecodedStream> {
        let kind = self
            .layout
            .get(entry.tag)
            .ok_or(StreamError::UnknownStream { tag: entry.tag })?;
        let range = &entry.range;
        if range.start > range.end || range.end > self.buffer.len() {
            return Err(StreamError::OutOfBounds {
                offset: range.start,
                len: range.end.saturating_sub(range.start),
                buffer_len: self.buffer.len(),
            });
        }

        // The cursor ends at the stream boundary so a body can't read into
        // the next stream; offsets stay absolute
        let mut cursor = ByteCursor::new(&self.buffer[..range.end]);
        cursor.seek(range.start)?;

        let stream = match kind {
            StreamKind::Record(spec) => DecodedStream::Record(decode_record(&mut cursor, spec)?),
            StreamKind::List(spec) => DecodedStream::List(decode_list(&mut cursor, spec)?),
        };

        tracing::debug!(
            tag = entry.tag,
            start = range.start,
            end = range.end,
            elements = stream.as_list().map_or(1, ListStream::count),
            "decoded stream"
        );
        Ok(stream)
    }

    /// Encode `structure` as a directory buffer
    ///
    /// Streams are written in layout order, right after the header. Layout
    /// streams missing from the structure are skipped. Sizes, offsets and
    /// list counts are all recomputed.
    pub fn encode(structure: &Structure, layout: &DirectoryLayout) -> Result<Vec<u8>> {
        for tag in structure.tags() {
            if layout.get(tag).is_none() {
                return Err(StreamError::UnknownStream { tag });
            }
        }

        let header_len = COUNT_SIZE + structure.len() * DIRECTORY_ENTRY_SIZE;
        let mut bodies = Vec::new();
        let mut sizes = Vec::with_capacity(structure.len());
        for (tag, kind) in layout.iter() {
            let Some(stream) = structure.get(tag) else {
                continue;
            };
            let start = header_len + bodies.len();
            write_stream(&mut bodies, tag, kind, stream)
                .map_err(|e| e.in_stream(tag, start, start))?;
            let size = header_len + bodies.len() - start;
            tracing::debug!(tag, size, "encoded stream");
            sizes.push((tag, size));
        }

        let mut out = Vec::with_capacity(header_len + bodies.len());
        write_u32(&mut out, "stream_count", sizes.len())?;
        let mut offset = header_len;
        for (tag, size) in sizes {
            out.extend_from_slice(&tag.to_le_bytes());
            write_u32(&mut out, "data_size", size)?;
            write_u32(&mut out, "offset", offset)?;
            offset += size;
        }
        out.extend_from_slice(&bodies);
        Ok(out)
    }
}

/// Parse a directory header from the start of `buffer`
///
/// Every entry's range is checked against the buffer length.
pub fn read_header(buffer: &[u8]) -> Result<Vec<DirectoryEntry>> {
    let mut cursor = ByteCursor::new(buffer);
    let count = cursor.read_u32()? as usize;

    let table_len = count.saturating_mul(DIRECTORY_ENTRY_SIZE);
    if table_len > cursor.remaining() {
        return Err(StreamError::OutOfBounds {
            offset: cursor.position(),
            len: table_len,
            buffer_len: buffer.len(),
        });
    }

    let mut entries: Vec<DirectoryEntry> = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = cursor.read_u32()?;
        let size = cursor.read_u32()? as usize;
        let offset = cursor.read_u32()? as usize;

        if entries.iter().any(|e| e.tag == tag) {
            return Err(StreamError::DuplicateTag { tag });
        }
        let end = offset.saturating_add(size);
        if end > buffer.len() {
            let err = StreamError::OutOfBounds {
                offset,
                len: size,
                buffer_len: buffer.len(),
            };
            return Err(err.in_stream(tag, offset, end));
        }
        entries.push(DirectoryEntry::new(tag, offset..end));
    }
    Ok(entries)
}

fn write_stream(
    out: &mut Vec<u8>,
    tag: u32,
    kind: &StreamKind,
    stream: &DecodedStream,
) -> Result<()> {
    match (kind, stream) {
        (StreamKind::Record(spec), DecodedStream::Record(record)) => {
            write_record(out, record, spec)
        }
        (StreamKind::List(spec), DecodedStream::List(list)) => {
            write_list(out, list.elements(), spec)
        }
        _ => Err(StreamError::KindMismatch { tag }),
    }
}

fn write_u32(out: &mut Vec<u8>, field: &str, value: usize) -> Result<()> {
    let v = u32::try_from(value).map_err(|_| StreamError::FieldOverflow {
        field: field.to_string(),
        value: value.to_string(),
    })?;
    out.extend_from_slice(&v.to_le_bytes());
    Ok(())
}
