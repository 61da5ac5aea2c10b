//! Minidump-style record layouts
//!
//! Field names follow the `MINIDUMP_*` structures. Location descriptors
//! (`data_size` + `rva`) are inlined into the owning record with a prefix.

use crate::codec::decode_record;
use crate::cursor::ByteCursor;
use crate::directory::{DirectoryLayout, StreamKind};
use crate::error::{Result, StreamError};
use crate::record::Record;
use crate::spec::{FieldSpec, PointerTarget, RecordSpec};

/// `ThreadListStream`
pub const THREAD_LIST_STREAM: u32 = 3;
/// `ModuleListStream`
pub const MODULE_LIST_STREAM: u32 = 4;
/// `HandleDataStream`
pub const HANDLE_DATA_STREAM: u32 = 12;
/// `UnloadedModuleListStream`
pub const UNLOADED_MODULE_LIST_STREAM: u32 = 14;

/// `VS_FIXEDFILEINFO` fields, all u32
const FIXED_FILE_INFO_FIELDS: [&str; 13] = [
    "signature",
    "struc_version",
    "file_version_ms",
    "file_version_ls",
    "product_version_ms",
    "product_version_ls",
    "file_flags_mask",
    "file_flags",
    "file_os",
    "file_type",
    "file_subtype",
    "file_date_ms",
    "file_date_ls",
];

fn fixed_file_info_fields(prefix: &str) -> impl Iterator<Item = FieldSpec> + '_ {
    FIXED_FILE_INFO_FIELDS
        .iter()
        .map(move |name| FieldSpec::unsigned(format!("{prefix}{name}"), 4))
}

fn location(prefix: &str) -> [FieldSpec; 2] {
    [
        FieldSpec::unsigned(format!("{prefix}_data_size"), 4),
        FieldSpec::offset(format!("{prefix}_rva"), 4),
    ]
}

/// `VS_FIXEDFILEINFO` (52 bytes)
pub fn fixed_file_info() -> Result<RecordSpec> {
    RecordSpec::new(fixed_file_info_fields("").collect())
}

/// `MINIDUMP_MODULE` (108 bytes)
///
/// `module_name_rva` resolves to the length-prefixed UTF-16 name.
/// `cv_record_rva` and `misc_record_rva` carry no decoder; read them with
/// `resolve_raw` and the matching `*_data_size`.
pub fn module() -> Result<RecordSpec> {
    let mut fields = vec![
        FieldSpec::unsigned("base_of_image", 8),
        FieldSpec::unsigned("size_of_image", 4),
        FieldSpec::unsigned("checksum", 4),
        FieldSpec::unsigned("time_date_stamp", 4),
        FieldSpec::pointer("module_name_rva", 4, PointerTarget::SizedBytes),
    ];
    fields.extend(fixed_file_info_fields("version_info."));
    fields.extend(location("cv_record"));
    fields.extend(location("misc_record"));
    fields.push(FieldSpec::unsigned("reserved0", 8));
    fields.push(FieldSpec::unsigned("reserved1", 8));
    RecordSpec::new(fields)
}

/// `MINIDUMP_THREAD` (48 bytes)
pub fn thread() -> Result<RecordSpec> {
    let mut fields = vec![
        FieldSpec::unsigned("thread_id", 4),
        FieldSpec::unsigned("suspend_count", 4),
        FieldSpec::unsigned("priority_class", 4),
        FieldSpec::unsigned("priority", 4),
        FieldSpec::unsigned("teb", 8),
        FieldSpec::unsigned("stack_start", 8),
    ];
    fields.extend(location("stack"));
    fields.extend(location("context"));
    RecordSpec::new(fields)
}

/// `MINIDUMP_UNLOADED_MODULE` (24 bytes)
///
/// Entries are not a count-prefixed list; read them with
/// [`decode_unloaded_modules`].
pub fn unloaded_module() -> Result<RecordSpec> {
    RecordSpec::new(vec![
        FieldSpec::unsigned("base_of_image", 8),
        FieldSpec::unsigned("size_of_image", 4),
        FieldSpec::unsigned("checksum", 4),
        FieldSpec::unsigned("time_date_stamp", 4),
        FieldSpec::pointer("module_name_rva", 4, PointerTarget::SizedBytes),
    ])
}

/// `MINIDUMP_UNLOADED_MODULE_LIST` header (12 bytes)
///
/// Not count-prefixed like the other lists: entries follow the header, each
/// `size_of_entry` bytes long.
pub fn unloaded_module_list_header() -> Result<RecordSpec> {
    RecordSpec::new(vec![
        FieldSpec::unsigned("size_of_header", 4),
        FieldSpec::unsigned("size_of_entry", 4),
        FieldSpec::unsigned("number_of_entries", 4),
    ])
}

/// `MINIDUMP_HANDLE_DATA_STREAM` header (16 bytes)
pub fn handle_data_header() -> Result<RecordSpec> {
    RecordSpec::new(vec![
        FieldSpec::unsigned("size_of_header", 4),
        FieldSpec::unsigned("size_of_descriptor", 4),
        FieldSpec::unsigned("number_of_descriptors", 4),
        FieldSpec::unsigned("reserved", 4),
    ])
}

/// Thread list, module list, unloaded-module header and handle-data header
pub fn minidump_layout() -> Result<DirectoryLayout> {
    DirectoryLayout::from_streams([
        (THREAD_LIST_STREAM, StreamKind::List(thread()?)),
        (MODULE_LIST_STREAM, StreamKind::List(module()?)),
        (HANDLE_DATA_STREAM, StreamKind::Record(handle_data_header()?)),
        (
            UNLOADED_MODULE_LIST_STREAM,
            StreamKind::Record(unloaded_module_list_header()?),
        ),
    ])
}

/// Decode the entries that follow an unloaded-module list header
///
/// `cursor` must sit at the start of the stream, where `header` was read.
/// Entries start `size_of_header` bytes in and are `size_of_entry` bytes
/// apart; bytes past the 24 known ones are skipped. The cursor is left
/// where it was.
///
/// ```ignore
/// let mut cursor = directory.cursor();
/// cursor.seek(entry.range.start)?;
/// let header = structure.record(UNLOADED_MODULE_LIST_STREAM).unwrap();
/// let modules = decode_unloaded_modules(&mut cursor, header)?;
/// ```
pub fn decode_unloaded_modules(cursor: &mut ByteCursor<'_>, header: &Record) -> Result<Vec<Record>> {
    let spec = unloaded_module()?;
    let header_field = |name: &str| {
        header
            .uint(name)
            .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
            .ok_or_else(|| StreamError::MissingField {
                field: name.to_string(),
            })
    };
    let header_size = header_field("size_of_header")?;
    let entry_size = header_field("size_of_entry")?;
    let count = header_field("number_of_entries")?;

    if entry_size < spec.width() {
        return Err(StreamError::InvalidWidth {
            field: "size_of_entry".to_string(),
            width: entry_size,
        });
    }

    let start = cursor.position().saturating_add(header_size);
    cursor.with_position(start, |c| {
        let body_len = count.saturating_mul(entry_size);
        if body_len > c.remaining() {
            return Err(StreamError::OutOfBounds {
                offset: c.position(),
                len: body_len,
                buffer_len: c.len(),
            });
        }

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(decode_record(c, &spec)?);
            c.read(entry_size - spec.width())?;
        }
        Ok(entries)
    })
}

/// Decode a UTF-16LE name as read through a `SizedBytes` target
///
/// A trailing odd byte is dropped; invalid surrogates become U+FFFD.
pub fn decode_utf16_name(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
