//! Nether-Stream: stream-directory codec for little-endian binary records
//!
//! This crate reads and writes buffers made of a directory header followed
//! by typed stream bodies, in the style of crash-dump formats: module lists,
//! thread lists and small fixed headers, all count-prefixed and
//! little-endian.
//!
//! # Key Features
//!
//! - **Declarative layouts**: records are described by [`RecordSpec`]s, not
//!   hand-written parsers
//! - **Strict bounds**: truncated input is an error, never a shorter result
//! - **Pointer fields**: offset fields decode lazily through [`PointerRef`],
//!   and the cursor always ends up where it started
//! - **Canonical encode**: counts, sizes and offsets are recomputed
//! - **No I/O**: the caller supplies the buffer
//!
//! # Usage
//!
//! ```ignore
//! use nether_stream::{StreamDirectory, presets};
//!
//! let data = std::fs::read("crash.dmp")?;
//! let directory = StreamDirectory::new(&data, presets::minidump_layout()?);
//! let structure = directory.decode_all()?;
//!
//! let mut cursor = directory.cursor();
//! for module in structure.list(presets::MODULE_LIST_STREAM).unwrap().elements() {
//!     let name = module.pointer("module_name_rva").unwrap().resolve(&mut cursor)?;
//!     println!("{:?}", name);
//! }
//!
//! let canonical = StreamDirectory::encode(&structure, directory.layout())?;
//! ```

mod codec;
mod cursor;
mod directory;
mod error;
mod layout;
mod pointer;
mod record;
mod spec;

pub mod presets;

pub use codec::{
    ListStream, decode_list, decode_record, encode_list, encode_record, write_list, write_record,
};
pub use cursor::{ByteCursor, VALID_WIDTHS};
pub use directory::{
    DecodedStream, DirectoryEntry, DirectoryLayout, StreamDirectory, StreamKind, Structure,
    read_header,
};
pub use error::{Result, StreamError};
pub use layout::{FieldDecl, LayoutConfig, LayoutError, RecordDecl, StreamDecl, TargetDecl};
pub use pointer::{PointerRef, decode_target};
pub use record::{Decoded, Record, Value};
pub use spec::{FieldKind, FieldSpec, PointerTarget, RecordSpec};

// =============================================================================
// Constants
// =============================================================================

/// Size of a list count prefix and of the directory stream count
pub const COUNT_SIZE: usize = 4;

/// Size of one directory header entry (tag, data size, offset)
pub const DIRECTORY_ENTRY_SIZE: usize = 12;

/// Offset value that means "no target"
pub const NULL_OFFSET: u64 = 0;

// =============================================================================
// Tests
// =============================================================================
