//! Error types for stream decoding and encoding

/// Errors that can occur when decoding or encoding a stream directory
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// A read, seek, or pointer resolution would pass the end of the buffer
    #[error("out of bounds: {len} byte(s) at offset 0x{offset:X} (buffer is {buffer_len} bytes)")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    /// A field declares a width the codec cannot handle
    #[error("field '{field}' has invalid width {width} (integers must be 1, 2, 4 or 8 bytes)")]
    InvalidWidth { field: String, width: usize },

    /// An encode-time value does not fit its declared width
    #[error("value {value} does not fit field '{field}'")]
    FieldOverflow { field: String, value: String },

    /// A stored value kind does not match the field's declared kind
    #[error("value stored for field '{field}' does not match its declared type")]
    FieldType { field: String },

    /// A record is missing a declared field
    #[error("record has no field '{field}'")]
    MissingField { field: String },

    /// A pointer has no target decoder and no override was given
    #[error("pointer field '{field}' has no target decoder")]
    MissingTarget { field: String },

    /// A stream failed to decode or encode
    #[error("stream {tag} (bytes 0x{start:X}..0x{end:X}): {source}")]
    Stream {
        tag: u32,
        start: usize,
        end: usize,
        source: Box<StreamError>,
    },

    /// A tag is not described by the layout
    #[error("no layout for stream tag {tag}")]
    UnknownStream { tag: u32 },

    /// A tag appears more than once in a layout or directory
    #[error("stream tag {tag} appears more than once")]
    DuplicateTag { tag: u32 },

    /// A decoded stream is a record where the layout wants a list, or the reverse
    #[error("stream {tag} does not match its layout kind")]
    KindMismatch { tag: u32 },
}

impl StreamError {
    /// Attach stream context to an error raised while handling one directory entry
    pub fn in_stream(self, tag: u32, start: usize, end: usize) -> Self {
        Self::Stream {
            tag,
            start,
            end,
            source: Box::new(self),
        }
    }

    /// The innermost error, with any stream context stripped
    pub fn root(&self) -> &StreamError {
        match self {
            Self::Stream { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, StreamError>;
