//! TOML layout files
//!
//! Declares record layouts by name and maps stream tags onto them:
//!
//! ```toml
//! [records.name]
//! fields = [{ name = "length", width = 4 }]
//!
//! [records.module]
//! fields = [
//!     { name = "base", width = 8 },
//!     { name = "name_rva", width = 4, target = "sized_bytes" },
//!     { name = "header_rva", width = 4, target = { record = "name" } },
//!     { name = "guid", bytes = 16 },
//! ]
//!
//! [[streams]]
//! tag = 4
//! record = "module"
//! list = true
//! ```

use std::path::{Path, PathBuf};

use hashbrown::{HashMap, HashSet};
use serde::Deserialize;

use crate::directory::{DirectoryLayout, StreamKind};
use crate::error::StreamError;
use crate::spec::{FieldSpec, PointerTarget, RecordSpec};

/// Errors from loading or building a layout file
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("failed to read layout {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse layout: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("record '{0}' is not declared")]
    UnknownRecord(String),

    #[error("record '{0}' refers to itself through a pointer target")]
    RecursiveRecord(String),

    #[error("field '{field}' in record '{record}' must declare exactly one of `width` or `bytes`")]
    InvalidField { record: String, field: String },

    #[error("invalid layout: {0}")]
    Stream(#[from] StreamError),
}

/// Parsed layout file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    #[serde(default)]
    pub records: HashMap<String, RecordDecl>,
    #[serde(default)]
    pub streams: Vec<StreamDecl>,
}

/// Named record layout
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordDecl {
    pub fields: Vec<FieldDecl>,
}

/// One field of a record declaration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    /// Integer width in bytes
    #[serde(default)]
    pub width: Option<usize>,
    /// Byte-array length
    #[serde(default)]
    pub bytes: Option<usize>,
    #[serde(default)]
    pub signed: bool,
    /// Marks the field as an offset without giving a decoder
    #[serde(default)]
    pub offset: bool,
    /// Decoder for what the offset points at; implies `offset`
    #[serde(default)]
    pub target: Option<TargetDecl>,
}

/// Pointer target as written in a layout file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDecl {
    Record(String),
    List(String),
    Bytes(usize),
    SizedBytes,
}

/// Stream tag mapped to a named record
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamDecl {
    pub tag: u32,
    pub record: String,
    #[serde(default)]
    pub list: bool,
}

impl LayoutConfig {
    /// Load a layout from file
    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let content = std::fs::read_to_string(path).map_err(|source| LayoutError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse a layout from string
    pub fn parse(content: &str) -> Result<Self, LayoutError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve every record reference and build the directory layout
    pub fn build(&self) -> Result<DirectoryLayout, LayoutError> {
        let mut builder = SpecBuilder {
            config: self,
            built: HashMap::new(),
            in_progress: HashSet::new(),
        };

        let mut layout = DirectoryLayout::new();
        for stream in &self.streams {
            let spec = builder.record(&stream.record)?;
            let kind = if stream.list {
                StreamKind::List(spec)
            } else {
                StreamKind::Record(spec)
            };
            layout.insert(stream.tag, kind)?;
        }
        Ok(layout)
    }

    /// Build a single named record spec
    pub fn record_spec(&self, name: &str) -> Result<RecordSpec, LayoutError> {
        SpecBuilder {
            config: self,
            built: HashMap::new(),
            in_progress: HashSet::new(),
        }
        .record(name)
    }
}

/// Builds record specs on demand, memoized, rejecting reference cycles
struct SpecBuilder<'c> {
    config: &'c LayoutConfig,
    built: HashMap<&'c str, RecordSpec>,
    in_progress: HashSet<&'c str>,
}

impl<'c> SpecBuilder<'c> {
    fn record(&mut self, name: &str) -> Result<RecordSpec, LayoutError> {
        let config = self.config;
        let (name, decl) = config
            .records
            .get_key_value(name)
            .ok_or_else(|| LayoutError::UnknownRecord(name.to_string()))?;
        if let Some(spec) = self.built.get(name.as_str()) {
            return Ok(spec.clone());
        }
        if !self.in_progress.insert(name.as_str()) {
            return Err(LayoutError::RecursiveRecord(name.clone()));
        }

        let mut fields = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            fields.push(self.field(name, field)?);
        }
        let spec = RecordSpec::new(fields)?;

        self.in_progress.remove(name.as_str());
        self.built.insert(name.as_str(), spec.clone());
        Ok(spec)
    }

    fn field(&mut self, record: &str, decl: &FieldDecl) -> Result<FieldSpec, LayoutError> {
        let mut field = match (decl.width, decl.bytes) {
            (Some(width), None) if decl.signed => FieldSpec::signed(&decl.name, width),
            (Some(width), None) if decl.offset => FieldSpec::offset(&decl.name, width),
            (Some(width), None) => FieldSpec::unsigned(&decl.name, width),
            (None, Some(len)) => FieldSpec::bytes(&decl.name, len),
            _ => {
                return Err(LayoutError::InvalidField {
                    record: record.to_string(),
                    field: decl.name.clone(),
                });
            }
        };

        if let Some(target) = &decl.target {
            let target = match target {
                TargetDecl::Record(name) => PointerTarget::Record(self.record(name)?),
                TargetDecl::List(name) => PointerTarget::List(self.record(name)?),
                TargetDecl::Bytes(len) => PointerTarget::Bytes(*len),
                TargetDecl::SizedBytes => PointerTarget::SizedBytes,
            };
            field = field.with_target(target);
        }
        Ok(field)
    }
}
