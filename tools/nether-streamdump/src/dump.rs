//! Dump command - decode every stream and print JSON

use anyhow::{Context, Result};
use clap::Args;
use nether_stream::{ByteCursor, Decoded, DecodedStream, Record, StreamDirectory};
use serde_json::{Map, Value, json};
use std::path::PathBuf;

use crate::input::{load_layout, read_input};

/// Pointers inside resolved targets are followed this many levels deep
const MAX_RESOLVE_DEPTH: usize = 4;

/// Arguments for the dump command
#[derive(Args)]
pub struct DumpArgs {
    /// Input file
    pub file: PathBuf,

    /// Layout file (defaults to the minidump layout)
    #[arg(short, long)]
    pub layout: Option<PathBuf>,

    /// Follow pointer fields that declare a target
    #[arg(long)]
    pub resolve: bool,
}

/// Execute the dump command
pub fn execute(args: DumpArgs) -> Result<()> {
    let data = read_input(&args.file)?;
    let layout = load_layout(args.layout.as_deref())?;

    let directory = StreamDirectory::new(&data, layout);
    let structure = directory
        .decode_all()
        .with_context(|| format!("Failed to decode {}", args.file.display()))?;
    tracing::info!("Decoded {} stream(s)", structure.len());

    let output = if args.resolve {
        let mut cursor = directory.cursor();
        let mut streams = Map::new();
        for tag in structure.tags() {
            let value = match structure.get(tag) {
                Some(DecodedStream::Record(record)) => resolved_record(record, &mut cursor, 0),
                Some(DecodedStream::List(list)) => json!({
                    "count": list.count(),
                    "elements": list
                        .elements()
                        .iter()
                        .map(|r| resolved_record(r, &mut cursor, 0))
                        .collect::<Vec<_>>(),
                }),
                None => continue,
            };
            streams.insert(tag.to_string(), value);
        }
        Value::Object(streams)
    } else {
        serde_json::to_value(&structure)?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Record as JSON, with each resolvable pointer's target under `$resolved`
///
/// Resolution failures are reported inline rather than aborting the dump.
fn resolved_record(record: &Record, cursor: &mut ByteCursor<'_>, depth: usize) -> Value {
    let mut object = Map::new();
    for (name, value) in record.iter() {
        object.insert(name.to_string(), field_json(value));
    }

    let mut resolved = Map::new();
    for pointer in record.pointers() {
        if pointer.is_null() || pointer.target().is_none() {
            continue;
        }
        let value = match pointer.resolve(cursor) {
            Ok(Some(decoded)) => decoded_json(&decoded, cursor, depth + 1),
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::warn!("Failed to resolve '{}': {}", pointer.field(), e);
                json!({ "error": e.to_string() })
            }
        };
        resolved.insert(pointer.field().to_string(), value);
    }
    if !resolved.is_empty() {
        object.insert("$resolved".to_string(), Value::Object(resolved));
    }
    Value::Object(object)
}

fn decoded_json(decoded: &Decoded, cursor: &mut ByteCursor<'_>, depth: usize) -> Value {
    if depth > MAX_RESOLVE_DEPTH {
        return json!("<max depth>");
    }
    match decoded {
        Decoded::Record(record) => resolved_record(record, cursor, depth),
        Decoded::List(list) => json!({
            "count": list.count(),
            "elements": list
                .elements()
                .iter()
                .map(|r| resolved_record(r, cursor, depth))
                .collect::<Vec<_>>(),
        }),
        Decoded::Bytes(bytes) => json!(hex::encode(bytes)),
    }
}

fn field_json(value: &nether_stream::Value) -> Value {
    match value {
        nether_stream::Value::Unsigned(v) => json!(v),
        nether_stream::Value::Signed(v) => json!(v),
        nether_stream::Value::Bytes(b) => json!(hex::encode(b)),
    }
}
