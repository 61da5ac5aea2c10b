//! End-to-end decode, pointer resolution and canonical re-encode over a
//! synthetic minidump-style buffer

use nether_stream::presets::{self, HANDLE_DATA_STREAM, MODULE_LIST_STREAM, THREAD_LIST_STREAM};
use nether_stream::{
    Decoded, DecodedStream, ListStream, Record, RecordSpec, StreamDirectory, StreamError,
    Structure,
};

/// Header (4 + 3 * 12) + thread list (4 + 48) + module list (4 + 108) + handle header (16)
const BODIES_END: usize = 40 + 52 + 112 + 16;
const NAME_OFFSET: usize = BODIES_END;
const MODULE_NAME: &str = "app.exe";
const CV_RECORD: &[u8] = b"RSDS\x01\x02\x03\x04";

fn cv_offset() -> usize {
    NAME_OFFSET + 4 + MODULE_NAME.len() * 2
}

/// Every field of `spec` set to zero
fn zeroed(spec: &RecordSpec) -> Record {
    let mut record = Record::new();
    for field in spec.fields() {
        record.set(field.name(), 0u64);
    }
    record
}

fn build_structure() -> Structure {
    let mut thread = zeroed(&presets::thread().unwrap());
    thread.set("thread_id", 0x1F04u64);
    thread.set("teb", 0x7FF6_0000_1000u64);
    thread.set("context_data_size", 0x4D0u64);
    thread.set("context_rva", 0x10_0000u64);

    let mut module = zeroed(&presets::module().unwrap());
    module.set("base_of_image", 0x1_4000_0000u64);
    module.set("size_of_image", 0x2_0000u64);
    module.set("module_name_rva", NAME_OFFSET as u64);
    module.set("version_info.signature", 0xFEEF_04BDu64);
    module.set("cv_record_data_size", CV_RECORD.len() as u64);
    module.set("cv_record_rva", cv_offset() as u64);

    let handles = Record::new()
        .with("size_of_header", 16u64)
        .with("size_of_descriptor", 40u64)
        .with("number_of_descriptors", 0u64)
        .with("reserved", 0u64);

    let mut structure = Structure::new();
    structure.insert(
        THREAD_LIST_STREAM,
        DecodedStream::List(ListStream::new(presets::thread().unwrap(), vec![thread])),
    );
    structure.insert(
        MODULE_LIST_STREAM,
        DecodedStream::List(ListStream::new(presets::module().unwrap(), vec![module])),
    );
    structure.insert(HANDLE_DATA_STREAM, DecodedStream::Record(handles));
    structure
}

/// Encoded directory followed by the data its pointers refer to
fn build_buffer() -> Vec<u8> {
    let layout = presets::minidump_layout().unwrap();
    let mut data = StreamDirectory::encode(&build_structure(), &layout).unwrap();
    assert_eq!(data.len(), BODIES_END);

    let name: Vec<u8> = MODULE_NAME
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
    data.extend_from_slice(&(name.len() as u32).to_le_bytes());
    data.extend_from_slice(&name);
    assert_eq!(data.len(), cv_offset());
    data.extend_from_slice(CV_RECORD);
    data
}

#[test]
fn test_decode_synthetic_dump() {
    let data = build_buffer();
    let directory = StreamDirectory::new(&data, presets::minidump_layout().unwrap());

    let entries = directory.read_header().unwrap();
    let tags: Vec<u32> = entries.iter().map(|e| e.tag).collect();
    assert_eq!(tags, [THREAD_LIST_STREAM, MODULE_LIST_STREAM, HANDLE_DATA_STREAM]);

    let structure = directory.decode(&entries).unwrap();
    assert_eq!(structure, build_structure());

    let threads = structure.list(THREAD_LIST_STREAM).unwrap();
    assert_eq!(threads.count(), 1);
    assert_eq!(threads.elements()[0].uint("thread_id"), Some(0x1F04));

    let handles = structure.record(HANDLE_DATA_STREAM).unwrap();
    assert_eq!(handles.uint("size_of_descriptor"), Some(40));
}

#[test]
fn test_resolve_module_pointers() {
    let data = build_buffer();
    let directory = StreamDirectory::new(&data, presets::minidump_layout().unwrap());
    let structure = directory.decode_all().unwrap();
    let module = &structure.list(MODULE_LIST_STREAM).unwrap().elements()[0];

    let mut cursor = directory.cursor();
    cursor.seek(40).unwrap();

    let name = module.pointer("module_name_rva").unwrap();
    assert_eq!(name.origin(), 40 + 52 + 4);
    let Some(Decoded::Bytes(raw_name)) = name.resolve(&mut cursor).unwrap() else {
        panic!("expected name bytes");
    };
    assert_eq!(presets::decode_utf16_name(&raw_name), MODULE_NAME);
    assert_eq!(cursor.position(), 40);

    let cv = module.pointer("cv_record_rva").unwrap();
    let size = module.uint("cv_record_data_size").unwrap() as usize;
    assert_eq!(cv.resolve_raw(&mut cursor, size).unwrap(), Some(CV_RECORD));
    assert!(matches!(
        cv.resolve(&mut cursor),
        Err(StreamError::MissingTarget { .. })
    ));
    assert_eq!(cursor.position(), 40);

    let misc = module.pointer("misc_record_rva").unwrap();
    assert!(misc.is_null());
    assert_eq!(misc.resolve_raw(&mut cursor, 16).unwrap(), None);
}

#[test]
fn test_dangling_pointer_restores_cursor() {
    let data = build_buffer();
    let directory = StreamDirectory::new(&data, presets::minidump_layout().unwrap());
    let structure = directory.decode_all().unwrap();
    let thread = &structure.list(THREAD_LIST_STREAM).unwrap().elements()[0];

    let mut cursor = directory.cursor();
    cursor.seek(12).unwrap();
    let context = thread.pointer("context_rva").unwrap();
    let err = context.resolve_raw(&mut cursor, 0x4D0).unwrap_err();
    assert!(matches!(err, StreamError::OutOfBounds { offset: 0x10_0000, .. }));
    assert_eq!(cursor.position(), 12);
}

#[test]
fn test_canonical_reencode() {
    let data = build_buffer();
    let layout = presets::minidump_layout().unwrap();
    let structure = StreamDirectory::new(&data, layout.clone())
        .decode_all()
        .unwrap();

    // Pointee data outside the stream bodies is not carried over
    let canonical = StreamDirectory::encode(&structure, &layout).unwrap();
    assert_eq!(canonical, &data[..BODIES_END]);

    let again = StreamDirectory::new(&canonical, layout.clone())
        .decode_all()
        .unwrap();
    assert_eq!(StreamDirectory::encode(&again, &layout).unwrap(), canonical);
}

#[test]
fn test_truncated_dump_fails_whole_decode() {
    let data = build_buffer();
    // Cut inside the module list body but keep the header intact
    let truncated = &data[..100];
    let directory = StreamDirectory::new(truncated, presets::minidump_layout().unwrap());

    let err = directory.decode_all().unwrap_err();
    assert!(matches!(
        err,
        StreamError::Stream {
            tag: MODULE_LIST_STREAM,
            ..
        }
    ));
}
