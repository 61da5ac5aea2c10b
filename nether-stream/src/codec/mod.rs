//! Record and list codecs
//!
//! Fixed records are read and written field by field through a
//! [`RecordSpec`](crate::spec::RecordSpec). Lists are a u32 element count
//! followed by that many fixed records.

mod fixed;
mod list;

pub use fixed::{decode_record, encode_record, write_record};
pub use list::{ListStream, decode_list, encode_list, write_list};
