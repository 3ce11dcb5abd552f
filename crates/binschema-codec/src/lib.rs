//! Bit-level I/O runtime for binschema: readers and writers operating at
//! both bit and byte granularity, over buffer, file, or stream backings,
//! plus the four variable-length integer encodings the schema layer can
//! declare for a field.
//!
//! This crate has no notion of schemas, fields, or expressions — it is the
//! leaf of the stack, exercised directly by tests here and indirectly by
//! `binschema-plan`'s interpreter and every target `binschema-codegen`
//! emits.

pub mod bits;
pub mod crc;
pub mod errors;
pub mod reader;
pub mod source;
pub mod varint;
pub mod writer;

pub use bits::{BitOrder, Endianness};
pub use errors::{ReadError, WriteError};
pub use reader::Reader;
pub use source::{BufferSource, ByteSource, FileSource, StreamSource};
pub use varint::VarlenEncoding;
pub use writer::{Placeholder, Writer};
