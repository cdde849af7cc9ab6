/// Binary decoders for fixed-layout cell payloads.
pub mod decode;
/// In-memory implementations of the reader ports.
pub mod memory;
/// The external-reader ports the engine consumes.
pub mod source;
/// Scalar values, storage classes, and the source column model.
pub mod types;

pub use source::{ArtifactReader, RawRecord, RecordCursor, RegistryReader, TableMeta};
pub use types::{ColumnKind, DecodedRow, ScalarValue, SourceColumn, StorageClass};
