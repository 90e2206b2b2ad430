pub use crate::codec::{
    FirstPacketFields, MetadataDecoder, MetadataOptions, StreamDecoder, StreamFileReader,
    TraceEncoder, WriterCodec,
};
pub use crate::config::{SinkParams, SourceParams};
pub use crate::error::{Error, ProtocolError};
pub use crate::model::{Notification, Trace};
pub use crate::query::{metadata_info, MetadataInfo};
pub use crate::sink::CtfFsSink;
pub use crate::source::iter::SourceIterator;
pub use crate::source::{CtfFsSource, CtfFsTrace, SourcePort};
pub use crate::types::{ByteOrder, Interruptor, PreEpochTimestamps};
