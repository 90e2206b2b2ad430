//! Seams to the external CTF codecs.
//!
//! The metadata grammar parser, the per-file binary decoder and the CTF
//! writer codec live behind these traits; the components in this crate
//! only drive them. Implementations report failures through
//! [`CodecError`]; the calling component attaches path context.

use crate::error::CodecError;
use crate::model::{Event, Field, Notification, Stream, Trace};
use crate::types::ByteOrder;
use std::path::Path;
use std::sync::Arc;

/// Options forwarded to the metadata decoder. Clock class offsets shift
/// every clock class the decoder creates.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct MetadataOptions {
    pub clock_class_offset_s: i64,
    pub clock_class_offset_ns: i64,
}

/// The CTF metadata decoder: TSDL grammar parsing and metadata-stream
/// de-packetizing.
pub trait MetadataDecoder: Send + Sync {
    /// Parses textual CTF metadata into a trace schema tree.
    fn parse(&self, text: &str, options: &MetadataOptions) -> Result<Arc<Trace>, CodecError>;

    /// Reconstructs the textual metadata from the contents of a
    /// packetized metadata file. `byte_order` is the one sniffed from the
    /// packet magic.
    fn depacketize(&self, bytes: &[u8], byte_order: ByteOrder) -> Result<String, CodecError>;
}

/// Decoded header and context structures of a stream file's first packet.
#[derive(Clone, Debug, Default)]
pub struct FirstPacketFields {
    pub header: Option<Field>,
    pub context: Option<Field>,
}

/// The low-level binary decoder for stream files of a given trace.
pub trait StreamDecoder: Send + Sync {
    /// Decodes only the first packet's header and context structures of
    /// the stream file at `path`.
    fn first_packet_fields(
        &self,
        trace: &Arc<Trace>,
        path: &Path,
    ) -> Result<FirstPacketFields, CodecError>;

    /// Opens the stream file at `path` for full decoding. Notifications
    /// produced by the returned reader reference `stream`.
    fn open(
        &self,
        trace: &Arc<Trace>,
        stream: &Arc<Stream>,
        path: &Path,
    ) -> Result<Box<dyn StreamFileReader>, CodecError>;
}

/// Decodes one stream file into notifications.
///
/// A well-formed file yields `(PacketBegin Event* PacketEnd)+` and then
/// `Ok(None)`.
pub trait StreamFileReader: Send {
    fn next(&mut self) -> Result<Option<Notification>, CodecError>;
}

/// The CTF writer codec: turns mirrored packets back into bytes.
pub trait WriterCodec: Send + Sync {
    /// Creates an encoder for a fresh output trace rooted at `dir`. The
    /// directory exists and is empty when this is called.
    fn create(&self, dir: &Path, trace: &Arc<Trace>) -> Result<Box<dyn TraceEncoder>, CodecError>;
}

/// Byte emission for one output trace. The encoder owns the on-disk form:
/// the textual metadata file and one data file per output stream.
pub trait TraceEncoder: Send {
    /// Writes one finished packet of `stream` to that stream's data file.
    fn flush_packet(
        &mut self,
        stream: &Arc<Stream>,
        packet_context: Option<&Field>,
        events: &[Arc<Event>],
    ) -> Result<(), CodecError>;

    /// Emits the metadata file and closes every open stream file.
    fn finalize(&mut self) -> Result<(), CodecError>;
}
