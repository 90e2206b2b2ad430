use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by codec implementations behind the traits in
/// [`crate::codec`].
pub type CodecError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid component parameters. {0}")]
    Params(#[source] serde_json::Error),

    #[error("Opening a trace in `/` is not supported")]
    RootIsFilesystemRoot,

    #[error("No CTF traces recursively found in `{}`", .0.display())]
    NoTracesFound(PathBuf),

    #[error("I/O error on `{}`. {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse the metadata of trace `{}`. {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Cannot decode stream file `{}`. {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Cannot write output trace `{}`. {source}", .dir.display())]
    Encode {
        dir: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Cannot add a stream class to a static trace")]
    TraceIsStatic,

    #[error("Duplicate stream class ID {0} within a trace")]
    DuplicateStreamClassId(u64),

    #[error("Duplicate event class ID {0} within a stream class")]
    DuplicateEventClassId(u64),

    #[error("Cannot determine the stream class of stream file `{}`", .0.display())]
    NoStreamClass(PathBuf),

    #[error("A schema object outlived its owning trace")]
    DanglingParent,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Violations of the notification ordering contract. These indicate a
/// pipeline or producer bug, not a recoverable condition for the stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Fresh stream file `{}` ended before its first packet", .0.display())]
    FreshStreamFileEnd(PathBuf),

    #[error("Event received for a stream with no preceding packet beginning")]
    EventBeforePacketBegin,

    #[error("Event received for a stream whose current packet is closed")]
    EventOutsidePacket,

    #[error("Packet end received for a stream with no preceding packet beginning")]
    PacketEndWithoutBegin,

    #[error("Packet begin received while the previous packet is still open")]
    PacketAlreadyOpen,

    #[error("Notification received for a finalized stream")]
    StreamFinalized,

    #[error("Stream class of an incoming stream was never mirrored")]
    StreamClassNotMirrored,
}
