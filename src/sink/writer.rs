//! Output trace writers and per-stream packet state.

use crate::codec::{TraceEncoder, WriterCodec};
use crate::error::{Error, ProtocolError};
use crate::model::{Event, Field, ObjectId, Stream, Trace};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Packet life cycle of one output stream.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum StreamState {
    Uninit,
    PacketOpen,
    PacketClosed,
    Final,
}

/// Mirror-side state of one output stream: the stream object, the packet
/// currently being assembled, and where it is in its life cycle.
pub(crate) struct SinkStream {
    trace_key: ObjectId,
    stream: Arc<Stream>,
    state: StreamState,
    packet_context: Option<Field>,
    events: Vec<Arc<Event>>,
}

impl SinkStream {
    pub(crate) fn new(trace_key: ObjectId, stream: Arc<Stream>) -> Self {
        SinkStream {
            trace_key,
            stream,
            state: StreamState::Uninit,
            packet_context: None,
            events: Vec::new(),
        }
    }

    /// Identity of the input trace this stream mirrors from.
    pub(crate) fn trace_key(&self) -> ObjectId {
        self.trace_key
    }

    pub(crate) fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }

    pub(crate) fn open_packet(&mut self, context: Option<Field>) -> Result<(), ProtocolError> {
        match self.state {
            StreamState::Uninit | StreamState::PacketClosed => {
                self.state = StreamState::PacketOpen;
                self.packet_context = context;
                self.events.clear();
                Ok(())
            }
            StreamState::PacketOpen => Err(ProtocolError::PacketAlreadyOpen),
            StreamState::Final => Err(ProtocolError::StreamFinalized),
        }
    }

    pub(crate) fn append_event(&mut self, event: Arc<Event>) -> Result<(), ProtocolError> {
        match self.state {
            StreamState::PacketOpen => {
                self.events.push(event);
                Ok(())
            }
            StreamState::Uninit => Err(ProtocolError::EventBeforePacketBegin),
            StreamState::PacketClosed => Err(ProtocolError::EventOutsidePacket),
            StreamState::Final => Err(ProtocolError::StreamFinalized),
        }
    }

    /// Closes the open packet, handing its context and events to the
    /// caller for flushing.
    pub(crate) fn close_packet(
        &mut self,
    ) -> Result<(Option<Field>, Vec<Arc<Event>>), ProtocolError> {
        match self.state {
            StreamState::PacketOpen => {
                self.state = StreamState::PacketClosed;
                Ok((self.packet_context.take(), std::mem::take(&mut self.events)))
            }
            StreamState::Uninit | StreamState::PacketClosed => {
                Err(ProtocolError::PacketEndWithoutBegin)
            }
            StreamState::Final => Err(ProtocolError::StreamFinalized),
        }
    }

    pub(crate) fn finish(&mut self) {
        self.state = StreamState::Final;
        self.packet_context = None;
        self.events.clear();
    }
}

/// Owns one output trace: its directory, schema tree and byte encoder.
pub struct TraceWriter {
    dir: PathBuf,
    trace: Arc<Trace>,
    encoder: Box<dyn TraceEncoder>,
}

impl TraceWriter {
    /// Creates the output directory and the codec encoder for it.
    pub(crate) fn create(
        codec: &dyn WriterCodec,
        dir: PathBuf,
        trace: Arc<Trace>,
    ) -> Result<Self, Error> {
        debug!("Creating output trace in `{}`", dir.display());
        std::fs::create_dir_all(&dir).map_err(|source| Error::Io {
            path: dir.clone(),
            source,
        })?;
        let encoder = codec
            .create(&dir, &trace)
            .map_err(|source| Error::Encode {
                dir: dir.clone(),
                source,
            })?;
        Ok(TraceWriter {
            dir,
            trace,
            encoder,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The output trace schema this writer assembles.
    pub fn trace(&self) -> &Arc<Trace> {
        &self.trace
    }

    pub(crate) fn flush_packet(
        &mut self,
        stream: &Arc<Stream>,
        packet_context: Option<&Field>,
        events: &[Arc<Event>],
    ) -> Result<(), Error> {
        self.encoder
            .flush_packet(stream, packet_context, events)
            .map_err(|source| Error::Encode {
                dir: self.dir.clone(),
                source,
            })
    }

    pub(crate) fn finalize(&mut self) -> Result<(), Error> {
        self.encoder.finalize().map_err(|source| Error::Encode {
            dir: self.dir.clone(),
            source,
        })
    }
}
