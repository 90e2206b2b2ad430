//! The filesystem sink component: mirrors a notification stream back
//! into one or more on-disk CTF traces.
//!
//! Schema elements are copied lazily, at most once per input identity:
//! a writer per input trace, an output stream class per input stream
//! class, an output stream per input stream, and an output event class
//! per `(stream class, event class id)`. This also handles traces whose
//! event classes are announced lazily by the producer, and several input
//! traces fanning into the same sink.

pub mod writer;

use crate::codec::WriterCodec;
use crate::config::SinkParams;
use crate::error::{Error, ProtocolError};
use crate::model::{copy, Event, Notification, ObjectId, Packet, Stream, StreamClass, Trace};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use writer::{SinkStream, TraceWriter};

/// The filesystem sink component.
pub struct CtfFsSink {
    params: SinkParams,
    codec: Arc<dyn WriterCodec>,
    next_trace_id: u32,
    writers: HashMap<ObjectId, TraceWriter>,
    stream_classes: HashMap<ObjectId, Arc<StreamClass>>,
    streams: HashMap<ObjectId, SinkStream>,
    finalized: bool,
}

impl CtfFsSink {
    pub fn new(params: SinkParams, codec: Arc<dyn WriterCodec>) -> Self {
        CtfFsSink {
            params,
            codec,
            next_trace_id: 0,
            writers: HashMap::new(),
            stream_classes: HashMap::new(),
            streams: HashMap::new(),
            finalized: false,
        }
    }

    /// Output trace writers created so far, in no particular order.
    pub fn writers(&self) -> impl Iterator<Item = &TraceWriter> {
        self.writers.values()
    }

    /// Consumes one notification from the pipeline.
    pub fn consume(&mut self, notification: &Notification) -> Result<(), Error> {
        if self.finalized {
            return Err(ProtocolError::StreamFinalized.into());
        }
        match notification {
            Notification::PacketBegin(packet) => self.on_packet_begin(packet),
            Notification::Event(event) => self.on_event(event),
            Notification::PacketEnd(packet) => self.on_packet_end(packet),
        }
    }

    /// Emits every output trace's metadata, closes files and releases the
    /// mirroring state. Always succeeds; idempotent.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        for stream in self.streams.values_mut() {
            stream.finish();
        }
        for writer in self.writers.values_mut() {
            if let Err(e) = writer.finalize() {
                warn!(
                    "Cannot finalize output trace `{}`. {e}",
                    writer.dir().display()
                );
            }
        }
        self.streams.clear();
        self.stream_classes.clear();
        self.writers.clear();
    }

    fn on_packet_begin(&mut self, packet: &Packet) -> Result<(), Error> {
        let in_stream = &packet.stream;
        let in_sc = in_stream.class();
        let in_trace = in_sc.trace().ok_or(Error::DanglingParent)?;

        // Writer resolution: one output trace per input trace identity.
        let trace_key = in_trace.identity();
        let out_trace = match self.writers.get(&trace_key) {
            Some(existing) => Arc::clone(existing.trace()),
            None => {
                let writer = self.create_writer(&in_trace)?;
                let out_trace = Arc::clone(writer.trace());
                self.writers.insert(trace_key, writer);
                out_trace
            }
        };

        // Stream class resolution, copying clock classes first so layout
        // clock references resolve in the output trace.
        let sc_key = in_sc.identity();
        let out_sc = match self.stream_classes.get(&sc_key) {
            Some(existing) => Arc::clone(existing),
            None => {
                copy::copy_clock_classes(&in_trace, &out_trace);
                let out_sc = copy::copy_stream_class(in_sc, &out_trace)?;
                self.stream_classes.insert(sc_key, Arc::clone(&out_sc));
                out_sc
            }
        };

        // Stream resolution. A repeated packet begin on a known stream is
        // a new packet, not a new stream.
        let stream_key = in_stream.identity();
        let sink_stream = self.streams.entry(stream_key).or_insert_with(|| {
            debug!(
                "Mirroring stream {} (instance ID {:?})",
                stream_key,
                in_stream.instance_id()
            );
            SinkStream::new(trace_key, Stream::new(out_sc, in_stream.instance_id()))
        });
        sink_stream.open_packet(packet.context.clone())?;
        Ok(())
    }

    fn on_event(&mut self, event: &Event) -> Result<(), Error> {
        let sink_stream = self
            .streams
            .get_mut(&event.stream.identity())
            .ok_or(ProtocolError::EventBeforePacketBegin)?;
        let out_sc = self
            .stream_classes
            .get(&event.stream.class().identity())
            .ok_or(ProtocolError::StreamClassNotMirrored)?;

        let out_ec = match out_sc.event_class_by_id(event.class.id()) {
            Some(existing) => existing,
            None => copy::copy_event_class(&event.class, out_sc)?,
        };

        let out_event = copy::copy_event(event, out_ec, Arc::clone(sink_stream.stream()));
        sink_stream.append_event(Arc::new(out_event))?;
        Ok(())
    }

    fn on_packet_end(&mut self, packet: &Packet) -> Result<(), Error> {
        let sink_stream = self
            .streams
            .get_mut(&packet.stream.identity())
            .ok_or(ProtocolError::PacketEndWithoutBegin)?;
        let (packet_context, events) = sink_stream.close_packet()?;
        let out_stream = Arc::clone(sink_stream.stream());
        let trace_key = sink_stream.trace_key();

        let writer = self
            .writers
            .get_mut(&trace_key)
            .ok_or(Error::DanglingParent)?;
        writer.flush_packet(&out_stream, packet_context.as_ref(), &events)
    }

    fn create_writer(&mut self, in_trace: &Trace) -> Result<TraceWriter, Error> {
        let dir = self.params.path.join(format!(
            "{}_{:03}",
            self.params.trace_name, self.next_trace_id
        ));
        self.next_trace_id += 1;
        let out_trace = copy::copy_trace(in_trace);
        TraceWriter::create(self.codec.as_ref(), dir, out_trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TraceEncoder;
    use crate::error::CodecError;
    use crate::model::{
        ClockClass, EventClass, Field, ScalarField, StreamClassSpec, Trace,
    };
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Records flushed packets instead of emitting bytes.
    #[derive(Default)]
    struct RecordingCodec {
        flushes: Arc<Mutex<Vec<FlushRecord>>>,
        finalized_dirs: Arc<Mutex<Vec<PathBuf>>>,
    }

    #[derive(Clone, Debug)]
    struct FlushRecord {
        dir: PathBuf,
        stream_instance_id: Option<u64>,
        event_names: Vec<String>,
        context: Option<Field>,
    }

    impl WriterCodec for RecordingCodec {
        fn create(
            &self,
            dir: &Path,
            _trace: &Arc<Trace>,
        ) -> Result<Box<dyn TraceEncoder>, CodecError> {
            Ok(Box::new(RecordingEncoder {
                dir: dir.to_path_buf(),
                flushes: Arc::clone(&self.flushes),
                finalized_dirs: Arc::clone(&self.finalized_dirs),
            }))
        }
    }

    struct RecordingEncoder {
        dir: PathBuf,
        flushes: Arc<Mutex<Vec<FlushRecord>>>,
        finalized_dirs: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl TraceEncoder for RecordingEncoder {
        fn flush_packet(
            &mut self,
            stream: &Arc<Stream>,
            packet_context: Option<&Field>,
            events: &[Arc<Event>],
        ) -> Result<(), CodecError> {
            self.flushes.lock().unwrap().push(FlushRecord {
                dir: self.dir.clone(),
                stream_instance_id: stream.instance_id(),
                event_names: events.iter().map(|e| e.class.name().to_string()).collect(),
                context: packet_context.cloned(),
            });
            Ok(())
        }

        fn finalize(&mut self) -> Result<(), CodecError> {
            self.finalized_dirs.lock().unwrap().push(self.dir.clone());
            Ok(())
        }
    }

    fn input_trace() -> Arc<Trace> {
        let trace = Trace::new(None, Default::default(), None);
        trace.add_clock_class(Arc::new(ClockClass::new("monotonic", 1_000_000_000)));
        let sc = StreamClass::create(
            &trace,
            StreamClassSpec {
                id: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        EventClass::create(&sc, 0, "alpha", None).unwrap();
        EventClass::create(&sc, 1, "beta", None).unwrap();
        trace
    }

    fn packet_begin(stream: &Arc<Stream>, context: Option<Field>) -> Notification {
        Notification::PacketBegin(Arc::new(Packet {
            stream: Arc::clone(stream),
            context,
        }))
    }

    fn packet_end(stream: &Arc<Stream>) -> Notification {
        Notification::PacketEnd(Arc::new(Packet {
            stream: Arc::clone(stream),
            context: None,
        }))
    }

    fn event(stream: &Arc<Stream>, event_class_id: u64) -> Notification {
        let class = stream.class().event_class_by_id(event_class_id).unwrap();
        Notification::Event(Arc::new(Event {
            class,
            stream: Arc::clone(stream),
            header: None,
            stream_context: None,
            context: None,
            payload: None,
        }))
    }

    fn sink_with_codec(base: &Path) -> (CtfFsSink, Arc<Mutex<Vec<FlushRecord>>>) {
        let codec = RecordingCodec::default();
        let flushes = Arc::clone(&codec.flushes);
        (
            CtfFsSink::new(SinkParams::new(base), Arc::new(codec)),
            flushes,
        )
    }

    #[test]
    fn mirrors_one_packet_with_events() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut sink, flushes) = sink_with_codec(tmp.path());

        let trace = input_trace();
        let stream = Stream::new(trace.stream_classes()[0].clone(), Some(7));
        let context = Field::Structure(
            None,
            vec![Field::Scalar(
                Some("packet_size".into()),
                ScalarField::UnsignedInteger(4096),
            )],
        );

        sink.consume(&packet_begin(&stream, Some(context.clone())))
            .unwrap();
        sink.consume(&event(&stream, 0)).unwrap();
        sink.consume(&event(&stream, 1)).unwrap();
        sink.consume(&packet_end(&stream)).unwrap();

        let flushes = flushes.lock().unwrap();
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].stream_instance_id, Some(7));
        assert_eq!(flushes[0].event_names, vec!["alpha", "beta"]);
        assert_eq!(flushes[0].context, Some(context));
        assert_eq!(
            flushes[0].dir,
            tmp.path().join("trace_000"),
        );
    }

    #[test]
    fn schema_copies_happen_at_most_once_per_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut sink, _flushes) = sink_with_codec(tmp.path());

        let trace = input_trace();
        let sc = trace.stream_classes()[0].clone();
        let stream_a = Stream::new(Arc::clone(&sc), Some(0));
        let stream_b = Stream::new(Arc::clone(&sc), Some(1));

        for _ in 0..3 {
            for stream in [&stream_a, &stream_b] {
                sink.consume(&packet_begin(stream, None)).unwrap();
                sink.consume(&event(stream, 0)).unwrap();
                sink.consume(&packet_end(stream)).unwrap();
            }
        }

        assert_eq!(sink.writers.len(), 1);
        assert_eq!(sink.stream_classes.len(), 1);
        assert_eq!(sink.streams.len(), 2);
        let out_trace = sink.writers().next().unwrap().trace();
        assert_eq!(out_trace.stream_classes().len(), 1);
        assert_eq!(out_trace.clock_classes().len(), 1);
        // Only the observed event class was mirrored, and only once.
        assert_eq!(out_trace.stream_classes()[0].event_classes().len(), 1);
    }

    #[test]
    fn distinct_traces_get_numbered_output_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut sink, _flushes) = sink_with_codec(tmp.path());

        for trace in [input_trace(), input_trace()] {
            let stream = Stream::new(trace.stream_classes()[0].clone(), None);
            sink.consume(&packet_begin(&stream, None)).unwrap();
            sink.consume(&packet_end(&stream)).unwrap();
        }

        let mut dirs: Vec<PathBuf> =
            sink.writers().map(|w| w.dir().to_path_buf()).collect();
        dirs.sort();
        assert_eq!(
            dirs,
            vec![tmp.path().join("trace_000"), tmp.path().join("trace_001")]
        );
        assert!(dirs.iter().all(|d| d.is_dir()));
    }

    #[test]
    fn lazily_announced_event_classes_are_mirrored_on_first_sight() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut sink, flushes) = sink_with_codec(tmp.path());

        let trace = input_trace();
        let sc = trace.stream_classes()[0].clone();
        let stream = Stream::new(Arc::clone(&sc), None);
        sink.consume(&packet_begin(&stream, None)).unwrap();

        // The producer announces a new event class mid-stream.
        EventClass::create(&sc, 9, "gamma", None).unwrap();
        sink.consume(&event(&stream, 9)).unwrap();
        sink.consume(&event(&stream, 9)).unwrap();
        sink.consume(&packet_end(&stream)).unwrap();

        let stream_classes = sink.writers().next().unwrap().trace().stream_classes();
        let out_sc = &stream_classes[0];
        assert_eq!(out_sc.event_classes().len(), 1);
        assert_eq!(out_sc.event_class_by_id(9).unwrap().name(), "gamma");
        assert_eq!(
            flushes.lock().unwrap()[0].event_names,
            vec!["gamma", "gamma"]
        );
    }

    #[test]
    fn protocol_violations_are_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut sink, _flushes) = sink_with_codec(tmp.path());

        let trace = input_trace();
        let stream = Stream::new(trace.stream_classes()[0].clone(), None);

        // Event and packet end before any packet begin.
        assert!(matches!(
            sink.consume(&event(&stream, 0)),
            Err(Error::Protocol(ProtocolError::EventBeforePacketBegin))
        ));
        assert!(matches!(
            sink.consume(&packet_end(&stream)),
            Err(Error::Protocol(ProtocolError::PacketEndWithoutBegin))
        ));

        sink.consume(&packet_begin(&stream, None)).unwrap();
        assert!(matches!(
            sink.consume(&packet_begin(&stream, None)),
            Err(Error::Protocol(ProtocolError::PacketAlreadyOpen))
        ));
        sink.consume(&packet_end(&stream)).unwrap();

        // Event between packets.
        assert!(matches!(
            sink.consume(&event(&stream, 0)),
            Err(Error::Protocol(ProtocolError::EventOutsidePacket))
        ));

        // A new packet begin on the same stream reuses the mirror.
        sink.consume(&packet_begin(&stream, None)).unwrap();
        sink.consume(&packet_end(&stream)).unwrap();
        assert_eq!(sink.streams.len(), 1);
    }

    #[test]
    fn finalize_is_idempotent_and_rejects_further_input() {
        let tmp = tempfile::tempdir().unwrap();
        let codec = RecordingCodec::default();
        let finalized_dirs = Arc::clone(&codec.finalized_dirs);
        let mut sink = CtfFsSink::new(SinkParams::new(tmp.path()), Arc::new(codec));

        let trace = input_trace();
        let stream = Stream::new(trace.stream_classes()[0].clone(), None);
        sink.consume(&packet_begin(&stream, None)).unwrap();
        sink.consume(&packet_end(&stream)).unwrap();

        sink.finalize();
        sink.finalize();
        assert_eq!(finalized_dirs.lock().unwrap().len(), 1);
        assert!(matches!(
            sink.consume(&packet_begin(&stream, None)),
            Err(Error::Protocol(ProtocolError::StreamFinalized))
        ));
    }
}
