//! The in-memory trace tree.
//!
//! Ownership is exclusive downward (Trace ⊃ StreamClass ⊃ EventClass;
//! Trace ⊃ ClockClass; StreamClass ⊃ Stream ⊃ Packet ⊃ Event) with weak
//! back-pointers upward. Schema nodes are shared via `Arc` so they outlive
//! every notification that references them.

use crate::error::Error;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering::Relaxed};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use uuid::Uuid;

pub mod copy;
pub mod fields;

pub use fields::{EnvValue, Field, FieldType, ScalarField, StructLayout, StructMember};

/// Stable identity of a schema-tree object.
///
/// Dense ids issued at construction; the sink's mirroring maps key on
/// these instead of addresses.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Relaxed))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A clock class. Identified by identity, not value, within one trace.
#[derive(Clone, Debug)]
pub struct ClockClass {
    identity: ObjectId,
    name: String,
    frequency: u64,
    offset_seconds: i64,
    offset_cycles: u64,
    precision: u64,
    unix_epoch_origin: bool,
    description: Option<String>,
    uuid: Option<Uuid>,
}

impl ClockClass {
    pub fn new<N: Into<String>>(name: N, frequency: u64) -> Self {
        ClockClass {
            identity: ObjectId::next(),
            name: name.into(),
            frequency,
            offset_seconds: 0,
            offset_cycles: 0,
            precision: 0,
            unix_epoch_origin: false,
            description: None,
            uuid: None,
        }
    }

    pub fn with_offset(mut self, seconds: i64, cycles: u64) -> Self {
        self.offset_seconds = seconds;
        self.offset_cycles = cycles;
        self
    }

    pub fn with_precision(mut self, precision: u64) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_unix_epoch_origin(mut self, unix_epoch_origin: bool) -> Self {
        self.unix_epoch_origin = unix_epoch_origin;
        self
    }

    pub fn with_description<D: Into<String>>(mut self, description: D) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn identity(&self) -> ObjectId {
        self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn offset_seconds(&self) -> i64 {
        self.offset_seconds
    }

    pub fn offset_cycles(&self) -> u64 {
        self.offset_cycles
    }

    pub fn precision(&self) -> u64 {
        self.precision
    }

    pub fn unix_epoch_origin(&self) -> bool {
        self.unix_epoch_origin
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    /// Converts a raw cycle count into nanoseconds since the clock's epoch.
    pub fn ns_from_epoch(&self, cycles: u64) -> i64 {
        let frequency = i128::from(self.frequency.max(1));
        let total_cycles = i128::from(self.offset_cycles) + i128::from(cycles);
        let cycles_ns = if frequency == 1_000_000_000 {
            total_cycles
        } else {
            total_cycles * 1_000_000_000 / frequency
        };
        (i128::from(self.offset_seconds) * 1_000_000_000 + cycles_ns) as i64
    }
}

/// A trace: the root of the schema tree.
#[derive(Debug)]
pub struct Trace {
    identity: ObjectId,
    uuid: Option<Uuid>,
    env: BTreeMap<String, EnvValue>,
    packet_header: Option<StructLayout>,
    clock_classes: RwLock<Vec<Arc<ClockClass>>>,
    stream_classes: RwLock<Vec<Arc<StreamClass>>>,
    is_static: AtomicBool,
}

impl Trace {
    pub fn new(
        uuid: Option<Uuid>,
        env: BTreeMap<String, EnvValue>,
        packet_header: Option<StructLayout>,
    ) -> Arc<Self> {
        Arc::new(Trace {
            identity: ObjectId::next(),
            uuid,
            env,
            packet_header,
            clock_classes: RwLock::new(Vec::new()),
            stream_classes: RwLock::new(Vec::new()),
            is_static: AtomicBool::new(false),
        })
    }

    pub fn identity(&self) -> ObjectId {
        self.identity
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn env(&self) -> &BTreeMap<String, EnvValue> {
        &self.env
    }

    pub fn packet_header(&self) -> Option<&StructLayout> {
        self.packet_header.as_ref()
    }

    /// Adds a clock class, idempotently: a clock class with the same name
    /// (or the same UUID) is considered already present and returned
    /// instead.
    pub fn add_clock_class(&self, clock_class: Arc<ClockClass>) -> Arc<ClockClass> {
        let mut clock_classes = self
            .clock_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = clock_classes.iter().find(|cc| {
            cc.name() == clock_class.name()
                || (cc.uuid().is_some() && cc.uuid() == clock_class.uuid())
        }) {
            return Arc::clone(existing);
        }
        clock_classes.push(Arc::clone(&clock_class));
        clock_class
    }

    pub fn clock_classes(&self) -> Vec<Arc<ClockClass>> {
        self.clock_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clock_class_by_name(&self, name: &str) -> Option<Arc<ClockClass>> {
        self.clock_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|cc| cc.name() == name)
            .cloned()
    }

    pub fn stream_classes(&self) -> Vec<Arc<StreamClass>> {
        self.stream_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stream_class_by_id(&self, id: u64) -> Option<Arc<StreamClass>> {
        self.stream_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|sc| sc.id() == Some(id))
            .cloned()
    }

    /// The trace's only stream class, when it has exactly one.
    pub fn single_stream_class(&self) -> Option<Arc<StreamClass>> {
        let stream_classes = self
            .stream_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match stream_classes.as_slice() {
            [sc] => Some(Arc::clone(sc)),
            _ => None,
        }
    }

    /// Marks the trace static: all the streams it will ever have exist.
    /// Subsequent stream class additions fail.
    pub fn set_static(&self) {
        self.is_static.store(true, Relaxed);
    }

    pub fn is_static(&self) -> bool {
        self.is_static.load(Relaxed)
    }
}

/// Construction-time properties of a stream class.
#[derive(Clone, Debug, Default)]
pub struct StreamClassSpec {
    pub id: Option<u64>,
    pub event_header: Option<StructLayout>,
    pub event_context: Option<StructLayout>,
    pub packet_context: Option<StructLayout>,
    pub clock: Option<Arc<ClockClass>>,
}

/// A stream class. `id` is unique within its trace; it may be absent when
/// the trace has a single stream class.
#[derive(Debug)]
pub struct StreamClass {
    identity: ObjectId,
    id: Option<u64>,
    trace: Weak<Trace>,
    event_header: Option<StructLayout>,
    event_context: Option<StructLayout>,
    packet_context: Option<StructLayout>,
    clock: Option<Arc<ClockClass>>,
    event_classes: RwLock<Vec<Arc<EventClass>>>,
}

impl StreamClass {
    /// Creates a stream class and attaches it to `trace`.
    pub fn create(trace: &Arc<Trace>, spec: StreamClassSpec) -> Result<Arc<Self>, Error> {
        if trace.is_static() {
            return Err(Error::TraceIsStatic);
        }
        let mut stream_classes = trace
            .stream_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = spec.id {
            if stream_classes.iter().any(|sc| sc.id() == Some(id)) {
                return Err(Error::DuplicateStreamClassId(id));
            }
        }
        let stream_class = Arc::new(StreamClass {
            identity: ObjectId::next(),
            id: spec.id,
            trace: Arc::downgrade(trace),
            event_header: spec.event_header,
            event_context: spec.event_context,
            packet_context: spec.packet_context,
            clock: spec.clock,
            event_classes: RwLock::new(Vec::new()),
        });
        stream_classes.push(Arc::clone(&stream_class));
        Ok(stream_class)
    }

    pub fn identity(&self) -> ObjectId {
        self.identity
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn trace(&self) -> Option<Arc<Trace>> {
        self.trace.upgrade()
    }

    pub fn event_header(&self) -> Option<&StructLayout> {
        self.event_header.as_ref()
    }

    pub fn event_context(&self) -> Option<&StructLayout> {
        self.event_context.as_ref()
    }

    pub fn packet_context(&self) -> Option<&StructLayout> {
        self.packet_context.as_ref()
    }

    pub fn clock(&self) -> Option<&Arc<ClockClass>> {
        self.clock.as_ref()
    }

    pub fn event_classes(&self) -> Vec<Arc<EventClass>> {
        self.event_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn event_class_by_id(&self, id: u64) -> Option<Arc<EventClass>> {
        self.event_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|ec| ec.id() == id)
            .cloned()
    }
}

/// An event class. `(stream class id, event class id)` is unique within a
/// trace. Event classes may be added after the trace went static: some
/// producers announce them lazily.
#[derive(Debug)]
pub struct EventClass {
    identity: ObjectId,
    id: u64,
    name: String,
    payload: Option<StructLayout>,
    stream_class: Weak<StreamClass>,
}

impl EventClass {
    /// Creates an event class and attaches it to `stream_class`.
    pub fn create<N: Into<String>>(
        stream_class: &Arc<StreamClass>,
        id: u64,
        name: N,
        payload: Option<StructLayout>,
    ) -> Result<Arc<Self>, Error> {
        let mut event_classes = stream_class
            .event_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if event_classes.iter().any(|ec| ec.id() == id) {
            return Err(Error::DuplicateEventClassId(id));
        }
        let event_class = Arc::new(EventClass {
            identity: ObjectId::next(),
            id,
            name: name.into(),
            payload,
            stream_class: Arc::downgrade(stream_class),
        });
        event_classes.push(Arc::clone(&event_class));
        Ok(event_class)
    }

    pub fn identity(&self) -> ObjectId {
        self.identity
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Option<&StructLayout> {
        self.payload.as_ref()
    }

    pub fn stream_class(&self) -> Option<Arc<StreamClass>> {
        self.stream_class.upgrade()
    }
}

/// A stream: a logical sequence of packets sharing a stream class. May
/// span multiple on-disk files.
#[derive(Debug)]
pub struct Stream {
    identity: ObjectId,
    class: Arc<StreamClass>,
    instance_id: Option<u64>,
}

impl Stream {
    pub fn new(class: Arc<StreamClass>, instance_id: Option<u64>) -> Arc<Self> {
        Arc::new(Stream {
            identity: ObjectId::next(),
            class,
            instance_id,
        })
    }

    pub fn identity(&self) -> ObjectId {
        self.identity
    }

    pub fn class(&self) -> &Arc<StreamClass> {
        &self.class
    }

    pub fn instance_id(&self) -> Option<u64> {
        self.instance_id
    }
}

/// A packet boundary value. Transient: appears only in notifications.
#[derive(Clone, Debug)]
pub struct Packet {
    pub stream: Arc<Stream>,
    pub context: Option<Field>,
}

/// A decoded event. Transient: appears only in notifications.
#[derive(Clone, Debug)]
pub struct Event {
    pub class: Arc<EventClass>,
    pub stream: Arc<Stream>,
    pub header: Option<Field>,
    pub stream_context: Option<Field>,
    pub context: Option<Field>,
    pub payload: Option<Field>,
}

/// What a source iterator produces, one per `next()`.
///
/// For a single stream the sequence always matches
/// `(PacketBegin Event* PacketEnd)*`.
#[derive(Clone, Debug)]
pub enum Notification {
    PacketBegin(Arc<Packet>),
    Event(Arc<Event>),
    PacketEnd(Arc<Packet>),
}

/// Per-trace clock class priorities.
///
/// Covers every clock class of the trace exactly once. The priority value
/// is a placeholder for a future cross-stream ordering policy; only
/// presence is meaningful today.
#[derive(Debug, Default)]
pub struct ClockClassPriorityMap {
    entries: Vec<(Arc<ClockClass>, u64)>,
}

impl ClockClassPriorityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, clock_class: Arc<ClockClass>, priority: u64) {
        match self
            .entries
            .iter_mut()
            .find(|(cc, _)| cc.identity() == clock_class.identity())
        {
            Some(entry) => entry.1 = priority,
            None => self.entries.push((clock_class, priority)),
        }
    }

    pub fn priority(&self, clock_class: &ClockClass) -> Option<u64> {
        self.entries
            .iter()
            .find(|(cc, _)| cc.identity() == clock_class.identity())
            .map(|(_, priority)| *priority)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<ClockClass>, u64)> {
        self.entries.iter().map(|(cc, priority)| (cc, *priority))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn static_trace_refuses_new_stream_classes() {
        let trace = Trace::new(None, Default::default(), None);
        let sc = StreamClass::create(
            &trace,
            StreamClassSpec {
                id: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        trace.set_static();
        assert!(matches!(
            StreamClass::create(&trace, Default::default()),
            Err(Error::TraceIsStatic)
        ));
        // Lazy event class additions are still allowed.
        EventClass::create(&sc, 0, "sched_switch", None).unwrap();
        assert_eq!(sc.event_classes().len(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let trace = Trace::new(None, Default::default(), None);
        let spec = StreamClassSpec {
            id: Some(3),
            ..Default::default()
        };
        let sc = StreamClass::create(&trace, spec.clone()).unwrap();
        assert!(matches!(
            StreamClass::create(&trace, spec),
            Err(Error::DuplicateStreamClassId(3))
        ));
        EventClass::create(&sc, 9, "a", None).unwrap();
        assert!(matches!(
            EventClass::create(&sc, 9, "b", None),
            Err(Error::DuplicateEventClassId(9))
        ));
    }

    #[test]
    fn single_stream_class_resolution() {
        let trace = Trace::new(None, Default::default(), None);
        assert!(trace.single_stream_class().is_none());
        let sc = StreamClass::create(&trace, Default::default()).unwrap();
        assert_eq!(
            trace.single_stream_class().map(|s| s.identity()),
            Some(sc.identity())
        );
        StreamClass::create(
            &trace,
            StreamClassSpec {
                id: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(trace.single_stream_class().is_none());
    }

    #[test]
    fn clock_ns_from_epoch() {
        // 1 GHz: cycles are nanoseconds.
        let cc = ClockClass::new("monotonic", 1_000_000_000).with_offset(2, 500);
        assert_eq!(cc.ns_from_epoch(100), 2_000_000_000 + 500 + 100);

        // 1 kHz: one cycle is a millisecond.
        let khz = ClockClass::new("slow", 1_000);
        assert_eq!(khz.ns_from_epoch(3), 3_000_000);

        // Pre-epoch result stays signed here.
        let pre = ClockClass::new("pre", 1_000_000_000).with_offset(-10, 0);
        assert!(pre.ns_from_epoch(0) < 0);
    }

    #[test]
    fn add_clock_class_is_idempotent_by_name() {
        let trace = Trace::new(None, Default::default(), None);
        let first = trace.add_clock_class(Arc::new(ClockClass::new("monotonic", 1_000_000_000)));
        let again = trace.add_clock_class(Arc::new(ClockClass::new("monotonic", 1_000_000_000)));
        assert_eq!(first.identity(), again.identity());
        assert_eq!(trace.clock_classes().len(), 1);
        trace.add_clock_class(Arc::new(ClockClass::new("realtime", 1_000_000_000)));
        assert_eq!(trace.clock_classes().len(), 2);
    }

    #[test]
    fn priority_map_covers_each_clock_once() {
        let a = Arc::new(ClockClass::new("a", 1));
        let b = Arc::new(ClockClass::new("b", 1));
        let mut map = ClockClassPriorityMap::new();
        map.add(Arc::clone(&a), 0);
        map.add(Arc::clone(&b), 0);
        map.add(Arc::clone(&a), 7);
        assert_eq!(map.len(), 2);
        assert_eq!(map.priority(&a), Some(7));
        assert_eq!(map.priority(&b), Some(0));
        assert_eq!(map.priority(&ClockClass::new("a", 1)), None);
    }
}
