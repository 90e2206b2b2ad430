//! One-time deep copies of schema elements into an output trace.
//!
//! Copies preserve declared ids, names and layouts but mint fresh
//! identities; integer field types that map a clock class are re-mapped to
//! the output trace's clock class of the same name.

use crate::error::Error;
use crate::model::{
    ClockClass, Event, EventClass, FieldType, Stream, StreamClass, StreamClassSpec, StructLayout,
    StructMember, Trace,
};
use std::sync::Arc;

/// Copies a trace's top-level schema: UUID, environment, trace-level clock
/// classes and the packet header layout.
///
/// Stream classes are not copied here; the sink mirrors them lazily on
/// first sight.
pub fn copy_trace(trace: &Trace) -> Arc<Trace> {
    let clock_classes: Vec<Arc<ClockClass>> = trace
        .clock_classes()
        .iter()
        .map(|cc| Arc::new(duplicate_clock_class(cc)))
        .collect();
    let packet_header = trace
        .packet_header()
        .map(|layout| copy_struct_layout(layout, &clock_classes));
    let out = Trace::new(trace.uuid(), trace.env().clone(), packet_header);
    for clock_class in clock_classes {
        out.add_clock_class(clock_class);
    }
    out
}

/// Copies every clock class of `from` into `into`. Idempotent: clock
/// classes already present (by name or UUID) are left alone.
pub fn copy_clock_classes(from: &Trace, into: &Trace) {
    for clock_class in from.clock_classes() {
        into.add_clock_class(Arc::new(duplicate_clock_class(&clock_class)));
    }
}

/// Copies a stream class (its event header, event context and packet
/// context layouts) into `into`, re-mapping clock references.
pub fn copy_stream_class(stream_class: &StreamClass, into: &Arc<Trace>) -> Result<Arc<StreamClass>, Error> {
    let clock_classes = into.clock_classes();
    let spec = StreamClassSpec {
        id: stream_class.id(),
        event_header: stream_class
            .event_header()
            .map(|layout| copy_struct_layout(layout, &clock_classes)),
        event_context: stream_class
            .event_context()
            .map(|layout| copy_struct_layout(layout, &clock_classes)),
        packet_context: stream_class
            .packet_context()
            .map(|layout| copy_struct_layout(layout, &clock_classes)),
        clock: stream_class
            .clock()
            .and_then(|cc| into.clock_class_by_name(cc.name())),
    };
    StreamClass::create(into, spec)
}

/// Copies an event class (id, name, payload layout) into `into`.
pub fn copy_event_class(
    event_class: &EventClass,
    into: &Arc<StreamClass>,
) -> Result<Arc<EventClass>, Error> {
    let clock_classes = into
        .trace()
        .map(|trace| trace.clock_classes())
        .unwrap_or_default();
    EventClass::create(
        into,
        event_class.id(),
        event_class.name(),
        event_class
            .payload()
            .map(|layout| copy_struct_layout(layout, &clock_classes)),
    )
}

/// Copies an event's decoded values against an output event class and
/// stream.
pub fn copy_event(event: &Event, class: Arc<EventClass>, stream: Arc<Stream>) -> Event {
    Event {
        class,
        stream,
        header: event.header.clone(),
        stream_context: event.stream_context.clone(),
        context: event.context.clone(),
        payload: event.payload.clone(),
    }
}

fn duplicate_clock_class(clock_class: &ClockClass) -> ClockClass {
    let mut copy = ClockClass::new(clock_class.name(), clock_class.frequency())
        .with_offset(clock_class.offset_seconds(), clock_class.offset_cycles())
        .with_precision(clock_class.precision())
        .with_unix_epoch_origin(clock_class.unix_epoch_origin());
    if let Some(description) = clock_class.description() {
        copy = copy.with_description(description);
    }
    if let Some(uuid) = clock_class.uuid() {
        copy = copy.with_uuid(uuid);
    }
    copy
}

fn copy_struct_layout(layout: &StructLayout, clock_classes: &[Arc<ClockClass>]) -> StructLayout {
    StructLayout::new(
        layout
            .members
            .iter()
            .map(|member| {
                StructMember::new(
                    member.name.clone(),
                    copy_field_type(&member.ty, clock_classes),
                )
            })
            .collect(),
    )
}

fn copy_field_type(ty: &FieldType, clock_classes: &[Arc<ClockClass>]) -> FieldType {
    match ty {
        FieldType::UnsignedInteger { mapped_clock } => FieldType::UnsignedInteger {
            mapped_clock: mapped_clock.as_ref().and_then(|cc| {
                clock_classes
                    .iter()
                    .find(|candidate| candidate.name() == cc.name())
                    .cloned()
            }),
        },
        FieldType::Struct(inner) => FieldType::Struct(copy_struct_layout(inner, clock_classes)),
        other => other.clone(),
    }
}
