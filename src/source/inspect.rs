//! First-packet inspection of a stream file.

use crate::codec::StreamDecoder;
use crate::error::Error;
use crate::model::{Field, StreamClass, StructMember, Trace};
use crate::types::PreEpochTimestamps;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const STREAM_ID_FIELD: &str = "stream_id";
const STREAM_INSTANCE_ID_FIELD: &str = "stream_instance_id";
const TIMESTAMP_BEGIN_FIELD: &str = "timestamp_begin";

/// What the first packet of a stream file reveals about its stream.
#[derive(Clone, Debug)]
pub struct DataStreamInfo {
    pub stream_class: Arc<StreamClass>,
    pub instance_id: Option<u64>,
    pub begin_ns: Option<u64>,
}

/// Decodes the first packet's header and context structures of the stream
/// file at `path` and extracts its grouping key.
pub fn inspect(
    trace: &Arc<Trace>,
    decoder: &dyn StreamDecoder,
    path: &Path,
    pre_epoch: PreEpochTimestamps,
) -> Result<DataStreamInfo, Error> {
    let fields = decoder
        .first_packet_fields(trace, path)
        .map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let instance_id = fields
        .header
        .as_ref()
        .and_then(|header| header.member(STREAM_INSTANCE_ID_FIELD))
        .and_then(Field::as_unsigned);
    let stream_class = stream_class_from_packet_header(trace, fields.header.as_ref())
        .ok_or_else(|| Error::NoStreamClass(path.to_path_buf()))?;
    let begin_ns = timestamp_begin_ns(&stream_class, fields.context.as_ref(), pre_epoch);

    Ok(DataStreamInfo {
        stream_class,
        instance_id,
        begin_ns,
    })
}

/// Resolves the stream class named by the packet header's `stream_id`
/// field. When the field (or the whole header) is absent, a trace with
/// exactly one stream class resolves to that class; otherwise the id is
/// required.
fn stream_class_from_packet_header(
    trace: &Trace,
    header: Option<&Field>,
) -> Option<Arc<StreamClass>> {
    match header
        .and_then(|header| header.member(STREAM_ID_FIELD))
        .and_then(Field::as_unsigned)
    {
        Some(id) => trace.stream_class_by_id(id),
        None => trace.single_stream_class(),
    }
}

/// Converts the packet context's `timestamp_begin` from raw clock cycles
/// to nanoseconds since epoch through the clock class mapped by the
/// stream class's packet context layout.
fn timestamp_begin_ns(
    stream_class: &StreamClass,
    context: Option<&Field>,
    pre_epoch: PreEpochTimestamps,
) -> Option<u64> {
    let raw = context?
        .member(TIMESTAMP_BEGIN_FIELD)
        .and_then(Field::as_unsigned)?;
    let clock = stream_class
        .packet_context()?
        .member(TIMESTAMP_BEGIN_FIELD)
        .and_then(StructMember::mapped_clock)?;
    let ns = clock.ns_from_epoch(raw);
    if ns < 0 && pre_epoch == PreEpochTimestamps::Ignore {
        debug!("Ignoring pre-epoch timestamp_begin ({ns} ns)");
        return None;
    }
    Some(ns as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FirstPacketFields;
    use crate::model::{
        ClockClass, FieldType, ScalarField, StreamClassSpec, StructLayout, StructMember,
    };
    use pretty_assertions::assert_eq;

    struct CannedDecoder(FirstPacketFields);

    impl StreamDecoder for CannedDecoder {
        fn first_packet_fields(
            &self,
            _trace: &Arc<Trace>,
            _path: &Path,
        ) -> Result<FirstPacketFields, crate::error::CodecError> {
            Ok(self.0.clone())
        }

        fn open(
            &self,
            _trace: &Arc<Trace>,
            _stream: &Arc<crate::model::Stream>,
            _path: &Path,
        ) -> Result<Box<dyn crate::codec::StreamFileReader>, crate::error::CodecError> {
            unimplemented!("inspection never opens the file")
        }
    }

    fn trace_with_clocked_class(offset_seconds: i64) -> Arc<Trace> {
        let trace = Trace::new(None, Default::default(), None);
        let clock = trace.add_clock_class(Arc::new(
            ClockClass::new("monotonic", 1_000_000_000).with_offset(offset_seconds, 0),
        ));
        StreamClass::create(
            &trace,
            StreamClassSpec {
                id: Some(0),
                packet_context: Some(StructLayout::new(vec![StructMember::new(
                    TIMESTAMP_BEGIN_FIELD,
                    FieldType::UnsignedInteger {
                        mapped_clock: Some(clock),
                    },
                )])),
                ..Default::default()
            },
        )
        .unwrap();
        trace
    }

    fn header(stream_id: Option<u64>, instance_id: Option<u64>) -> Field {
        let mut members = Vec::new();
        if let Some(id) = stream_id {
            members.push(Field::Scalar(
                Some(STREAM_ID_FIELD.into()),
                ScalarField::UnsignedInteger(id),
            ));
        }
        if let Some(id) = instance_id {
            members.push(Field::Scalar(
                Some(STREAM_INSTANCE_ID_FIELD.into()),
                ScalarField::UnsignedInteger(id),
            ));
        }
        Field::Structure(None, members)
    }

    fn context(timestamp_begin: u64) -> Field {
        Field::Structure(
            None,
            vec![Field::Scalar(
                Some(TIMESTAMP_BEGIN_FIELD.into()),
                ScalarField::UnsignedInteger(timestamp_begin),
            )],
        )
    }

    #[test]
    fn full_header_and_context() {
        let trace = trace_with_clocked_class(0);
        let decoder = CannedDecoder(FirstPacketFields {
            header: Some(header(Some(0), Some(7))),
            context: Some(context(100)),
        });
        let info = inspect(
            &trace,
            &decoder,
            Path::new("stream_0"),
            PreEpochTimestamps::Wrap,
        )
        .unwrap();
        assert_eq!(info.instance_id, Some(7));
        assert_eq!(info.begin_ns, Some(100));
        assert_eq!(info.stream_class.id(), Some(0));
    }

    #[test]
    fn absent_stream_id_resolves_single_stream_class() {
        let trace = trace_with_clocked_class(0);
        let decoder = CannedDecoder(FirstPacketFields {
            header: None,
            context: None,
        });
        let info = inspect(
            &trace,
            &decoder,
            Path::new("stream"),
            PreEpochTimestamps::Wrap,
        )
        .unwrap();
        assert_eq!(info.stream_class.id(), Some(0));
        assert_eq!(info.instance_id, None);
        assert_eq!(info.begin_ns, None);
    }

    #[test]
    fn absent_stream_id_with_two_stream_classes_fails() {
        let trace = trace_with_clocked_class(0);
        StreamClass::create(
            &trace,
            StreamClassSpec {
                id: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        let decoder = CannedDecoder(FirstPacketFields::default());
        assert!(matches!(
            inspect(
                &trace,
                &decoder,
                Path::new("stream"),
                PreEpochTimestamps::Wrap
            ),
            Err(Error::NoStreamClass(_))
        ));
    }

    #[test]
    fn pre_epoch_policy() {
        // Clock 10 s before the epoch: raw 0 converts to -10 s in ns.
        let trace = trace_with_clocked_class(-10);
        let fields = FirstPacketFields {
            header: Some(header(Some(0), None)),
            context: Some(context(0)),
        };

        let wrapped = inspect(
            &trace,
            &CannedDecoder(fields.clone()),
            Path::new("s"),
            PreEpochTimestamps::Wrap,
        )
        .unwrap();
        assert_eq!(wrapped.begin_ns, Some((-10_000_000_000_i64) as u64));

        let ignored = inspect(
            &trace,
            &CannedDecoder(fields),
            Path::new("s"),
            PreEpochTimestamps::Ignore,
        )
        .unwrap();
        assert_eq!(ignored.begin_ns, None);
    }
}
