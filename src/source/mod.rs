//! The filesystem source component: discovers CTF traces on disk and
//! exposes one output port per logical stream.

pub mod discovery;
pub mod group;
pub mod inspect;
pub mod iter;

use crate::codec::{MetadataDecoder, StreamDecoder};
use crate::config::SourceParams;
use crate::error::Error;
use crate::model::{ClockClassPriorityMap, Trace};
use crate::query;
use crate::source::discovery::DiscoveredTrace;
use crate::source::group::StreamFileGroup;
use crate::source::iter::SourceIterator;
use crate::types::Interruptor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A source output port. One per stream file group; named after the
/// path of the group's earliest stream file.
#[derive(Clone)]
pub struct SourcePort {
    name: String,
    group: Arc<StreamFileGroup>,
}

impl SourcePort {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port userdata: the bound stream file group.
    pub fn group(&self) -> &Arc<StreamFileGroup> {
        &self.group
    }
}

/// One discovered trace: its schema tree, clock class priorities and
/// stream file groups.
pub struct CtfFsTrace {
    path: PathBuf,
    name: String,
    trace: Arc<Trace>,
    cc_prio_map: ClockClassPriorityMap,
    groups: Vec<Arc<StreamFileGroup>>,
}

impl CtfFsTrace {
    fn create(
        params: &SourceParams,
        discovered: &DiscoveredTrace,
        metadata_decoder: &dyn MetadataDecoder,
        stream_decoder: &dyn StreamDecoder,
    ) -> Result<Self, Error> {
        let metadata = query::metadata_info(&discovered.path, metadata_decoder)?;
        let trace = metadata_decoder
            .parse(&metadata.text, &params.metadata_options())
            .map_err(|source| Error::Metadata {
                path: discovered.path.clone(),
                source,
            })?;

        let groups: Vec<Arc<StreamFileGroup>> = group::group(
            &trace,
            &discovered.path,
            stream_decoder,
            params.pre_epoch_timestamps,
        )?
        .into_iter()
        .map(Arc::new)
        .collect();

        let mut cc_prio_map = ClockClassPriorityMap::new();
        for clock_class in trace.clock_classes() {
            cc_prio_map.add(clock_class, 0);
        }

        // The groups created every stream this trace will ever have, so
        // the trace can go static now.
        trace.set_static();

        Ok(CtfFsTrace {
            path: discovered.path.clone(),
            name: discovered.name.clone(),
            trace,
            cc_prio_map,
            groups,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trace(&self) -> &Arc<Trace> {
        &self.trace
    }

    pub fn clock_class_priorities(&self) -> &ClockClassPriorityMap {
        &self.cc_prio_map
    }

    pub fn groups(&self) -> &[Arc<StreamFileGroup>] {
        &self.groups
    }
}

/// The filesystem source component.
pub struct CtfFsSource {
    stream_decoder: Arc<dyn StreamDecoder>,
    traces: Vec<CtfFsTrace>,
    ports: Vec<SourcePort>,
    interruptor: Interruptor,
}

impl CtfFsSource {
    /// Initializes the source: discovers traces under `params.path`,
    /// builds their models and publishes one port per stream file group.
    ///
    /// A trace whose metadata or stream files cannot be understood is
    /// skipped with a message; the remaining traces proceed. Discovery
    /// failures and an empty usable set are fatal.
    pub fn new(
        params: SourceParams,
        metadata_decoder: Arc<dyn MetadataDecoder>,
        stream_decoder: Arc<dyn StreamDecoder>,
    ) -> Result<Self, Error> {
        let discovered = discovery::discover(&params.path)?;

        let mut traces = Vec::new();
        for candidate in discovered {
            match CtfFsTrace::create(
                &params,
                &candidate,
                metadata_decoder.as_ref(),
                stream_decoder.as_ref(),
            ) {
                Ok(trace) => traces.push(trace),
                Err(e) => warn!("Skipping trace `{}`. {e}", candidate.path.display()),
            }
        }
        if traces.is_empty() {
            return Err(Error::NoTracesFound(params.path));
        }

        let mut ports = Vec::new();
        for trace in &traces {
            for group in &trace.groups {
                let name = group.files()[0].path.display().to_string();
                debug!("Creating one port named `{name}`");
                ports.push(SourcePort {
                    name,
                    group: Arc::clone(group),
                });
            }
        }

        Ok(CtfFsSource {
            stream_decoder,
            traces,
            ports,
            interruptor: Interruptor::new(),
        })
    }

    pub fn traces(&self) -> &[CtfFsTrace] {
        &self.traces
    }

    pub fn ports(&self) -> &[SourcePort] {
        &self.ports
    }

    /// A handle that cancels this source's iterators between reads.
    pub fn interruptor(&self) -> Interruptor {
        self.interruptor.clone()
    }

    /// Opens a notification iterator on `port`.
    pub fn iterator(&self, port: &SourcePort) -> Result<SourceIterator, Error> {
        SourceIterator::new(
            Arc::clone(&self.stream_decoder),
            Arc::clone(port.group()),
            self.interruptor.clone(),
        )
    }

    /// Releases every trace and port. Idempotent.
    pub fn finalize(&mut self) {
        self.ports.clear();
        self.traces.clear();
    }
}
