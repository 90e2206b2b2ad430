//! Grouping of a trace's stream files into logical streams.

use crate::codec::StreamDecoder;
use crate::error::Error;
use crate::model::{Stream, StreamClass, Trace};
use crate::source::discovery::METADATA_FILENAME;
use crate::source::inspect;
use crate::types::PreEpochTimestamps;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A stream file and its ordering key within a group. Immutable once
/// created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFileInfo {
    pub path: PathBuf,
    pub begin_ns: Option<u64>,
}

/// An ordered collection of stream files that together compose one
/// logical stream.
///
/// Files are sorted by `begin_ns` ascending; all of them share the
/// group's `(stream class, instance id)`. A file with no begin timestamp
/// is always alone in its group.
#[derive(Debug)]
pub struct StreamFileGroup {
    trace: Arc<Trace>,
    stream_class: Arc<StreamClass>,
    stream: Arc<Stream>,
    files: Vec<StreamFileInfo>,
}

impl StreamFileGroup {
    fn new(
        trace: Arc<Trace>,
        stream_class: Arc<StreamClass>,
        instance_id: Option<u64>,
    ) -> Self {
        let stream = Stream::new(Arc::clone(&stream_class), instance_id);
        StreamFileGroup {
            trace,
            stream_class,
            stream,
            files: Vec::new(),
        }
    }

    pub fn trace(&self) -> &Arc<Trace> {
        &self.trace
    }

    pub fn stream_class(&self) -> &Arc<StreamClass> {
        &self.stream_class
    }

    /// The logical stream this group composes. Created with the group;
    /// the trace has no other streams than the group streams.
    pub fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }

    pub fn files(&self) -> &[StreamFileInfo] {
        &self.files
    }

    /// Inserts at the position that keeps `begin_ns` ascending; ties keep
    /// insertion order.
    fn add_file(&mut self, file: StreamFileInfo) {
        let begin = file.begin_ns.unwrap_or(u64::MAX);
        let at = self
            .files
            .iter()
            .position(|other| begin < other.begin_ns.unwrap_or(u64::MAX))
            .unwrap_or(self.files.len());
        self.files.insert(at, file);
    }
}

/// Partitions the stream files of the trace directory at `dir` into
/// stream file groups keyed by `(stream class, instance id)`.
///
/// The `metadata` file, dot-files, non-regular files and empty files are
/// skipped.
pub fn group(
    trace: &Arc<Trace>,
    dir: &Path,
    decoder: &dyn StreamDecoder,
    pre_epoch: PreEpochTimestamps,
) -> Result<Vec<StreamFileGroup>, Error> {
    let entries = fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut groups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let path = entry.path();

        if file_name == METADATA_FILENAME {
            debug!("Ignoring metadata file `{}`", path.display());
            continue;
        }
        if file_name.starts_with('.') {
            debug!("Ignoring hidden file `{}`", path.display());
            continue;
        }
        let metadata = fs::metadata(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        if !metadata.is_file() {
            debug!("Ignoring non-regular file `{}`", path.display());
            continue;
        }
        if metadata.len() == 0 {
            debug!("Ignoring empty file `{}`", path.display());
            continue;
        }

        add_stream_file(trace, &mut groups, &path, decoder, pre_epoch)?;
    }
    Ok(groups)
}

fn add_stream_file(
    trace: &Arc<Trace>,
    groups: &mut Vec<StreamFileGroup>,
    path: &Path,
    decoder: &dyn StreamDecoder,
    pre_epoch: PreEpochTimestamps,
) -> Result<(), Error> {
    let info = inspect::inspect(trace, decoder, path, pre_epoch)?;

    // No begin timestamp means no key to order the file within a group,
    // so the file cannot share one even if it has an instance id.
    let instance_id = if info.begin_ns.is_none() {
        None
    } else {
        info.instance_id
    };
    let file = StreamFileInfo {
        path: path.to_path_buf(),
        begin_ns: info.begin_ns,
    };

    if instance_id.is_none() {
        let mut group = StreamFileGroup::new(
            Arc::clone(trace),
            info.stream_class,
            None,
        );
        group.add_file(file);
        groups.push(group);
        return Ok(());
    }

    match groups.iter_mut().find(|g| {
        g.stream_class.identity() == info.stream_class.identity()
            && g.stream.instance_id() == instance_id
    }) {
        Some(existing) => existing.add_file(file),
        None => {
            let mut group =
                StreamFileGroup::new(Arc::clone(trace), info.stream_class, instance_id);
            group.add_file(file);
            groups.push(group);
        }
    }
    Ok(())
}
