//! Per-port notification iteration over a stream file group.

use crate::codec::{StreamDecoder, StreamFileReader};
use crate::error::{Error, ProtocolError};
use crate::model::Notification;
use crate::source::group::StreamFileGroup;
use crate::types::Interruptor;
use std::sync::Arc;
use tracing::debug;

/// Cursor over a group's ordered file list. Delegates per-file decoding
/// to the stream decoder and advances across file boundaries seamlessly,
/// so the consumer sees one logical stream.
pub struct SourceIterator {
    decoder: Arc<dyn StreamDecoder>,
    group: Arc<StreamFileGroup>,
    interruptor: Interruptor,
    file_idx: usize,
    reader: Option<Box<dyn StreamFileReader>>,
}

impl SourceIterator {
    pub(crate) fn new(
        decoder: Arc<dyn StreamDecoder>,
        group: Arc<StreamFileGroup>,
        interruptor: Interruptor,
    ) -> Result<Self, Error> {
        let mut iterator = SourceIterator {
            decoder,
            group,
            interruptor,
            file_idx: 0,
            reader: None,
        };
        iterator.reader = Some(iterator.open_current()?);
        Ok(iterator)
    }

    /// The group this iterator walks.
    pub fn group(&self) -> &Arc<StreamFileGroup> {
        &self.group
    }

    /// Produces the next notification of the logical stream. `Ok(None)`
    /// is the terminal end; every error is terminal for this stream.
    pub fn next_notification(&mut self) -> Result<Option<Notification>, Error> {
        // Cancellation is only observed between reads.
        if self.interruptor.is_set() {
            self.reader = None;
            return Ok(None);
        }
        let current_path = match self.group.files().get(self.file_idx) {
            Some(file) => file.path.clone(),
            None => return Ok(None),
        };
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let next = reader.next().map_err(|source| Error::Decode {
            path: current_path.clone(),
            source,
        })?;
        if let Some(notification) = next {
            return Ok(Some(notification));
        }

        // Current file exhausted: move on within the group.
        self.file_idx += 1;
        if self.file_idx == self.group.files().len() {
            self.reader = None;
            return Ok(None);
        }

        let next_path = self.group.files()[self.file_idx].path.clone();
        let mut reader = self.open_current()?;
        match reader.next().map_err(|source| Error::Decode {
            path: next_path.clone(),
            source,
        })? {
            Some(notification) => {
                self.reader = Some(reader);
                Ok(Some(notification))
            }
            // Empty stream files never make it into a group, so a fresh
            // file must yield at least one packet.
            None => {
                self.reader = None;
                Err(ProtocolError::FreshStreamFileEnd(next_path).into())
            }
        }
    }

    /// Releases the open reader and the cursor. Idempotent.
    pub fn finalize(&mut self) {
        self.reader = None;
    }

    fn open_current(&self) -> Result<Box<dyn StreamFileReader>, Error> {
        let file = &self.group.files()[self.file_idx];
        debug!("Opening stream file `{}`", file.path.display());
        self.decoder
            .open(self.group.trace(), self.group.stream(), &file.path)
            .map_err(|source| Error::Decode {
                path: file.path.clone(),
                source,
            })
    }
}

impl Iterator for SourceIterator {
    type Item = Result<Notification, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_notification().transpose()
    }
}
