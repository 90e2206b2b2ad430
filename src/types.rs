use derive_more::Display;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a component and the
/// pipeline driver. Iterators observe it between `next()` calls only; a
/// read in flight is allowed to complete first.
#[derive(Clone, Debug)]
#[repr(transparent)]
pub struct Interruptor(Arc<AtomicBool>);

impl Interruptor {
    pub fn new() -> Self {
        Interruptor(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(SeqCst)
    }
}

impl Default for Interruptor {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte order of a packetized metadata stream, as sniffed from its magic
/// number.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum ByteOrder {
    #[display(fmt = "little-endian")]
    LittleEndian,
    #[display(fmt = "big-endian")]
    BigEndian,
}

/// What to do with a `timestamp_begin` that falls before the clock's
/// epoch once converted to nanoseconds.
///
/// `Wrap` keeps the historical signed-to-unsigned cast (pre-epoch
/// timestamps become very large and sort last within their group).
/// `Ignore` treats the timestamp as absent, which forces the stream file
/// into a singleton group.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreEpochTimestamps {
    #[default]
    #[display(fmt = "wrap")]
    Wrap,
    #[display(fmt = "ignore")]
    Ignore,
}

impl FromStr for PreEpochTimestamps {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wrap" => Ok(PreEpochTimestamps::Wrap),
            "ignore" => Ok(PreEpochTimestamps::Ignore),
            _ => Err(format!(
                "'{s}' is not a pre-epoch timestamp policy ('wrap' or 'ignore')"
            )),
        }
    }
}
