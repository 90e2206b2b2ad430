//! The `metadata-info` out-of-band query.

use crate::codec::MetadataDecoder;
use crate::error::Error;
use crate::source::discovery::METADATA_FILENAME;
use crate::types::ByteOrder;
use std::fs;
use std::path::Path;

/// Signature at the head of textual CTF metadata.
pub const METADATA_TEXT_SIGNATURE: &str = "/* CTF 1.8";

/// Magic number opening a packetized metadata packet header.
const PACKETIZED_METADATA_MAGIC: u32 = 0x75d1_1d57;

/// Result of the `metadata-info` query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataInfo {
    /// The full textual metadata, always starting with the CTF signature.
    pub text: String,
    /// Whether the on-disk metadata was stored in packetized form.
    pub is_packetized: bool,
}

/// Sniffs whether metadata bytes are packetized, and in which byte order.
pub fn packetized_byte_order(bytes: &[u8]) -> Option<ByteOrder> {
    let magic: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    if u32::from_le_bytes(magic) == PACKETIZED_METADATA_MAGIC {
        Some(ByteOrder::LittleEndian)
    } else if u32::from_be_bytes(magic) == PACKETIZED_METADATA_MAGIC {
        Some(ByteOrder::BigEndian)
    } else {
        None
    }
}

/// Answers `metadata-info` for the trace directory at `path`: the textual
/// metadata (de-packetized if needed) plus the packetized flag.
pub fn metadata_info(path: &Path, decoder: &dyn MetadataDecoder) -> Result<MetadataInfo, Error> {
    let metadata_path = path.join(METADATA_FILENAME);
    let bytes = fs::read(&metadata_path).map_err(|source| Error::Io {
        path: metadata_path.clone(),
        source,
    })?;

    let (text, is_packetized) = match packetized_byte_order(&bytes) {
        Some(byte_order) => {
            let text = decoder
                .depacketize(&bytes, byte_order)
                .map_err(|source| Error::Metadata {
                    path: metadata_path,
                    source,
                })?;
            (text, true)
        }
        None => (String::from_utf8_lossy(&bytes).into_owned(), false),
    };

    let text = if text.starts_with(METADATA_TEXT_SIGNATURE) {
        text
    } else {
        format!("{METADATA_TEXT_SIGNATURE} */\n\n{text}")
    };

    Ok(MetadataInfo {
        text,
        is_packetized,
    })
}
