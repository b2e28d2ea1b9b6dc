use crate::{file::io::read_le, Result};

/// Names of the streams a metadata root may list.
pub const VALID_STREAM_NAMES: [&str; 8] = [
    "#Strings", "#US", "#Blob", "#GUID", "#~", "#-", "#Pdb", "#JTD",
];

/// One entry of the stream directory in the metadata root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Name of the stream
    pub name: String,
}

impl StreamHeader {
    /// Parses a stream header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too short and
    /// [`crate::Error::Malformed`] for an unknown stream name.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(out_of_bounds_error!());
        }

        let name_bytes: Vec<u8> = data[8..]
            .iter()
            .take(32)
            .take_while(|byte| **byte != 0)
            .copied()
            .collect();
        let name = String::from_utf8_lossy(&name_bytes).to_string();

        if !VALID_STREAM_NAMES.iter().any(|valid_name| name == *valid_name) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// Size of this header in the directory: offset, size and the name padded to 4 bytes.
    #[must_use]
    pub fn header_size(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }
}
