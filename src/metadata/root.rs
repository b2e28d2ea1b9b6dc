//! The metadata root (ECMA-335 II.24.2.1): signature, runtime version and stream directory.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Result,
};

/// Magic signature of the metadata root, `BSJB`.
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Parsed metadata root with its stream headers.
#[derive(Debug, Clone)]
pub struct Root {
    /// Magic signature, always [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Length of the padded version string
    pub length: u32,
    /// Runtime version string, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved flags
    pub flags: u16,
    /// Stream headers in the order they appear
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parses the metadata root from the start of `data`, which must span the whole metadata.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a wrong signature or an inconsistent stream
    /// directory, and [`crate::Error::OutOfBounds`] if a stream lies outside `data`.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(out_of_bounds_error!());
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let length = read_le_at::<u32>(data, &mut 12)?;
        let Some(version_end) = (length as usize).checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                length
            ));
        };
        if version_end + 4 > data.len() {
            return Err(out_of_bounds_error!());
        }

        let version = String::from_utf8_lossy(&data[16..version_end])
            .trim_end_matches('\0')
            .to_string();

        let mut offset = version_end;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 || usize::from(stream_count) * 9 > data.len() {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        for _ in 0..stream_count {
            if offset >= data.len() {
                return Err(out_of_bounds_error!());
            }

            let stream = StreamHeader::from(&data[offset..])?;
            match stream.offset.checked_add(stream.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(out_of_bounds_error!()),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        stream.offset,
                        stream.size
                    ))
                }
            }

            offset += stream.header_size();
            stream_headers.push(stream);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            length,
            version,
            flags,
            stream_headers,
        })
    }

    /// Looks up a stream header by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|stream| stream.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x42, 0x53, 0x4A, 0x42,
            0x01, 0x00,
            0x01, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x08, 0x00, 0x00, 0x00,
            b'v', b'4', b'.', b'0', 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
            0x01, 0x00,

            0x24, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00,
            0x23, 0x7E, 0x00, 0x00,

            0x00, 0x00, 0x00, 0x00,
        ];

        let root = Root::read(&header_bytes).unwrap();

        assert_eq!(root.signature, CIL_HEADER_MAGIC);
        assert_eq!(root.major_version, 1);
        assert_eq!(root.length, 8);
        assert_eq!(root.version, "v4.0");
        assert_eq!(root.stream_headers.len(), 1);
        assert_eq!(root.stream("#~").map(|s| s.offset), Some(0x24));
        assert!(root.stream("#Strings").is_none());
    }

    #[test]
    fn bad_signature() {
        let mut header_bytes = [0u8; 32];
        header_bytes[0] = 0x42;
        assert!(matches!(
            Root::read(&header_bytes),
            Err(crate::Error::Malformed { .. })
        ));
    }
}
