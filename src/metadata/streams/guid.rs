use crate::Result;

/// View of the `#GUID` heap: 16-byte entries addressed by 1-based index.
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Wraps a `#GUID` heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap length is not a multiple of 16.
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "#GUID heap size {} is not a multiple of 16",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// Returns the GUID at the 1-based `index`; index 0 is the nil GUID.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an index past the heap.
    pub fn get(&self, index: usize) -> Result<[u8; 16]> {
        if index == 0 {
            return Ok([0; 16]);
        }

        let start = (index - 1) * 16;
        let Some(bytes) = self.data.get(start..start + 16) else {
            return Err(out_of_bounds_error!());
        };

        let mut guid = [0u8; 16];
        guid.copy_from_slice(bytes);
        Ok(guid)
    }
}

/// Formats a GUID in its registry form, `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
#[must_use]
pub fn format_guid(guid: &[u8; 16]) -> String {
    format!(
        "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        u32::from_le_bytes([guid[0], guid[1], guid[2], guid[3]]),
        u16::from_le_bytes([guid[4], guid[5]]),
        u16::from_le_bytes([guid[6], guid[7]]),
        guid[8],
        guid[9],
        guid[10],
        guid[11],
        guid[12],
        guid[13],
        guid[14],
        guid[15]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let mut data = vec![0u8; 32];
        data[16] = 0x01;
        let heap = Guid::from(&data).unwrap();

        assert_eq!(heap.get(0).unwrap(), [0; 16]);
        assert_eq!(heap.get(2).unwrap()[0], 0x01);
        assert!(heap.get(3).is_err());
        assert!(Guid::from(&data[..5]).is_err());
    }

    #[test]
    fn formatting() {
        let guid = [
            0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        assert_eq!(format_guid(&guid), "00112233-4455-6677-8899-aabbccddeeff");
    }
}
