//! PE image checksum, as computed by `MapFileAndCheckSum`.

/// Computes the checksum of `data`, treating the 4 bytes at `checksum_offset` as zero.
///
/// The image is summed as little-endian 16-bit words with the carries folded back in, and
/// the file length is added to the folded sum.
#[must_use]
pub fn pe_checksum(data: &[u8], checksum_offset: usize) -> u32 {
    let file_size = data.len();
    let skip = checksum_offset..checksum_offset.saturating_add(4);

    let mut sum: u64 = 0;
    let mut i = 0;
    while i + 1 < file_size {
        if !skip.contains(&i) {
            sum += u64::from(u16::from_le_bytes([data[i], data[i + 1]]));
        }
        i += 2;
    }

    if i < file_size && !skip.contains(&i) {
        sum += u64::from(data[i]);
    }

    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    // The folded sum fits into 16 bits and PE images are limited to 4 GiB
    #[allow(clippy::cast_possible_truncation)]
    let checksum = (sum as u32).wrapping_add(file_size as u32);
    checksum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_checksum_field() {
        let mut data: Vec<u8> = (0..=255).collect();
        let before = pe_checksum(&data, 64);
        data[64..68].copy_from_slice(&[0xFF; 4]);
        assert_eq!(pe_checksum(&data, 64), before);
    }

    #[test]
    fn small_values() {
        // 0x0201 + 0x0003 + length 3
        assert_eq!(pe_checksum(&[0x01, 0x02, 0x03], 100), 0x0204 + 3);
        // Carries fold back into the low word
        assert_eq!(pe_checksum(&[0xFF, 0xFF, 0x02, 0x00], 100), 0x0002 + 4);
    }
}
