//! CRC32 helper exposed to generated runtimes, per the generated-module
//! interface's "runtime imports: bit reader, bit writer, CRC32 helper, ..."
//! contract.

/// Computes the CRC-32 (IEEE 802.3 polynomial) checksum of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_of_empty_is_zero() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}
