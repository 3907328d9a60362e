//! CRC64-ISO shard fingerprints
//!
//! Every shard is fingerprinted with CRC-64/GO-ISO (the ISO 3309 polynomial)
//! before it leaves the codec. The fingerprint guards against accidental
//! corruption of a shard in transit or at rest; it is not a cryptographic
//! digest.

use crc::{Crc, CRC_64_GO_ISO};

const CRC64_ISO: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Compute the CRC-64/GO-ISO checksum of a byte slice.
pub fn crc64_iso(data: &[u8]) -> u64 {
    CRC64_ISO.checksum(data)
}

/// Compute the CRC-64/GO-ISO checksum formatted as lowercase,
/// zero-padded 16-hex. This is the shard hash stored in manifests and
/// embedded in shard storage keys.
pub fn crc64_iso_hex16(data: &[u8]) -> String {
    format!("{:016x}", crc64_iso(data))
}
