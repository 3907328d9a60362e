//! Reed-Solomon Erasure Coding
//!
//! Implements RS(k, m) erasure coding in systematic form:
//! - k data shards (minimum required to reconstruct)
//! - m parity shards (redundancy)
//! - Any k of the k + m shards reconstruct the original payload
//!
//! Every shard is fingerprinted with CRC64-ISO as it is produced; the
//! fingerprints seed the object manifest's shard slots.

use crate::error::{Result, ZstoreError};
use crate::fingerprint::crc64_iso_hex16;
use crate::manifest::{ObjectManifest, ShardSlot};
use bytes::Bytes;
use rayon::prelude::*;
use reed_solomon_erasure::galois_8::ReedSolomon;

/// Reed-Solomon encoder for a fixed (k, m) configuration.
pub struct ErasureCodec {
    data_shards: usize,
    parity_shards: usize,
    rs: ReedSolomon,
}

impl ErasureCodec {
    /// Create a codec for `data_shards` (k) and `parity_shards` (m).
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 {
            return Err(ZstoreError::Encode("data_shards must be > 0".to_string()));
        }
        if parity_shards == 0 {
            return Err(ZstoreError::Encode("parity_shards must be > 0".to_string()));
        }
        let rs = ReedSolomon::new(data_shards, parity_shards)
            .map_err(|e| ZstoreError::Encode(e.to_string()))?;
        Ok(Self {
            data_shards,
            parity_shards,
            rs,
        })
    }

    /// Number of data shards (k).
    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    /// Number of parity shards (m).
    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    /// Total number of shards (k + m).
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Maximum number of shard losses that can be tolerated.
    pub fn max_failures(&self) -> usize {
        self.parity_shards
    }

    /// Encode a payload into `k + m` equal-length shards plus a manifest
    /// seed carrying the per-shard fingerprints.
    ///
    /// The first k shards are the (zero-padded) payload split; the last m
    /// are parity. The manifest seed has empty placement fields; the upload
    /// orchestrator stamps them after the shards land.
    pub fn encode(&self, payload: &[u8]) -> Result<(Vec<Bytes>, ObjectManifest)> {
        let mut shards = self.split_and_encode(payload)?;
        self.rs
            .encode(&mut shards)
            .map_err(|e| ZstoreError::Encode(e.to_string()))?;

        let shard_slots: Vec<ShardSlot> = shards
            .iter()
            .map(|shard| ShardSlot::unplaced(crc64_iso_hex16(shard)))
            .collect();

        let manifest = self.seed_manifest(payload.len(), shards[0].len(), shard_slots);
        Ok((shards.into_iter().map(Bytes::from).collect(), manifest))
    }

    /// Encode using parallel fingerprinting and shard conversion.
    ///
    /// Produces output identical to [`encode`](Self::encode); worthwhile
    /// for payloads above a few megabytes.
    pub fn encode_parallel(&self, payload: &[u8]) -> Result<(Vec<Bytes>, ObjectManifest)> {
        let mut shards = self.split_and_encode(payload)?;
        self.rs
            .encode(&mut shards)
            .map_err(|e| ZstoreError::Encode(e.to_string()))?;

        let shard_slots: Vec<ShardSlot> = shards
            .par_iter()
            .map(|shard| ShardSlot::unplaced(crc64_iso_hex16(shard)))
            .collect();

        let manifest = self.seed_manifest(payload.len(), shards[0].len(), shard_slots);
        Ok((
            shards.into_par_iter().map(Bytes::from).collect(),
            manifest,
        ))
    }

    /// Verify that a complete shard set is internally consistent.
    pub fn verify_shards(&self, shards: &[Bytes]) -> Result<bool> {
        if shards.len() != self.total_shards() {
            return Ok(false);
        }

        let expected_size = shards.first().map(|s| s.len()).unwrap_or(0);
        if !shards.iter().all(|s| s.len() == expected_size) {
            return Ok(false);
        }

        let shard_refs: Vec<&[u8]> = shards.iter().map(|s| s.as_ref()).collect();
        self.rs
            .verify(&shard_refs)
            .map_err(|e| ZstoreError::Encode(e.to_string()))
    }

    /// Split the payload into padded data shards and append zeroed parity
    /// shards, ready for RS encoding.
    fn split_and_encode(&self, payload: &[u8]) -> Result<Vec<Vec<u8>>> {
        if payload.is_empty() {
            return Err(ZstoreError::EmptyPayload);
        }

        let shard_size = payload.len().div_ceil(self.data_shards);
        let padded_size = shard_size * self.data_shards;
        let mut padded = payload.to_vec();
        padded.resize(padded_size, 0);

        let mut shards: Vec<Vec<u8>> = padded.chunks(shard_size).map(|c| c.to_vec()).collect();
        for _ in 0..self.parity_shards {
            shards.push(vec![0u8; shard_size]);
        }
        Ok(shards)
    }

    fn seed_manifest(
        &self,
        original_size: usize,
        shard_size: usize,
        shard_slots: Vec<ShardSlot>,
    ) -> ObjectManifest {
        ObjectManifest {
            prefix: String::new(),
            file_name: String::new(),
            original_size: original_size as i64,
            shard_size: shard_size as i64,
            parity_shards: self.parity_shards,
            shard_slots,
        }
    }
}

/// Convenience function: encode a payload with an ad-hoc (k, m).
pub fn encode(payload: &[u8], data_shards: usize, parity_shards: usize) -> Result<(Vec<Bytes>, ObjectManifest)> {
    ErasureCodec::new(data_shards, parity_shards)?.encode(payload)
}

/// Reconstruct the original payload from a sparse shard set.
///
/// `shards` must have exactly `k + m` entries, index-ordered to match the
/// manifest's slots, with `None` marking missing shards. At least k shards
/// must be present. The output is trimmed to the manifest's
/// `original_size`.
pub fn decode(shards: &mut Vec<Option<Vec<u8>>>, manifest: &ObjectManifest) -> Result<Vec<u8>> {
    let total_shards = manifest.total_shards();
    let data_shards = manifest.data_shards();

    if shards.len() != total_shards {
        return Err(ZstoreError::Decode(format!(
            "expected {} shard slots, got {}",
            total_shards,
            shards.len()
        )));
    }

    let available = shards.iter().filter(|s| s.is_some()).count();
    if available < data_shards {
        return Err(ZstoreError::InsufficientShards {
            available,
            required: data_shards,
        });
    }

    let rs = ReedSolomon::new(data_shards, manifest.parity_shards)
        .map_err(|e| ZstoreError::Decode(e.to_string()))?;
    rs.reconstruct(shards)
        .map_err(|e| ZstoreError::Decode(e.to_string()))?;

    let mut payload = Vec::with_capacity(data_shards * manifest.shard_size as usize);
    for shard in shards.iter().take(data_shards) {
        match shard {
            Some(data) => payload.extend_from_slice(data),
            None => {
                return Err(ZstoreError::Decode(
                    "reconstruction left a data shard missing".to_string(),
                ))
            }
        }
    }

    payload.truncate(manifest.original_size as usize);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_payload(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i % 256) as u8).collect()
    }

    fn as_sparse(shards: &[Bytes]) -> Vec<Option<Vec<u8>>> {
        shards.iter().map(|s| Some(s.to_vec())).collect()
    }

    #[test]
    fn test_codec_rejects_zero_shards() {
        assert!(ErasureCodec::new(0, 2).is_err());
        assert!(ErasureCodec::new(4, 0).is_err());
    }

    #[test]
    fn test_encode_rejects_empty_payload() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let result = codec.encode(b"");
        assert!(matches!(result, Err(ZstoreError::EmptyPayload)));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let payload = generate_payload(1024);

        let (shards, manifest) = codec.encode(&payload).unwrap();
        assert_eq!(shards.len(), 6);
        assert_eq!(manifest.original_size, 1024);
        assert_eq!(manifest.parity_shards, 2);
        assert!(shards.iter().all(|s| s.len() == manifest.shard_size as usize));

        let mut sparse = as_sparse(&shards);
        let decoded = decode(&mut sparse, &manifest).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_with_max_missing_shards() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let payload = generate_payload(10_000);

        let (shards, manifest) = codec.encode(&payload).unwrap();
        let mut sparse = as_sparse(&shards);
        sparse[0] = None; // data shard
        sparse[5] = None; // parity shard

        let decoded = decode(&mut sparse, &manifest).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_too_many_missing() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let payload = generate_payload(512);

        let (shards, manifest) = codec.encode(&payload).unwrap();
        let mut sparse = as_sparse(&shards);
        sparse[0] = None;
        sparse[1] = None;
        sparse[2] = None;

        let result = decode(&mut sparse, &manifest);
        assert!(matches!(
            result,
            Err(ZstoreError::InsufficientShards {
                available: 3,
                required: 4
            })
        ));
    }

    #[test]
    fn test_exactly_k_shards_decode() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let payload = generate_payload(4096);

        let (shards, manifest) = codec.encode(&payload).unwrap();
        let mut sparse = as_sparse(&shards);
        sparse[1] = None;
        sparse[3] = None;

        let decoded = decode(&mut sparse, &manifest).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_payload_smaller_than_k() {
        // Last data shard zero-pads; original_size drives the trim.
        let codec = ErasureCodec::new(4, 2).unwrap();
        let payload = b"abc";

        let (shards, manifest) = codec.encode(payload).unwrap();
        assert_eq!(manifest.shard_size, 1);

        let mut sparse = as_sparse(&shards);
        let decoded = decode(&mut sparse, &manifest).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_manifest_seed_hashes() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let payload = generate_payload(2048);

        let (shards, manifest) = codec.encode(&payload).unwrap();
        for (shard, slot) in shards.iter().zip(manifest.shard_slots.iter()) {
            assert_eq!(slot.hash, crc64_iso_hex16(shard));
            assert!(!slot.is_resolved());
        }
    }

    #[test]
    fn test_encode_parallel_matches_sequential() {
        let codec = ErasureCodec::new(6, 3).unwrap();
        let payload = generate_payload(1024 * 1024);

        let (seq_shards, seq_manifest) = codec.encode(&payload).unwrap();
        let (par_shards, par_manifest) = codec.encode_parallel(&payload).unwrap();

        assert_eq!(seq_shards, par_shards);
        assert_eq!(seq_manifest, par_manifest);
    }

    #[test]
    fn test_verify_shards() {
        let codec = ErasureCodec::new(4, 2).unwrap();
        let payload = generate_payload(600);

        let (shards, _) = codec.encode(&payload).unwrap();
        assert!(codec.verify_shards(&shards).unwrap());

        let mut corrupted = shards.clone();
        let mut bytes = corrupted[0].to_vec();
        bytes[0] ^= 0xFF;
        corrupted[0] = Bytes::from(bytes);
        assert!(!codec.verify_shards(&corrupted).unwrap());
    }

    #[test]
    fn test_convenience_encode() {
        let payload = generate_payload(300);
        let (shards, manifest) = encode(&payload, 3, 2).unwrap();
        assert_eq!(shards.len(), 5);
        assert_eq!(manifest.data_shards(), 3);

        let mut sparse = as_sparse(&shards);
        sparse[4] = None;
        let decoded = decode(&mut sparse, &manifest).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_wrong_slot_count() {
        let payload = generate_payload(100);
        let (shards, manifest) = encode(&payload, 4, 2).unwrap();

        let mut short: Vec<Option<Vec<u8>>> =
            shards.iter().take(5).map(|s| Some(s.to_vec())).collect();
        let result = decode(&mut short, &manifest);
        assert!(matches!(result, Err(ZstoreError::Decode(_))));
    }
}
