//! Binary point encoding for cold items
//!
//! Each point is 16 bytes: the timestamp as a big-endian `i64` followed by
//! the IEEE-754 bits of the value as a big-endian `u64`.

use crate::error::StorageError;
use crate::types::DataPoint;

/// Encoded size of one point
pub const POINT_SIZE: usize = 16;

/// Encode one point
pub fn encode_point(point: &DataPoint) -> Vec<u8> {
    let mut buf = Vec::with_capacity(POINT_SIZE);
    buf.extend_from_slice(&point.timestamp.to_be_bytes());
    buf.extend_from_slice(&point.value.to_bits().to_be_bytes());
    buf
}

/// Decode one point; any length other than 16 is rejected
pub fn decode_point(bytes: &[u8]) -> Result<DataPoint, StorageError> {
    if bytes.len() != POINT_SIZE {
        return Err(StorageError::decode(format!(
            "point blob is {} bytes, expected {POINT_SIZE}",
            bytes.len()
        )));
    }
    let mut ts = [0u8; 8];
    let mut bits = [0u8; 8];
    ts.copy_from_slice(&bytes[..8]);
    bits.copy_from_slice(&bytes[8..]);
    Ok(DataPoint::new(
        i64::from_be_bytes(ts),
        f64::from_bits(u64::from_be_bytes(bits)),
    ))
}

/// Encode a batch of points
pub fn encode_points<'a>(points: impl IntoIterator<Item = &'a DataPoint>) -> Vec<Vec<u8>> {
    points.into_iter().map(encode_point).collect()
}

/// Decode a batch, failing on the first malformed blob
pub fn decode_points(blobs: &[Vec<u8>]) -> Result<Vec<DataPoint>, StorageError> {
    blobs.iter().map(|b| decode_point(b)).collect()
}
