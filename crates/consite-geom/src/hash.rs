use geo::{LineString, Polygon};
use sha2::{Digest, Sha256};

/// Coordinates are snapped to this grid before hashing so that results which
/// differ only by floating point noise share a fingerprint.
const SNAP: f64 = 1e-6;

/// Computes an order-independent fingerprint for a polygon collection.
pub fn shape_fingerprint(shapes: &[Polygon<f64>]) -> String {
    let mut encoded: Vec<Vec<u8>> = shapes.iter().map(encode_polygon).collect();
    encoded.sort();
    let mut hasher = Sha256::new();
    hasher.update((encoded.len() as u64).to_le_bytes());
    for item in encoded {
        hasher.update((item.len() as u64).to_le_bytes());
        hasher.update(&item);
    }
    format!("{:x}", hasher.finalize())
}

fn encode_polygon(polygon: &Polygon<f64>) -> Vec<u8> {
    let mut bytes = Vec::new();
    encode_ring(polygon.exterior(), &mut bytes);
    bytes.extend((polygon.interiors().len() as u64).to_le_bytes());
    for ring in polygon.interiors() {
        encode_ring(ring, &mut bytes);
    }
    bytes
}

fn encode_ring(ring: &LineString<f64>, bytes: &mut Vec<u8>) {
    bytes.extend((ring.0.len() as u64).to_le_bytes());
    for coord in &ring.0 {
        bytes.extend(((coord.x / SNAP).round() as i64).to_le_bytes());
        bytes.extend(((coord.y / SNAP).round() as i64).to_le_bytes());
    }
}
