//! Deterministic local embedder: feature-hashed character trigrams.
//!
//! No network, no model weights. The same text always maps to the same
//! vector, and distinct texts land in distinct buckets with high
//! probability. Used as the offline/test embedding path; near-duplicate
//! detection quality is weaker than a real model but the geometry
//! (cosine over L2-normalized vectors) is identical.

/// Output dimensionality of [`hash_embed`].
pub const HASH_EMBED_DIM: usize = 256;

/// Embed `text` into a fixed `HASH_EMBED_DIM`-dim L2-normalized vector.
///
/// Whitespace runs are collapsed and input is lowercased before hashing,
/// so formatting-only edits do not change the vector.
pub fn hash_embed(text: &str) -> Vec<f32> {
    let normalized: Vec<char> = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .collect();

    let mut v = vec![0f32; HASH_EMBED_DIM];
    if normalized.len() < 3 {
        return v;
    }

    for tri in normalized.windows(3) {
        let mut buf = [0u8; 12];
        let mut len = 0;
        for c in tri {
            len += c.encode_utf8(&mut buf[len..]).len();
        }
        let h = fnv1a(&buf[..len]);
        let idx = (h % HASH_EMBED_DIM as u64) as usize;
        // Signed hashing keeps the expected dot product of unrelated
        // texts near zero instead of biasing positive.
        let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
        v[idx] += sign;
    }

    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut h = OFFSET;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(PRIME);
    }
    h
}
