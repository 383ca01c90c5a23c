//! PCM byte conversions at the service boundaries.
//!
//! * Transcription and detection payloads use `linear16`: signed 16-bit
//!   little-endian samples.
//! * Synthesized speech arrives as raw `pcm_f32le`.

/// Convert `f32` samples in `[-1.0, 1.0]` to 16-bit little-endian bytes.
/// Out-of-range samples are clamped.
pub fn to_linear16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Decode 32-bit float little-endian bytes.  A trailing partial sample is
/// ignored.
pub fn from_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
