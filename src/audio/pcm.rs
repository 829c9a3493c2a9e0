//! Conversion between raw little-endian PCM frames and integer samples
//!
//! 8-bit samples are unsigned on the wire and centered around zero once
//! decoded, matching what hound reads and writes for 8-bit WAV files.

/// Decode little-endian PCM bytes into signed samples.
/// Trailing bytes that do not form a whole sample are ignored.
pub fn decode(bytes: &[u8], width: u16) -> Vec<i32> {
    let width = width as usize;
    if width == 0 {
        return Vec::new();
    }

    bytes
        .chunks_exact(width)
        .map(|b| match width {
            1 => b[0] as i32 - 128,
            2 => i16::from_le_bytes([b[0], b[1]]) as i32,
            // sign-extend through the top byte
            3 => i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8,
            _ => i32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        })
        .collect()
}

/// Encode signed samples as little-endian PCM bytes of the given width
pub fn encode(samples: &[i32], width: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * width as usize);
    for &s in samples {
        match width {
            1 => out.push((s + 128).clamp(0, 255) as u8),
            2 => out.extend_from_slice(&(s as i16).to_le_bytes()),
            3 => out.extend_from_slice(&s.to_le_bytes()[..3]),
            _ => out.extend_from_slice(&s.to_le_bytes()),
        }
    }
    out
}

/// Scale a decoded sample to [-1.0, 1.0)
pub fn to_f32(sample: i32, width: u16) -> f32 {
    let full_scale = (1u64 << (width.clamp(1, 4) as u32 * 8 - 1)) as f32;
    sample as f32 / full_scale
}
