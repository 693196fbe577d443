//! WebSocket frame masking
//!
//! Client-to-server payloads are XORed with a repeating 4-byte key. Masking and
//! unmasking are the same operation.

/// Apply a WebSocket mask in place
///
/// Byte `i` of `data` is XORed with `mask[i % 4]`.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    apply_mask_offset(data, mask, 0);
}

/// Apply a WebSocket mask starting at a given offset into the key stream
///
/// Useful when a payload is unmasked in several chunks.
pub fn apply_mask_offset(data: &mut [u8], mask: [u8; 4], offset: usize) {
    if data.is_empty() {
        return;
    }

    let rotated = [
        mask[offset & 3],
        mask[(offset + 1) & 3],
        mask[(offset + 2) & 3],
        mask[(offset + 3) & 3],
    ];

    // Process 8 bytes at a time using u64
    let mask_u64 = u64::from_ne_bytes([
        rotated[0], rotated[1], rotated[2], rotated[3], rotated[0], rotated[1], rotated[2],
        rotated[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = u64::from_ne_bytes(word) ^ mask_u64;
        chunk.copy_from_slice(&masked.to_ne_bytes());
    }

    // Remainder starts on a multiple of 8, so key alignment is unchanged
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= rotated[i & 3];
    }
}
