//! UTF-8 validation for text messages
//!
//! Backed by `simdutf8`, which picks SSE4.2/AVX2 on x86-64 and NEON on aarch64
//! and falls back to std elsewhere.

/// Validate that the input is valid UTF-8
#[inline]
pub fn validate_utf8(data: &[u8]) -> bool {
    simdutf8::basic::from_utf8(data).is_ok()
}

/// Convert validated bytes into an owned `String`
///
/// Returns `None` if the bytes are not valid UTF-8.
pub fn into_string(data: Vec<u8>) -> Option<String> {
    if !validate_utf8(&data) {
        return None;
    }
    // SAFETY: validated above
    Some(unsafe { String::from_utf8_unchecked(data) })
}
