use std::time::Duration;

/// Check if the given string slice is a valid C-style string.
///
/// Formally, this function checks whether the byte sequence of the string slice contains any
/// b'\x00'. If so, this function returns `false`.
///
/// ```ignore
/// assert!(is_valid_c_string("abcňôłňôłňôł"));
/// assert!(!is_valid_c_string("abc\x00ňôłňôłňôł"));
/// ```
///
pub fn is_valid_c_string(s: &str) -> bool {
    !s.as_bytes().contains(&b'\x00')
}

/// Get the number of whole milliseconds in the given duration, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    let ms = duration.as_millis();
    if ms > u128::from(u64::max_value()) {
        u64::max_value()
    } else {
        ms as u64
    }
}
