//! Hex formatting for addresses and register images.

/// Default number of hex digits used by [`to_hex_string`] callers that
/// format a single byte.
pub const DEFAULT_HEX_WIDTH: usize = 2;

/// Format `value` as `0x` followed by uppercase hex digits, zero-padded to
/// at least `width` digits.
///
/// # Examples
///
/// ```
/// use pinbridge_core::to_hex_string;
///
/// assert_eq!(to_hex_string(0x20, 2), "0x20");
/// assert_eq!(to_hex_string(0x7, 2), "0x07");
/// assert_eq!(to_hex_string(0xF0, 4), "0x00F0");
/// assert_eq!(to_hex_string(0x1234, 2), "0x1234");
/// ```
pub fn to_hex_string(value: u32, width: usize) -> String {
    format!("0x{value:0width$X}")
}
