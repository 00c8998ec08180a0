//! macOS virtual keycodes (US layout).

pub const KVK_RETURN: u16 = 0x24;
pub const KVK_TAB: u16 = 0x30;
pub const KVK_ESCAPE: u16 = 0x35;

/// Placeholder keycode for events whose character is carried as unicode text.
pub const KVK_UNICODE: u16 = 0x00;

const LETTERS: [u16; 26] = [
    0x00, 0x0B, 0x08, 0x02, 0x0E, 0x03, 0x05, 0x04, 0x22, 0x26, // a-j
    0x28, 0x25, 0x2E, 0x2D, 0x1F, 0x23, 0x0C, 0x0F, 0x01, 0x11, // k-t
    0x20, 0x09, 0x0D, 0x07, 0x10, 0x06, // u-z
];

const DIGITS: [u16; 10] = [0x1D, 0x12, 0x13, 0x14, 0x15, 0x17, 0x16, 0x1A, 0x1C, 0x19];

/// Physical key for `c` on a US keyboard, case-insensitive for letters.
pub fn keycode_for_char(c: char) -> Option<u16> {
    match c {
        'a'..='z' => Some(LETTERS[(c as u8 - b'a') as usize]),
        'A'..='Z' => Some(LETTERS[(c as u8 - b'A') as usize]),
        '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
        '-' => Some(0x1B),
        '=' => Some(0x18),
        '[' => Some(0x21),
        ']' => Some(0x1E),
        '\\' => Some(0x2A),
        ';' => Some(0x29),
        '\'' => Some(0x27),
        ',' => Some(0x2B),
        '.' => Some(0x2F),
        '/' => Some(0x2C),
        '`' => Some(0x32),
        ' ' => Some(0x31),
        _ => None,
    }
}
