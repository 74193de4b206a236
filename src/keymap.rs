//! Character to USB HID keycode mapping
//!
//! This module centralizes the keyboard vocabulary: HID usage IDs, the
//! modifier byte layout from the boot keyboard report, and the pure
//! character lookup every input source shares.

use bitflags::bitflags;

/// USB HID keyboard usage IDs (Keyboard/Keypad page 0x07).
pub mod hid {
    pub const KEY_A: u8 = 0x04;
    pub const KEY_1: u8 = 0x1e;
    pub const KEY_0: u8 = 0x27;
    pub const KEY_ENTER: u8 = 0x28;
    pub const KEY_BACKSPACE: u8 = 0x2a;
    pub const KEY_TAB: u8 = 0x2b;
    pub const KEY_SPACE: u8 = 0x2c;
    pub const KEY_MINUS: u8 = 0x2d;
    pub const KEY_EQUAL: u8 = 0x2e;
    pub const KEY_BRACKET_LEFT: u8 = 0x2f;
    pub const KEY_BRACKET_RIGHT: u8 = 0x30;
    pub const KEY_BACKSLASH: u8 = 0x31;
    pub const KEY_SEMICOLON: u8 = 0x33;
    pub const KEY_APOSTROPHE: u8 = 0x34;
    pub const KEY_GRAVE: u8 = 0x35;
    pub const KEY_COMMA: u8 = 0x36;
    pub const KEY_PERIOD: u8 = 0x37;
    pub const KEY_SLASH: u8 = 0x38;
    pub const KEY_INSERT: u8 = 0x49;
    pub const KEY_HOME: u8 = 0x4a;
    pub const KEY_PAGE_UP: u8 = 0x4b;
    pub const KEY_DELETE: u8 = 0x4c;
    pub const KEY_END: u8 = 0x4d;
    pub const KEY_PAGE_DOWN: u8 = 0x4e;
    pub const KEY_ARROW_RIGHT: u8 = 0x4f;
    pub const KEY_ARROW_LEFT: u8 = 0x50;
    pub const KEY_ARROW_DOWN: u8 = 0x51;
    pub const KEY_ARROW_UP: u8 = 0x52;
}

bitflags! {
    /// Modifier bits as laid out in byte 0 of the HID boot keyboard report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const LEFT_CTRL = 0x01;
        const LEFT_SHIFT = 0x02;
        const LEFT_ALT = 0x04;
        const LEFT_GUI = 0x08;
    }
}

/// One decoded, logical unit of keyboard input.
///
/// Produced by decoding one input character or one recognized escape
/// sequence; consumed exactly once by the output serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub keycode: u8,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(keycode: u8, modifiers: Modifiers) -> Self {
        Self { keycode, modifiers }
    }

    /// Event for a plain keycode with no modifiers (named special keys).
    pub fn plain(keycode: u8) -> Self {
        Self::new(keycode, Modifiers::empty())
    }

    /// Event derived from a keymap lookup result.
    pub fn from_mapped(keycode: u8, needs_shift: bool) -> Self {
        let modifiers = if needs_shift {
            Modifiers::LEFT_SHIFT
        } else {
            Modifiers::empty()
        };
        Self::new(keycode, modifiers)
    }
}

/// Map a character to its HID keycode and whether Shift is required to
/// produce it on a US layout.
///
/// Returns `None` for ESC (which only ever starts an escape sequence) and
/// for anything the keyboard cannot type; unmapped input is silently
/// dropped by callers, never surfaced as an error.
pub fn map(c: char) -> Option<(u8, bool)> {
    match c {
        'a'..='z' => Some((hid::KEY_A + (c as u8 - b'a'), false)),
        'A'..='Z' => Some((hid::KEY_A + (c as u8 - b'A'), true)),
        '1'..='9' => Some((hid::KEY_1 + (c as u8 - b'1'), false)),
        '0' => Some((hid::KEY_0, false)),

        ' ' => Some((hid::KEY_SPACE, false)),
        '\r' | '\n' => Some((hid::KEY_ENTER, false)),
        '\t' => Some((hid::KEY_TAB, false)),
        '\x08' | '\x7f' => Some((hid::KEY_BACKSPACE, false)),

        // Shifted digit row symbols land on the digit keycode they sit on.
        '!' => Some((hid::KEY_1, true)),
        '@' => Some((hid::KEY_1 + 1, true)),
        '#' => Some((hid::KEY_1 + 2, true)),
        '$' => Some((hid::KEY_1 + 3, true)),
        '%' => Some((hid::KEY_1 + 4, true)),
        '^' => Some((hid::KEY_1 + 5, true)),
        '&' => Some((hid::KEY_1 + 6, true)),
        '*' => Some((hid::KEY_1 + 7, true)),
        '(' => Some((hid::KEY_1 + 8, true)),
        ')' => Some((hid::KEY_0, true)),

        '-' => Some((hid::KEY_MINUS, false)),
        '_' => Some((hid::KEY_MINUS, true)),
        '=' => Some((hid::KEY_EQUAL, false)),
        '+' => Some((hid::KEY_EQUAL, true)),
        '[' => Some((hid::KEY_BRACKET_LEFT, false)),
        '{' => Some((hid::KEY_BRACKET_LEFT, true)),
        ']' => Some((hid::KEY_BRACKET_RIGHT, false)),
        '}' => Some((hid::KEY_BRACKET_RIGHT, true)),
        '\\' => Some((hid::KEY_BACKSLASH, false)),
        '|' => Some((hid::KEY_BACKSLASH, true)),
        ';' => Some((hid::KEY_SEMICOLON, false)),
        ':' => Some((hid::KEY_SEMICOLON, true)),
        '\'' => Some((hid::KEY_APOSTROPHE, false)),
        '"' => Some((hid::KEY_APOSTROPHE, true)),
        '`' => Some((hid::KEY_GRAVE, false)),
        '~' => Some((hid::KEY_GRAVE, true)),
        ',' => Some((hid::KEY_COMMA, false)),
        '<' => Some((hid::KEY_COMMA, true)),
        '.' => Some((hid::KEY_PERIOD, false)),
        '>' => Some((hid::KEY_PERIOD, true)),
        '/' => Some((hid::KEY_SLASH, false)),
        '?' => Some((hid::KEY_SLASH, true)),

        // ESC belongs to the escape decoder, never mapped directly.
        _ => None,
    }
}
