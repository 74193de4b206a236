//! Per-source escape sequence decoder
//!
//! Recognizes the VT100/xterm CSI subset that terminals emit for navigation
//! keys (`ESC [ {A,B,C,D,H,F}` and `ESC [ {1..6} ~`) and maps everything
//! else through the keymap. Each input source owns its own decoder, so a
//! half-collected sequence on one source can never corrupt another.

use crate::keymap::{self, hid, KeyEvent};

/// Longest sequence the decoder will buffer, including the leading ESC.
/// Anything still unresolved at this length is discarded.
const MAX_SEQUENCE_LEN: usize = 8;

const ESC: u8 = 0x1b;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Not inside an escape sequence; bytes map directly.
    Idle,
    /// Collecting bytes after an ESC.
    Collecting { buf: [u8; MAX_SEQUENCE_LEN], len: usize },
}

/// Byte-at-a-time decoder turning a raw input stream into key events.
///
/// Fed one byte per call; returns at most one event per call and never
/// queues events internally. The machine always returns to `Idle`: every
/// byte either resolves a sequence, continues one below the length cap, or
/// forces a silent reset.
#[derive(Debug)]
pub struct EscapeDecoder {
    state: State,
}

impl EscapeDecoder {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Feed one byte, returning the key event it completes, if any.
    ///
    /// Unrecognized input (unmapped characters, malformed or overlong
    /// sequences) produces no event and no error.
    pub fn feed(&mut self, byte: u8) -> Option<KeyEvent> {
        match self.state {
            State::Idle => {
                if byte == ESC {
                    let mut buf = [0u8; MAX_SEQUENCE_LEN];
                    buf[0] = ESC;
                    self.state = State::Collecting { buf, len: 1 };
                    return None;
                }
                keymap::map(byte as char)
                    .map(|(keycode, shift)| KeyEvent::from_mapped(keycode, shift))
            }
            State::Collecting { mut buf, len } => {
                // Only `ESC [` continues collection; any other second byte
                // abandons the ESC and the byte is re-evaluated from Idle.
                if len == 1 && byte != b'[' {
                    self.state = State::Idle;
                    return self.feed(byte);
                }

                buf[len] = byte;
                let len = len + 1;

                if let Some(event) = resolve(&buf[..len]) {
                    self.state = State::Idle;
                    return Some(event);
                }

                if len >= MAX_SEQUENCE_LEN {
                    self.state = State::Idle;
                } else {
                    self.state = State::Collecting { buf, len };
                }
                None
            }
        }
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.state == State::Idle
    }
}

impl Default for EscapeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Try to resolve a collected `ESC [ ...` buffer into a named key.
fn resolve(seq: &[u8]) -> Option<KeyEvent> {
    debug_assert!(seq.len() >= 2 && seq[0] == ESC && seq[1] == b'[');

    // Single-letter terminators right after the bracket.
    if seq.len() == 3 {
        let keycode = match seq[2] {
            b'A' => Some(hid::KEY_ARROW_UP),
            b'B' => Some(hid::KEY_ARROW_DOWN),
            b'C' => Some(hid::KEY_ARROW_RIGHT),
            b'D' => Some(hid::KEY_ARROW_LEFT),
            b'H' => Some(hid::KEY_HOME),
            b'F' => Some(hid::KEY_END),
            _ => None,
        };
        if let Some(keycode) = keycode {
            return Some(KeyEvent::plain(keycode));
        }
    }

    // Extended sequences terminate with `~` and are keyed on the first
    // parameter digit; any modifier parameters in between are ignored.
    if seq.len() >= 4 && *seq.last().unwrap() == b'~' {
        let keycode = match seq[2] {
            b'1' => Some(hid::KEY_HOME),
            b'2' => Some(hid::KEY_INSERT),
            b'3' => Some(hid::KEY_DELETE),
            b'4' => Some(hid::KEY_END),
            b'5' => Some(hid::KEY_PAGE_UP),
            b'6' => Some(hid::KEY_PAGE_DOWN),
            _ => None,
        };
        if let Some(keycode) = keycode {
            return Some(KeyEvent::plain(keycode));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::Modifiers;

    fn feed_all(decoder: &mut EscapeDecoder, bytes: &[u8]) -> Vec<KeyEvent> {
        bytes.iter().filter_map(|&b| decoder.feed(b)).collect()
    }

    #[test]
    fn arrow_sequence_yields_one_event_and_resets() {
        let mut decoder = EscapeDecoder::new();
        let events = feed_all(&mut decoder, b"\x1b[A");
        assert_eq!(events, vec![KeyEvent::plain(hid::KEY_ARROW_UP)]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn all_letter_terminators() {
        let cases: [(&[u8], u8); 6] = [
            (b"\x1b[A", hid::KEY_ARROW_UP),
            (b"\x1b[B", hid::KEY_ARROW_DOWN),
            (b"\x1b[C", hid::KEY_ARROW_RIGHT),
            (b"\x1b[D", hid::KEY_ARROW_LEFT),
            (b"\x1b[H", hid::KEY_HOME),
            (b"\x1b[F", hid::KEY_END),
        ];
        for (bytes, keycode) in cases {
            let mut decoder = EscapeDecoder::new();
            assert_eq!(feed_all(&mut decoder, bytes), vec![KeyEvent::plain(keycode)]);
        }
    }

    #[test]
    fn tilde_sequences_map_by_digit() {
        let cases: [(&[u8], u8); 6] = [
            (b"\x1b[1~", hid::KEY_HOME),
            (b"\x1b[2~", hid::KEY_INSERT),
            (b"\x1b[3~", hid::KEY_DELETE),
            (b"\x1b[4~", hid::KEY_END),
            (b"\x1b[5~", hid::KEY_PAGE_UP),
            (b"\x1b[6~", hid::KEY_PAGE_DOWN),
        ];
        for (bytes, keycode) in cases {
            let mut decoder = EscapeDecoder::new();
            assert_eq!(feed_all(&mut decoder, bytes), vec![KeyEvent::plain(keycode)]);
            assert!(decoder.is_idle());
        }
    }

    #[test]
    fn modified_tilde_sequence_still_resolves_by_first_digit() {
        let mut decoder = EscapeDecoder::new();
        let events = feed_all(&mut decoder, b"\x1b[5;2~");
        assert_eq!(events, vec![KeyEvent::plain(hid::KEY_PAGE_UP)]);
    }

    #[test]
    fn non_bracket_second_byte_replays_as_literal() {
        let mut decoder = EscapeDecoder::new();
        assert_eq!(decoder.feed(0x1b), None);
        let event = decoder.feed(b'a').unwrap();
        assert_eq!(event, KeyEvent::from_mapped(hid::KEY_A, false));
        assert!(decoder.is_idle());
    }

    #[test]
    fn esc_after_esc_restarts_collection() {
        let mut decoder = EscapeDecoder::new();
        let events = feed_all(&mut decoder, b"\x1b\x1b[A");
        assert_eq!(events, vec![KeyEvent::plain(hid::KEY_ARROW_UP)]);
    }

    #[test]
    fn unmapped_second_byte_is_dropped() {
        let mut decoder = EscapeDecoder::new();
        assert_eq!(feed_all(&mut decoder, b"\x1b\x01"), vec![]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn overlong_sequence_is_discarded_silently() {
        let mut decoder = EscapeDecoder::new();
        // Nothing here resolves, so the cap forces a reset.
        assert_eq!(feed_all(&mut decoder, b"\x1b[999999"), vec![]);
        assert!(decoder.is_idle());

        // The decoder is fully recovered afterwards.
        let event = decoder.feed(b'a').unwrap();
        assert_eq!(event.keycode, hid::KEY_A);
    }

    #[test]
    fn never_collects_more_than_the_cap() {
        let mut decoder = EscapeDecoder::new();
        for _ in 0..4 {
            decoder.feed(b'\x1b');
            let mut fed = 1usize;
            for &b in b"[0000000000" {
                decoder.feed(b);
                fed += 1;
                if decoder.is_idle() {
                    break;
                }
            }
            assert!(fed <= MAX_SEQUENCE_LEN, "collected {fed} bytes");
            assert!(decoder.is_idle());
        }
    }

    #[test]
    fn literal_text_decodes_with_shift_state_per_character() {
        let mut decoder = EscapeDecoder::new();
        let events = feed_all(&mut decoder, b"Hi!");
        assert_eq!(
            events,
            vec![
                KeyEvent::new(hid::KEY_A + 7, Modifiers::LEFT_SHIFT),
                KeyEvent::new(hid::KEY_A + 8, Modifiers::empty()),
                KeyEvent::new(hid::KEY_1, Modifiers::LEFT_SHIFT),
            ]
        );
    }

    #[test]
    fn text_around_sequences_is_unaffected() {
        let mut decoder = EscapeDecoder::new();
        let events = feed_all(&mut decoder, b"a\x1b[Db");
        assert_eq!(
            events,
            vec![
                KeyEvent::from_mapped(hid::KEY_A, false),
                KeyEvent::plain(hid::KEY_ARROW_LEFT),
                KeyEvent::from_mapped(hid::KEY_A + 1, false),
            ]
        );
    }
}
