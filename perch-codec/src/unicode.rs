//! `\uXXXX` escape decoding.
//!
//! The bot backend escapes every non-ASCII character of a JSON string as one
//! `\uXXXX` escape per UTF-16 code unit, so an emoji arrives as a surrogate
//! pair of two escapes. The functions here
//! rewrite those runs into plain UTF-8 and leave every other byte, including
//! the other JSON escapes (`\n`, `\"`, `\\`), exactly as it was.

/// What to do with escapes that cannot, or must not, become raw UTF-8.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Lone surrogates become their 3-byte (CESU-style) encoding.
    Raw,
    /// Lone surrogates become U+FFFD so the output is always valid UTF-8.
    Lossy,
    /// Escapes that would break a JSON string literal stay escaped.
    Json,
}

/// `true` for a UTF-16 high (leading) surrogate, `0xD800..=0xDBFF`.
pub fn is_high_surrogate(unit: u32) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

/// `true` for a UTF-16 low (trailing) surrogate, `0xDC00..=0xDFFF`.
pub fn is_low_surrogate(unit: u32) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

/// Combine a high/low surrogate pair into the code point it encodes.
///
/// Returns `None` if the two units do not form a pair.
pub fn combine_surrogates(high: u32, low: u32) -> Option<u32> {
    if !is_high_surrogate(high) || !is_low_surrogate(low) {
        return None;
    }
    Some(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
}

/// Append the UTF-8 encoding of `cp` to `out`.
///
/// 1 byte below U+0080, 2 below U+0800, 3 below U+10000, 4 above. Surrogate
/// values are encoded with the 3-byte form even though that is not valid
/// UTF-8; callers that need a `String` must filter them first.
pub fn encode_utf8(cp: u32, out: &mut Vec<u8>) {
    if cp < 0x80 {
        out.push(cp as u8);
    } else if cp < 0x800 {
        out.push(0xC0 | (cp >> 6) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else if cp < 0x10000 {
        out.push(0xE0 | (cp >> 12) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else {
        out.push(0xF0 | (cp >> 18) as u8);
        out.push(0x80 | ((cp >> 12) & 0x3F) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    }
}

/// Decode every `\uXXXX` run in `input` into UTF-8 bytes.
///
/// A high surrogate that is not followed by a low-surrogate escape is emitted
/// on its own (3 bytes) and decoding resumes at the escape that followed it.
/// Truncated or non-hex escapes are copied through unchanged.
///
/// ```
/// use perch_codec::unicode::decode;
///
/// assert_eq!(decode(b"caf\\u00e9"), "café".as_bytes());
/// assert_eq!(decode(b"\\uD83D\\uDE00"), [0xF0, 0x9F, 0x98, 0x80]);
/// ```
pub fn decode(input: &[u8]) -> Vec<u8> {
    decode_with(input, Mode::Raw)
}

/// [`decode`] for string input, replacing lone surrogates with U+FFFD.
pub fn decode_str(input: &str) -> String {
    let bytes = decode_with(input.as_bytes(), Mode::Lossy);
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Decode the escapes of a whole JSON document while keeping it parseable.
///
/// Escapes that would decode to `"`, `\`, a control character below U+0020
/// or a lone surrogate are left in their escaped form.
pub fn decode_json(input: &str) -> String {
    let bytes = decode_with(input.as_bytes(), Mode::Json);
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn decode_with(input: &[u8], mode: Mode) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        if byte != b'\\' {
            out.push(byte);
            i += 1;
            continue;
        }

        match input.get(i + 1) {
            None => {
                out.push(byte);
                i += 1;
            }
            Some(b'u') => match code_unit_at(input, i) {
                Some(unit) => i += emit_escape(input, i, unit, mode, &mut out),
                None => {
                    out.extend_from_slice(b"\\u");
                    i += 2;
                }
            },
            Some(&next) => {
                // Any other escape is copied as a pair so that `\\u0041`
                // keeps its escaped backslash.
                out.push(byte);
                out.push(next);
                i += 2;
            }
        }
    }

    out
}

/// Emit the escape starting at `at` and return how many input bytes it used.
fn emit_escape(input: &[u8], at: usize, unit: u32, mode: Mode, out: &mut Vec<u8>) -> usize {
    if is_high_surrogate(unit) {
        if let Some(cp) = code_unit_at(input, at + 6).and_then(|low| combine_surrogates(unit, low)) {
            encode_utf8(cp, out);
            return 12;
        }
        log::trace!("unpaired high surrogate {unit:#06x} at byte {at}");
        emit_lone_surrogate(&input[at..at + 6], unit, mode, out);
        return 6;
    }

    if is_low_surrogate(unit) {
        emit_lone_surrogate(&input[at..at + 6], unit, mode, out);
        return 6;
    }

    if mode == Mode::Json && (unit < 0x20 || unit == u32::from(b'"') || unit == u32::from(b'\\')) {
        out.extend_from_slice(&input[at..at + 6]);
    } else {
        encode_utf8(unit, out);
    }
    6
}

fn emit_lone_surrogate(raw: &[u8], unit: u32, mode: Mode, out: &mut Vec<u8>) {
    match mode {
        Mode::Raw => encode_utf8(unit, out),
        Mode::Lossy => encode_utf8(0xFFFD, out),
        Mode::Json => out.extend_from_slice(raw),
    }
}

/// Parse a complete `\uXXXX` escape starting at `at`.
fn code_unit_at(input: &[u8], at: usize) -> Option<u32> {
    let escape = input.get(at..at + 6)?;
    if escape[0] != b'\\' || escape[1] != b'u' {
        return None;
    }
    escape[2..].iter().try_fold(0u32, |acc, &b| {
        let digit = (b as char).to_digit(16)?;
        Some(acc << 4 | digit)
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_untouched() {
        let s = r#"{"ok":true,"text":"line\nbreak \"quoted\" back\\slash"}"#;
        assert_eq!(decode(s.as_bytes()), s.as_bytes());
        assert_eq!(decode_str(s), s);
        assert_eq!(decode_json(s), s);
    }

    #[test]
    fn one_two_and_three_byte_code_points() {
        assert_eq!(decode(b"\\u0041"), b"A");
        assert_eq!(decode(b"\\u00e9"), [0xC3, 0xA9]);
        assert_eq!(decode(b"\\u20AC"), "€".as_bytes());
        assert_eq!(decode_str("caf\\u00e9 \\u20ac5"), "café €5");
    }

    #[test]
    fn surrogate_pair_becomes_four_bytes() {
        assert_eq!(decode(b"\\uD83D\\uDE00"), [0xF0, 0x9F, 0x98, 0x80]);
        assert_eq!(decode_str("hi \\ud83d\\ude00!"), "hi \u{1F600}!");
    }

    #[test]
    fn combine_rejects_non_pairs() {
        assert_eq!(combine_surrogates(0xD83D, 0xDE00), Some(0x1F600));
        assert_eq!(combine_surrogates(0xD83D, 0x0041), None);
        assert_eq!(combine_surrogates(0xDE00, 0xD83D), None);
    }

    #[test]
    fn unpaired_high_surrogate_falls_back() {
        // High surrogate alone, then a normal escape which is still decoded.
        let out = decode(b"\\uD83D\\u0041");
        assert_eq!(out, [0xED, 0xA0, 0xBD, b'A']);
        assert_eq!(decode_str("\\uD83D\\u0041"), "\u{FFFD}A");
        assert_eq!(decode_json("\\uD83D\\u0041"), "\\uD83DA");
    }

    #[test]
    fn lone_low_surrogate_falls_back() {
        assert_eq!(decode(b"\\uDE00x"), [0xED, 0xB8, 0x80, b'x']);
        assert_eq!(decode_str("\\uDE00x"), "\u{FFFD}x");
    }

    #[test]
    fn truncated_escapes_are_copied() {
        assert_eq!(decode(b"abc\\u12"), b"abc\\u12");
        assert_eq!(decode(b"abc\\u"), b"abc\\u");
        assert_eq!(decode(b"abc\\"), b"abc\\");
        assert_eq!(decode(b"\\uZZZZ"), b"\\uZZZZ");
    }

    #[test]
    fn escaped_backslash_is_not_an_escape_start() {
        assert_eq!(decode(b"\\\\u0041"), b"\\\\u0041");
    }

    #[test]
    fn json_mode_keeps_structural_characters_escaped() {
        let doc = "{\"text\":\"say \\u0022hi\\u0022\\u000a\\u005c \\u00e9\"}";
        let out = decode_json(doc);
        assert_eq!(out, "{\"text\":\"say \\u0022hi\\u0022\\u000a\\u005c é\"}");
    }

    #[test]
    fn encode_utf8_boundaries() {
        let mut out = Vec::new();
        for cp in [0x7F, 0x80, 0x7FF, 0x800, 0xFFFF, 0x10000, 0x10FFFF] {
            out.clear();
            encode_utf8(cp, &mut out);
            let expected = char::from_u32(cp).unwrap().to_string();
            assert_eq!(out, expected.as_bytes(), "U+{cp:04X}");
        }
    }
}
