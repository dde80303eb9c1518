//! Character reference decoding for text and attribute values.
//!
//! Contract:
//! - Named references come from a small fixed table; unknown names pass through.
//! - Numeric references (`&#123;`, `&#x7B;`) decode only when semicolon-terminated,
//!   within the digit limits and naming a valid Unicode scalar.
//! - Anything malformed is copied unchanged, so decoding never fails.

use memchr::memchr;

const NAMED: &[(&str, char)] = &[
    ("amp", '&'),
    ("apos", '\''),
    ("copy", '\u{00A9}'),
    ("gt", '>'),
    ("hellip", '\u{2026}'),
    ("laquo", '\u{00AB}'),
    ("lt", '<'),
    ("mdash", '\u{2014}'),
    ("nbsp", '\u{00A0}'),
    ("ndash", '\u{2013}'),
    ("quot", '"'),
    ("raquo", '\u{00BB}'),
    ("reg", '\u{00AE}'),
];

const MAX_NAME_LEN: usize = 8;
const MAX_HEX_DIGITS: usize = 6;
const MAX_DEC_DIGITS: usize = 7;

pub(crate) fn decode_entities(s: &str) -> String {
    let bytes = s.as_bytes();
    let Some(first) = memchr(b'&', bytes) else {
        return s.to_string();
    };

    let mut out = String::with_capacity(s.len());
    out.push_str(&s[..first]);
    let mut i = first;
    while i < bytes.len() {
        let Some(rel) = memchr(b'&', &bytes[i..]) else {
            out.push_str(&s[i..]);
            break;
        };
        out.push_str(&s[i..i + rel]);
        i += rel;
        match decode_reference(s, i) {
            Some((ch, consumed)) => {
                out.push(ch);
                i += consumed;
            }
            None => {
                out.push('&');
                i += 1;
            }
        }
    }
    out
}

/// Decode the reference starting at the `&` at `at`; returns the char and bytes consumed.
fn decode_reference(s: &str, at: usize) -> Option<(char, usize)> {
    let rest = &s[at + 1..];
    // Bounded scan: no valid reference body is longer than the window.
    let window = &rest.as_bytes()[..rest.len().min(MAX_NAME_LEN + 2)];
    let end = memchr(b';', window)?;
    let body = &rest[..end];
    let consumed = end + 2;

    if let Some(digits) = body.strip_prefix('#') {
        let (digits, radix, limit) = match digits.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16, MAX_HEX_DIGITS),
            None => (digits, 10, MAX_DEC_DIGITS),
        };
        if digits.is_empty()
            || digits.len() > limit
            || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return None;
        }
        if radix == 10 && !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let ch = u32::from_str_radix(digits, radix).ok().and_then(char::from_u32)?;
        return Some((ch, consumed));
    }

    if body.is_empty() || body.len() > MAX_NAME_LEN {
        return None;
    }
    NAMED
        .binary_search_by(|(name, _)| (*name).cmp(body))
        .ok()
        .map(|idx| (NAMED[idx].1, consumed))
}
