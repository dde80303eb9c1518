//! Strict markup tokenizer for component templates.
//!
//! Supported tag and attribute name characters (ASCII only): `[A-Za-z0-9:_.-]`. The `.`
//! is what lets qualified component names like `app.hello` through.
//!
//! Unlike a browser tokenizer this one refuses to guess: an unterminated tag, comment or
//! quoted value, or a stray character inside a tag, is a `DecodeError`. A `<` that does
//! not open a tag, comment or end tag is kept as literal text.
//!
//! Invariants:
//! - Tag and attribute names are ASCII-lowercased.
//! - Text and attribute values have character references decoded.
//! - Adjacent text runs are merged into one `Token::Text`.
//! - Slices are only cut at ASCII structural bytes, so every endpoint is a char boundary.
use crate::entities::decode_entities;
use crate::error::DecodeError;
use crate::types::Token;
use memchr::memchr;

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";
const SCRIPT_CLOSE_TAG: &[u8] = b"</script";
const STYLE_CLOSE_TAG: &[u8] = b"</style";

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b':' | b'.')
}

fn starts_with_ignore_ascii_case_at(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

fn unexpected(input: &str, offset: usize) -> DecodeError {
    match input[offset..].chars().next() {
        Some(found) => DecodeError::UnexpectedChar { found, offset },
        None => DecodeError::Unterminated {
            what: "tag",
            offset,
        },
    }
}

fn find_rawtext_close_tag(haystack: &str, close_tag: &[u8]) -> Option<(usize, usize)> {
    let bytes = haystack.as_bytes();
    let len = bytes.len();
    let n = close_tag.len();
    let mut i = 0;
    while i + n <= len {
        i += memchr(b'<', &bytes[i..])?;
        if i + n > len {
            return None;
        }
        if starts_with_ignore_ascii_case_at(bytes, i, close_tag) {
            let mut k = i + n;
            while k < len && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && bytes[k] == b'>' {
                return Some((i, k + 1));
            }
        }
        i += 1;
    }
    None
}

fn push_text(out: &mut Vec<Token>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::Text(prev)) = out.last_mut() {
        prev.push_str(&text);
    } else {
        out.push(Token::Text(text));
    }
}

struct Scanner<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn name(&mut self) -> &'a str {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_name_char(self.bytes[self.pos]) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn attribute_value(&mut self, tag_start: usize) -> Result<String, DecodeError> {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                let value_start = self.pos + 1;
                let Some(rel) = memchr(quote, &self.bytes[value_start..]) else {
                    return Err(DecodeError::Unterminated {
                        what: "attribute value",
                        offset: self.pos,
                    });
                };
                self.pos = value_start + rel + 1;
                Ok(decode_entities(&self.input[value_start..value_start + rel]))
            }
            Some(_) => {
                let value_start = self.pos;
                while let Some(b) = self.peek() {
                    if b.is_ascii_whitespace() || b == b'>' {
                        break;
                    }
                    if b == b'/' && self.bytes.get(self.pos + 1) == Some(&b'>') {
                        break;
                    }
                    if matches!(b, b'"' | b'\'' | b'<' | b'=' | b'`') {
                        return Err(unexpected(self.input, self.pos));
                    }
                    self.pos += 1;
                }
                Ok(decode_entities(&self.input[value_start..self.pos]))
            }
            None => Err(DecodeError::Unterminated {
                what: "tag",
                offset: tag_start,
            }),
        }
    }

    /// Scans the attribute list after a tag name, through the closing `>`.
    fn attributes(
        &mut self,
        tag_start: usize,
    ) -> Result<(Vec<(String, String)>, bool), DecodeError> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(DecodeError::Unterminated {
                        what: "tag",
                        offset: tag_start,
                    });
                }
                Some(b'>') => {
                    self.pos += 1;
                    return Ok((attributes, false));
                }
                Some(b'/') => {
                    if self.bytes.get(self.pos + 1) == Some(&b'>') {
                        self.pos += 2;
                        return Ok((attributes, true));
                    }
                    return Err(unexpected(self.input, self.pos));
                }
                Some(b) if is_name_char(b) => {
                    let name = self.name().to_ascii_lowercase();
                    self.skip_whitespace();
                    let value = if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        self.attribute_value(tag_start)?
                    } else {
                        String::new()
                    };
                    attributes.push((name, value));
                }
                Some(_) => return Err(unexpected(self.input, self.pos)),
            }
        }
    }
}

/// Tokenizes template output into a flat token list.
pub fn tokenize(input: &str) -> Result<Vec<Token>, DecodeError> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    let mut scan = Scanner {
        input,
        bytes,
        pos: 0,
    };

    while scan.pos < bytes.len() {
        let i = scan.pos;
        if bytes[i] != b'<' {
            let end = memchr(b'<', &bytes[i..]).map_or(bytes.len(), |rel| i + rel);
            push_text(&mut out, decode_entities(&input[i..end]));
            scan.pos = end;
            continue;
        }

        if input[i..].starts_with(COMMENT_START) {
            let body_start = i + COMMENT_START.len();
            let Some(rel) = input[body_start..].find(COMMENT_END) else {
                return Err(DecodeError::Unterminated {
                    what: "comment",
                    offset: i,
                });
            };
            out.push(Token::Comment(input[body_start..body_start + rel].to_string()));
            scan.pos = body_start + rel + COMMENT_END.len();
            continue;
        }

        if bytes.get(i + 1) == Some(&b'!') {
            let Some(rel) = memchr(b'>', &bytes[i..]) else {
                return Err(DecodeError::Unterminated {
                    what: "declaration",
                    offset: i,
                });
            };
            let body = &input[i + 2..i + rel];
            if starts_with_ignore_ascii_case_at(bytes, i, b"<!doctype") {
                out.push(Token::Doctype(body.trim().to_string()));
            } else {
                out.push(Token::Comment(body.to_string()));
            }
            scan.pos = i + rel + 1;
            continue;
        }

        if bytes.get(i + 1) == Some(&b'/') {
            scan.pos = i + 2;
            let name = scan.name();
            if name.is_empty() {
                return Err(unexpected(input, scan.pos));
            }
            let name = name.to_ascii_lowercase();
            scan.skip_whitespace();
            match scan.peek() {
                Some(b'>') => scan.pos += 1,
                Some(_) => return Err(unexpected(input, scan.pos)),
                None => {
                    return Err(DecodeError::Unterminated {
                        what: "end tag",
                        offset: i,
                    });
                }
            }
            out.push(Token::EndTag(name));
            continue;
        }

        if !bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            // Not a tag opener; keep the '<' as text.
            push_text(&mut out, "<".to_string());
            scan.pos = i + 1;
            continue;
        }

        scan.pos = i + 1;
        let name = scan.name().to_ascii_lowercase();
        let (attributes, self_closing) = scan.attributes(i)?;
        let rawtext = !self_closing && (name == "script" || name == "style");
        out.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });

        if rawtext {
            let close_tag = if name == "script" {
                SCRIPT_CLOSE_TAG
            } else {
                STYLE_CLOSE_TAG
            };
            let body_start = scan.pos;
            let Some((rel_start, rel_end)) =
                find_rawtext_close_tag(&input[body_start..], close_tag)
            else {
                return Err(DecodeError::Unterminated {
                    what: "raw text element",
                    offset: i,
                });
            };
            let raw = &input[body_start..body_start + rel_start];
            if !raw.is_empty() {
                out.push(Token::Text(raw.to_string()));
            }
            out.push(Token::EndTag(name));
            scan.pos = body_start + rel_end;
        }
    }

    log::trace!(target: "markup.tokenizer", "tokenized {} bytes into {} tokens", input.len(), out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str, attributes: &[(&str, &str)], self_closing: bool) -> Token {
        Token::StartTag {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            self_closing,
        }
    }

    #[test]
    fn tokenizes_elements_text_and_attributes() {
        let tokens = tokenize(r#"<div class="test" id=main disabled>hello</div>"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                start(
                    "div",
                    &[("class", "test"), ("id", "main"), ("disabled", "")],
                    false
                ),
                Token::Text("hello".into()),
                Token::EndTag("div".into()),
            ]
        );
    }

    #[test]
    fn lowercases_names_and_keeps_dotted_component_names() {
        let tokens = tokenize(r#"<App.Mur Value="x"/>"#).unwrap();
        assert_eq!(tokens, vec![start("app.mur", &[("value", "x")], true)]);
    }

    #[test]
    fn decodes_references_in_text_and_values() {
        let tokens = tokenize(r#"<a title="a &amp; b">&lt;x&#x2F;&gt;</a>"#).unwrap();
        assert!(
            matches!(
                tokens.as_slice(),
                [Token::StartTag { attributes, .. }, Token::Text(t), Token::EndTag(_)]
                    if attributes[0].1 == "a & b" && t == "<x/>"
            ),
            "unexpected tokens: {tokens:?}"
        );
    }

    #[test]
    fn skips_doctype_and_comments_as_tokens() {
        let tokens = tokenize("<!DOCTYPE html><!-- note --><p></p>").unwrap();
        assert_eq!(tokens[0], Token::Doctype("DOCTYPE html".into()));
        assert_eq!(tokens[1], Token::Comment(" note ".into()));
    }

    #[test]
    fn keeps_literal_less_than_in_text() {
        let tokens = tokenize("<p>a < b</p>").unwrap();
        assert_eq!(tokens[1], Token::Text("a < b".into()));
    }

    #[test]
    fn script_body_is_raw_text() {
        let tokens = tokenize("<script>if (a<b) {}</ScRiPt>").unwrap();
        assert_eq!(
            tokens,
            vec![
                start("script", &[], false),
                Token::Text("if (a<b) {}".into()),
                Token::EndTag("script".into()),
            ]
        );
    }

    #[test]
    fn rejects_malformed_tags() {
        assert_eq!(
            tokenize(r#"<div %error="42">"#),
            Err(DecodeError::UnexpectedChar {
                found: '%',
                offset: 5
            })
        );
        assert!(matches!(
            tokenize("<div class=\"x"),
            Err(DecodeError::Unterminated {
                what: "attribute value",
                ..
            })
        ));
        assert!(matches!(
            tokenize("<div"),
            Err(DecodeError::Unterminated { what: "tag", .. })
        ));
        assert!(matches!(
            tokenize("<!-- open"),
            Err(DecodeError::Unterminated {
                what: "comment",
                ..
            })
        ));
        assert!(matches!(
            tokenize("</div x>"),
            Err(DecodeError::UnexpectedChar { found: 'x', .. })
        ));
        assert!(matches!(
            tokenize("<script>never closed"),
            Err(DecodeError::Unterminated {
                what: "raw text element",
                ..
            })
        ));
    }

    #[test]
    fn preserves_utf8_text() {
        let tokens = tokenize("<p>caf\u{e9} \u{1F60A}</p>").unwrap();
        assert_eq!(tokens[1], Token::Text("caf\u{e9} \u{1F60A}".into()));
    }
}
