//! This module escapes arbitrary text into the body of a double quoted string literal of each
//! supported language. Callers add the surrounding quotes.
//!

use std::fmt::Write;

/// Style used for characters that have no short escape sequence.
#[derive(Clone, Copy, Debug)]
enum ControlStyle {
    /// `\u00XX`.
    Unicode4,

    /// `\u{XX}`.
    UnicodeBraced,

    /// `\ooo`, exactly three octal digits.
    Octal,
}

/// Escape `s` with the common short escapes and the given style for the remaining control
/// characters. Non-ASCII characters are kept verbatim unless `ascii_only` is set, in which case
/// they are written as `\uXXXX` UTF-16 code units.
fn escape(s: &str, style: ControlStyle, ascii_only: bool) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => {
                // Writing into a `String` cannot fail.
                let _ = match style {
                    ControlStyle::Unicode4 => write!(out, "\\u{:04x}", c as u32),
                    ControlStyle::UnicodeBraced => write!(out, "\\u{{{:x}}}", c as u32),
                    ControlStyle::Octal => write!(out, "\\{:03o}", c as u32),
                };
            },
            // Line and paragraph separators end a line in some JavaScript engines, and the Go
            // scanner rejects a byte order mark anywhere but at the start of a file.
            '\u{85}' | '\u{2028}' | '\u{2029}' | '\u{feff}' if !ascii_only => {
                let _ = match style {
                    ControlStyle::Unicode4 => write!(out, "\\u{:04x}", c as u32),
                    ControlStyle::UnicodeBraced => write!(out, "\\u{{{:x}}}", c as u32),
                    ControlStyle::Octal => write!(out, "{}", c),
                };
            },
            c if ascii_only && !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units).iter() {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            },
            c => out.push(c),
        }
    }
    out
}

/// Escape text for a Python, JavaScript, TypeScript or Go string literal. The result is also a
/// valid JSON string body.
pub fn c_like(s: &str) -> String {
    escape(s, ControlStyle::Unicode4, false)
}

/// Escape text for a C# regular string literal. Non-ASCII characters are escaped so the source
/// file is plain ASCII.
pub fn csharp(s: &str) -> String {
    escape(s, ControlStyle::Unicode4, true)
}

/// Escape text for a Rust string literal.
pub fn rust(s: &str) -> String {
    escape(s, ControlStyle::UnicodeBraced, false)
}

/// Escape text for a C++ narrow string literal. Non-ASCII characters stay UTF-8 encoded.
pub fn cpp(s: &str) -> String {
    escape(s, ControlStyle::Octal, false)
}

/// Escape text for a Java string literal. Non-ASCII characters become `\uXXXX` escapes, which the
/// Java compiler translates before tokenizing; control characters, quotes and backslashes never
/// do, so a literal cannot be broken up by that translation.
pub fn java(s: &str) -> String {
    escape(s, ControlStyle::Octal, true)
}

/// Split text into pieces of at most `max_chars` characters, each escaped for a Java string
/// literal. Java limits a single string constant to 65535 bytes of modified UTF-8.
pub fn java_chunks(s: &str, max_chars: usize) -> Vec<String> {
    let max_chars = std::cmp::max(max_chars, 1);
    let chars: Vec<char> = s.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }

    chars.chunks(max_chars)
        .map(|chunk| java(&chunk.iter().collect::<String>()))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    /// Escape grammar of a target language's string literal.
    #[derive(Clone, Copy)]
    struct Grammar {
        /// `\uXXXX`, exactly four hex digits, combined into UTF-16.
        unicode4: bool,

        /// `\u{X..}`, one to six hex digits.
        braced: bool,

        /// `\ooo`, exactly three octal digits.
        octal: bool,

        /// Characters that must never appear unescaped.
        forbidden: &'static [char],
    }

    const SEPARATORS: &[char] = &['\u{85}', '\u{2028}', '\u{2029}', '\u{feff}'];

    const C_LIKE: Grammar = Grammar {
        unicode4: true,
        braced: false,
        octal: false,
        forbidden: SEPARATORS,
    };

    const RUST: Grammar = Grammar {
        unicode4: false,
        braced: true,
        octal: false,
        forbidden: SEPARATORS,
    };

    const CPP: Grammar = Grammar {
        unicode4: false,
        braced: false,
        octal: true,
        forbidden: &[],
    };

    const JAVA: Grammar = Grammar {
        unicode4: true,
        braced: false,
        octal: true,
        forbidden: &[],
    };

    fn hex_digits(chars: &[char], radix: u32) -> Option<u32> {
        if chars.is_empty() || !chars.iter().all(|c| c.is_digit(radix)) {
            return None;
        }
        u32::from_str_radix(&chars.iter().collect::<String>(), radix).ok()
    }

    /// Decode the body of a string literal, rejecting anything the grammar does not allow.
    fn unescape(body: &str, grammar: Grammar) -> Result<String, String> {
        let chars: Vec<char> = body.chars().collect();
        let mut units: Vec<u16> = Vec::new();
        let mut out = String::new();
        let mut i = 0;

        let flush = |units: &mut Vec<u16>, out: &mut String| -> Result<(), String> {
            for decoded in std::char::decode_utf16(units.drain(..)) {
                out.push(decoded.map_err(|e| format!("lone surrogate: {}", e))?);
            }
            Ok(())
        };

        while i < chars.len() {
            let c = chars[i];
            if c != '\\' {
                if c.is_ascii_control() || c == '"' || grammar.forbidden.contains(&c) {
                    return Err(format!("raw {:?} at {}", c, i));
                }
                flush(&mut units, &mut out)?;
                out.push(c);
                i += 1;
                continue;
            }

            let next = *chars.get(i + 1).ok_or("dangling backslash")?;
            match next {
                'u' if chars.get(i + 2) == Some(&'{') => {
                    if !grammar.braced {
                        return Err(format!("braced escape at {}", i));
                    }
                    flush(&mut units, &mut out)?;
                    let end = (i + 3..chars.len()).find(|&j| chars[j] == '}')
                        .ok_or("unterminated braced escape")?;
                    if end - (i + 3) > 6 {
                        return Err(format!("too many digits at {}", i));
                    }
                    let value = hex_digits(&chars[i + 3..end], 16).ok_or("bad braced escape")?;
                    out.push(std::char::from_u32(value).ok_or("braced escape is not a char")?);
                    i = end + 1;
                },
                'u' => {
                    if !grammar.unicode4 || i + 6 > chars.len() {
                        return Err(format!("unicode escape at {}", i));
                    }
                    let value = hex_digits(&chars[i + 2..i + 6], 16).ok_or("bad unicode escape")?;
                    units.push(value as u16);
                    i += 6;
                },
                '0'..='7' => {
                    if !grammar.octal || i + 4 > chars.len() {
                        return Err(format!("octal escape at {}", i));
                    }
                    let value = hex_digits(&chars[i + 1..i + 4], 8).ok_or("bad octal escape")?;
                    flush(&mut units, &mut out)?;
                    out.push(std::char::from_u32(value).ok_or("octal escape is not a char")?);
                    i += 4;
                },
                'n' | 'r' | 't' | '"' | '\\' => {
                    flush(&mut units, &mut out)?;
                    out.push(match next {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    });
                    i += 2;
                },
                other => return Err(format!("unknown escape \\{} at {}", other, i)),
            }
        }
        flush(&mut units, &mut out)?;
        Ok(out)
    }

    /// Arbitrary strings with the characters that need special treatment mixed in.
    fn text() -> impl Strategy<Value = String> {
        let special = prop::sample::select(vec![
            '\0', '\u{1}', '\u{7f}', '\u{85}', '\u{2028}', '\u{2029}', '\u{feff}', '"', '\\',
            '\n', '7', 'u', '{', '\u{1f600}',
        ]);
        prop::collection::vec(prop_oneof![any::<char>(), special], 0..48)
            .prop_map(|chars| chars.into_iter().collect())
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(r#"a\"b\\c"#, c_like("a\"b\\c"));
        assert_eq!(r#"a\"b\\c"#, java("a\"b\\c"));
        assert_eq!("line\\nbreak\\ttab", cpp("line\nbreak\ttab"));
    }

    #[test]
    fn control_characters_per_language() {
        assert_eq!("\\u0001", c_like("\u{1}"));
        assert_eq!("\\u{1}", rust("\u{1}"));
        assert_eq!("\\001", cpp("\u{1}"));
        assert_eq!("\\177", java("\u{7f}"));
        assert_eq!("\\000", cpp("\0"));
    }

    #[test]
    fn non_ascii_handling() {
        assert_eq!("héllo", c_like("héllo"));
        assert_eq!("h\\u00e9llo", csharp("héllo"));
        assert_eq!("\\ud83d\\ude00", java("\u{1f600}"));
        assert_eq!("\\u2028", c_like("\u{2028}"));
    }

    #[test]
    fn separators_use_the_escape_form_of_each_language() {
        let s = "x\u{2028}y\u{2029}z";
        assert_eq!(r"x\u2028y\u2029z", c_like(s));
        assert_eq!(r"x\u{2028}y\u{2029}z", rust(s));
        assert_eq!(r"x\u2028y\u2029z", csharp(s));
        assert_eq!(r"x\u2028y\u2029z", java(s));
        assert_eq!(s, cpp(s));
        assert_eq!(r"\u{85}", rust("\u{85}"));
    }

    #[test]
    fn byte_order_mark_is_escaped() {
        assert_eq!(r"a\ufeffb", c_like("a\u{feff}b"));
        assert_eq!(r"a\u{feff}b", rust("a\u{feff}b"));
        assert!(!c_like("\u{feff}").contains('\u{feff}'));
    }

    #[test]
    fn rendered_rust_harness_uses_braced_separators() {
        use crate::languages::Language;

        let harness = Language::Rust.profile()
            .harness("fn solution(input: Json) -> Json { input }", "{\"s\":\"x\u{2028}y\"}");
        assert!(harness.contains(r"x\u{2028}y"));
        assert!(!harness.contains(r"\u2028"));
    }

    #[test]
    fn rendered_go_harness_has_no_byte_order_mark() {
        use crate::languages::Language;

        let harness = Language::Go.profile()
            .harness("package main\n", "\"a\u{feff}b\"");
        assert!(!harness.contains('\u{feff}'));
        assert!(harness.contains(r"a\ufeffb"));
    }

    #[test]
    fn grammars_reject_foreign_escape_forms() {
        assert!(unescape(r"\u2028", RUST).is_err());
        assert!(unescape(r"\u{2028}", C_LIKE).is_err());
        assert!(unescape(r"\001", C_LIKE).is_err());
        assert!(unescape(r"\u0001", CPP).is_err());
        assert!(unescape(r"\01", CPP).is_err());
        assert!(unescape("a\u{feff}b", C_LIKE).is_err());
        assert_eq!(Ok(String::from("x\u{2028}")), unescape(r"x\u{2028}", RUST));
    }

    #[test]
    fn octal_escapes_do_not_absorb_digits() {
        assert_eq!("\\0017", cpp("\u{1}7"));
        assert_eq!(Ok(String::from("\u{1}7")), unescape(&cpp("\u{1}7"), CPP));
    }

    #[test]
    fn java_chunks_split_on_characters() {
        let chunks = java_chunks("abcdé", 2);
        assert_eq!(vec!["ab", "cd", "\\u00e9"], chunks);
        assert_eq!(vec![String::new()], java_chunks("", 8000));
    }

    proptest! {
        #[test]
        fn prop_c_like_is_a_json_string_body(s in text()) {
            let decoded: String = serde_json::from_str(&format!("\"{}\"", c_like(&s))).unwrap();
            prop_assert_eq!(decoded, s);
        }

        #[test]
        fn prop_c_like_round_trips(s in text()) {
            prop_assert_eq!(unescape(&c_like(&s), C_LIKE), Ok(s));
        }

        #[test]
        fn prop_csharp_is_ascii_and_json_compatible(s in text()) {
            let body = csharp(&s);
            prop_assert!(body.is_ascii());
            prop_assert_eq!(unescape(&body, C_LIKE), Ok(s.clone()));
            let decoded: String = serde_json::from_str(&format!("\"{}\"", body)).unwrap();
            prop_assert_eq!(decoded, s);
        }

        #[test]
        fn prop_rust_round_trips(s in text()) {
            prop_assert_eq!(unescape(&rust(&s), RUST), Ok(s));
        }

        #[test]
        fn prop_cpp_round_trips(s in text()) {
            prop_assert_eq!(unescape(&cpp(&s), CPP), Ok(s));
        }

        #[test]
        fn prop_java_chunks_round_trip(s in text(), size in 1usize..16) {
            let chunks = java_chunks(&s, size);
            prop_assert!(chunks.iter().all(|chunk| chunk.is_ascii()));
            let mut joined = String::new();
            for chunk in chunks.iter() {
                joined.push_str(&unescape(chunk, JAVA).map_err(TestCaseError::fail)?);
            }
            prop_assert_eq!(joined, s);
        }
    }
}
