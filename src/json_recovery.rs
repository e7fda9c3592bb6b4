//! Pulls a single JSON object out of free-form model output and repairs the
//! damage language models commonly do to it before parsing.

use log::debug;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    Extract,
    Parse,
}

impl fmt::Display for RecoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryStage::Extract => write!(f, "extract"),
            RecoveryStage::Parse => write!(f, "parse"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("no JSON object found in response")]
    NotFound,
    /// Carries the error from the strict parse of the untouched text.
    #[error("response JSON is malformed beyond repair: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
}

impl RecoveryError {
    pub fn stage(&self) -> RecoveryStage {
        match self {
            RecoveryError::NotFound => RecoveryStage::Extract,
            RecoveryError::Parse { .. } => RecoveryStage::Parse,
        }
    }
}

/// Finds the outermost `{ ... }` span: first `{` through last `}`.
///
/// A span left unbalanced by truncation extends to the end of the text instead.
pub fn extract_json(raw: &str) -> Result<&str, RecoveryError> {
    let start = raw.find('{').ok_or(RecoveryError::NotFound)?;

    if let Some(end) = raw.rfind('}').filter(|&end| end > start) {
        let span = &raw[start..=end];
        if bracket_depth(span) <= 0 {
            return Ok(span);
        }
    }

    let tail = raw[start..].trim_end();
    let tail = tail.strip_suffix("```").unwrap_or(tail).trim_end();
    // A lone `{` with nothing after it is not an object.
    if tail[1..].trim().is_empty() {
        return Err(RecoveryError::NotFound);
    }
    Ok(tail)
}

/// Strict parse first, then one repair pass and a single retry.
pub fn repair_and_parse(slice: &str) -> Result<Value, RecoveryError> {
    let strict_error = match serde_json::from_str::<Value>(slice) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let repaired = repair(slice);
    debug!("Strict JSON parse failed ({}), retrying after repair", strict_error);

    serde_json::from_str::<Value>(&repaired).map_err(|retry_error| {
        debug!("Repaired JSON still invalid: {}", retry_error);
        RecoveryError::Parse {
            source: strict_error,
        }
    })
}

pub fn recover_structured(raw: &str) -> Result<Value, RecoveryError> {
    let slice = extract_json(raw)?;
    repair_and_parse(slice)
}

/// Net count of unclosed `{`/`[` outside string literals.
fn bracket_depth(text: &str) -> i64 {
    let mut depth = 0i64;
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from.min(chars.len())..]
        .iter()
        .copied()
        .find(|c| !c.is_whitespace())
}

/// Whether a `"` inside a string ends it, judged by what follows.
fn quote_closes_string(chars: &[char], after: usize, is_key: bool) -> bool {
    match next_significant(chars, after) {
        None => true,
        Some(':') => true,
        Some(',') | Some('}') | Some(']') => !is_key,
        Some(_) => false,
    }
}

struct Repairer {
    out: String,
    closers: Vec<char>,
    last_significant: Option<char>,
    last_string_was_key: bool,
}

impl Repairer {
    fn trim_trailing_comma(&mut self) {
        let trimmed = self.out.trim_end().len();
        self.out.truncate(trimmed);
        if self.out.ends_with(',') {
            self.out.pop();
            let trimmed = self.out.trim_end().len();
            self.out.truncate(trimmed);
        }
    }

    fn close(&mut self, closer: char) {
        self.trim_trailing_comma();
        if self.out.ends_with(':') {
            self.out.push_str("null");
        } else if closer == '}' && self.last_string_was_key && self.out.ends_with('"') {
            self.out.push_str(":null");
        }
        self.out.push(closer);
        self.last_significant = Some(closer);
        self.last_string_was_key = false;
    }
}

/// Single best-effort pass: drops trailing and doubled commas, escapes raw control
/// characters and stray interior quotes, fixes invalid escapes, then closes whatever a
/// truncated response left open.
fn repair(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut r = Repairer {
        out: String::with_capacity(input.len() + 16),
        closers: Vec::new(),
        last_significant: None,
        last_string_was_key: false,
    };
    let mut in_string = false;
    let mut string_is_key = false;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if in_string {
            match c {
                '\\' => match chars.get(i + 1) {
                    Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => {
                        r.out.push(c);
                        r.out.push(chars[i + 1]);
                        i += 1;
                    }
                    Some('\'') => {
                        r.out.push('\'');
                        i += 1;
                    }
                    Some(_) => r.out.push_str("\\\\"),
                    None => {}
                },
                '"' if quote_closes_string(&chars, i + 1, string_is_key) => {
                    r.out.push('"');
                    in_string = false;
                    r.last_significant = Some('"');
                    r.last_string_was_key = string_is_key;
                }
                '"' => r.out.push_str("\\\""),
                '\n' => r.out.push_str("\\n"),
                '\r' => r.out.push_str("\\r"),
                '\t' => r.out.push_str("\\t"),
                c if c.is_control() => r.out.push_str(&format!("\\u{:04x}", c as u32)),
                c => r.out.push(c),
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                string_is_key = r.closers.last() == Some(&'}')
                    && matches!(r.last_significant, Some('{') | Some(','));
                in_string = true;
                r.out.push(c);
            }
            '{' | '[' => {
                r.closers.push(if c == '{' { '}' } else { ']' });
                r.out.push(c);
                r.last_significant = Some(c);
            }
            '}' | ']' => {
                // A closer with no matching opener is dropped.
                if r.closers.contains(&c) {
                    while let Some(expected) = r.closers.pop() {
                        r.close(expected);
                        if expected == c {
                            break;
                        }
                    }
                }
            }
            ',' => {
                if !matches!(r.last_significant, Some(',') | Some('{') | Some('[') | None) {
                    r.out.push(c);
                    r.last_significant = Some(c);
                }
            }
            c if c.is_whitespace() => r.out.push(c),
            c => {
                r.out.push(c);
                r.last_significant = Some(c);
            }
        }
        i += 1;
    }

    if in_string {
        r.out.push('"');
        r.last_significant = Some('"');
        r.last_string_was_key = string_is_key;
    }
    while let Some(closer) = r.closers.pop() {
        r.close(closer);
    }

    r.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_with_prose_and_fences() {
        let raw = "Sure! ```json\n{\"a\": {\"b\": 1}}\n``` hope that helps";
        assert_eq!(extract_json(raw).unwrap(), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn test_extract_json_not_found() {
        assert!(matches!(extract_json("no json here"), Err(RecoveryError::NotFound)));
        assert!(matches!(extract_json("} backwards {"), Err(RecoveryError::NotFound)));
        assert!(matches!(extract_json("{"), Err(RecoveryError::NotFound)));
        assert!(matches!(
            extract_json("Here you go:\n```json\n{\n```"),
            Err(RecoveryError::NotFound)
        ));
    }

    #[test]
    fn test_extract_json_truncated_after_inner_object() {
        let raw = "{\"a\": {\"b\": 1}, \"c\": [1, 2";
        assert_eq!(extract_json(raw).unwrap(), raw);
    }

    #[test]
    fn test_extract_json_truncated_inside_fence() {
        let raw = "```json\n{\"title\": \"Soup\", \"tags\": [\"a\"\n```";
        assert_eq!(extract_json(raw).unwrap(), "{\"title\": \"Soup\", \"tags\": [\"a\"");
    }

    #[test]
    fn test_strict_json_is_untouched() {
        let value = repair_and_parse(r#"{"title": "Soup", "n": [1, 2.5, null, true]}"#).unwrap();
        assert_eq!(value, json!({"title": "Soup", "n": [1, 2.5, null, true]}));
    }

    #[test]
    fn test_trailing_commas() {
        let value = repair_and_parse(r#"{"a": [1, 2, ], "b": {"c": 3,},}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2], "b": {"c": 3}}));
    }

    #[test]
    fn test_doubled_commas() {
        let value = repair_and_parse(r#"{"a": [1,, 2], "b": 3}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2], "b": 3}));
    }

    #[test]
    fn test_raw_control_characters_in_strings() {
        let value = repair_and_parse("{\"steps\": \"Chop.\n\tStir.\"}").unwrap();
        assert_eq!(value, json!({"steps": "Chop.\n\tStir."}));
    }

    #[test]
    fn test_unescaped_interior_quotes() {
        let value = repair_and_parse(r#"{"title": "Grandma's "famous" pie", "serves": 4}"#).unwrap();
        assert_eq!(value, json!({"title": "Grandma's \"famous\" pie", "serves": 4}));
    }

    #[test]
    fn test_invalid_escapes() {
        let value = repair_and_parse(r#"{"note": "it\'s 50\% done"}"#).unwrap();
        assert_eq!(value, json!({"note": "it's 50\\% done"}));
    }

    #[test]
    fn test_truncated_inside_string() {
        let value = repair_and_parse(r#"{"title": "Soup", "instructions": ["Boil wa"#).unwrap();
        assert_eq!(value, json!({"title": "Soup", "instructions": ["Boil wa"]}));
    }

    #[test]
    fn test_truncated_after_key_or_colon() {
        assert_eq!(
            repair_and_parse(r#"{"a": 1, "b""#).unwrap(),
            json!({"a": 1, "b": null})
        );
        assert_eq!(
            repair_and_parse(r#"{"a": 1, "b":"#).unwrap(),
            json!({"a": 1, "b": null})
        );
        assert_eq!(
            repair_and_parse(r#"{"a": [1, 2,"#).unwrap(),
            json!({"a": [1, 2]})
        );
    }

    #[test]
    fn test_mismatched_closer() {
        let value = repair_and_parse(r#"{"a": [1, 2}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn test_irreparable_keeps_strict_error() {
        let err = repair_and_parse(r#"{"a": tru"#).unwrap_err();
        assert_eq!(err.stage(), RecoveryStage::Parse);
        let RecoveryError::Parse { source } = err else {
            panic!("expected parse error");
        };
        assert!(source.is_eof() || source.is_syntax());
    }

    #[test]
    fn test_recover_structured_stages() {
        let err = recover_structured("The model refused.").unwrap_err();
        assert_eq!(err.stage(), RecoveryStage::Extract);

        let err = recover_structured("{ this is not json }").unwrap_err();
        assert_eq!(err.stage(), RecoveryStage::Parse);
    }
}
