//! Recovering a JSON object from raw model output.
//!
//! Models wrap JSON in code fences, use typographic quotes, leave trailing
//! commas or stop before closing every brace. [`extract_json`] repairs the
//! common cases before handing the text to `serde_json`.

use serde_json::{Map, Value};

use crate::error::LlmError;

/// Pull the first JSON object out of `text`, repairing what it can.
///
/// # Errors
/// [`LlmError::ParseError`] if no object can be recovered.
pub fn extract_json(text: &str) -> Result<Value, LlmError> {
    let cleaned = normalise_quotes(strip_fences(text.trim()));
    let start = cleaned
        .find('{')
        .ok_or_else(|| LlmError::ParseError("no JSON object in response".into()))?;
    let body = object_span(&cleaned[start..]);

    if let Ok(value @ Value::Object(_)) = serde_json::from_str(body) {
        return Ok(value);
    }
    let repaired = balance(&drop_trailing_commas(body));
    match serde_json::from_str(&repaired) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(LlmError::ParseError("response is not a JSON object".into())),
        Err(e) => Err(LlmError::ParseError(e.to_string())),
    }
}

/// Lift the flat turn shape some models prefer into `action` / `internal`.
///
/// `{"speaks", "does", "tone", "emotional_state", "wants_to_exit"}` becomes
/// `{"action": {...}, "internal": {...}}`. Values already nested pass through.
#[must_use]
pub fn normalise_turn(value: Value) -> Value {
    let Value::Object(mut flat) = value else {
        return value;
    };
    if flat.contains_key("action") || !flat.contains_key("speaks") {
        return Value::Object(flat);
    }

    let mut action = Map::new();
    for key in ["speaks", "does", "tone"] {
        if let Some(v) = flat.remove(key) {
            action.insert(key.to_string(), v);
        }
    }
    let mut internal = Map::new();
    for key in ["emotional_state", "wants_to_exit", "intensity"] {
        if let Some(v) = flat.remove(key) {
            internal.insert(key.to_string(), v);
        }
    }
    flat.insert("action".into(), Value::Object(action));
    flat.insert("internal".into(), Value::Object(internal));
    Value::Object(flat)
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn normalise_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            c if c.is_control() && c != '\n' && c != '\t' && c != '\r' => ' ',
            c => c,
        })
        .collect()
}

/// The object opening `text`, up to the brace that balances it, or all of
/// `text` when the object is never closed. Braces inside strings don't count.
fn object_span(text: &str) -> &str {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[..=i];
                }
            }
            _ => {}
        }
    }
    text
}

fn drop_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Close an unterminated string, then any open arrays and objects.
fn balance(text: &str) -> String {
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => open.push('}'),
            '[' => open.push(']'),
            '}' | ']' => {
                open.pop();
            }
            _ => {}
        }
    }

    let mut out = text.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    while let Some(close) = open.pop() {
        out.push(close);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_object_parses() {
        let value = extract_json(r#"{"speaks": "hi"}"#).expect("valid");
        assert_eq!(value, json!({"speaks": "hi"}));
    }

    #[test]
    fn fenced_block_with_prose_around_it() {
        let text = "```json\n{\"observation\": \"odd\", \"wants_to_interject\": false}\n```";
        let value = extract_json(text).expect("fenced");
        assert_eq!(value["observation"], "odd");

        let chatty = "Sure! Here you go: {\"speaks\": \"fine\"} Hope that helps.";
        assert_eq!(extract_json(chatty).expect("prose")["speaks"], "fine");
    }

    #[test]
    fn smart_quotes_are_straightened() {
        let value = extract_json("{\u{201c}speaks\u{201d}: \u{201c}no\u{201d}}").expect("quotes");
        assert_eq!(value["speaks"], "no");
    }

    #[test]
    fn truncated_output_is_closed() {
        let value = extract_json(r#"{"action": {"speaks": "I was going to say"#).expect("balanced");
        assert_eq!(value["action"]["speaks"], "I was going to say");

        let value = extract_json(r#"{"beliefs": ["a", "b""#).expect("array");
        assert_eq!(value["beliefs"], json!(["a", "b"]));
    }

    #[test]
    fn trailing_commas_are_dropped() {
        let value = extract_json(r#"{"facts": ["x",], "n": 1,}"#).expect("commas");
        assert_eq!(value, json!({"facts": ["x"], "n": 1}));
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let value = extract_json(r#"{"speaks": "a {curly} remark"#).expect("string braces");
        assert_eq!(value["speaks"], "a {curly} remark");
    }

    #[test]
    fn truncation_after_a_braced_phrase_keeps_the_tail() {
        let value = extract_json(r#"{"action": {"speaks": "I saw {it} and then"#).expect("truncated");
        assert_eq!(value["action"]["speaks"], "I saw {it} and then");
    }

    #[test]
    fn prose_with_braces_after_the_object_is_ignored() {
        let value =
            extract_json(r#"{"speaks": "fine"} Note: I used {braces} here."#).expect("trailing prose");
        assert_eq!(value, json!({"speaks": "fine"}));

        let nested = extract_json(r#"{"a": {"b": "}"}, "c": [1, {"d": 2}]} ok }"#).expect("nested");
        assert_eq!(nested, json!({"a": {"b": "}"}, "c": [1, {"d": 2}]}));
    }

    #[test]
    fn no_object_is_a_parse_error() {
        assert!(matches!(extract_json("I refuse."), Err(LlmError::ParseError(_))));
    }

    #[test]
    fn flat_turn_is_nested() {
        let value = normalise_turn(json!({
            "speaks": "Leave it.",
            "tone": "cold",
            "emotional_state": "angry",
            "wants_to_exit": true
        }));
        assert_eq!(
            value,
            json!({
                "action": {"speaks": "Leave it.", "tone": "cold"},
                "internal": {"emotional_state": "angry", "wants_to_exit": true}
            })
        );

        let nested = json!({"action": {"speaks": "x"}, "internal": {}});
        assert_eq!(normalise_turn(nested.clone()), nested);
    }
}
