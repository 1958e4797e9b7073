//! The streaming generator: the event vocabulary rendered back to TOON
//! text. See `spec.md` §4.4.
//!
//! Two generation modes trade memory for compactness. `Mode::Streaming`
//! commits to a format as soon as it has seen enough of the first array
//! element to be safe (scalar → inline/list by count, object → list — never
//! tabular, since tabular needs every element's field set, not just the
//! first). `Mode::Buffered` first materializes the whole array and can
//! additionally choose the tabular format when every element shares an
//! identical, flat field set.

use crate::config::Options;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::token::Number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Streaming,
    Buffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteContext {
    ObjectValue,
    InlineArrayElement,
    TabularCell,
}

#[derive(Debug, Clone)]
enum Value {
    Null,
    Bool(bool),
    Integral(i64),
    Fractional(f64),
    String(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

/// Render a full event stream (ending in `Event::Eof`) to TOON text.
pub fn generate(events: Vec<Event>, options: &Options, mode: Mode) -> Result<String> {
    let mut iter = events.into_iter().peekable();
    let value = build_value(&mut iter)?;
    match iter.next() {
        Some(Event::Eof) | None => {}
        Some(other) => {
            return Err(Error::structural(
                format!("unexpected trailing event after the document's root value: {:?}", other),
                0,
                0,
            ))
        }
    }

    let mut lines = Vec::new();
    match value {
        Value::Object(fields) => render_object_fields(&fields, 0, options, mode, &mut lines),
        Value::Array(items) => render_array(None, &items, 0, options, mode, &mut lines),
        scalar => lines.push(scalar_text(&scalar, QuoteContext::ObjectValue)),
    }
    Ok(lines.join("\n"))
}

fn build_value<I: Iterator<Item = Event>>(
    events: &mut std::iter::Peekable<I>,
) -> Result<Value> {
    match events.next() {
        Some(Event::StartObject) => {
            let mut fields = Vec::new();
            loop {
                match events.next() {
                    Some(Event::FieldName(name)) => {
                        let value = build_value(events)?;
                        fields.push((name, value));
                    }
                    Some(Event::EndObject) => break,
                    other => {
                        return Err(Error::structural(
                            format!("unexpected event inside object: {:?}", other),
                            0,
                            0,
                        ))
                    }
                }
            }
            Ok(Value::Object(fields))
        }
        Some(Event::StartArray { .. }) => {
            let mut items = Vec::new();
            loop {
                match events.peek() {
                    Some(Event::EndArray) => {
                        events.next();
                        break;
                    }
                    None => {
                        return Err(Error::structural(
                            "unexpected end of event stream inside array",
                            0,
                            0,
                        ))
                    }
                    _ => items.push(build_value(events)?),
                }
            }
            Ok(Value::Array(items))
        }
        Some(Event::ValueString(s)) => Ok(Value::String(s)),
        Some(Event::ValueIntegral(v)) => Ok(Value::Integral(v)),
        Some(Event::ValueFractional(v)) => Ok(Value::Fractional(v)),
        Some(Event::ValueTrue) => Ok(Value::Bool(true)),
        Some(Event::ValueFalse) => Ok(Value::Bool(false)),
        Some(Event::ValueNull) => Ok(Value::Null),
        other => Err(Error::structural(
            format!("expected a value-starting event, found {:?}", other),
            0,
            0,
        )),
    }
}

fn indent_str(options: &Options, level: u32) -> String {
    " ".repeat((level * options.indent_size) as usize)
}

fn render_object_fields(
    fields: &[(String, Value)],
    level: u32,
    options: &Options,
    mode: Mode,
    out: &mut Vec<String>,
) {
    for (name, value) in fields {
        render_field(name, value, level, options, mode, out);
    }
}

fn render_field(name: &str, value: &Value, level: u32, options: &Options, mode: Mode, out: &mut Vec<String>) {
    let prefix = indent_str(options, level);
    let key = format_key(name);
    match value {
        Value::Object(fields) => {
            out.push(format!("{}{}:", prefix, key));
            if !fields.is_empty() {
                render_object_fields(fields, level + 1, options, mode, out);
            }
        }
        Value::Array(items) => render_array(Some(&key), items, level, options, mode, out),
        scalar => out.push(format!("{}{}: {}", prefix, key, scalar_text(scalar, QuoteContext::ObjectValue))),
    }
}

enum ArrayFormat {
    Empty,
    InlineScalars(Vec<String>),
    ScalarList(Vec<String>),
    Tabular { fields: Vec<String>, rows: Vec<Vec<String>> },
    ObjectList(Vec<Value>),
}

fn classify_array(items: &[Value], options: &Options, mode: Mode) -> ArrayFormat {
    if items.is_empty() {
        return ArrayFormat::Empty;
    }

    let all_scalars = items.iter().all(is_scalar);
    if all_scalars {
        let texts: Vec<String> = items
            .iter()
            .map(|v| scalar_text(v, QuoteContext::InlineArrayElement))
            .collect();
        if items.len() < options.inline_threshold {
            return ArrayFormat::InlineScalars(texts);
        }
        return ArrayFormat::ScalarList(texts);
    }

    let all_objects = items.iter().all(|v| matches!(v, Value::Object(_)));
    if all_objects && mode == Mode::Buffered {
        if let Some(fields) = uniform_flat_fields(items) {
            let rows = items.iter().map(|v| tabular_row(v, &fields)).collect();
            return ArrayFormat::Tabular { fields, rows };
        }
    }

    ArrayFormat::ObjectList(items.to_vec())
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn uniform_flat_fields(items: &[Value]) -> Option<Vec<String>> {
    let first_fields = match &items[0] {
        Value::Object(fields) => fields,
        _ => return None,
    };
    let names: Vec<String> = first_fields.iter().map(|(k, _)| k.clone()).collect();
    for item in items {
        let fields = match item {
            Value::Object(fields) => fields,
            _ => return None,
        };
        if fields.len() != names.len() {
            return None;
        }
        for (i, (name, value)) in fields.iter().enumerate() {
            if *name != names[i] || !is_scalar(value) {
                return None;
            }
        }
    }
    Some(names)
}

fn tabular_row(item: &Value, fields: &[String]) -> Vec<String> {
    let obj = match item {
        Value::Object(f) => f,
        _ => unreachable!("uniform_flat_fields only returns Some for all-object arrays"),
    };
    fields
        .iter()
        .map(|name| {
            let value = obj
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v)
                .expect("uniform_flat_fields guarantees every row has every field");
            scalar_text(value, QuoteContext::TabularCell)
        })
        .collect()
}

fn array_header(key: Option<&str>, len: usize, fields: Option<&[String]>) -> String {
    let mut s = String::new();
    if let Some(k) = key {
        s.push_str(k);
    }
    s.push('[');
    s.push_str(&len.to_string());
    s.push(']');
    if let Some(fields) = fields {
        s.push('{');
        s.push_str(
            &fields
                .iter()
                .map(|f| format_key(f))
                .collect::<Vec<_>>()
                .join(","),
        );
        s.push('}');
    }
    s
}

fn render_array(key: Option<&str>, items: &[Value], level: u32, options: &Options, mode: Mode, out: &mut Vec<String>) {
    let prefix = indent_str(options, level);
    match classify_array(items, options, mode) {
        ArrayFormat::Empty => {
            out.push(format!("{}{}:", prefix, array_header(key, 0, None)));
        }
        ArrayFormat::InlineScalars(texts) => {
            out.push(format!(
                "{}{}: {}",
                prefix,
                array_header(key, texts.len(), None),
                texts.join(",")
            ));
        }
        ArrayFormat::ScalarList(texts) => {
            out.push(format!("{}{}:", prefix, array_header(key, texts.len(), None)));
            let item_prefix = indent_str(options, level + 1);
            for text in texts {
                out.push(format!("{}- {}", item_prefix, text));
            }
        }
        ArrayFormat::Tabular { fields, rows } => {
            out.push(format!(
                "{}{}:",
                prefix,
                array_header(key, rows.len(), Some(&fields))
            ));
            let row_prefix = indent_str(options, level + 1);
            for row in rows {
                out.push(format!("{}{}", row_prefix, row.join(",")));
            }
        }
        ArrayFormat::ObjectList(values) => {
            out.push(format!("{}{}:", prefix, array_header(key, values.len(), None)));
            for value in &values {
                render_list_item(value, level + 1, options, mode, out);
            }
        }
    }
}

fn render_list_item(value: &Value, level: u32, options: &Options, mode: Mode, out: &mut Vec<String>) {
    let item_prefix = indent_str(options, level);
    match value {
        Value::Object(fields) => {
            if fields.is_empty() {
                out.push(format!("{}-", item_prefix));
                return;
            }
            let (first_name, first_value) = &fields[0];
            let first_key = format_key(first_name);
            match first_value {
                Value::Object(inner_fields) => {
                    out.push(format!("{}- {}:", item_prefix, first_key));
                    if !inner_fields.is_empty() {
                        render_object_fields(inner_fields, level + 1, options, mode, out);
                    }
                }
                Value::Array(items) => {
                    let mut nested = Vec::new();
                    render_array(Some(&first_key), items, level, options, mode, &mut nested);
                    let mut nested_lines = nested.into_iter();
                    let header_line = nested_lines.next().unwrap_or_default();
                    out.push(format!("{}- {}", item_prefix, header_line.trim_start()));
                    out.extend(nested_lines);
                }
                scalar => out.push(format!(
                    "{}- {}: {}",
                    item_prefix,
                    first_key,
                    scalar_text(scalar, QuoteContext::ObjectValue)
                )),
            }
            if fields.len() > 1 {
                render_object_fields(&fields[1..], level + 1, options, mode, out);
            }
        }
        Value::Array(items) => {
            let mut nested = Vec::new();
            render_array(None, items, level, options, mode, &mut nested);
            let mut nested_lines = nested.into_iter();
            let header_line = nested_lines.next().unwrap_or_default();
            out.push(format!("{}- {}", item_prefix, header_line.trim_start()));
            out.extend(nested_lines);
        }
        scalar => out.push(format!("{}- {}", item_prefix, scalar_text(scalar, QuoteContext::ObjectValue))),
    }
}

fn format_key(key: &str) -> String {
    if key_needs_quoting(key) {
        quote_string(key)
    } else {
        key.to_string()
    }
}

/// Keys are unquoted iff they match `[A-Za-z_][A-Za-z0-9_.]*` and are not
/// one of the reserved literals. See `spec.md` §4.4.1 — an allowlist, not
/// the denylist `needs_quoting` uses for ordinary string values, since an
/// unquoted key must also be lexable as a single `Identifier` token.
fn key_needs_quoting(key: &str) -> bool {
    if matches!(key, "true" | "false" | "null") {
        return true;
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return true,
    }
    !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn scalar_text(value: &Value, ctx: QuoteContext) -> String {
    match value {
        Value::String(s) => {
            if needs_quoting(s, ctx) {
                quote_string(s)
            } else {
                s.clone()
            }
        }
        Value::Integral(v) => v.to_string(),
        Value::Fractional(v) => format_fractional(*v),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Null => "null".to_string(),
        Value::Object(_) | Value::Array(_) => unreachable!("scalar_text called on a non-scalar value"),
    }
}

/// Format a number the same way regardless of which event produced it:
/// `NaN`/`Infinity` print as `null`, `-0.0` normalizes to `0.0`, and a
/// whole-valued fractional keeps a trailing `.0` rather than printing as
/// a bare integer — the integral/fractional split the lexer preserved
/// must stay visible in the rendered text, or `format_number(Fractional(n))`
/// and `format_number(Integral(n))` would collide and the round trip would
/// silently change a value's type. See `spec.md` §4.4.1 and §8 property 5's
/// `generate(42.0) = "42.0"`.
pub fn format_number(n: Number) -> String {
    match n {
        Number::Integral(v) => v.to_string(),
        Number::Fractional(v) => format_fractional(v),
    }
}

fn format_fractional(v: f64) -> String {
    if v.is_nan() || v.is_infinite() {
        return "null".to_string();
    }
    let v = if v == 0.0 { 0.0 } else { v };
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}.0", v as i64);
    }
    format!("{}", v)
}

fn needs_quoting(s: &str, ctx: QuoteContext) -> bool {
    if s.is_empty() {
        return true;
    }
    if s.trim() != s {
        return true;
    }
    if matches!(s, "true" | "false" | "null") {
        return true;
    }
    if looks_numeric(s) {
        return true;
    }
    if s.starts_with('-') {
        return true;
    }
    if s
        .chars()
        .any(|c| matches!(c, '\\' | '"' | '[' | ']' | '{' | '}') || c.is_control())
    {
        return true;
    }
    match ctx {
        QuoteContext::ObjectValue => s.contains(':') || s.contains(',') || s.contains('|'),
        QuoteContext::InlineArrayElement => {
            s.contains(',') || s.contains('|') || s.contains('\t') || s.contains(':')
        }
        QuoteContext::TabularCell => s.contains(',') || s.contains('|') || s.contains('\t'),
    }
}

fn looks_numeric(s: &str) -> bool {
    let mut chars = s.chars().peekable();
    if chars.peek() == Some(&'-') {
        chars.next();
    }
    let mut saw_digit = false;
    while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
        chars.next();
        saw_digit = true;
    }
    if !saw_digit {
        return false;
    }
    if chars.peek() == Some(&'.') {
        chars.next();
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            chars.next();
        }
    }
    if matches!(chars.peek(), Some('e') | Some('E')) {
        chars.next();
        if matches!(chars.peek(), Some('+') | Some('-')) {
            chars.next();
        }
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            chars.next();
        }
    }
    chars.next().is_none()
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: Vec<Event>, mode: Mode) -> String {
        generate(events, &Options::default(), mode).expect("expected generation to succeed")
    }

    #[test]
    fn flat_object() {
        let events = vec![
            Event::StartObject,
            Event::FieldName("name".into()),
            Event::ValueString("Alice".into()),
            Event::FieldName("age".into()),
            Event::ValueIntegral(30),
            Event::EndObject,
            Event::Eof,
        ];
        assert_eq!(run(events, Mode::Streaming), "name: Alice\nage: 30");
    }

    #[test]
    fn nested_object() {
        let events = vec![
            Event::StartObject,
            Event::FieldName("user".into()),
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(1),
            Event::EndObject,
            Event::EndObject,
            Event::Eof,
        ];
        assert_eq!(run(events, Mode::Streaming), "user:\n  id: 1");
    }

    #[test]
    fn inline_scalar_array_below_threshold() {
        let events = vec![
            Event::StartObject,
            Event::FieldName("tags".into()),
            Event::StartArray { len: 3 },
            Event::ValueString("a".into()),
            Event::ValueString("b".into()),
            Event::ValueString("c".into()),
            Event::EndArray,
            Event::EndObject,
            Event::Eof,
        ];
        assert_eq!(run(events, Mode::Streaming), "tags[3]: a,b,c");
    }

    #[test]
    fn scalar_array_above_threshold_becomes_list() {
        let mut events = vec![Event::StartObject, Event::FieldName("n".into()), Event::StartArray { len: 12 }];
        for i in 0..12 {
            events.push(Event::ValueIntegral(i));
        }
        events.push(Event::EndArray);
        events.push(Event::EndObject);
        events.push(Event::Eof);
        let text = run(events, Mode::Streaming);
        assert!(text.starts_with("n[12]:\n  - 0\n  - 1"));
    }

    #[test]
    fn buffered_mode_uses_tabular_for_uniform_objects() {
        let events = vec![
            Event::StartObject,
            Event::FieldName("users".into()),
            Event::StartArray { len: 2 },
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(1),
            Event::FieldName("name".into()),
            Event::ValueString("Alice".into()),
            Event::EndObject,
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(2),
            Event::FieldName("name".into()),
            Event::ValueString("Bob".into()),
            Event::EndObject,
            Event::EndArray,
            Event::EndObject,
            Event::Eof,
        ];
        assert_eq!(
            run(events, Mode::Buffered),
            "users[2]{id,name}:\n  1,Alice\n  2,Bob"
        );
    }

    #[test]
    fn streaming_mode_never_emits_tabular() {
        let events = vec![
            Event::StartObject,
            Event::FieldName("users".into()),
            Event::StartArray { len: 2 },
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(1),
            Event::FieldName("name".into()),
            Event::ValueString("Alice".into()),
            Event::EndObject,
            Event::StartObject,
            Event::FieldName("id".into()),
            Event::ValueIntegral(2),
            Event::FieldName("name".into()),
            Event::ValueString("Bob".into()),
            Event::EndObject,
            Event::EndArray,
            Event::EndObject,
            Event::Eof,
        ];
        let text = run(events, Mode::Streaming);
        assert!(!text.contains('{'));
        assert!(text.contains("- id: 1"));
    }

    #[test]
    fn number_canonicalization() {
        assert_eq!(format_number(Number::Fractional(2.0)), "2.0");
        assert_eq!(format_number(Number::Fractional(-0.0)), "0.0");
        assert_eq!(format_number(Number::Fractional(1.50)), "1.5");
        assert_eq!(format_number(Number::Fractional(f64::NAN)), "null");
        assert_eq!(format_number(Number::Fractional(f64::INFINITY)), "null");
        assert_eq!(format_number(Number::Integral(-12)), "-12");
    }

    #[test]
    fn quoting_is_minimal_for_plain_words() {
        assert!(!needs_quoting("alice", QuoteContext::ObjectValue));
        assert!(!needs_quoting("hello world", QuoteContext::ObjectValue));
    }

    #[test]
    fn quoting_catches_reserved_words_and_number_lookalikes() {
        assert!(needs_quoting("true", QuoteContext::ObjectValue));
        assert!(needs_quoting("007", QuoteContext::ObjectValue));
        assert!(needs_quoting("-5", QuoteContext::ObjectValue));
        assert!(needs_quoting("", QuoteContext::ObjectValue));
    }

    #[test]
    fn quoting_is_context_sensitive_for_delimiters() {
        assert!(!needs_quoting("a:b", QuoteContext::TabularCell));
        assert!(needs_quoting("a:b", QuoteContext::ObjectValue));
        assert!(needs_quoting("a,b", QuoteContext::InlineArrayElement));
        assert!(needs_quoting("a,b", QuoteContext::ObjectValue));
        assert!(needs_quoting("a|b", QuoteContext::ObjectValue));
    }

    #[test]
    fn key_quoting_uses_the_identifier_allowlist() {
        assert!(!key_needs_quoting("name"));
        assert!(!key_needs_quoting("_private"));
        assert!(!key_needs_quoting("a.b.c"));
        assert!(key_needs_quoting("a-b"));
        assert!(key_needs_quoting("a,b"));
        assert!(key_needs_quoting("a b"));
        assert!(key_needs_quoting("true"));
        assert!(key_needs_quoting("007"));
        assert!(key_needs_quoting(""));
    }

    #[test]
    fn string_escaping_round_trips_visually() {
        assert_eq!(quote_string("a\nb\t\"c\""), "\"a\\nb\\t\\\"c\\\"\"");
    }

    #[test]
    fn empty_array_has_no_body() {
        let events = vec![
            Event::StartObject,
            Event::FieldName("tags".into()),
            Event::StartArray { len: 0 },
            Event::EndArray,
            Event::EndObject,
            Event::Eof,
        ];
        assert_eq!(run(events, Mode::Streaming), "tags[0]:");
    }

    #[test]
    fn bare_root_scalar() {
        let events = vec![Event::ValueIntegral(42), Event::Eof];
        assert_eq!(run(events, Mode::Streaming), "42");
    }

    #[test]
    fn root_array_has_no_key() {
        let events = vec![
            Event::StartArray { len: 2 },
            Event::ValueIntegral(1),
            Event::ValueIntegral(2),
            Event::EndArray,
            Event::Eof,
        ];
        assert_eq!(run(events, Mode::Streaming), "[2]: 1,2");
    }
}
