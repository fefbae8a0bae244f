//! Free-form section bodies: strings as paragraphs, arrays as bullets,
//! objects as `Key: value` lines with nested values indented.

use serde_json::Value;

use super::canvas::Canvas;
use super::layout::{content_width, CONTENT_LEFT};

const BODY_SIZE: f32 = 9.0;
const LINE_H: f32 = 4.4;
const INDENT: f32 = 5.0;
const PARAGRAPH_GAP: f32 = 1.6;

pub(crate) fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.iter().all(is_blank),
        Value::Object(o) => o.values().all(is_blank),
        _ => false,
    }
}

/// `paymentTerms` / `payment_terms` -> `Payment Terms`.
pub(crate) fn humanize_key(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() && !current.chars().all(char::is_uppercase) {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "Yes" } else { "No" }.to_string()),
        _ => None,
    }
}

/// Writes wrapped lines at `x`, breaking pages line by line.
pub(crate) fn paragraph(canvas: &mut Canvas<'_>, text: &str, x: f32, size: f32, bold: bool) {
    let max_w = CONTENT_LEFT + content_width() - x;
    let lines = canvas.metrics.wrap(text, size, max_w);
    for line in lines {
        canvas.ensure(LINE_H);
        canvas.cursor.advance(LINE_H);
        canvas.text(&line, size, x, canvas.cursor.y + 1.0, bold);
    }
}

pub(crate) fn render_value(canvas: &mut Canvas<'_>, value: &Value, depth: usize) {
    let x = CONTENT_LEFT + depth as f32 * INDENT;
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for v in items.iter().filter(|v| !is_blank(v)) {
                match scalar_text(v) {
                    Some(t) => paragraph(canvas, &format!("- {t}"), x, BODY_SIZE, false),
                    None => render_value(canvas, v, depth + 1),
                }
            }
        }
        Value::Object(map) => {
            for (k, v) in map.iter().filter(|(_, v)| !is_blank(v)) {
                let key = humanize_key(k);
                match scalar_text(v) {
                    Some(t) => paragraph(canvas, &format!("{key}: {t}"), x, BODY_SIZE, false),
                    None => {
                        paragraph(canvas, &format!("{key}:"), x, BODY_SIZE, true);
                        render_value(canvas, v, depth + 1);
                    }
                }
            }
        }
        scalar => {
            if let Some(t) = scalar_text(scalar) {
                paragraph(canvas, &t, x, BODY_SIZE, false);
                canvas.cursor.advance(PARAGRAPH_GAP);
            }
        }
    }
}
