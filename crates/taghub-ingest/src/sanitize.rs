//! Text sanitization seam.
//!
//! HTML cleanup belongs to an external sanitizer; the coordinator only
//! depends on [`Sanitizer`].

/// Turns untrusted text into text safe to store and render.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, raw: &str) -> String;
}

/// Escapes markup characters and trims surrounding whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct EscapeSanitizer;

impl Sanitizer for EscapeSanitizer {
    fn sanitize(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.trim().chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                c if c.is_control() => {}
                c => out.push(c),
            }
        }
        out
    }
}
