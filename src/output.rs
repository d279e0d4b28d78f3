//! Output formatter: turns a [`DecodeOutcome`] into something a human can
//! read without losing track of how much was cut.

use serde::Serialize;
use std::fmt;

use crate::engine::{DecodeOutcome, TerminalReason};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered {
    /// At most `display_limit` characters of the final value.
    pub text:        String,
    pub truncated:   bool,
    pub shown_chars: usize,
    pub total_chars: usize,
    pub chain:       Vec<&'static str>,
    pub reason:      TerminalReason,
    /// `"text"` or `"bytes"`; bytes are rendered as lower-case hex.
    pub kind:        &'static str,
}

/// Render `outcome` for display, cutting on a character boundary once
/// `display_limit` characters have been emitted.  The outcome itself is not
/// touched, so callers can still export the full value.
pub fn render(outcome: &DecodeOutcome, display_limit: usize) -> Rendered {
    let full = outcome.value.to_string();
    let total_chars = full.chars().count();

    let cut = full.char_indices().nth(display_limit).map(|(i, _)| i);
    let text = match cut {
        Some(cut) => full[..cut].to_owned(),
        None => full,
    };
    let shown_chars = total_chars.min(display_limit);

    Rendered {
        text,
        truncated: shown_chars < total_chars,
        shown_chars,
        total_chars,
        chain: outcome.chain.clone(),
        reason: outcome.reason,
        kind: if outcome.value.is_text() { "text" } else { "bytes" },
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chain.is_empty() {
            writeln!(f, "Chain:  (none, {})", self.reason)?;
        } else {
            writeln!(f, "Chain:  {}", self.chain.join(" -> "))?;
            if self.reason == TerminalReason::MaxDepthReached {
                writeln!(f, "Note:   {}", self.reason)?;
            }
        }
        writeln!(f, "Result ({}):", self.kind)?;
        writeln!(f, "{}", self.text)?;
        if self.truncated {
            writeln!(f, "(output truncated: {} of {} characters shown)", self.shown_chars, self.total_chars)?;
        }
        Ok(())
    }
}
