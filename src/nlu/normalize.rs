//! # Persian Text Normalizer
//!
//! Canonicalizes free text before any matching happens. Every other NLU
//! component — and both sides of every name/subject comparison — goes
//! through [`normalize`] first, so the keyword tables elsewhere in this
//! crate are written against the *normalized* form.
//!
//! Pipeline, in order:
//!
//! 1. Unicode NFC composition
//! 2. Arabic letter variants → Persian (`ي`/`ى` → `ی`, `ك` → `ک`)
//! 3. Bidirectional control marks removed (LRM, RLM, embeddings, isolates)
//! 4. ZWNJ / ZWJ collapsed to a plain space (so «دانش‌آموز» → «دانش آموز»)
//! 5. Whitespace runs collapsed to single spaces, ends trimmed
//!
//! Pure function, no failure modes.

use unicode_normalization::UnicodeNormalization;

/// Bidi control characters stripped outright.
const BIDI_CONTROLS: &[char] = &[
    '\u{200E}', // LRM
    '\u{200F}', // RLM
    '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}', // embeddings/overrides
    '\u{2066}', '\u{2067}', '\u{2068}', '\u{2069}', // isolates
    '\u{061C}', // ALM
];

/// Canonicalizes a Persian string. See the module docs for the exact steps.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut started = false;

    for ch in text.nfc() {
        let mapped = match ch {
            '\u{064A}' | '\u{0649}' => Some('\u{06CC}'), // ي / ى → ی
            '\u{0643}' => Some('\u{06A9}'),              // ك → ک
            c if BIDI_CONTROLS.contains(&c) => None,
            '\u{200C}' | '\u{200D}' => {
                // ZWNJ / ZWJ act as word separators here
                pending_space = true;
                continue;
            }
            c if c.is_whitespace() => {
                pending_space = true;
                continue;
            }
            c => Some(c),
        };

        if let Some(c) = mapped {
            if pending_space && started {
                out.push(' ');
            }
            pending_space = false;
            started = true;
            out.push(c);
        }
    }

    out
}

/// True when the character belongs to the Persian/Arabic letter blocks.
///
/// Used by the intent classifier to recognize name-shaped token runs.
pub fn is_persian_letter(c: char) -> bool {
    matches!(c,
        '\u{0621}'..='\u{063A}'
        | '\u{0641}'..='\u{064A}'
        | '\u{066E}'..='\u{06D3}'
    )
}
