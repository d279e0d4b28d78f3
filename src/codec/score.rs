//! Plausibility heuristics consulted during auto-decode.
//!
//! Loose alphabets (ASCII85 accepts almost any printable run, Base85 any
//! alphanumeric word) decode plain text into garbage far too often.  These
//! checks let a codec veto such results without changing what it decodes in
//! single-codec mode.

/// Minimum share of printable characters for a value to count as text.
const PRINTABLE_RATIO: f64 = 0.95;

/// Relative frequency of `a`..=`z` in English prose, in percent.
const LETTER_FREQ: [f64; 26] = [
    8.2, 1.5, 2.8, 4.3, 12.7, 2.2, 2.0, 6.1, 7.0, 0.15, 0.77, 4.0, 2.4,
    6.7, 7.5, 1.9, 0.095, 6.0, 6.3, 9.1, 2.8, 0.98, 2.4, 0.15, 2.0, 0.074,
];

/// [`english_score`] a rewrite must reach when common words alone do not
/// settle it.
const ENGLISH_FLOOR: f64 = 0.5;

/// Letters needed before a single common word counts as evidence.
const SINGLE_HIT_LETTERS: usize = 8;

/// Letters needed before letter frequency alone counts as evidence.
const FREQUENCY_ONLY_LETTERS: usize = 20;

/// Punctuation that shows up in ordinary sentences.
const PROSE_PUNCT: &str = ".,!?'\"-:;()";

/// Common words of English prose and of the script sources this tool is
/// usually pointed at.  Matched as whole, lower-cased words.
const KEYWORDS: &[&str] = &[
    "the", "and", "that", "this", "with", "from", "have", "you", "are", "was",
    "for", "not", "but", "all", "what", "your", "there", "they", "will",
    "hello", "world", "test", "flag", "secret", "password", "key", "user",
    "import", "def", "return", "print", "class", "lambda", "exec", "eval",
    "while", "if", "else", "elif", "true", "false", "none", "self", "in",
    "is", "of", "to", "it", "be", "on", "as", "or", "at", "by", "an",
    "function", "var", "let", "const", "string", "decode", "encode",
];

/// True if `bytes` is UTF-8, nearly all of it printable, and mostly ASCII.
///
/// Non-ASCII characters only count as printable when alphabetic, so a lone
/// CJK ideograph or box-drawing symbol produced from noise does not pass.
pub fn looks_textual(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    let mut total = 0usize;
    let mut printable = 0usize;
    let mut ascii = 0usize;
    for c in text.chars() {
        total += 1;
        if c.is_ascii() {
            ascii += 1;
            if c.is_ascii_graphic() || c.is_ascii_whitespace() {
                printable += 1;
            }
        } else if c.is_alphabetic() {
            printable += 1;
        }
    }
    total > 0 && ascii * 2 > total && printable as f64 / total as f64 >= PRINTABLE_RATIO
}

/// Name of the container format `bytes` starts with, if recognised.
pub fn container_signature(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x1f, 0x8b, 0x08, ..] => Some("gzip"),
        [0x28, 0xb5, 0x2f, 0xfd, ..] => Some("zstd"),
        [0x5d, 0x00, 0x00, ..] => Some("lzma"),
        // 32K window at each of the four compression levels zlib writes.
        [0x78, 0x01 | 0x5e | 0x9c | 0xda, ..] => Some("zlib"),
        _ if super::marshal::code_object_offset(bytes).is_some() => Some("marshal"),
        _ => None,
    }
}

/// True if `text` is made of words: ASCII letters, whitespace and sentence
/// punctuation, plus digits when `allow_digits` is set.
pub fn looks_like_words(text: &str, allow_digits: bool) -> bool {
    let text = text.trim();
    text.bytes().any(|b| b.is_ascii_alphabetic())
        && text.chars().all(|c| {
            c.is_ascii_alphabetic()
                || c.is_ascii_whitespace()
                || (allow_digits && c.is_ascii_digit())
                || PROSE_PUNCT.contains(c)
        })
}

/// Radix codec veto.  Input that already reads as words only gives way to
/// output that reads better; anything else must decode to text or to a
/// container the next layer can open.
pub fn plausible_radix_output(input: &[u8], output: &[u8], loose_alphabet: bool) -> bool {
    if let Ok(before) = std::str::from_utf8(input) {
        if looks_like_words(before, loose_alphabet) {
            return looks_textual(output)
                && std::str::from_utf8(output).map_or(false, |after| reads_better(before, after));
        }
    }
    container_signature(output).is_some() || looks_textual(output)
}

/// Cosine similarity between the letter histogram of `text` and English
/// letter frequencies: near 0.8 for prose, well under 0.5 for rotated or
/// random letters, 0.0 with no letters at all.
pub fn english_score(text: &str) -> f64 {
    let mut counts = [0u32; 26];
    for b in text.bytes().filter(u8::is_ascii_alphabetic) {
        counts[usize::from(b.to_ascii_lowercase() - b'a')] += 1;
    }
    let norm = counts.iter().map(|&n| f64::from(n).powi(2)).sum::<f64>().sqrt();
    if norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = counts.iter().zip(LETTER_FREQ).map(|(&n, f)| f64::from(n) * f).sum();
    let freq_norm = LETTER_FREQ.iter().map(|f| f * f).sum::<f64>().sqrt();
    dot / (norm * freq_norm)
}

/// Number of [`KEYWORDS`] occurrences in `text`.  Words must be lower-case
/// or capitalised; `IF` in a run of shifted symbols is not the keyword.
pub fn keyword_hits(text: &str) -> usize {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|w| natural_case(w))
        .filter(|w| KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(w)))
        .count()
}

fn natural_case(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some() && chars.all(|c| !c.is_ascii_uppercase())
}

/// True if `after` reads more like English than `before`.
///
/// The letter-frequency score must rise in every case.  On top of that
/// `after` needs either more common words (two, or one in at least
/// [`SINGLE_HIT_LETTERS`] letters of reasonably English text) or, with the
/// word count tied, enough letters for frequency alone to be meaningful.
pub fn reads_better(before: &str, after: &str) -> bool {
    let (score_before, score_after) = (english_score(before), english_score(after));
    if score_after <= score_before {
        return false;
    }
    let letters = after.bytes().filter(u8::is_ascii_alphabetic).count();
    let (hits_before, hits_after) = (keyword_hits(before), keyword_hits(after));
    if hits_after > hits_before {
        hits_after >= 2 || (letters >= SINGLE_HIT_LETTERS && score_after >= ENGLISH_FLOOR)
    } else {
        hits_after == hits_before && letters >= FREQUENCY_ONLY_LETTERS && score_after >= ENGLISH_FLOOR
    }
}
