//! Text helpers for agent replies: spoken summaries and cost estimates.

/// USD per million input tokens.
const INPUT_PRICE_PER_M: f64 = 3.0;
/// USD per million output tokens.
const OUTPUT_PRICE_PER_M: f64 = 15.0;
/// Rough tokens-per-word ratio used when the service reports no usage.
const TOKENS_PER_WORD: f64 = 1.3;

/// First `max` characters of `text` (never splits a code point).
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Shorten `text` for speech.
///
/// Text within `max_chars` is returned as is.  Longer text is cut to
/// `max_chars`, moved back to the last space when that space lies in the
/// final 20 % of the cut, and suffixed with `...`.
///
/// ```
/// use nero_voice::llm::speakable_summary;
///
/// assert_eq!(speakable_summary("São 10 horas.", 200), "São 10 horas.");
/// ```
pub fn speakable_summary(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut = truncate_chars(text, max_chars);
    let cut = match cut.rfind(' ') {
        Some(i) if cut[..i].chars().count() as f64 > max_chars as f64 * 0.8 => &cut[..i],
        _ => cut.as_str(),
    };
    format!("{}...", cut.trim_end())
}

/// Token count guessed from whitespace-separated words.
pub fn estimated_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * TOKENS_PER_WORD
}

pub fn estimate_cost_usd(input_tokens: f64, output_tokens: f64) -> f64 {
    (input_tokens * INPUT_PRICE_PER_M + output_tokens * OUTPUT_PRICE_PER_M) / 1_000_000.0
}
