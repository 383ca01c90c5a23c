//! Matching recognized text against configured wake/stop phrases.

/// Uppercase, turn punctuation into spaces, collapse whitespace.
///
/// ```
/// use nero_voice::listening::normalize;
///
/// assert_eq!(normalize("  Nero, enviar! "), "NERO ENVIAR");
/// ```
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(char::to_uppercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// An ordered list of phrases; the first listed phrase that matches wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseSet {
    /// (as configured, normalized)
    phrases: Vec<(String, String)>,
}

impl PhraseSet {
    /// Blank phrases are dropped.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| (p.as_ref().trim().to_string(), normalize(p.as_ref())))
            .filter(|(_, norm)| !norm.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// The configured phrase found in `text` on word boundaries, if any.
    pub fn find_in(&self, text: &str) -> Option<&str> {
        let haystack = format!(" {} ", normalize(text));
        self.phrases
            .iter()
            .find(|(_, norm)| haystack.contains(&format!(" {norm} ")))
            .map(|(original, _)| original.as_str())
    }
}
