use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardrailsConfig {
    pub banned_phrases: Vec<String>,
    pub banned_regexes: Vec<String>,
    pub min_length: usize,
    pub max_length: usize,
    pub require_disclaimer: bool,
    pub disclaimer: Option<String>,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            banned_phrases: Vec::new(),
            banned_regexes: Vec::new(),
            min_length: 0,
            max_length: 10_000,
            require_disclaimer: false,
            disclaimer: None,
        }
    }
}

impl GuardrailsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_length == 0 {
            return Err("maxLength must be positive".to_string());
        }
        if self.min_length > self.max_length {
            return Err(format!(
                "minLength {} exceeds maxLength {}",
                self.min_length, self.max_length
            ));
        }
        for raw in &self.banned_regexes {
            let pattern = raw.trim();
            if pattern.is_empty() {
                continue;
            }
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|err| format!("invalid banned_regex {pattern}: {err}"))?;
        }
        Ok(())
    }

    /// Filter a provider response. `Err` carries the rejection reason.
    ///
    /// Overlong text is truncated rather than rejected, but the banned-content
    /// scan always runs against the original text: truncation must not hide a
    /// banned phrase in the removed tail.
    pub fn apply(&self, text: &str) -> Result<String, String> {
        let length = text.chars().count();
        if length < self.min_length {
            return Err("response too short".to_string());
        }

        let mut out = if length > self.max_length {
            text.chars().take(self.max_length).collect()
        } else {
            text.to_string()
        };

        if let Some(reason) = self.check_text(text) {
            return Err(reason);
        }

        if self.require_disclaimer {
            if let Some(disclaimer) = self.disclaimer.as_deref().filter(|d| !d.is_empty()) {
                out.push_str("\n\n");
                out.push_str(disclaimer);
            }
        }

        Ok(out)
    }

    fn check_text(&self, text: &str) -> Option<String> {
        if !self.banned_phrases.is_empty() {
            let content = text.to_lowercase();
            for phrase in &self.banned_phrases {
                let phrase = phrase.trim();
                if phrase.is_empty() {
                    continue;
                }
                if content.contains(&phrase.to_lowercase()) {
                    return Some(format!("banned phrase: {phrase}"));
                }
            }
        }

        for raw in &self.banned_regexes {
            let pattern = raw.trim();
            if pattern.is_empty() {
                continue;
            }
            let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(regex) => regex,
                Err(_) => return Some(format!("invalid banned regex: {pattern}")),
            };
            if regex.is_match(text) {
                return Some(format!("banned pattern: {pattern}"));
            }
        }

        None
    }
}
