//! Validated command names: the registry key a handler registers under and
//! a client's `Command` field must match.

#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ValidatedChannelString(String);

impl ValidatedChannelString {
    pub const MAX_BYTES: usize = 128;

    pub fn new(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.as_bytes().len() > Self::MAX_BYTES || !raw.is_ascii() {
            return None;
        }
        let mut chars = raw.chars();
        let first = chars.next()?;
        if !is_alnum(first) {
            return None;
        }
        for ch in chars {
            if !(is_alnum(ch) || matches!(ch, '.' | '_' | '-')) {
                return None;
            }
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ValidatedChannelString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_alnum(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dotted_command_names() {
        assert!(ValidatedChannelString::new("agent.hostname.reconfigurehostname").is_some());
    }

    #[test]
    fn rejects_empty_and_oversized_and_non_ascii() {
        assert!(ValidatedChannelString::new("").is_none());
        assert!(ValidatedChannelString::new(&"a".repeat(200)).is_none());
        assert!(ValidatedChannelString::new("café.reload").is_none());
    }
}
