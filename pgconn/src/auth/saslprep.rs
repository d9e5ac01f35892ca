use std::fmt;

/// Error applying the SASLprep (RFC 4013) profile: the input contained a
/// prohibited code point or violated the bidirectional rule.
#[derive(Debug)]
pub struct SaslPrepError(stringprep::Error);

impl fmt::Display for SaslPrepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SASLprep rejected input: {:?}", self.0)
    }
}

impl std::error::Error for SaslPrepError {}

/// Apply the SASLprep (RFC 4013) string-preparation profile to a password
/// before using it in SCRAM. Delegates to the `stringprep` crate rather
/// than hand-rolling NFKC normalization and the RFC 3454 tables.
pub fn saslprep(input: &str) -> Result<std::borrow::Cow<'_, str>, SaslPrepError> {
    stringprep::saslprep(input).map_err(SaslPrepError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_hyphen_maps_to_nothing() {
        assert_eq!(saslprep("I\u{00AD}X").unwrap(), "IX");
    }

    #[test]
    fn ascii_passthrough() {
        assert_eq!(saslprep("user").unwrap(), "user");
        assert_eq!(saslprep("USER").unwrap(), "USER");
    }

    #[test]
    fn nfkc_normalizes() {
        assert_eq!(saslprep("\u{AA}").unwrap(), "a");
        assert_eq!(saslprep("\u{2168}").unwrap(), "IX");
    }

    #[test]
    fn prohibited_character_rejected() {
        assert!(saslprep("\u{0007}").is_err());
    }

    #[test]
    fn bidi_rule_rejected() {
        assert!(saslprep("\u{0627}\u{0031}").is_err());
    }
}
