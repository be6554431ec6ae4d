use secrecy::{ExposeSecret, SecretString};

/// Bearer credential for a remote service (summarization API, record store).
/// Redacted in Debug output.
#[derive(Clone)]
pub struct ApiToken(SecretString);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Build a token from optional configuration, treating blank as absent.
    pub fn from_config(value: Option<&str>) -> Option<Self> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let token = ApiToken::new("hf_secret_value");
        let shown = format!("{token:?}");
        assert!(!shown.contains("hf_secret_value"));
        assert!(shown.contains("REDACTED"));
    }

    #[test]
    fn expose_returns_value() {
        assert_eq!(ApiToken::new("abc").expose(), "abc");
    }

    #[test]
    fn blank_config_is_absent() {
        assert!(ApiToken::from_config(None).is_none());
        assert!(ApiToken::from_config(Some("   ")).is_none());
        assert_eq!(ApiToken::from_config(Some(" tok ")).unwrap().expose(), "tok");
    }
}
