//! Free-form language tags.
//!
//! A [`LanguageHint`] is not a closed ISO enum: topic models and corpora in the
//! wild carry whatever label their producer chose ("en", "EN ", "english").
//! Hints are canonicalized on construction (trim + ASCII lowercase) and every
//! comparison, hash and map lookup goes through the canonical form.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
#[serde(into = "String")]
pub struct LanguageHint(String);

impl LanguageHint {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for LanguageHint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LanguageHint {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<LanguageHint> for String {
    fn from(hint: LanguageHint) -> Self {
        hint.0
    }
}

impl std::str::FromStr for LanguageHint {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl std::fmt::Display for LanguageHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_forms_compare_equal() {
        assert_eq!(LanguageHint::new(" EN "), LanguageHint::new("en"));
        assert_eq!(LanguageHint::new("De").as_str(), "de");
    }

    #[test]
    fn serde_canonicalizes_on_deserialize() {
        let hint: LanguageHint = serde_json::from_str("\" FR \"").unwrap();
        assert_eq!(hint, LanguageHint::new("fr"));
        assert_eq!(serde_json::to_string(&hint).unwrap(), "\"fr\"");
    }
}
