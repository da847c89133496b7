//! Two-letter language codes used for user-facing defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Iso639_1Code {
    #[default]
    En,
    De,
}

impl Iso639_1Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Iso639_1Code::En => "en",
            Iso639_1Code::De => "de",
        }
    }

    /// Name shown for organizations that were never named.
    pub fn default_organization_name(&self) -> &'static str {
        match self {
            Iso639_1Code::En => "My Organization",
            Iso639_1Code::De => "Meine Organisation",
        }
    }
}

impl std::str::FromStr for Iso639_1Code {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept full locale tags such as "de-DE" or "en_US".
        let language = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match language.as_str() {
            "en" => Ok(Iso639_1Code::En),
            "de" => Ok(Iso639_1Code::De),
            _ => Err(format!("Unsupported language: {}", s)),
        }
    }
}
