use serde::{Deserialize, Serialize};

/// Dictionary / tile-bag language selector. Korean tiles carry raw jamos,
/// not composed syllables; composition only happens for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ko,
}

impl Language {
    /// Case-folds a raw board/rack token the way lookups expect it:
    /// upper for English, verbatim for Korean jamos.
    pub fn normalize(self, token: &str) -> String {
        match self {
            Language::En => token.to_uppercase(),
            Language::Ko => token.to_string(),
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}
