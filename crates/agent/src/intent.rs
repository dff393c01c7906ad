//! Intent classification
//!
//! Keyword matching over whole words of the cleaned utterance. Categories are
//! checked in a fixed priority order and the first match wins, so the result
//! is identical whether it runs per turn or offline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse caller intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Meeting,
    Price,
    Availability,
    Interest,
    Rejection,
    Confirmation,
    Question,
    Unknown,
}

/// Priority order with keyword phrases (lowercase, space-separated words)
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Meeting,
        &[
            "schůzka",
            "schůzku",
            "schůzky",
            "sejít",
            "setkání",
            "potkat",
            "setkat",
            "můžem se vidět",
            "osobně",
            "prezentace",
            "prezentaci",
            "konzultace",
            "konzultaci",
        ],
    ),
    (
        Intent::Price,
        &["kolik", "cena", "ceny", "cenu", "stojí", "stoji", "náklady", "vyjde"],
    ),
    (
        Intent::Availability,
        &["kdy", "termín", "termin", "volno", "volné", "volne"],
    ),
    (
        Intent::Interest,
        &["zajímá", "zajímalo", "chci", "mám zájem", "bylo by", "co kdyby"],
    ),
    (
        Intent::Rejection,
        &["ne", "nemám", "nechci", "nevím", "nezájem", "přesunout"],
    ),
    (
        Intent::Confirmation,
        &["ano", "jo", "dobře", "super", "ok", "je to", "souhlasím"],
    ),
    (Intent::Question, &["jaký", "jaká", "jaké", "jak", "co", "proč", "kde"]),
];

impl Intent {
    /// Classify a cleaned utterance
    pub fn classify(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return Intent::Unknown;
        }

        INTENT_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| contains_phrase(&words, k)))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Meeting => "meeting",
            Intent::Price => "price",
            Intent::Availability => "availability",
            Intent::Interest => "interest",
            Intent::Rejection => "rejection",
            Intent::Confirmation => "confirmation",
            Intent::Question => "question",
            Intent::Unknown => "unknown",
        }
    }

    /// Intents whose replies are cached regardless of query length
    pub fn is_cacheable(&self) -> bool {
        matches!(
            self,
            Intent::Price | Intent::Confirmation | Intent::Rejection | Intent::Availability
        )
    }

    pub fn all() -> &'static [Intent] {
        &[
            Intent::Meeting,
            Intent::Price,
            Intent::Availability,
            Intent::Interest,
            Intent::Rejection,
            Intent::Confirmation,
            Intent::Question,
            Intent::Unknown,
        ]
    }
}

fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split(' ').collect();
    needle.len() <= words.len() && words.windows(needle.len()).any(|w| w == needle.as_slice())
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::all()
            .iter()
            .find(|i| i.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown intent: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_intents() {
        assert_eq!(Intent::classify("kolik to stojí"), Intent::Price);
        assert_eq!(Intent::classify("kdy máte volno"), Intent::Availability);
        assert_eq!(Intent::classify("to mě zajímá"), Intent::Interest);
        assert_eq!(Intent::classify("ne, děkuji"), Intent::Rejection);
        assert_eq!(Intent::classify("ano"), Intent::Confirmation);
        assert_eq!(Intent::classify("a proč"), Intent::Question);
        assert_eq!(Intent::classify("můžeme se sejít osobně"), Intent::Meeting);
    }

    #[test]
    fn test_priority_order() {
        // meeting beats price, price beats availability
        assert_eq!(Intent::classify("kolik stojí konzultace"), Intent::Meeting);
        assert_eq!(Intent::classify("kdy a kolik"), Intent::Price);
        // rejection beats confirmation
        assert_eq!(Intent::classify("ano ale ne teď"), Intent::Rejection);
    }

    #[test]
    fn test_whole_word_matching() {
        // "ne" inside "není" or "ano" does not count
        assert_eq!(Intent::classify("není to"), Intent::Unknown);
        assert_eq!(Intent::classify("okno"), Intent::Unknown);
        assert_eq!(Intent::classify("mám zájem"), Intent::Interest);
        assert_eq!(Intent::classify("nemám čas"), Intent::Rejection);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(Intent::classify(""), Intent::Unknown);
        assert_eq!(Intent::classify("haló"), Intent::Unknown);
        assert_eq!(Intent::classify("!!!"), Intent::Unknown);
    }

    #[test]
    fn test_deterministic_and_case_insensitive() {
        let text = "Kolik TO Stojí?";
        assert_eq!(Intent::classify(text), Intent::classify(text));
        assert_eq!(Intent::classify(text), Intent::Price);
    }

    #[test]
    fn test_label_roundtrip() {
        for intent in Intent::all() {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), *intent);
        }
        assert!("sales".parse::<Intent>().is_err());
    }
}
