//! Utterance and reply cleaning
//!
//! `clean_input` repairs common Czech STT mistakes and dialect variants in
//! caller speech. It works on whole words and repeats until nothing changes,
//! so cleaning an already cleaned utterance is a no-op.
//!
//! `clean_reply` makes model output safe for TTS: no markup, no emoji, no
//! repeated punctuation, and long replies cut to their first sentences.

use once_cell::sync::Lazy;
use regex::Regex;

use cold_call_config::constants::reply::{LONG_REPLY_CHARS, MAX_SENTENCES};

/// Single-word repairs. No replacement is itself a key.
const WORD_MAP: &[(&str, &str)] = &[
    ("dobry", "dobrý"),
    ("nula", "0"),
    ("zero", "0"),
    ("jeden", "1"),
    ("dva", "2"),
    ("tři", "3"),
    ("čtyři", "4"),
    ("pět", "5"),
    ("jo", "ano"),
    ("jojo", "ano"),
    ("jó", "ano"),
    ("áno", "ano"),
    ("no", "ano"),
    ("nee", "ne"),
    ("ne-ne", "ne"),
    ("vite", "víte"),
    ("vidite", "vidíte"),
    ("mate", "máte"),
    ("nemam", "nemám"),
    ("nema", "nemá"),
    ("nemate", "nemáte"),
    ("mamzajem", "mám zájem"),
    ("podívej", "poslechni"),
    ("slyš", "poslechni"),
    ("počkej", "chvíli"),
    ("tečka", "."),
    ("lomítko", "/"),
    ("hm", "hmm"),
    ("ehm", "hmm"),
    ("uh", "hmm"),
    ("áha", "aha"),
    ("jáha", "aha"),
];

/// Multi-word repairs, matched before single words
const PHRASE_MAP: &[(&[&str], &str)] = &[
    (&["slyšíme", "se", "dobrý", "den"], "dobrý den"),
    (&["ne", "prosím"], "ne"),
    (&["vůbec", "ne"], "ne"),
    (&["počkej", "chvíli"], "chvíli"),
    (&["dvě", "lomítka"], "//"),
];

/// Upper bound on cleaning passes; real input settles in two or three
const MAX_PASSES: usize = 16;

/// Normalize a raw caller utterance
pub fn clean_input(text: &str) -> String {
    let mut current = text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    for _ in 0..MAX_PASSES {
        let next = clean_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn clean_pass(text: &str) -> String {
    let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    let tokens = replace_phrases(tokens);
    let tokens: Vec<String> = tokens.iter().map(|t| replace_word(t)).collect();
    let tokens = dedupe_bigrams(dedupe_unigrams(tokens));
    tokens.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a token into leading punctuation, word and trailing punctuation
fn split_affixes(token: &str) -> (&str, &str, &str) {
    let core = token.trim_matches(|c: char| !c.is_alphanumeric());
    if core.is_empty() {
        return (token, "", "");
    }
    let start = token.find(core).unwrap_or(0);
    let end = start + core.len();
    (&token[..start], core, &token[end..])
}

fn replace_word(token: &str) -> String {
    let (prefix, core, suffix) = split_affixes(token);
    match WORD_MAP.iter().find(|(from, _)| *from == core) {
        Some((_, to)) => format!("{}{}{}", prefix, to, suffix),
        None => token.to_string(),
    }
}

fn replace_phrases(tokens: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    'outer: while i < tokens.len() {
        for (phrase, replacement) in PHRASE_MAP {
            let end = i + phrase.len();
            if end > tokens.len() {
                continue;
            }
            let matches = tokens[i..end]
                .iter()
                .zip(phrase.iter())
                .all(|(tok, word)| split_affixes(tok).1 == *word);
            if matches {
                let (prefix, _, _) = split_affixes(&tokens[i]);
                let (_, _, suffix) = split_affixes(&tokens[end - 1]);
                out.push(format!("{}{}{}", prefix, replacement, suffix));
                i = end;
                continue 'outer;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

fn dedupe_unigrams(mut tokens: Vec<String>) -> Vec<String> {
    tokens.dedup();
    tokens
}

/// "dobrý den dobrý den" -> "dobrý den"
fn dedupe_bigrams(tokens: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        out.push(token);
        let n = out.len();
        if n >= 4 && out[n - 4] == out[n - 2] && out[n - 3] == out[n - 1] {
            out.truncate(n - 2);
        }
    }
    out
}

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").expect("valid regex"));

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0xFE0F | 0x200D | 0x2B50 | 0x2B55 | 0x2705)
}

/// Make a model reply safe for TTS
pub fn clean_reply(text: &str) -> String {
    let text = BOLD.replace_all(text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text: String = text.chars().filter(|c| !is_emoji(*c)).collect();
    let text = collapse_punctuation(&text);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.chars().count() <= LONG_REPLY_CHARS {
        return text;
    }

    let sentences = split_sentences(&text);
    if sentences.len() > 1 {
        sentences[..sentences.len().min(MAX_SENTENCES)].join(" ")
    } else {
        text
    }
}

/// "..." -> ".", "!!" -> "!", "??" -> "?"
fn collapse_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let c = if c == '…' { '.' } else { c };
        if matches!(c, '.' | '!' | '?') && out.ends_with(c) {
            continue;
        }
        out.push(c);
    }
    out
}

/// Split after `.`, `?` or `!`, keeping the terminator
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '?' | '!')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_input_basics() {
        assert_eq!(clean_input("  Dobrý   DEN  "), "dobrý den");
        assert_eq!(clean_input("jo jo"), "ano");
        assert_eq!(clean_input("no tak jo"), "ano tak ano");
        assert_eq!(clean_input("nemam zajem"), "nemám zajem");
        assert_eq!(clean_input("mamzajem"), "mám zájem");
        assert_eq!(clean_input("dva nebo tři"), "2 nebo 3");
    }

    #[test]
    fn test_clean_input_phrases() {
        assert_eq!(clean_input("slyšíme se dobrý den"), "dobrý den");
        assert_eq!(clean_input("ne prosím"), "ne");
        assert_eq!(clean_input("vůbec ne!"), "ne!");
        assert_eq!(clean_input("Dobrý den dobrý den"), "dobrý den");
        assert_eq!(clean_input("info zavináč firma tečka cz"), "info zavináč firma . cz");
    }

    #[test]
    fn test_clean_input_keeps_punctuation() {
        assert_eq!(clean_input("jo, jasně"), "ano, jasně");
        assert_eq!(clean_input("Kolik stojí web?"), "kolik stojí web?");
    }

    #[test]
    fn test_clean_input_does_not_touch_word_parts() {
        // "no" inside "ano" or "nové" stays
        assert_eq!(clean_input("ano nové"), "ano nové");
        assert_eq!(clean_input("nemáte"), "nemáte");
    }

    #[test]
    fn test_clean_input_idempotent() {
        let samples = [
            "slyšíme se dobrý den dobrý den",
            "jo jo no tak jo",
            "nee ne-ne vůbec ne",
            "počkej chvíli počkej",
            "hm ehm uh áha jáha",
            "mamzajem mamzajem",
            "dvě lomítka lomítko tečka",
            "Kolik stojí web? jeden dva tři",
            "no no no no",
            "",
        ];
        for sample in samples {
            let once = clean_input(sample);
            assert_eq!(clean_input(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_clean_reply_markup_and_emoji() {
        assert_eq!(clean_reply("**Super!** To je *skvělé* 😀"), "Super! To je skvělé");
        assert_eq!(clean_reply("Jasně ✅ zavolám"), "Jasně zavolám");
        assert_eq!(clean_reply("Dobře... uvidíme!!! Opravdu??"), "Dobře. uvidíme! Opravdu?");
    }

    #[test]
    fn test_clean_reply_short_kept() {
        let reply = "Od 8000 Kč. Zajímá vás? Můžu poslat nabídku.";
        assert_eq!(clean_reply(reply), reply);
    }

    #[test]
    fn test_clean_reply_long_truncated() {
        let long = format!(
            "První věta je tady. Druhá věta? {} Třetí věta.",
            "Výplň ".repeat(40)
        );
        assert_eq!(clean_reply(&long), "První věta je tady. Druhá věta?");
    }

    #[test]
    fn test_clean_reply_long_single_sentence_kept() {
        let long = "slovo ".repeat(50);
        assert_eq!(clean_reply(&long), long.trim());
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Ahoj. Cena 8.500 Kč! A dál"),
            vec!["Ahoj.", "Cena 8.500 Kč!", "A dál"]
        );
        assert!(split_sentences("").is_empty());
    }
}
