//! Grammatical completeness heuristic

/// Czech verb inflections (present tense, past participle, conditional)
const VERB_ENDINGS: &[&str] = &[
    "ám", "áš", "á", "áme", "áte", "ají", "ím", "íš", "í", "íme", "íte", "uju", "uješ", "uje",
    "ujeme", "ujete", "ují", "oval", "ovala", "ovali", "bych", "bys", "by", "bychom", "byste",
];

const QUESTION_WORDS: &[&str] = &["kolik", "kdy", "kde", "jak", "co", "proč", "kdo"];

/// Whether `text` reads as a finished sentence
///
/// True when it ends in `.`, `?` or `!`. Otherwise at least three words are
/// required, plus either a word with a verb ending or a leading question word.
/// Advisory only: the boundary detector never gates emission on it.
pub fn is_sentence_complete(text: &str) -> bool {
    let text = text.trim().to_lowercase();

    let Some(last) = text.chars().last() else {
        return false;
    };
    if matches!(last, '.' | '?' | '!') {
        return true;
    }

    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() < 3 {
        return false;
    }

    let starts_with_question = QUESTION_WORDS.iter().any(|q| words[0].starts_with(q));
    if starts_with_question {
        return true;
    }

    words
        .iter()
        .any(|word| VERB_ENDINGS.iter().any(|ending| word.ends_with(ending)))
}
