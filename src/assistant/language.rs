use lazy_static::lazy_static;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::chat::{ HistoryTurn, Language };

lazy_static! {
    // Latin-script Arabic ("Arabizi") words common in greetings and small talk.
    static ref ARABIZI_WORDS: HashSet<&'static str> = [
        "ahlan",
        "marhaba",
        "mar7aba",
        "salam",
        "shukran",
        "shokran",
        "habibi",
        "yalla",
        "kifak",
        "kifik",
        "keefak",
        "ezayak",
        "ezayek",
        "izzayak",
        "shu",
        "shou",
        "eish",
        "wesh",
        "inshallah",
        "mashallah",
        "3adi",
        "7abibi",
        "ya3ni",
        "mnih",
        "tamam",
    ]
    .into_iter()
    .collect();
}

fn is_arabic_char(c: char) -> bool {
    matches!(
        c,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}'
    )
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '\u{00C0}'..='\u{024F}')
}

/// Net word vote: positive leans Arabic, negative leans English, zero is undecided.
fn script_vote(text: &str) -> i64 {
    let mut vote = 0i64;
    for word in text.split_whitespace() {
        if word.chars().any(is_arabic_char) {
            vote += 1;
            continue;
        }
        if !word.chars().any(is_latin_letter) {
            continue;
        }
        let bare: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        if ARABIZI_WORDS.contains(bare.as_str()) {
            vote += 1;
        } else {
            vote -= 1;
        }
    }
    vote
}

fn decide(text: &str) -> Option<Language> {
    match script_vote(text).cmp(&0) {
        Ordering::Greater => Some(Language::Ar),
        Ordering::Less => Some(Language::En),
        Ordering::Equal => None,
    }
}

/// Picks the reply language from the message, then from the most recent decisive
/// history turn, then `default`.
pub fn detect_language(message: &str, history: &[HistoryTurn], default: Language) -> Language {
    decide(message)
        .or_else(|| history.iter().rev().find_map(|turn| decide(&turn.text)))
        .unwrap_or(default)
}
