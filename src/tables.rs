//! Morse data tables: character <-> representation mapping (spec §4.1).
//!
//! A representation is a non-empty string over `.` and `-`. Lookups on the
//! character side are case-insensitive; `' '` (inter-word-space) is never
//! looked up here, it is handled by the enqueue layer.

use lazy_static::lazy_static;
use phf::phf_map;
use std::collections::HashMap;

use crate::error::{CwError, CwResult};

pub static MORSE: phf::Map<char, &'static str> = phf_map! {
    'A' => ".-",    'B' => "-...",  'C' => "-.-.",  'D' => "-..",
    'E' => ".",     'F' => "..-.",  'G' => "--.",   'H' => "....",
    'I' => "..",    'J' => ".---",  'K' => "-.-",   'L' => ".-..",
    'M' => "--",    'N' => "-.",    'O' => "---",   'P' => ".--.",
    'Q' => "--.-",  'R' => ".-.",   'S' => "...",   'T' => "-",
    'U' => "..-",   'V' => "...-",  'W' => ".--",   'X' => "-..-",
    'Y' => "-.--",  'Z' => "--..",
    '0' => "-----", '1' => ".----", '2' => "..---", '3' => "...--",
    '4' => "....-", '5' => ".....", '6' => "-....", '7' => "--...",
    '8' => "---..", '9' => "----.",
    '.' => ".-.-.-", ',' => "--..--", '?' => "..--..", '/' => "-..-.",
    '&' => ".-...", '(' => "-.--.",  ')' => "-.--.-", '+' => ".-.-.",
    '=' => "-...-", '@' => ".--.-.", ':' => "---...", '\'' => ".----.",
    '"' => ".-..-.", '!' => "-.-.--",
    ';' => "-.-.-.", '_' => "..--.-", '$' => "...-..-",
    // procedural signals, sent without inter-character-space between
    // their constituent letters (scenario 6 in spec §8)
    '<' => "...-.-", // <SK>
};

lazy_static! {
    static ref CHAR_OF_REP: HashMap<&'static str, char> = {
        let mut m = HashMap::new();
        for (&c, &rep) in MORSE.entries() {
            m.insert(rep, c);
        }
        m
    };
}

/// Returns the Morse representation of `c`, case-insensitive.
pub fn representation_of_character(c: char) -> CwResult<&'static str> {
    let up = c.to_ascii_uppercase();
    MORSE
        .get(&up)
        .copied()
        .ok_or_else(|| CwError::NotFound(format!("no Morse representation for character '{c}'")))
}

/// Returns the character whose representation is `rep`.
pub fn character_of_representation(rep: &str) -> CwResult<char> {
    if !is_valid_representation(rep) {
        return Err(CwError::InvalidArgument(format!(
            "'{rep}' is not a valid representation"
        )));
    }
    CHAR_OF_REP
        .get(rep)
        .copied()
        .ok_or_else(|| CwError::NotFound(format!("representation '{rep}' matches no character")))
}

/// All characters known to the table, in table order.
pub fn list_all_characters() -> Vec<char> {
    MORSE.keys().copied().collect()
}

pub fn is_valid_character(c: char) -> bool {
    let up = c.to_ascii_uppercase();
    c == ' ' || MORSE.contains_key(&up)
}

/// A representation is valid iff it is non-empty and contains only `.`/`-`.
pub fn is_valid_representation(rep: &str) -> bool {
    !rep.is_empty() && rep.chars().all(|c| c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_character() {
        for c in list_all_characters() {
            let rep = representation_of_character(c).unwrap();
            let back = character_of_representation(rep).unwrap();
            assert_eq!(back, c);
        }
    }

    #[test]
    fn case_insensitive_lookup() {
        assert_eq!(
            representation_of_character('a').unwrap(),
            representation_of_character('A').unwrap()
        );
    }

    #[test]
    fn rejects_invalid_representation() {
        assert!(character_of_representation("x").is_err());
        assert!(character_of_representation("").is_err());
        assert!(!is_valid_representation(""));
        assert!(!is_valid_representation(".x-"));
    }

    #[test]
    fn space_is_not_in_the_table() {
        assert!(MORSE.get(&' ').is_none());
        assert!(is_valid_character(' '));
    }
}
