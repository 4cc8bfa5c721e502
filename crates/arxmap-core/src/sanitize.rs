//! Best-effort text normalizer for values persisted to the corpus table.
//!
//! Drops characters that do not survive a UTF-8 CSV round trip cleanly:
//! control characters other than tab/newline/carriage return, the Unicode
//! replacement character, byte order marks and noncharacters.

pub trait Sanitize {
    fn sanitize(self) -> Self;
}

impl Sanitize for String {
    fn sanitize(self) -> Self {
        if self.chars().all(is_persistable) {
            return self;
        }
        self.chars().filter(|&c| is_persistable(c)).collect()
    }
}

impl<T: Sanitize> Sanitize for Vec<T> {
    fn sanitize(self) -> Self {
        self.into_iter().map(Sanitize::sanitize).collect()
    }
}

impl<T: Sanitize> Sanitize for Option<T> {
    fn sanitize(self) -> Self {
        self.map(Sanitize::sanitize)
    }
}

/// Convenience for borrowed input.
pub fn sanitize_text(input: &str) -> String {
    input.to_string().sanitize()
}

fn is_persistable(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => true,
        '\u{FEFF}' | '\u{FFFD}' => false,
        c if c.is_control() => false,
        c => !is_noncharacter(c),
    }
}

fn is_noncharacter(c: char) -> bool {
    let cp = c as u32;
    (0xFDD0..=0xFDEF).contains(&cp) || (cp & 0xFFFE) == 0xFFFE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_and_accented_text() {
        assert_eq!(sanitize_text("Schrödinger equation, λ-calculus"), "Schrödinger equation, λ-calculus");
    }

    #[test]
    fn strips_controls_but_keeps_whitespace() {
        assert_eq!(sanitize_text("a\u{0}b\u{7}c\td\ne"), "abc\td\ne");
    }

    #[test]
    fn strips_replacement_and_noncharacters() {
        assert_eq!(sanitize_text("x\u{FFFD}y\u{FFFF}z\u{FDD0}\u{FEFF}"), "xyz");
    }

    #[test]
    fn applies_recursively_to_lists() {
        let authors = vec!["Ada\u{1}".to_string(), "Alan".to_string()];
        assert_eq!(authors.sanitize(), vec!["Ada".to_string(), "Alan".to_string()]);
        assert_eq!(Some("c\u{0}d".to_string()).sanitize(), Some("cd".to_string()));
    }
}
