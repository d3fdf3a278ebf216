//! Yes/no prompts on the controlling terminal
//!
//! Only the question is written here. Answers arrive on the line reader the
//! caller already owns, so one reader serves both commands and answers.

use console::Term;
use std::io;

/// Write `question [y/N] ` to stderr
pub fn ask(question: &str, default: bool) -> io::Result<()> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    Term::stderr().write_line(&format!("{question} {hint}"))
}

/// Interpret an answer line; `None` for anything that is not yes or no
pub fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Like [`parse_answer`], with an empty line taking `default`
pub fn answer_or(answer: &str, default: bool) -> Option<bool> {
    if answer.trim().is_empty() {
        Some(default)
    } else {
        parse_answer(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y"), Some(true));
        assert_eq!(parse_answer(" YES "), Some(true));
        assert_eq!(parse_answer("n"), Some(false));
        assert_eq!(parse_answer(""), None);
        assert_eq!(parse_answer("maybe"), None);
    }

    #[test]
    fn test_empty_line_takes_default() {
        assert_eq!(answer_or("", false), Some(false));
        assert_eq!(answer_or("  ", true), Some(true));
        assert_eq!(answer_or("yes", false), Some(true));
        assert_eq!(answer_or("later", true), None);
    }
}
