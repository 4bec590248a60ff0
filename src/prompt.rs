//! Yes/no confirmation before anything that downloads or touches the firewall.

use std::io::{self, BufRead, Write};

/// Asks the operator a yes/no question.
///
/// Closures implement it too, which keeps tests deterministic:
///
/// ```
/// use geoblock::Confirm;
///
/// let mut always_no = |_: &str| false;
/// assert!(!always_no.confirm("Proceed?"));
/// ```
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, question: &str) -> bool {
        self(question)
    }
}

/// Interactive prompt reading answers line by line.
///
/// An empty answer takes `default`; anything that is not a yes/no variant is
/// asked again. End of input counts as "no".
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
    default: Option<bool>,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on stdin/stdout with "yes" as the default answer.
    pub fn stdio() -> Self {
        TerminalPrompt::new(io::stdin().lock(), io::stdout(), Some(true))
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W, default: Option<bool>) -> Self {
        TerminalPrompt {
            input,
            output,
            default,
        }
    }

    fn suffix(&self) -> &'static str {
        match self.default {
            Some(true) => " [Y/n] ",
            Some(false) => " [y/N] ",
            None => " [y/n] ",
        }
    }

    fn ask(&mut self, question: &str) -> io::Result<bool> {
        let suffix = self.suffix();
        loop {
            write!(self.output, "{}{}", question, suffix)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(false);
            }

            match parse_answer(&line) {
                Some(answer) => return Ok(answer),
                None if line.trim().is_empty() => {
                    if let Some(default) = self.default {
                        return Ok(default);
                    }
                }
                None => {}
            }
            writeln!(self.output, "Please respond with 'yes' or 'no' (or 'y' or 'n').")?;
        }
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalPrompt<R, W> {
    fn confirm(&mut self, question: &str) -> bool {
        self.ask(question).unwrap_or_else(|e| {
            log::warn!("Could not read an answer ({}), assuming no", e);
            false
        })
    }
}

/// Interpret a typed answer; `None` if it is neither yes nor no.
fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "yes" | "ye" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(input: &str, default: Option<bool>) -> (bool, String) {
        let mut output = Vec::new();
        let result = TerminalPrompt::new(input.as_bytes(), &mut output, default).confirm("Go?");
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_answer_variants() {
        assert_eq!(parse_answer("Y\n"), Some(true));
        assert_eq!(parse_answer(" ye "), Some(true));
        assert_eq!(parse_answer("NO"), Some(false));
        assert_eq!(parse_answer("maybe"), None);
        assert_eq!(parse_answer(""), None);
    }

    #[test]
    fn test_empty_answer_takes_default() {
        assert!(answer("\n", Some(true)).0);
        assert!(!answer("\n", Some(false)).0);
    }

    #[test]
    fn test_reasks_until_valid() {
        let (result, output) = answer("perhaps\n\nn\n", None);
        assert!(!result);
        assert_eq!(output.matches("Go? [y/n] ").count(), 3);
        assert_eq!(output.matches("Please respond").count(), 2);
    }

    #[test]
    fn test_end_of_input_is_no() {
        assert!(!answer("", Some(true)).0);
    }
}
