use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use crate::quiz::arithmetic::{GenerateError, GenerationParams};
use crate::quiz::session::QUIT_WORD;

/// Max number of problems the user can try to answer.
pub const MAX_NUM_QUESTIONS: usize = 250;

pub const MIN_NUM: i64 = -100;
pub const MAX_NUM: i64 = 100;

const OPERATIONS_MENU: &str = "
What operations do you want to be included?
    Enter any combination of
    - 'a' for addition
    - 's' for subtraction
    - 'm' for multiplication
    - 'd' for division
    (Ex. 'as' for addition and subtraction, or 'asmd' for all)
Operation(s): ";

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("quit requested")]
    Quit,
    #[error("input ended before setup was complete")]
    Closed,
    #[error(transparent)]
    Invalid(#[from] GenerateError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Everything asked before a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setup {
    pub use_ai: bool,
    pub params: GenerationParams,
    pub show_remaining: bool,
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Reads one trimmed line. The quit word ends everything.
    pub fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(PromptError::Closed);
        }

        let reply = line.trim().to_string();
        if reply.to_lowercase() == QUIT_WORD {
            return Err(PromptError::Quit);
        }
        Ok(reply)
    }

    fn say(&mut self, message: impl Display) -> Result<(), PromptError> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }

    pub fn ask_yes_no(&mut self, question: &str) -> Result<bool, PromptError> {
        loop {
            match self.ask(question)?.to_lowercase().as_str() {
                "y" => return Ok(true),
                "n" => return Ok(false),
                _ => self.say("Please enter 'y' or 'n'")?,
            }
        }
    }

    /// Asks until the reply parses and `accept` has no complaint about it.
    pub fn ask_number<T: FromStr>(
        &mut self,
        question: &str,
        accept: impl Fn(&T) -> Option<String>,
    ) -> Result<T, PromptError> {
        loop {
            let Ok(value) = self.ask(question)?.parse::<T>() else {
                self.say("Enter a number.")?;
                continue;
            };
            match accept(&value) {
                Some(complaint) => self.say(complaint)?,
                None => return Ok(value),
            }
        }
    }

    pub fn ask_operations(&mut self) -> Result<Vec<String>, PromptError> {
        loop {
            let reply = self.ask(OPERATIONS_MENU)?.to_lowercase();
            match GenerationParams::parse_operations(&reply) {
                Ok(operations) => {
                    return Ok(operations.iter().map(|op| op.code().to_string()).collect())
                }
                Err(GenerateError::NoOperations) => {
                    self.say("Must choose at least one operation.")?
                }
                Err(_) => self.say("Please enter a combination of 'a', 's', 'm', and 'd'.")?,
            }
        }
    }

    pub fn gather_setup(&mut self) -> Result<Setup, PromptError> {
        let use_ai = self.ask_yes_no("Would you like ChatGPT (AI) to generate your problems? (y/n) ")?;

        let min = self.ask_number(
            "Enter the smallest number that can be used in each problem (Doesn't apply to divisors): ",
            |n: &i64| {
                (!(MIN_NUM..MAX_NUM).contains(n)).then(|| {
                    format!("Smallest number must be between {} and {}", MIN_NUM, MAX_NUM - 1)
                })
            },
        )?;

        let max = self.ask_number(
            "Enter the largest number that can be used in each problem (Doesn't apply to divisors): ",
            |n: &i64| {
                if *n <= min {
                    Some(format!(
                        "Largest number has to be greater than the smallest number ({})",
                        min
                    ))
                } else if *n > MAX_NUM {
                    Some(format!(
                        "Largest number must be between {} and {}",
                        min + 1,
                        MAX_NUM
                    ))
                } else {
                    None
                }
            },
        )?;

        let count = self.ask_number(
            "Enter the number of problems you want to try and answer: ",
            |n: &usize| {
                (!(1..=MAX_NUM_QUESTIONS).contains(n)).then(|| {
                    format!(
                        "Must include at least one problem and no more than {}",
                        MAX_NUM_QUESTIONS
                    )
                })
            },
        )?;

        let operations = self.ask_operations()?;
        let show_remaining = self.ask_yes_no("Display time left during the game? (y/n) ")?;

        let params = GenerationParams::new(min, max, count, operations)?;

        Ok(Setup {
            use_ai,
            params,
            show_remaining,
        })
    }

    pub fn wait_for_start(&mut self) -> Result<(), PromptError> {
        loop {
            if self.ask("Type 'start' when you're ready to start! ")?.to_lowercase() == "start" {
                return Ok(());
            }
            self.say("Please enter 'start' to begin.")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::quiz::Operation;

    fn prompter(script: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    fn printed(prompter: &Prompter<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(prompter.output.clone()).unwrap()
    }

    #[test]
    fn straight_through_setup() {
        let mut p = prompter("n\n5\n20\n10\nasd\ny\n");
        let setup = p.gather_setup().unwrap();
        assert!(!setup.use_ai);
        assert!(setup.show_remaining);
        assert_eq!(setup.params.min, 5);
        assert_eq!(setup.params.max, 20);
        assert_eq!(setup.params.count, 10);
        assert_eq!(
            setup.params.operations,
            vec![Operation::Add, Operation::Subtract, Operation::Divide]
        );
    }

    #[test]
    fn bad_answers_are_asked_again() {
        let mut p = prompter("maybe\nY\nabc\n-500\n5\n3\n500\n20\n0\n10\n\nxz\nAS\nn\n");
        let setup = p.gather_setup().unwrap();
        assert!(setup.use_ai);
        assert_eq!((setup.params.min, setup.params.max), (5, 20));
        assert_eq!(setup.params.count, 10);
        assert_eq!(
            setup.params.operations,
            vec![Operation::Add, Operation::Subtract]
        );

        let out = printed(&p);
        assert!(out.contains("Please enter 'y' or 'n'"));
        assert!(out.contains("Enter a number."));
        assert!(out.contains("Smallest number must be between -100 and 99"));
        assert!(out.contains("Largest number has to be greater than the smallest number (5)"));
        assert!(out.contains("Largest number must be between 6 and 100"));
        assert!(out.contains("Must include at least one problem and no more than 250"));
        assert!(out.contains("Must choose at least one operation."));
        assert!(out.contains("Please enter a combination of 'a', 's', 'm', and 'd'."));
    }

    #[test]
    fn quit_word_anywhere_stops_setup() {
        let mut p = prompter("n\n5\nq\n");
        assert!(matches!(p.gather_setup(), Err(PromptError::Quit)));

        let mut p = prompter("Q\n");
        assert!(matches!(p.wait_for_start(), Err(PromptError::Quit)));
    }

    #[test]
    fn running_out_of_input_is_an_error() {
        let mut p = prompter("n\n5\n");
        assert!(matches!(p.gather_setup(), Err(PromptError::Closed)));
    }

    #[test]
    fn start_gate_waits_for_the_word() {
        let mut p = prompter("go\n START \n");
        p.wait_for_start().unwrap();
        assert!(printed(&p).contains("Please enter 'start' to begin."));
    }
}
