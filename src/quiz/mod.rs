pub mod ai_helper;
pub mod arithmetic;
pub mod score;
pub mod session;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    pub fn symbol(&self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
            Operation::Multiply => '*',
            Operation::Divide => '/',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Add => "Addition",
            Operation::Subtract => "Subtraction",
            Operation::Multiply => "Multiplication",
            Operation::Divide => "Division",
        }
    }

    /// Single letter used in the operations menu.
    pub fn code(&self) -> char {
        match self {
            Operation::Add => 'a',
            Operation::Subtract => 's',
            Operation::Multiply => 'm',
            Operation::Divide => 'd',
        }
    }

    /// Checked integer arithmetic. Division only succeeds when it is exact.
    pub fn apply(&self, a: i64, b: i64) -> Option<i64> {
        match self {
            Operation::Add => a.checked_add(b),
            Operation::Subtract => a.checked_sub(b),
            Operation::Multiply => a.checked_mul(b),
            Operation::Divide => {
                if b == 0 || a.checked_rem(b)? != 0 {
                    return None;
                }
                a.checked_div(b)
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" | "+" | "add" => Ok(Operation::Add),
            "s" | "-" | "subtract" => Ok(Operation::Subtract),
            "m" | "*" | "multiply" => Ok(Operation::Multiply),
            "d" | "/" | "divide" => Ok(Operation::Divide),
            _ => Err(s.to_string()),
        }
    }
}

/// One arithmetic question with its exact integer answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub a: i64,
    pub b: i64,
    pub operation: Operation,
    pub answer: i64,
}

impl Problem {
    /// Returns `None` when the operation overflows or the division is not exact.
    pub fn new(a: i64, operation: Operation, b: i64) -> Option<Self> {
        let answer = operation.apply(a, b)?;
        Some(Self {
            a,
            b,
            operation,
            answer,
        })
    }

    /// Anything that does not parse as an integer is simply wrong.
    pub fn check(&self, raw: &str) -> bool {
        raw.trim()
            .parse::<i64>()
            .map(|given| given == self.answer)
            .unwrap_or(false)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.a, self.operation.symbol(), self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProblemParseError {
    #[error("\"{0}\" is not of the form <a><op><b>")]
    Shape(String),
    #[error("\"{0}\" has no integer answer")]
    NoAnswer(String),
}

impl FromStr for Problem {
    type Err = ProblemParseError;

    /// Parses the display form back, e.g. `"14/2"` or `"-3--4"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let shape = || ProblemParseError::Shape(s.to_string());

        // The operator is the first symbol after the leading sign of `a`
        // and at least one digit.
        let (idx, op) = text
            .char_indices()
            .skip(1)
            .find_map(|(i, c)| {
                Operation::ALL
                    .into_iter()
                    .find(|op| op.symbol() == c)
                    .map(|op| (i, op))
            })
            .ok_or_else(shape)?;

        let a = text[..idx].parse::<i64>().map_err(|_| shape())?;
        let b = text[idx + 1..].parse::<i64>().map_err(|_| shape())?;

        Problem::new(a, op, b).ok_or_else(|| ProblemParseError::NoAnswer(s.to_string()))
    }
}

/// Wire shape shared with the external problem source.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProblemEntry {
    pub problem: String,
    pub answer: serde_json::Value,
}

/// Ordered problems for one session. Never changes once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemSet {
    problems: Vec<Problem>,
}

impl ProblemSet {
    pub fn new(problems: Vec<Problem>) -> Self {
        Self { problems }
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Problem> {
        self.problems.iter()
    }
}

impl<'a> IntoIterator for &'a ProblemSet {
    type Item = &'a Problem;
    type IntoIter = std::slice::Iter<'a, Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub raw_input: String,
    /// Time since the session started.
    pub captured_at: Duration,
}
