use std::fmt;

use crate::quiz::session::SessionEnd;
use crate::quiz::{AnswerRecord, Problem, ProblemSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Miss {
    pub problem: Problem,
    pub given: String,
}

/// Outcome of a session. Answers are paired with problems by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scorecard {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    pub misses: Vec<Miss>,
    /// False when the answers stopped for some reason other than the clock.
    pub out_of_time: bool,
}

impl Scorecard {
    pub fn grade(problems: &ProblemSet, answers: &[AnswerRecord]) -> Self {
        let mut correct = 0;
        let mut misses = Vec::new();

        for (problem, answer) in problems.iter().zip(answers) {
            if problem.check(&answer.raw_input) {
                correct += 1;
            } else {
                misses.push(Miss {
                    problem: problem.clone(),
                    given: answer.raw_input.trim().to_string(),
                });
            }
        }

        Self {
            total: problems.len(),
            answered: answers.len().min(problems.len()),
            correct,
            misses,
            out_of_time: true,
        }
    }

    pub fn ended_by(mut self, end: SessionEnd) -> Self {
        self.out_of_time = end == SessionEnd::TimeExpired;
        self
    }

    pub fn unanswered(&self) -> usize {
        self.total - self.answered
    }
}

impl fmt::Display for Scorecard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.correct == self.total {
            writeln!(f, "You got every problem right!!")?;
        } else if self.correct == 0 {
            writeln!(f, "You didn't get any problems right...")?;
        } else if self.correct == 1 {
            writeln!(f, "You only got 1 problem right, better than 0 right?")?;
        } else {
            writeln!(f, "Overall, you got {} problem(s) correct!", self.correct)?;
        }

        if !self.misses.is_empty() {
            if self.correct != 0 {
                writeln!(f, "You got {} problem(s) incorrect.", self.misses.len())?;
            }
            writeln!(f)?;
            writeln!(f, "Problems you got incorrect:")?;
            for miss in &self.misses {
                writeln!(
                    f,
                    "{} = {}, you answered: {}",
                    miss.problem, miss.problem.answer, miss.given
                )?;
                writeln!(f)?;
            }
        }

        if self.unanswered() > 0 {
            if self.out_of_time {
                writeln!(
                    f,
                    "You didn't have time to answer {} problem(s).",
                    self.unanswered()
                )?;
            } else {
                writeln!(f, "{} problem(s) were left unanswered.", self.unanswered())?;
            }
        }
        Ok(())
    }
}
