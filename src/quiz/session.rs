use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::quiz::{AnswerRecord, ProblemSet};

/// How often the supervisor checks the clock.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Typing this at any prompt ends the program.
pub const QUIT_WORD: &str = "q";

/// A stream that fails this many times in a row is treated as closed.
pub const MAX_CONSECUTIVE_READ_ERRORS: usize = 8;

#[cfg(test)]
pub type LineSender = mpsc::UnboundedSender<io::Result<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    WaitingToStart,
    Running,
    TimeExpired,
    AllAnswered,
    Quit,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    TimeExpired,
    AllAnswered,
    /// The input stream ended before every problem was shown.
    InputClosed,
    Quit,
}

impl From<SessionEnd> for SessionState {
    fn from(end: SessionEnd) -> Self {
        match end {
            SessionEnd::TimeExpired => SessionState::TimeExpired,
            SessionEnd::AllAnswered | SessionEnd::InputClosed => SessionState::AllAnswered,
            SessionEnd::Quit => SessionState::Quit,
        }
    }
}

/// Blocking line input, delivered asynchronously.
pub struct LineFeed {
    lines: mpsc::UnboundedReceiver<io::Result<String>>,
}

impl LineFeed {
    /// Reads `reader` on a detached thread. The thread is never joined, so a
    /// read that is still blocked when the session ends cannot hold up exit.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let spawned = thread::Builder::new()
            .name("answer-reader".to_string())
            .spawn(move || {
                let mut errors_in_a_row = 0;
                for line in reader.lines() {
                    errors_in_a_row = if line.is_err() { errors_in_a_row + 1 } else { 0 };
                    if tx.send(line).is_err() || errors_in_a_row >= MAX_CONSECUTIVE_READ_ERRORS {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("Could not start the input reader: {}", e);
        }
        Self { lines: rx }
    }

    pub fn stdin() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    /// A feed driven by hand, for scripted input.
    #[cfg(test)]
    pub fn channel() -> (LineSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { lines: rx })
    }

    async fn next_line(&mut self) -> Option<io::Result<String>> {
        self.lines.recv().await
    }
}

/// Answers captured so far. Once frozen, late answers are dropped.
#[derive(Default)]
struct Ledger {
    records: Vec<AnswerRecord>,
    frozen: bool,
}

type SharedLedger = Arc<Mutex<Ledger>>;

fn append(ledger: &SharedLedger, record: AnswerRecord) -> bool {
    let mut ledger = ledger.lock().unwrap_or_else(PoisonError::into_inner);
    if ledger.frozen {
        return false;
    }
    ledger.records.push(record);
    true
}

fn freeze(ledger: &SharedLedger) -> Vec<AnswerRecord> {
    let mut ledger = ledger.lock().unwrap_or_else(PoisonError::into_inner);
    ledger.frozen = true;
    ledger.records.clone()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub answers: Vec<AnswerRecord>,
    pub end: SessionEnd,
    pub elapsed: Duration,
    pub budget: Duration,
}

impl SessionReport {
    /// Time left on the clock, unless the clock ran out.
    pub fn time_to_spare(&self) -> Option<Duration> {
        match self.end {
            SessionEnd::TimeExpired => None,
            _ => self.budget.checked_sub(self.elapsed).filter(|d| !d.is_zero()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimedSession {
    budget: Duration,
    show_remaining: bool,
    quit_word: String,
}

impl TimedSession {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            show_remaining: false,
            quit_word: QUIT_WORD.to_string(),
        }
    }

    pub fn show_remaining(mut self, show_remaining: bool) -> Self {
        self.show_remaining = show_remaining;
        self
    }

    /// Races the countdown against answer collection.
    ///
    /// Collection runs as its own task and presents the problems in order,
    /// writing prompts to `out`. When the budget runs out the task is aborted
    /// and not waited for; answers captured up to that instant are returned,
    /// a line still being typed is lost.
    pub async fn run<W>(&self, problems: &ProblemSet, feed: LineFeed, out: W) -> SessionReport
    where
        W: Write + Send + 'static,
    {
        let mut state = SessionState::WaitingToStart;
        let ledger = SharedLedger::default();
        let started = Instant::now();
        transition(&mut state, SessionState::Running);

        let mut collector = tokio::spawn(collect(
            Collection {
                problems: problems.clone(),
                budget: self.budget,
                show_remaining: self.show_remaining,
                quit_word: self.quit_word.clone(),
                started,
            },
            feed,
            out,
            ledger.clone(),
        ));

        let mut ticker = time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                finished = &mut collector => {
                    break match finished {
                        Ok(end) => end,
                        Err(e) => {
                            warn!("Answer collection stopped unexpectedly: {}", e);
                            SessionEnd::InputClosed
                        }
                    };
                }
                _ = ticker.tick() => {
                    if started.elapsed() >= self.budget {
                        collector.abort();
                        break SessionEnd::TimeExpired;
                    }
                }
            }
        };

        let answers = freeze(&ledger);
        let elapsed = started.elapsed();
        transition(&mut state, end.into());
        transition(&mut state, SessionState::Done);

        info!(
            "Session ended ({:?}) after {:.1}s with {}/{} answers",
            end,
            elapsed.as_secs_f64(),
            answers.len(),
            problems.len()
        );

        SessionReport {
            answers,
            end,
            elapsed,
            budget: self.budget,
        }
    }
}

fn transition(state: &mut SessionState, next: SessionState) {
    debug!("Session {:?} -> {:?}", state, next);
    *state = next;
}

struct Collection {
    problems: ProblemSet,
    budget: Duration,
    show_remaining: bool,
    quit_word: String,
    started: Instant,
}

async fn collect<W: Write>(
    collection: Collection,
    mut feed: LineFeed,
    mut out: W,
    ledger: SharedLedger,
) -> SessionEnd {
    let Collection {
        problems,
        budget,
        show_remaining,
        quit_word,
        started,
    } = collection;

    for problem in &problems {
        // A broken terminal should not end the session, so write errors
        // are ignored.
        let _ = writeln!(out);
        if show_remaining {
            let left = budget.saturating_sub(started.elapsed());
            let _ = writeln!(out, "You have {:.1} seconds remaining", left.as_secs_f64());
        }
        let _ = write!(out, "{} = ", problem);
        let _ = out.flush();

        let raw_input = match feed.next_line().await {
            Some(Ok(line)) => line.trim().to_string(),
            Some(Err(e)) => {
                // Keep later answers lined up with their problems.
                debug!("Could not read an answer for {}: {}", problem, e);
                String::new()
            }
            None => {
                debug!("Input closed before {}", problem);
                return SessionEnd::InputClosed;
            }
        };

        if raw_input == quit_word {
            return SessionEnd::Quit;
        }

        let record = AnswerRecord {
            raw_input,
            captured_at: started.elapsed(),
        };
        if record.captured_at >= budget || !append(&ledger, record) {
            return SessionEnd::TimeExpired;
        }
    }

    SessionEnd::AllAnswered
}
