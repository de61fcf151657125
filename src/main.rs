mod config;
mod prompt;
mod quiz;

use std::io;

use dotenv::dotenv;
use log::{debug, warn};
use prompt::{PromptError, Prompter};
use quiz::ai_helper::{self, AiProblemSource};
use quiz::arithmetic::ProblemGenerator;
use quiz::score::Scorecard;
use quiz::session::{LineFeed, SessionEnd, TimedSession};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting one minute math...");

    let config = config::Config::from_env()?;
    debug!("Config: time limit {:?}, seed {:?}", config.time_limit, config.seed);

    println!();
    println!("Welcome to the One Minute Math Challenge!");
    println!();
    println!(
        "You will have {} seconds to solve as many problems as possible.",
        config.time_limit.as_secs()
    );
    println!("To quit at any time, press 'q'.");
    println!("Enter your answer and press Enter.");
    println!();

    // The prompter holds the stdin lock, so it must be gone before the
    // session starts reading.
    let setup = Prompter::stdio().gather_setup().or_else(stop)?;

    let source = if setup.use_ai {
        match config.api_key.as_deref() {
            Some(key) => AiProblemSource::connect(key)
                .map_err(|e| warn!("ChatGPT is unavailable: {}", e))
                .ok(),
            None => {
                println!("ChatGPT is missing an API key!");
                None
            }
        }
    } else {
        None
    };

    let mut generator = match config.seed {
        Some(seed) => ProblemGenerator::seeded(seed),
        None => ProblemGenerator::from_entropy(),
    };

    let problems =
        ai_helper::obtain_problems(source.as_ref(), &mut generator, &setup.params).await?;

    if problems.is_empty() {
        return Err("no problems to answer".into());
    }

    println!();
    Prompter::stdio().wait_for_start().or_else(stop)?;

    let session = TimedSession::new(config.time_limit).show_remaining(setup.show_remaining);
    let report = session.run(&problems, LineFeed::stdin(), io::stdout()).await;

    match report.end {
        SessionEnd::Quit => std::process::exit(0),
        SessionEnd::TimeExpired => {
            println!();
            println!("Time's up!");
        }
        SessionEnd::AllAnswered | SessionEnd::InputClosed => println!(),
    }

    // Show user how much time they had left (If they had any)
    if let Some(spare) = report.time_to_spare() {
        println!(
            "You finished with {:.1} second(s) to spare!",
            spare.as_secs_f64()
        );
    }

    let scorecard = Scorecard::grade(&problems, &report.answers).ended_by(report.end);

    println!();
    println!("{}", "=".repeat(20));
    println!();
    print!("{}", scorecard);

    Ok(())
}

/// Quitting ends the process on the spot; anything else is a real error.
fn stop<T>(err: PromptError) -> Result<T, PromptError> {
    match err {
        PromptError::Quit => std::process::exit(0),
        other => Err(other),
    }
}
