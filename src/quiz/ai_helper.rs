use std::time::Duration;

use chatgpt::client::ChatGPT;
use chatgpt::config::ChatGPTEngine;
use chatgpt::types::CompletionResponse;
use log::{debug, info, warn};
use rand::Rng;

use crate::quiz::arithmetic::{GenerateError, GenerationParams, ProblemGenerator};
use crate::quiz::{Operation, Problem, ProblemEntry, ProblemSet};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("ChatGPT request failed: {0}")]
    Client(#[from] chatgpt::err::Error),
    #[error("ChatGPT returned an empty response")]
    EmptyResponse,
    #[error("ChatGPT response is not a problem list: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("ChatGPT response rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    InvalidParams(#[from] GenerateError),
}

/// Asks ChatGPT for a problem sheet instead of generating one locally.
pub struct AiProblemSource {
    chat_gpt: ChatGPT,
}

impl AiProblemSource {
    pub fn new(chat_gpt: ChatGPT) -> Self {
        Self { chat_gpt }
    }

    pub fn connect(api_key: &str) -> Result<Self, SourceError> {
        let mut gpt = ChatGPT::new(api_key)?;
        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.timeout = Duration::from_secs(15);
        Ok(Self::new(gpt))
    }

    pub async fn generate(&self, params: &GenerationParams) -> Result<ProblemSet, SourceError> {
        params.validate()?;

        let prompt = build_prompt(params);
        debug!("Requesting {} problems from ChatGPT", params.count);

        let response: CompletionResponse = self.chat_gpt.send_message(&prompt).await?;
        let content = response.message().clone().content;

        debug!("Completion: {:?}", content);

        parse_response(&content, params)
    }
}

pub fn build_prompt(params: &GenerationParams) -> String {
    let names = params
        .operations
        .iter()
        .map(Operation::name)
        .collect::<Vec<_>>()
        .join(", ");
    let division = if params.operations.contains(&Operation::Divide) {
        "Only use exact division, and never divide by 0 or 1."
    } else {
        ""
    };
    let example = serde_json::json!([{ "problem": "13+8", "answer": "21" }]);

    format!(
        "Create a one-minute math sheet with {} problems. Only use numbers between {} and {}.
        Only include the following operations: {}. {}
        Write each problem with no spaces, using the symbols + - * /.
        Return a JSON array structured like {} and nothing else.
        Do not surround the JSON in any markdown formatting.",
        params.count, params.min, params.max, names, division, example
    )
}

/// Validates a completion strictly: every entry must parse, use a requested
/// operation, stay in range, and state the right answer.
pub fn parse_response(text: &str, params: &GenerationParams) -> Result<ProblemSet, SourceError> {
    let body = strip_fences(text);
    if body.is_empty() {
        return Err(SourceError::EmptyResponse);
    }

    let entries: Vec<ProblemEntry> = serde_json::from_str(body)?;
    if entries.len() != params.count {
        return Err(SourceError::Rejected(format!(
            "expected {} problems, got {}",
            params.count,
            entries.len()
        )));
    }

    let problems = entries
        .iter()
        .map(|entry| check_entry(entry, params))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ProblemSet::new(problems))
}

// Models love wrapping JSON in ```json fences even when told not to.
fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    match text.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => text,
    }
}

fn check_entry(entry: &ProblemEntry, params: &GenerationParams) -> Result<Problem, SourceError> {
    let reject = |reason: String| SourceError::Rejected(format!("{}: {}", entry.problem, reason));

    let problem: Problem = entry
        .problem
        .parse()
        .map_err(|e: crate::quiz::ProblemParseError| reject(e.to_string()))?;

    if !params.operations.contains(&problem.operation) {
        return Err(reject(format!("{} was not requested", problem.operation)));
    }

    let in_range = |n: i64| (params.min..=params.max).contains(&n);
    let operands_ok = match problem.operation {
        Operation::Divide => problem.b > 1 && in_range(problem.a),
        _ => in_range(problem.a) && in_range(problem.b),
    };
    if !operands_ok {
        return Err(reject("operands out of range".to_string()));
    }

    let stated = match &entry.answer {
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    };
    match stated {
        Some(answer) if answer == problem.answer => Ok(problem),
        Some(answer) => Err(reject(format!(
            "stated answer {} but it is {}",
            answer, problem.answer
        ))),
        None => Err(reject(format!("answer {} is not an integer", entry.answer))),
    }
}

/// Falls back to the local generator when the external source failed.
pub fn settle<R: Rng>(
    outcome: Result<ProblemSet, SourceError>,
    generator: &mut ProblemGenerator<R>,
    params: &GenerationParams,
) -> Result<ProblemSet, GenerateError> {
    match outcome {
        Ok(problems) => {
            info!("Using {} problems from ChatGPT", problems.len());
            Ok(problems)
        }
        Err(e) => {
            warn!("{}", e);
            println!();
            println!("ChatGPT couldn't write your problems this time :(");
            println!("Your problems will be generated by a state-of-the-art algorithm instead.");
            generator.generate(params)
        }
    }
}

/// Problems from `source` when there is one and it delivers, otherwise from
/// `generator`.
pub async fn obtain_problems<R: Rng>(
    source: Option<&AiProblemSource>,
    generator: &mut ProblemGenerator<R>,
    params: &GenerationParams,
) -> Result<ProblemSet, GenerateError> {
    match source {
        Some(source) => {
            let outcome = source.generate(params).await;
            settle(outcome, generator, params)
        }
        None => generator.generate(params),
    }
}
