use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::quiz::{Operation, Problem, ProblemSet};

/// How far the exact-divisor search may walk away from the drawn seed
/// before giving up.
pub const MAX_SEED_STEPS: u32 = 1_000;

/// Trial divisions one exact-divisor search may spend across all its steps.
pub const MAX_TRIAL_DIVISIONS: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("Min number ({min}) is greater than or equal to max number ({max})!")]
    Bounds { min: i64, max: i64 },
    #[error("Number of questions can't be 0 or less.")]
    Count,
    #[error("At least one operation is required.")]
    NoOperations,
    #[error("{}", describe_unsupported(.0))]
    UnsupportedOperations(Vec<String>),
    #[error("no exact divisor found within {steps} steps of {seed}")]
    NoExactDivisor { seed: i64, steps: u32 },
    #[error("{operation} of {a} and {b} does not fit in a 64-bit integer")]
    Overflow { a: i64, b: i64, operation: Operation },
}

fn describe_unsupported(symbols: &[String]) -> String {
    let verb = if symbols.len() == 1 {
        "is not a valid operation"
    } else {
        "are not valid operations"
    };
    format!("{} {}", symbols.join(" "), verb)
}

/// What to generate: operands are drawn from `min..=max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub min: i64,
    pub max: i64,
    pub count: usize,
    pub operations: Vec<Operation>,
}

impl GenerationParams {
    /// Builds and validates parameters from raw operation symbols, checking
    /// the bounds first, then the count, then the operations.
    pub fn new<I, S>(min: i64, max: i64, count: usize, symbols: I) -> Result<Self, GenerateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_shape(min, max, count)?;
        let operations = parse_symbols(symbols)?;

        let params = Self {
            min,
            max,
            count,
            operations,
        };
        params.validate()?;
        Ok(params)
    }

    /// Splits user text such as `"asmd"` or `"add, divide"` into symbols.
    pub fn parse_operations(text: &str) -> Result<Vec<Operation>, GenerateError> {
        let text = text.trim();
        let symbols: Vec<String> = if text.contains(|c: char| c == ',' || c.is_whitespace()) {
            text.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            text.chars().map(|c| c.to_string()).collect()
        };

        let operations = parse_symbols(symbols)?;
        if operations.is_empty() {
            return Err(GenerateError::NoOperations);
        }
        Ok(operations)
    }

    pub fn validate(&self) -> Result<(), GenerateError> {
        validate_shape(self.min, self.max, self.count)?;
        if self.operations.is_empty() {
            return Err(GenerateError::NoOperations);
        }
        Ok(())
    }
}

/// Deduplicates while keeping first-seen order; every unsupported symbol is
/// reported, not just the first.
fn parse_symbols<I, S>(symbols: I) -> Result<Vec<Operation>, GenerateError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut operations = Vec::new();
    let mut unsupported = Vec::new();
    for symbol in symbols {
        match symbol.as_ref().parse::<Operation>() {
            Ok(op) if !operations.contains(&op) => operations.push(op),
            Ok(_) => {}
            Err(bad) if !unsupported.contains(&bad) => unsupported.push(bad),
            Err(_) => {}
        }
    }

    if !unsupported.is_empty() {
        return Err(GenerateError::UnsupportedOperations(unsupported));
    }
    Ok(operations)
}

fn validate_shape(min: i64, max: i64, count: usize) -> Result<(), GenerateError> {
    if min >= max {
        return Err(GenerateError::Bounds { min, max });
    }
    if count == 0 {
        return Err(GenerateError::Count);
    }
    Ok(())
}

pub struct ProblemGenerator<R: Rng> {
    rng: R,
}

impl ProblemGenerator<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Same seed, same problems.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ProblemGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generates `params.count` problems. Each iteration picks an operation
    /// uniformly from the requested set and draws fresh operands.
    pub fn generate(&mut self, params: &GenerationParams) -> Result<ProblemSet, GenerateError> {
        params.validate()?;

        let problems = (0..params.count)
            .map(|_| self.next_problem(params))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Generated {} problems in [{}, {}] using {:?}",
            problems.len(),
            params.min,
            params.max,
            params.operations
        );
        Ok(ProblemSet::new(problems))
    }

    fn next_problem(&mut self, params: &GenerationParams) -> Result<Problem, GenerateError> {
        let operation = *params
            .operations
            .choose(&mut self.rng)
            .ok_or(GenerateError::NoOperations)?;

        // Only the numerator of a division comes from the range; the
        // denominator is one of its divisors.
        let (a, b) = match operation {
            Operation::Divide => {
                let seed = self.rng.gen_range(params.min..=params.max);
                exact_divisor(seed, &mut self.rng)?
            }
            _ => (
                self.rng.gen_range(params.min..=params.max),
                self.rng.gen_range(params.min..=params.max),
            ),
        };

        Problem::new(a, operation, b).ok_or(GenerateError::Overflow { a, b, operation })
    }
}

/// Returns `(n, divisor)` where `divisor > 1` divides `n` exactly.
///
/// When `n` has no divisor in `2..=sqrt(|n|)` (0, ±1, primes) it is moved one
/// step away from zero and the search repeats, so the returned numerator may
/// differ from `seed`. Negative seeds are searched by magnitude and keep
/// their sign. Gives up after [`MAX_SEED_STEPS`] moves or
/// [`MAX_TRIAL_DIVISIONS`] trial divisions, whichever comes first.
pub fn exact_divisor<R: Rng + ?Sized>(seed: i64, rng: &mut R) -> Result<(i64, i64), GenerateError> {
    exact_divisor_within(seed, MAX_SEED_STEPS, MAX_TRIAL_DIVISIONS, rng)
}

fn exact_divisor_within<R: Rng + ?Sized>(
    seed: i64,
    max_steps: u32,
    max_trials: u64,
    rng: &mut R,
) -> Result<(i64, i64), GenerateError> {
    let step: i64 = if seed < 0 { -1 } else { 1 };
    let exhausted = GenerateError::NoExactDivisor {
        seed,
        steps: max_steps,
    };

    let mut trials = max_trials;
    let mut n = seed;
    for _ in 0..=max_steps {
        let divisors = divisors_of(n.unsigned_abs(), &mut trials);
        if let Some(&divisor) = divisors.choose(rng) {
            let divisor = i64::try_from(divisor).map_err(|_| exhausted.clone())?;
            return Ok((n, divisor));
        }
        if trials == 0 {
            debug!("Trial division budget spent searching from {}", seed);
            return Err(exhausted);
        }
        n = n.checked_add(step).ok_or_else(|| exhausted.clone())?;
    }

    Err(exhausted)
}

/// Divisors of `n` other than 1 and `n`, found in pairs up to `sqrt(n)`.
///
/// Each candidate costs one unit of `trials`; when the budget runs dry the
/// divisors found so far are returned.
fn divisors_of(n: u64, trials: &mut u64) -> Vec<u64> {
    let mut divisors = Vec::new();
    let mut i: u64 = 2;
    while i.checked_mul(i).map_or(false, |square| square <= n) {
        if *trials == 0 {
            break;
        }
        *trials -= 1;
        if n % i == 0 {
            divisors.push(i);
            // The square root only counts once
            if i != n / i {
                divisors.push(n / i);
            }
        }
        i += 1;
    }
    divisors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min: i64, max: i64, count: usize, ops: &[&str]) -> GenerationParams {
        GenerationParams::new(min, max, count, ops.iter()).unwrap()
    }

    #[test]
    fn divisors_come_in_pairs() {
        let mut trials = MAX_TRIAL_DIVISIONS;
        let mut divisors = divisors_of(36, &mut trials);
        divisors.sort_unstable();
        assert_eq!(divisors, vec![2, 3, 4, 6, 9, 12, 18]);
        assert_eq!(trials, MAX_TRIAL_DIVISIONS - 5);

        assert!(divisors_of(13, &mut trials).is_empty());
        assert!(divisors_of(1, &mut trials).is_empty());
        assert!(divisors_of(0, &mut trials).is_empty());
    }

    #[test]
    fn spent_budget_keeps_what_was_found() {
        let mut trials = 2;
        assert_eq!(divisors_of(36, &mut trials), vec![2, 18, 3, 12]);
        assert_eq!(trials, 0);
        assert!(divisors_of(36, &mut trials).is_empty());
    }

    #[test]
    fn search_gives_up_after_its_steps() {
        let mut rng = StdRng::seed_from_u64(0);
        // 23 and 24 would need one step; none are allowed.
        assert_eq!(
            exact_divisor_within(23, 0, MAX_TRIAL_DIVISIONS, &mut rng),
            Err(GenerateError::NoExactDivisor { seed: 23, steps: 0 })
        );
        assert_eq!(
            exact_divisor_within(23, 1, MAX_TRIAL_DIVISIONS, &mut rng).map(|(n, _)| n),
            Ok(24)
        );
    }

    #[test]
    fn search_gives_up_when_trial_budget_runs_out() {
        let mut rng = StdRng::seed_from_u64(0);
        // 1_000_003 is prime; its square root is about 1000.
        let err = exact_divisor_within(1_000_003, MAX_SEED_STEPS, 100, &mut rng).unwrap_err();
        assert_eq!(
            err,
            GenerateError::NoExactDivisor {
                seed: 1_000_003,
                steps: MAX_SEED_STEPS
            }
        );
    }

    #[test]
    fn huge_division_ranges_finish() {
        let params = params(i64::MAX - 100, i64::MAX, 5, &["d"]);
        match ProblemGenerator::seeded(8).generate(&params) {
            Ok(set) => {
                for problem in &set {
                    assert!(problem.b > 1);
                    assert_eq!(problem.a % problem.b, 0);
                }
            }
            Err(err) => assert!(matches!(err, GenerateError::NoExactDivisor { .. })),
        }
    }

    #[test]
    fn overflowing_operands_are_reported() {
        let params = params(i64::MAX - 1, i64::MAX, 1, &["a"]);
        let err = ProblemGenerator::seeded(1).generate(&params).unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Overflow {
                operation: Operation::Add,
                ..
            }
        ));
    }

    #[test]
    fn primes_are_stepped_over() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let (n, d) = exact_divisor(7, &mut rng).unwrap();
            assert_eq!(n, 8);
            assert!(d == 2 || d == 4);
        }
    }

    #[test]
    fn degenerate_seeds_reach_four() {
        let mut rng = StdRng::seed_from_u64(1);
        for seed in [0, 1, 2, 3] {
            assert_eq!(exact_divisor(seed, &mut rng).unwrap(), (4, 2));
        }
        assert_eq!(exact_divisor(-1, &mut rng).unwrap(), (-4, 2));
    }

    #[test]
    fn negative_seeds_keep_their_sign() {
        let mut rng = StdRng::seed_from_u64(3);
        let (n, d) = exact_divisor(-12, &mut rng).unwrap();
        assert_eq!(n, -12);
        assert!([2, 3, 4, 6].contains(&d));
    }

    #[test]
    fn every_division_is_exact() {
        let params = params(-100, 100, 250, &["d"]);
        for seed in 0..20 {
            let set = ProblemGenerator::seeded(seed).generate(&params).unwrap();
            assert_eq!(set.len(), 250);
            for problem in &set {
                assert_eq!(problem.operation, Operation::Divide);
                assert!(problem.b > 1, "{problem}");
                assert_eq!(problem.a % problem.b, 0, "{problem}");
                assert_eq!(problem.a / problem.b, problem.answer);
            }
        }
    }

    #[test]
    fn small_division_example() {
        let params = params(1, 10, 3, &["d"]);
        let set = ProblemGenerator::seeded(42).generate(&params).unwrap();
        assert_eq!(set.len(), 3);
        for problem in &set {
            let text = problem.to_string();
            let (n, d) = text.split_once('/').unwrap();
            let (n, d): (i64, i64) = (n.parse().unwrap(), d.parse().unwrap());
            assert_eq!(n % d, 0);
            // Seeds above 10 never happen, and 10 itself has divisors.
            assert!(n <= 10);
        }
    }

    #[test]
    fn answers_match_operands() {
        let params = params(-20, 20, 200, &["a", "s", "m", "d"]);
        let set = ProblemGenerator::seeded(99).generate(&params).unwrap();
        assert_eq!(set.len(), 200);
        for problem in &set {
            let expected = match problem.operation {
                Operation::Add => problem.a + problem.b,
                Operation::Subtract => problem.a - problem.b,
                Operation::Multiply => problem.a * problem.b,
                Operation::Divide => problem.a / problem.b,
            };
            assert_eq!(problem.answer, expected);
            if problem.operation != Operation::Divide {
                assert!((-20..=20).contains(&problem.a));
                assert!((-20..=20).contains(&problem.b));
            }
        }
    }

    #[test]
    fn only_requested_operations_are_used() {
        let params = params(1, 50, 100, &["a", "m"]);
        let set = ProblemGenerator::seeded(5).generate(&params).unwrap();
        assert!(set
            .iter()
            .all(|p| matches!(p.operation, Operation::Add | Operation::Multiply)));
    }

    #[test]
    fn same_seed_same_problems() {
        let params = params(1, 12, 30, &["a", "s", "m", "d"]);
        let first = ProblemGenerator::seeded(2024).generate(&params).unwrap();
        let second = ProblemGenerator::seeded(2024).generate(&params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bounds_are_validated_first() {
        let err = GenerationParams::new(10, 10, 0, ["x"]).unwrap_err();
        assert_eq!(err, GenerateError::Bounds { min: 10, max: 10 });
        assert!(!err.to_string().is_empty());

        let err = GenerationParams::new(11, 10, 5, ["a"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Min number (11) is greater than or equal to max number (10)!"
        );
    }

    #[test]
    fn count_must_be_positive() {
        let err = GenerationParams::new(1, 10, 0, ["a"]).unwrap_err();
        assert_eq!(err, GenerateError::Count);
    }

    #[test]
    fn unsupported_symbols_are_named() {
        let err = GenerationParams::new(1, 10, 5, ["a", "x"]).unwrap_err();
        assert_eq!(err.to_string(), "x is not a valid operation");

        let err = GenerationParams::new(1, 10, 5, ["%", "a", "^"]).unwrap_err();
        assert_eq!(
            err,
            GenerateError::UnsupportedOperations(vec!["%".into(), "^".into()])
        );
        assert_eq!(err.to_string(), "% ^ are not valid operations");
    }

    #[test]
    fn empty_operation_set_is_rejected() {
        let err = GenerationParams::new(1, 10, 5, Vec::<&str>::new()).unwrap_err();
        assert_eq!(err, GenerateError::NoOperations);
    }

    #[test]
    fn generate_revalidates_hand_built_params() {
        let params = GenerationParams {
            min: 5,
            max: 1,
            count: 3,
            operations: vec![Operation::Add],
        };
        let result = ProblemGenerator::seeded(0).generate(&params);
        assert_eq!(result, Err(GenerateError::Bounds { min: 5, max: 1 }));
    }

    #[test]
    fn parses_operation_text() {
        assert_eq!(
            GenerationParams::parse_operations("asmd").unwrap(),
            Operation::ALL.to_vec()
        );
        assert_eq!(
            GenerationParams::parse_operations("add, divide").unwrap(),
            vec![Operation::Add, Operation::Divide]
        );
        assert_eq!(
            GenerationParams::parse_operations("aa").unwrap(),
            vec![Operation::Add]
        );
        assert_eq!(
            GenerationParams::parse_operations("ax"),
            Err(GenerateError::UnsupportedOperations(vec!["x".into()]))
        );
        assert_eq!(
            GenerationParams::parse_operations("  "),
            Err(GenerateError::NoOperations)
        );
    }
}
