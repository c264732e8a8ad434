//! Guardrails pipeline: input/output validator chains and an ordered output
//! filter list (spec.md §2 C6, §4.6).
//!
//! A tripwire short-circuits the chain immediately regardless of the
//! configured [`ValidatorChainMode`] — even `Parallel`, where every
//! validator has already run concurrently, still reports the tripwire in
//! the merged result rather than letting later merges mask it.

pub mod validators;

use std::sync::Arc;

use neuron_types::{Severity, ValidationError, ValidationResult};

/// How a [`GuardrailsPipeline`] runs its validator chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorChainMode {
    /// Stop at the first validator that fails or trips.
    FailFast,
    /// Run every validator in order, merging all results.
    CollectAll,
    /// Run every validator concurrently, merging all results.
    Parallel,
}

/// One content validator in a chain.
#[async_trait::async_trait]
pub trait Validator: Send + Sync {
    /// Stable name, used in error codes / tracing.
    fn name(&self) -> &str;

    /// Where this validator runs in the chain; lower runs earlier. Ties are
    /// broken by registration order (Design Notes §9: stable sort, never a
    /// plain `sort_by_key`, so two validators sharing a priority run in the
    /// order they were added).
    fn priority(&self) -> i32 {
        0
    }

    /// Validate `content`, returning a pass/fail/tripwire [`ValidationResult`].
    async fn validate(&self, content: &str) -> ValidationResult;
}

/// Returned alongside a chain's [`ValidationResult`] when a validator's
/// tripwire fired (spec.md §4.6, §7 `TripwireError`).
#[derive(Debug, Clone)]
pub struct TripwireError {
    /// Name of the validator that tripped the chain.
    pub validator_name: String,
    /// The merged result at the moment the tripwire fired.
    pub result: ValidationResult,
}

impl std::fmt::Display for TripwireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tripwire fired in validator {}", self.validator_name)
    }
}

impl std::error::Error for TripwireError {}

/// Sort `validators` by ascending [`Validator::priority`], registration
/// order preserved for ties.
fn ordered(validators: &[Arc<dyn Validator>]) -> Vec<Arc<dyn Validator>> {
    let mut ordered: Vec<Arc<dyn Validator>> = validators.to_vec();
    ordered.sort_by_key(|v| v.priority());
    ordered
}

/// A pure output rewrite applied after validators pass (redaction, truncation, ...).
pub trait Filter: Send + Sync {
    /// Stable name, used in tracing.
    fn name(&self) -> &str;

    /// Rewrite `content`.
    fn apply(&self, content: &str) -> String;
}

/// Run `validators` over `content` per `mode`, honoring the tripwire
/// short-circuit invariant: a tripwire terminates the chain immediately in
/// every mode, cancelling outstanding work in `Parallel`, and is reported
/// back as a [`TripwireError`] alongside the merged result.
pub async fn run_chain(
    validators: &[Arc<dyn Validator>],
    content: &str,
    mode: ValidatorChainMode,
) -> (ValidationResult, Option<TripwireError>) {
    let validators = ordered(validators);
    match mode {
        ValidatorChainMode::FailFast => {
            let mut acc = ValidationResult::pass(content);
            for validator in &validators {
                let result = validator.validate(content).await;
                let tripwire = result.tripwire;
                let valid = result.valid;
                acc = acc.merge(result);
                if tripwire {
                    return (acc.clone(), Some(TripwireError { validator_name: validator.name().to_owned(), result: acc }));
                }
                if !valid {
                    break;
                }
            }
            (acc, None)
        }
        ValidatorChainMode::CollectAll => {
            let mut acc = ValidationResult::pass(content);
            for validator in &validators {
                let result = validator.validate(content).await;
                let tripwire = result.tripwire;
                acc = acc.merge(result);
                if tripwire {
                    // Terminate immediately: later validators never run, even
                    // though CollectAll would otherwise run every validator.
                    return (acc.clone(), Some(TripwireError { validator_name: validator.name().to_owned(), result: acc }));
                }
            }
            (acc, None)
        }
        ValidatorChainMode::Parallel => {
            // Validators run concurrently, but as soon as one reports a
            // tripwire every handle still in flight is aborted rather than
            // awaited to completion.
            let handles: Vec<_> = validators
                .iter()
                .map(|v| {
                    let v = Arc::clone(v);
                    let content = content.to_owned();
                    tokio::spawn(async move {
                        let result = v.validate(&content).await;
                        (v.name().to_owned(), result)
                    })
                })
                .collect();

            let mut acc = ValidationResult::pass(content);
            let mut tripwire_err = None;
            let mut remaining = handles;
            while !remaining.is_empty() {
                let (finished, _index, still_running) = futures::future::select_all(remaining).await;
                remaining = still_running;
                let Ok((name, result)) = finished else { continue };
                let tripped = result.tripwire;
                acc = acc.merge(result);
                if tripped && tripwire_err.is_none() {
                    tripwire_err = Some(TripwireError { validator_name: name, result: acc.clone() });
                    for handle in &remaining {
                        handle.abort();
                    }
                    break;
                }
            }
            (acc, tripwire_err)
        }
    }
}

/// Input-validation, output-validation, and output-filtering pipeline.
pub struct GuardrailsPipeline {
    mode: ValidatorChainMode,
    input_validators: Vec<Arc<dyn Validator>>,
    output_validators: Vec<Arc<dyn Validator>>,
    output_filters: Vec<Arc<dyn Filter>>,
}

impl GuardrailsPipeline {
    /// Build an empty pipeline running validators in `mode`.
    #[must_use]
    pub fn new(mode: ValidatorChainMode) -> Self {
        Self {
            mode,
            input_validators: Vec::new(),
            output_validators: Vec::new(),
            output_filters: Vec::new(),
        }
    }

    /// Append an input-side validator, builder-style.
    #[must_use]
    pub fn with_input_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.input_validators.push(validator);
        self
    }

    /// Append an output-side validator, builder-style.
    #[must_use]
    pub fn with_output_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.output_validators.push(validator);
        self
    }

    /// Append an output filter, builder-style. Filters run in the order added.
    #[must_use]
    pub fn with_output_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.output_filters.push(filter);
        self
    }

    /// Validate input content before it reaches the model. `Err` carries the
    /// tripwire alongside the merged result that produced it.
    pub async fn validate_input(&self, content: &str) -> Result<ValidationResult, TripwireError> {
        let (result, tripwire) = run_chain(&self.input_validators, content, self.mode).await;
        match tripwire {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    /// Validate the model's output, then apply output filters in order if
    /// validation passed. `filtered_content` carries the final, filter-applied
    /// text. Filters run only when no tripwire fired, matching the pipeline's
    /// "reject outright" semantics for tripwires.
    pub async fn validate_output(&self, content: &str) -> Result<ValidationResult, TripwireError> {
        let (mut result, tripwire) = run_chain(&self.output_validators, content, self.mode).await;
        if let Some(err) = tripwire {
            return Err(err);
        }
        let mut text = content.to_owned();
        for filter in &self.output_filters {
            text = filter.apply(&text);
        }
        result.filtered_content = text;
        Ok(result)
    }
}

/// Helper to build a simple failing [`ValidationError`].
#[must_use]
pub fn error(code: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::new(code, message, Severity::Error)
}
