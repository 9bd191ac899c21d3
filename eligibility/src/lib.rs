//! X12 271 eligibility response parser.
//!
//! Turns a raw 271 interchange into normalized [`EligibilityResponse`]
//! records. The pipeline is a single synchronous pass over an
//! already-fully-read buffer:
//!
//! ```text
//! raw text → tokenize → envelope validation → loop hierarchy → records
//! ```
//!
//! Structural failures (a malformed envelope, a strict-mode control count
//! disagreement) abort the file and surface as [`ParseError`]. A broken
//! loop hierarchy aborts only its own transaction; sibling transactions in
//! a batch still produce records. Record-level problems never abort
//! anything; they degrade the individual record and are carried on it as
//! [`Diagnostic`]s.
//!
//! Parsing is single-threaded with no shared mutable state, so independent
//! inputs can be parsed concurrently, and the produced records are plain
//! values that can cross thread boundaries freely.

mod adapter;
mod assemble;
pub mod benefit;
pub mod hierarchy;
mod record;

use thiserror::Error;
use tracing::{debug, warn};

pub use edi271_envelope::{
    validate, EnvelopeError, EnvelopeSummary, EnvelopeValidator, ValidationMode,
};
pub use edi271_segment::{tokenize, Delimiters, MalformedEnvelope, Segment};

pub use adapter::{emit, OutputAdapter};
pub use benefit::{benefit_code_meaning, BenefitDate, BenefitEntry};
pub use hierarchy::{Hierarchy, HierarchyError, Loop, LoopKind};
pub use record::{Diagnostic, DiagnosticKind, EligibilityResponse, UNKNOWN};

/// File-level failure; no records are produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] MalformedEnvelope),
    #[error("envelope validation failed: {0}")]
    Envelope(#[from] EnvelopeError),
}

/// One transaction that could not be assembled. Does not affect sibling
/// transactions in the same interchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transaction {control_number}: {error}")]
pub struct TransactionFailure {
    /// ST02 of the failed transaction, or "unknown".
    pub control_number: String,
    #[source]
    pub error: HierarchyError,
}

/// Parser configuration.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// How envelope count disagreements are treated. Defaults to strict.
    pub mode: ValidationMode,
}

/// Everything one parse produced: assembled records (each possibly carrying
/// diagnostics) and per-transaction failures, plus any envelope warnings
/// collected in permissive mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub records: Vec<EligibilityResponse>,
    pub failures: Vec<TransactionFailure>,
    pub envelope_warnings: Vec<EnvelopeError>,
}

/// Parse a 271 interchange with default (strict) options.
pub fn parse(input: &str) -> Result<ParseOutcome, ParseError> {
    parse_with(input, &ParseOptions::default())
}

/// Parse a 271 interchange.
pub fn parse_with(input: &str, options: &ParseOptions) -> Result<ParseOutcome, ParseError> {
    let segments = tokenize(input)?;
    let summary = validate(&segments, options.mode)?;
    debug!(
        segments = summary.segment_count,
        groups = summary.group_count,
        transactions = summary.transaction_count,
        "envelope accepted"
    );

    let mut outcome = ParseOutcome {
        envelope_warnings: summary.warnings,
        ..ParseOutcome::default()
    };

    for span in transactions(&segments) {
        match Hierarchy::build(span) {
            Ok(hierarchy) => outcome.records.extend(assemble::assemble(span, &hierarchy)),
            Err(error) => {
                let control_number = span
                    .iter()
                    .find(|s| s.tag() == "ST")
                    .and_then(|s| s.element(2))
                    .filter(|id| !id.is_empty())
                    .unwrap_or("unknown")
                    .to_string();
                warn!(%control_number, %error, "dropping transaction");
                outcome.failures.push(TransactionFailure {
                    control_number,
                    error,
                });
            }
        }
    }

    debug!(
        records = outcome.records.len(),
        failures = outcome.failures.len(),
        "parse complete"
    );
    Ok(outcome)
}

/// ST..SE spans, inclusive. Pairing is already guaranteed by envelope
/// validation.
fn transactions<'a, 'b>(segments: &'a [Segment<'b>]) -> Vec<&'a [Segment<'b>]> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;

    for (position, segment) in segments.iter().enumerate() {
        match segment.tag() {
            "ST" => open = Some(position),
            "SE" => {
                if let Some(start) = open.take() {
                    spans.push(&segments[start..=position]);
                }
            }
            _ => {}
        }
    }

    spans
}
