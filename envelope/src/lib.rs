//! Envelope validation for X12 271 interchanges.
//!
//! Confirms that the ISA/IEA, GS/GE, and ST/SE framing segments are opened
//! and closed in matching pairs, and that each trailer's declared control
//! count and control number agree with what was actually enclosed.
//!
//! Sequence violations are always hard errors. Count and control-number
//! disagreements are hard errors in [`ValidationMode::Strict`] (the
//! default) and accumulated warnings in [`ValidationMode::Permissive`].

use edi271_segment::Segment;
use thiserror::Error;

/// How count and control-number disagreements are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Abort on the first disagreement.
    #[default]
    Strict,
    /// Record disagreements as warnings and continue.
    Permissive,
}

/// Envelope validation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("{tag} segment encountered out of sequence")]
    OutOfSequence { tag: String },
    #[error("interchange ended without a closing {trailer}")]
    MissingTrailer { trailer: &'static str },
    #[error("{trailer} declares {declared} {unit}(s) but {actual} were present")]
    ControlCountMismatch {
        trailer: &'static str,
        unit: &'static str,
        declared: String,
        actual: u32,
    },
    #[error("{trailer} control number {found:?} does not match {header} {expected:?}")]
    ControlNumberMismatch {
        trailer: &'static str,
        header: &'static str,
        found: String,
        expected: String,
    },
}

/// Totals observed while walking the envelope, plus any warnings collected
/// in permissive mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeSummary {
    pub segment_count: usize,
    pub group_count: u32,
    pub transaction_count: u32,
    pub warnings: Vec<EnvelopeError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    InInterchange,
    InGroup,
    InTransaction,
}

/// Stateful envelope walker. Feed segments in order via
/// [`EnvelopeValidator::check`], then call [`EnvelopeValidator::finish`].
pub struct EnvelopeValidator {
    mode: ValidationMode,
    state: State,
    summary: EnvelopeSummary,
    isa_control: String,
    gs_control: String,
    st_control: String,
    groups_in_interchange: u32,
    transactions_in_group: u32,
    segments_in_transaction: u32,
}

impl EnvelopeValidator {
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            state: State::Initial,
            summary: EnvelopeSummary::default(),
            isa_control: String::new(),
            gs_control: String::new(),
            st_control: String::new(),
            groups_in_interchange: 0,
            transactions_in_group: 0,
            segments_in_transaction: 0,
        }
    }

    /// Report a count or control-number disagreement according to the mode.
    fn report(&mut self, error: EnvelopeError) -> Result<(), EnvelopeError> {
        match self.mode {
            ValidationMode::Strict => Err(error),
            ValidationMode::Permissive => {
                self.summary.warnings.push(error);
                Ok(())
            }
        }
    }

    fn out_of_sequence(tag: &str) -> EnvelopeError {
        EnvelopeError::OutOfSequence {
            tag: tag.to_string(),
        }
    }

    pub fn check(&mut self, segment: &Segment) -> Result<(), EnvelopeError> {
        // SE01 counts every segment from ST through SE inclusive.
        if self.state == State::InTransaction {
            self.segments_in_transaction += 1;
        }

        match segment.tag() {
            "ISA" => {
                if self.state != State::Initial {
                    return Err(Self::out_of_sequence("ISA"));
                }
                self.isa_control = segment.element_or_empty(13).trim().to_string();
                self.groups_in_interchange = 0;
                self.state = State::InInterchange;
            }
            "GS" => {
                if self.state != State::InInterchange {
                    return Err(Self::out_of_sequence("GS"));
                }
                self.gs_control = segment.element_or_empty(6).trim().to_string();
                self.transactions_in_group = 0;
                self.groups_in_interchange += 1;
                self.summary.group_count += 1;
                self.state = State::InGroup;
            }
            "ST" => {
                if self.state != State::InGroup {
                    return Err(Self::out_of_sequence("ST"));
                }
                self.st_control = segment.element_or_empty(2).trim().to_string();
                self.segments_in_transaction = 1;
                self.transactions_in_group += 1;
                self.summary.transaction_count += 1;
                self.state = State::InTransaction;
            }
            "SE" => {
                if self.state != State::InTransaction {
                    return Err(Self::out_of_sequence("SE"));
                }
                let declared = segment.element_or_empty(1);
                if parse_u32(declared) != Some(self.segments_in_transaction) {
                    let actual = self.segments_in_transaction;
                    self.report(EnvelopeError::ControlCountMismatch {
                        trailer: "SE",
                        unit: "segment",
                        declared: declared.to_string(),
                        actual,
                    })?;
                }
                let found = segment.element_or_empty(2);
                if !controls_match(found, &self.st_control) {
                    let expected = self.st_control.clone();
                    self.report(EnvelopeError::ControlNumberMismatch {
                        trailer: "SE",
                        header: "ST",
                        found: found.to_string(),
                        expected,
                    })?;
                }
                self.state = State::InGroup;
            }
            "GE" => {
                if self.state != State::InGroup {
                    return Err(Self::out_of_sequence("GE"));
                }
                let declared = segment.element_or_empty(1);
                if parse_u32(declared) != Some(self.transactions_in_group) {
                    let actual = self.transactions_in_group;
                    self.report(EnvelopeError::ControlCountMismatch {
                        trailer: "GE",
                        unit: "transaction set",
                        declared: declared.to_string(),
                        actual,
                    })?;
                }
                let found = segment.element_or_empty(2);
                if !controls_match(found, &self.gs_control) {
                    let expected = self.gs_control.clone();
                    self.report(EnvelopeError::ControlNumberMismatch {
                        trailer: "GE",
                        header: "GS",
                        found: found.to_string(),
                        expected,
                    })?;
                }
                self.state = State::InInterchange;
            }
            "IEA" => {
                if self.state != State::InInterchange {
                    return Err(Self::out_of_sequence("IEA"));
                }
                let declared = segment.element_or_empty(1);
                if parse_u32(declared) != Some(self.groups_in_interchange) {
                    let actual = self.groups_in_interchange;
                    self.report(EnvelopeError::ControlCountMismatch {
                        trailer: "IEA",
                        unit: "functional group",
                        declared: declared.to_string(),
                        actual,
                    })?;
                }
                let found = segment.element_or_empty(2);
                if !controls_match(found, &self.isa_control) {
                    let expected = self.isa_control.clone();
                    self.report(EnvelopeError::ControlNumberMismatch {
                        trailer: "IEA",
                        header: "ISA",
                        found: found.to_string(),
                        expected,
                    })?;
                }
                self.state = State::Initial;
            }
            tag => {
                // Data segments are only legal inside some envelope level.
                if self.state == State::Initial {
                    return Err(Self::out_of_sequence(tag));
                }
            }
        }

        self.summary.segment_count += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<EnvelopeSummary, EnvelopeError> {
        match self.state {
            State::Initial => Ok(self.summary),
            State::InInterchange => Err(EnvelopeError::MissingTrailer { trailer: "IEA" }),
            State::InGroup => Err(EnvelopeError::MissingTrailer { trailer: "GE" }),
            State::InTransaction => Err(EnvelopeError::MissingTrailer { trailer: "SE" }),
        }
    }
}

/// Validate a tokenized segment sequence end to end.
pub fn validate(
    segments: &[Segment],
    mode: ValidationMode,
) -> Result<EnvelopeSummary, EnvelopeError> {
    let mut validator = EnvelopeValidator::new(mode);
    for segment in segments {
        validator.check(segment)?;
    }
    validator.finish()
}

fn parse_u32(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for byte in trimmed.bytes() {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(u32::from(byte - b'0'))?;
    }
    Some(value)
}

/// Control numbers compare numerically when both sides parse (so "0001"
/// matches "1"), otherwise as trimmed text.
fn controls_match(found: &str, expected: &str) -> bool {
    match (parse_u32(found), parse_u32(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => found.trim() == expected.trim(),
    }
}
