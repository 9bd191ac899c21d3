//! Normalized eligibility records and per-record diagnostics.

use serde::{Deserialize, Serialize};

use crate::benefit::BenefitEntry;

/// Marker for a field whose source segment was not reported. Distinct from
/// "", which means the segment was present with an empty value.
pub const UNKNOWN: &str = "Unknown";

/// Kind of a recoverable, record-level problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// EB01 outside the closed benefit-information code set.
    UnknownBenefitCode,
    /// An expected segment was absent; the field stays [`UNKNOWN`].
    MissingRequiredSegment,
    /// A subscriber or dependent loop carried no benefit segments.
    IncompleteSubscriber,
}

/// A recoverable problem noted while assembling one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub note: String,
}

/// Normalized 271 eligibility response for one covered individual.
///
/// Dates and monetary values are kept as formatted strings; source values
/// may legitimately be non-numeric placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResponse {
    pub transaction_id: String,
    pub response_date: String,
    pub payer_name: String,
    pub provider_name: String,
    pub provider_npi: String,
    pub subscriber_name: String,
    pub member_id: String,
    pub group_number: String,
    pub employer: String,
    pub address: String,
    pub date_of_birth: String,
    pub gender: String,
    pub plan_name: String,
    pub individual_deductible: String,
    pub individual_deductible_met: String,
    pub preventative_care_copay: String,
    pub mental_health_covered: String,
    pub status: String,
    pub benefits: Vec<BenefitEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Default for EligibilityResponse {
    fn default() -> Self {
        Self {
            transaction_id: UNKNOWN.to_string(),
            response_date: UNKNOWN.to_string(),
            payer_name: UNKNOWN.to_string(),
            provider_name: UNKNOWN.to_string(),
            provider_npi: UNKNOWN.to_string(),
            subscriber_name: UNKNOWN.to_string(),
            member_id: UNKNOWN.to_string(),
            group_number: UNKNOWN.to_string(),
            employer: UNKNOWN.to_string(),
            address: UNKNOWN.to_string(),
            date_of_birth: UNKNOWN.to_string(),
            gender: UNKNOWN.to_string(),
            plan_name: UNKNOWN.to_string(),
            individual_deductible: UNKNOWN.to_string(),
            individual_deductible_met: UNKNOWN.to_string(),
            preventative_care_copay: UNKNOWN.to_string(),
            mental_health_covered: "Not specified".to_string(),
            status: "Active".to_string(),
            benefits: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

impl EligibilityResponse {
    /// Record a diagnostic against this record.
    pub fn flag(&mut self, kind: DiagnosticKind, note: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            kind,
            note: note.into(),
        });
    }

    /// Whether any diagnostic of the given kind was recorded.
    pub fn is_flagged(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_record_distinguishes_unreported_fields() {
        let record = EligibilityResponse::default();

        assert_eq!(record.payer_name, UNKNOWN);
        assert_eq!(record.status, "Active");
        assert_eq!(record.mental_health_covered, "Not specified");
        assert!(record.diagnostics.is_empty());
    }

    #[test]
    fn flag_accumulates_in_order() {
        let mut record = EligibilityResponse::default();
        record.flag(DiagnosticKind::MissingRequiredSegment, "no DMG");
        record.flag(DiagnosticKind::IncompleteSubscriber, "no benefits");

        assert!(record.is_flagged(DiagnosticKind::MissingRequiredSegment));
        assert!(record.is_flagged(DiagnosticKind::IncompleteSubscriber));
        assert!(!record.is_flagged(DiagnosticKind::UnknownBenefitCode));
        assert_eq!(record.diagnostics[0].note, "no DMG");
    }
}
