//! Benefit segment (EB) mapping and the closed benefit-information code set.

use serde::{Deserialize, Serialize};

use edi271_segment::{Delimiters, Segment};

use crate::record::UNKNOWN;

/// Meaning of an EB01 eligibility or benefit information code.
///
/// The code set is fixed by the 270/271 implementation guide; it is a
/// static mapping, not an extensible table. Returns `None` for codes
/// outside the set.
pub fn benefit_code_meaning(code: &str) -> Option<&'static str> {
    Some(match code {
        "1" => "Active Coverage",
        "2" => "Active - Full Risk Capitation",
        "3" => "Active - Services Capitated",
        "4" => "Active - Services Capitated to Primary Care Physician",
        "5" => "Active - Pending Investigation",
        "6" => "Inactive",
        "7" => "Inactive - Pending Eligibility Update",
        "8" => "Inactive - Pending Investigation",
        "A" => "Co-Insurance",
        "B" => "Co-Payment",
        "C" => "Deductible",
        "CB" => "Coverage Basis",
        "D" => "Benefit Description",
        "E" => "Exclusions",
        "F" => "Limitations",
        "G" => "Out of Pocket (Stop Loss)",
        "H" => "Unlimited",
        "I" => "Non-Covered",
        "J" => "Cost Containment",
        "K" => "Reserve",
        "L" => "Primary Care Provider",
        "M" => "Pre-Existing Condition",
        "MC" => "Managed Care Coordinator",
        "N" => "Services Restricted to Following Provider",
        "O" => "Not Deemed a Medical Necessity",
        "P" => "Benefit Disclaimer",
        "Q" => "Second Surgical Opinion Required",
        "R" => "Other or Additional Payor",
        "S" => "Prior Year(s) History",
        "T" => "Card(s) Reported Lost/Stolen",
        "U" => "Contact Following Entity for Eligibility or Benefit Information",
        "V" => "Cannot Process",
        "W" => "Other Source of Data",
        "X" => "Health Care Facility",
        "Y" => "Spend Down",
        _ => return None,
    })
}

/// A date attached to a benefit entry (from a DTP segment following the EB).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitDate {
    /// DTP01 date/time qualifier (e.g. "291" plan begin).
    pub qualifier: String,
    /// DTP03 value, kept in its source format.
    pub value: String,
}

/// One eligibility/benefit entry, mapped from a single EB segment.
///
/// Element values are kept verbatim; in particular `amount` and `percent`
/// stay formatted strings because payers send non-numeric placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitEntry {
    /// EB01 verbatim, even when outside the known code set.
    pub eligibility_code: String,
    /// Mapped meaning of EB01, or [`UNKNOWN`].
    pub meaning: String,
    /// EB02 coverage level code (e.g. "IND", "FAM").
    pub coverage_level: String,
    /// EB03 service type codes, split on the repetition separator.
    pub service_type_codes: Vec<String>,
    /// EB04 insurance type / plan code (e.g. "HM").
    pub plan_code: String,
    /// EB05 plan coverage description.
    pub plan_description: String,
    /// EB06 time period qualifier (e.g. "22" service year, "29" remaining).
    pub time_period: String,
    /// EB07 monetary amount, raw.
    pub amount: String,
    /// EB08 percent, raw.
    pub percent: String,
    /// Dates from DTP segments following this EB, in encounter order.
    pub dates: Vec<BenefitDate>,
}

impl BenefitEntry {
    pub fn from_segment(segment: &Segment) -> Self {
        let code = segment.element_or_empty(1);
        Self {
            eligibility_code: code.to_string(),
            meaning: benefit_code_meaning(code).unwrap_or(UNKNOWN).to_string(),
            coverage_level: segment.element_or_empty(2).to_string(),
            service_type_codes: segment
                .repetitions(3)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            plan_code: segment.element_or_empty(4).to_string(),
            plan_description: segment.element_or_empty(5).to_string(),
            time_period: segment.element_or_empty(6).to_string(),
            amount: segment.element_or_empty(7).to_string(),
            percent: segment.element_or_empty(8).to_string(),
            dates: Vec::new(),
        }
    }

    /// Whether EB01 falls inside the closed code set.
    pub fn is_recognized(&self) -> bool {
        benefit_code_meaning(&self.eligibility_code).is_some()
    }

    /// Re-emit this entry as an EB segment, terminator included. Trailing
    /// empty elements are dropped. Attached dates are not re-emitted.
    pub fn encode(&self, delimiters: Delimiters) -> String {
        let repetition = (delimiters.repetition as char).to_string();
        let mut elements = vec![
            self.eligibility_code.clone(),
            self.coverage_level.clone(),
            self.service_type_codes.join(&repetition),
            self.plan_code.clone(),
            self.plan_description.clone(),
            self.time_period.clone(),
            self.amount.clone(),
            self.percent.clone(),
        ];
        while elements.last().is_some_and(String::is_empty) {
            elements.pop();
        }

        let mut out = String::from("EB");
        for element in &elements {
            out.push(delimiters.element as char);
            out.push_str(element);
        }
        out.push(delimiters.segment as char);
        out
    }
}
