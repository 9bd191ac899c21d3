//! Maps assembled loops into normalized eligibility records.

use edi271_segment::Segment;

use crate::benefit::{BenefitDate, BenefitEntry};
use crate::hierarchy::{Hierarchy, Loop, LoopKind};
use crate::record::{DiagnosticKind, EligibilityResponse, UNKNOWN};

/// Assemble one record per subscriber and dependent loop.
///
/// A transaction with no subscriber loop still yields a single record so
/// that the envelope-level identifiers are not lost; it is flagged rather
/// than dropped.
pub(crate) fn assemble(segments: &[Segment], hierarchy: &Hierarchy) -> Vec<EligibilityResponse> {
    let mut base = EligibilityResponse::default();
    for &position in hierarchy.preamble() {
        let segment = &segments[position];
        match segment.tag() {
            "ST" => {
                let control = segment.element_or_empty(2);
                if !control.is_empty() {
                    base.transaction_id = control.to_string();
                }
            }
            "BHT" => {
                // BHT04 is the transaction creation date, CCYYMMDD.
                if let Some(date) = segment.element(4).and_then(format_ccyymmdd) {
                    base.response_date = date;
                }
            }
            _ => {}
        }
    }

    let mut records: Vec<EligibilityResponse> = hierarchy
        .loops()
        .iter()
        .filter(|l| matches!(l.kind, LoopKind::Subscriber | LoopKind::Dependent))
        .map(|member| assemble_member(segments, hierarchy, member, &base))
        .collect();

    if records.is_empty() {
        let mut record = base;
        record.flag(
            DiagnosticKind::MissingRequiredSegment,
            "transaction contains no subscriber loop",
        );
        records.push(record);
    }

    records
}

fn assemble_member(
    segments: &[Segment],
    hierarchy: &Hierarchy,
    member: &Loop,
    base: &EligibilityResponse,
) -> EligibilityResponse {
    let mut record = base.clone();

    apply_member_loop(segments, member, &mut record);

    // Payer, provider, and (for dependents) subscriber-level identifiers
    // come from the ancestor chain; the member's own values win.
    for ancestor in hierarchy.ancestors(member) {
        apply_context_loop(segments, ancestor, &mut record);
    }

    let who = match member.kind {
        LoopKind::Dependent => "dependent",
        _ => "subscriber",
    };

    if record.payer_name == UNKNOWN {
        record.flag(
            DiagnosticKind::MissingRequiredSegment,
            "no payer identification (NM1*PR) in scope",
        );
    }
    if record.provider_name == UNKNOWN {
        record.flag(
            DiagnosticKind::MissingRequiredSegment,
            "no provider identification (NM1*1P) in scope",
        );
    }
    if record.subscriber_name == UNKNOWN {
        record.flag(
            DiagnosticKind::MissingRequiredSegment,
            format!("no {who} name segment (NM1)"),
        );
    }
    if record.date_of_birth == UNKNOWN && record.gender == UNKNOWN {
        record.flag(
            DiagnosticKind::MissingRequiredSegment,
            format!("no {who} demographic segment (DMG)"),
        );
    }
    if record.benefits.is_empty() {
        record.flag(
            DiagnosticKind::IncompleteSubscriber,
            format!("{who} loop {} contains no benefit segments", member.id),
        );
    }

    record
}

/// Walk the member's own loop: identity, demographics, and benefits.
fn apply_member_loop(segments: &[Segment], member: &Loop, record: &mut EligibilityResponse) {
    let mut street: Option<String> = None;

    for &position in &member.segments {
        let segment = &segments[position];
        match segment.tag() {
            "NM1" => match segment.element_or_empty(1) {
                // IL = insured/subscriber, 03 and QD = dependent.
                "IL" | "03" | "QD" => {
                    if let Some(name) = person_name(segment) {
                        record.subscriber_name = name;
                    }
                    let member_id = segment.element_or_empty(9);
                    if !member_id.is_empty() {
                        record.member_id = member_id.to_string();
                    }
                }
                _ => {}
            },
            "REF" => match segment.element_or_empty(1) {
                "18" => assign(&mut record.group_number, segment.element_or_empty(2)),
                "6P" => assign(&mut record.employer, segment.element_or_empty(2)),
                _ => {}
            },
            "N3" => {
                let line = segment.element_or_empty(1);
                if !line.is_empty() {
                    street = Some(line.to_string());
                }
            }
            "N4" => {
                if let Some(line) = &street {
                    record.address = format!(
                        "{line}, {}, {} {}",
                        segment.element_or_empty(1),
                        segment.element_or_empty(2),
                        segment.element_or_empty(3),
                    );
                }
            }
            "DMG" => {
                if let Some(dob) = segment.element(2).and_then(format_ccyymmdd) {
                    record.date_of_birth = dob;
                }
                record.gender = match segment.element_or_empty(3) {
                    "F" => "Female".to_string(),
                    "M" => "Male".to_string(),
                    _ => UNKNOWN.to_string(),
                };
            }
            "EB" => {
                let entry = BenefitEntry::from_segment(segment);
                if !entry.is_recognized() {
                    record.flag(
                        DiagnosticKind::UnknownBenefitCode,
                        format!(
                            "benefit information code {:?} is outside the 271 code set",
                            entry.eligibility_code
                        ),
                    );
                }
                roll_up_benefit(record, &entry);
                record.benefits.push(entry);
            }
            "DTP" => {
                // Dates between benefit segments belong to the entry above.
                if let Some(entry) = record.benefits.last_mut() {
                    entry.dates.push(BenefitDate {
                        qualifier: segment.element_or_empty(1).to_string(),
                        value: segment.element_or_empty(3).to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    // N3 with no N4 still yields a street address.
    if record.address == UNKNOWN {
        if let Some(line) = street {
            record.address = line;
        }
    }
}

/// Walk an ancestor loop, filling only fields still unreported.
fn apply_context_loop(segments: &[Segment], ancestor: &Loop, record: &mut EligibilityResponse) {
    for &position in &ancestor.segments {
        let segment = &segments[position];
        match segment.tag() {
            "NM1" => match segment.element_or_empty(1) {
                "PR" => {
                    if record.payer_name == UNKNOWN {
                        assign(&mut record.payer_name, segment.element_or_empty(3));
                    }
                }
                "1P" | "FA" => {
                    if record.provider_name == UNKNOWN {
                        assign(&mut record.provider_name, segment.element_or_empty(3));
                        assign(&mut record.provider_npi, segment.element_or_empty(9));
                    }
                }
                // A dependent inherits the subscriber's member id.
                "IL" => {
                    if record.member_id == UNKNOWN {
                        assign(&mut record.member_id, segment.element_or_empty(9));
                    }
                }
                _ => {}
            },
            "REF" => match segment.element_or_empty(1) {
                "18" => {
                    if record.group_number == UNKNOWN {
                        assign(&mut record.group_number, segment.element_or_empty(2));
                    }
                }
                "6P" => {
                    if record.employer == UNKNOWN {
                        assign(&mut record.employer, segment.element_or_empty(2));
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
}

/// Fold one benefit entry into the record's summary fields.
fn roll_up_benefit(record: &mut EligibilityResponse, entry: &BenefitEntry) {
    if record.plan_name == UNKNOWN
        && entry.plan_description.to_ascii_uppercase().contains("PLAN")
    {
        record.plan_name = entry.plan_description.clone();
    }

    // Individual deductible: time period 22 is the service year figure,
    // 29 is the remaining (met) figure. First occurrence wins.
    if entry.coverage_level == "IND" && !entry.amount.is_empty() {
        match entry.time_period.as_str() {
            "22" if record.individual_deductible == UNKNOWN => {
                record.individual_deductible = entry.amount.clone();
            }
            "29" if record.individual_deductible_met == UNKNOWN => {
                record.individual_deductible_met = entry.amount.clone();
            }
            _ => {}
        }
    }

    // Co-payment against a preventive service type (98, legacy A3).
    if record.preventative_care_copay == UNKNOWN
        && entry.eligibility_code == "B"
        && !entry.amount.is_empty()
        && entry
            .service_type_codes
            .iter()
            .any(|code| code == "98" || code == "A3")
    {
        record.preventative_care_copay = entry.amount.clone();
    }

    if entry.service_type_codes.iter().any(|code| code == "MH") {
        record.mental_health_covered = "Yes".to_string();
    }
}

fn assign(slot: &mut String, value: &str) {
    if !value.is_empty() {
        *slot = value.to_string();
    }
}

/// "LAST, FIRST M" from an NM1 individual name.
fn person_name(segment: &Segment) -> Option<String> {
    let last = segment.element_or_empty(3);
    let first = segment.element_or_empty(4);
    let middle = segment.element_or_empty(5);

    if last.is_empty() && first.is_empty() {
        return None;
    }
    let mut name = format!("{last}, {first}");
    if !middle.is_empty() {
        name.push(' ');
        name.push_str(middle);
    }
    Some(name)
}

/// CCYYMMDD → MM/DD/YYYY; anything else is left unreported.
fn format_ccyymmdd(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}/{}/{}", &raw[4..6], &raw[6..8], &raw[..4]))
}
