//! X12 271 segment tokenizer.
//!
//! Splits a fully-read interchange into an ordered sequence of [`Segment`]s
//! using the delimiters the interchange declares about itself in the fixed
//! positions of its ISA header. Tokenization is a single forward pass over
//! the caller's buffer; every [`Segment`] borrows from that buffer and is
//! immutable once constructed.

use thiserror::Error;

/// Size of the ISA header in bytes, including the segment terminator.
pub const ISA_LENGTH: usize = 106;

/// X12 delimiters extracted from the ISA segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    /// Element separator (byte 3 of the ISA, typically '*')
    pub element: u8,
    /// Component (sub-element) separator (byte 104, typically ':')
    pub component: u8,
    /// Segment terminator (byte 105, typically '~')
    pub segment: u8,
    /// Repetition separator (ISA11, typically '^')
    pub repetition: u8,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            element: b'*',
            component: b':',
            segment: b'~',
            repetition: b'^',
        }
    }
}

/// Structurally invalid input; aborts the parse of the whole file.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MalformedEnvelope {
    #[error("input is empty")]
    Empty,
    #[error("interchange must begin with an ISA header")]
    MissingInterchangeHeader,
    #[error("ISA header is {0} bytes, expected at least {ISA_LENGTH}")]
    TruncatedInterchangeHeader(usize),
    #[error("delimiter declared in the ISA header is not an ASCII character")]
    NonAsciiDelimiter,
    #[error("ISA header declares identical delimiter characters")]
    AmbiguousDelimiters,
    #[error("segment tag cannot be empty")]
    EmptySegmentTag,
}

/// One parsed segment: a tag plus its ordered data elements, all borrowed
/// from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    tag: &'a str,
    elements: Vec<&'a str>,
    delimiters: Delimiters,
}

impl<'a> Segment<'a> {
    /// Segment tag (e.g. "ISA", "HL", "NM1", "EB").
    #[inline]
    pub fn tag(&self) -> &'a str {
        self.tag
    }

    /// Get an element by X12 element number.
    ///
    /// `element(0)` is the segment tag itself; `element(1)` is the first
    /// data element, so NM1-03 is `element(3)`. This matches the numbering
    /// used by the implementation guides and prevents off-by-one errors.
    #[inline]
    pub fn element(&self, number: usize) -> Option<&'a str> {
        match number {
            0 => Some(self.tag),
            n => self.elements.get(n - 1).copied(),
        }
    }

    /// Like [`Segment::element`] but maps an absent element to "".
    #[inline]
    pub fn element_or_empty(&self, number: usize) -> &'a str {
        self.element(number).unwrap_or("")
    }

    /// Total element count including the tag as element 0.
    #[inline]
    pub fn element_count(&self) -> usize {
        self.elements.len() + 1
    }

    /// Split an element into its sub-element components.
    pub fn components(&self, number: usize) -> impl Iterator<Item = &'a str> {
        self.element_or_empty(number)
            .split(self.delimiters.component as char)
    }

    /// Split an element into its repetitions.
    pub fn repetitions(&self, number: usize) -> impl Iterator<Item = &'a str> {
        self.element_or_empty(number)
            .split(self.delimiters.repetition as char)
    }

    /// Delimiter set in force for this segment.
    #[inline]
    pub fn delimiters(&self) -> Delimiters {
        self.delimiters
    }
}

/// Tokenize a fully-read 271 interchange into an ordered segment sequence.
///
/// The element separator, component separator, and segment terminator are
/// read from bytes 3, 104, and 105 of the ISA header; the repetition
/// separator comes from ISA11 when it carries one. Newlines between
/// segments are tolerated and stripped.
///
/// # Errors
///
/// Returns [`MalformedEnvelope`] when the ISA header is absent or shorter
/// than [`ISA_LENGTH`], when the declared delimiters are non-ASCII or not
/// pairwise distinct, or when a segment mid-stream has an empty tag.
pub fn tokenize(input: &str) -> Result<Vec<Segment<'_>>, MalformedEnvelope> {
    let input = input.trim_matches(|c: char| c.is_ascii_whitespace());
    let bytes = input.as_bytes();

    if bytes.is_empty() {
        return Err(MalformedEnvelope::Empty);
    }
    if bytes.len() < 3 || &bytes[..3] != b"ISA" {
        return Err(MalformedEnvelope::MissingInterchangeHeader);
    }
    if bytes.len() < ISA_LENGTH {
        return Err(MalformedEnvelope::TruncatedInterchangeHeader(bytes.len()));
    }

    let mut delimiters = Delimiters {
        element: bytes[3],
        component: bytes[104],
        segment: bytes[105],
        ..Delimiters::default()
    };

    for separator in [delimiters.element, delimiters.component, delimiters.segment] {
        if !separator.is_ascii() {
            return Err(MalformedEnvelope::NonAsciiDelimiter);
        }
    }
    if delimiters.element == delimiters.component
        || delimiters.element == delimiters.segment
        || delimiters.component == delimiters.segment
    {
        return Err(MalformedEnvelope::AmbiguousDelimiters);
    }

    let mut segments = Vec::new();
    for chunk in input.split(delimiters.segment as char) {
        let chunk = chunk.trim_matches(|c: char| c.is_ascii_whitespace());
        if chunk.is_empty() {
            continue;
        }

        let mut parts = chunk.split(delimiters.element as char);
        let tag = parts.next().unwrap_or("");
        if tag.is_empty() {
            return Err(MalformedEnvelope::EmptySegmentTag);
        }
        let elements: Vec<&str> = parts.collect();

        if segments.is_empty() {
            // First segment is the ISA. In 5010 interchanges ISA11 is the
            // repetition separator; 4010 interchanges carry a standard
            // identifier there instead, so an alphanumeric byte keeps the
            // default.
            if let Some(&rep) = elements.get(10).and_then(|e| e.as_bytes().first()) {
                if rep.is_ascii() && !rep.is_ascii_alphanumeric() {
                    delimiters.repetition = rep;
                }
            }
        }

        segments.push(Segment {
            tag,
            elements,
            delimiters,
        });
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ISA: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *210101*1200*^*00501*000000001*0*P*:~";

    #[test]
    fn tokenizes_isa_header() {
        let segments = tokenize(ISA).unwrap();

        assert_eq!(segments.len(), 1);
        let isa = &segments[0];
        assert_eq!(isa.tag(), "ISA");
        assert_eq!(isa.element_count(), 17);
        assert_eq!(isa.element(13), Some("000000001"));
        assert_eq!(isa.delimiters().repetition, b'^');
    }

    #[test]
    fn element_zero_is_the_tag() {
        let input = format!("{ISA}NM1*IL*1*DOE*JANE~");
        let segments = tokenize(&input).unwrap();

        let nm1 = &segments[1];
        assert_eq!(nm1.element(0), Some("NM1"));
        assert_eq!(nm1.element(1), Some("IL"));
        assert_eq!(nm1.element(3), Some("DOE"));
        assert_eq!(nm1.element(9), None);
    }

    #[test]
    fn empty_elements_are_preserved() {
        let input = format!("{ISA}NM1*IL*1**JANE**MI~");
        let segments = tokenize(&input).unwrap();

        let nm1 = &segments[1];
        assert_eq!(nm1.element(3), Some(""));
        assert_eq!(nm1.element(4), Some("JANE"));
        assert_eq!(nm1.element(6), Some("MI"));
    }

    #[test]
    fn trailing_separator_yields_trailing_empty_element() {
        let input = format!("{ISA}REF*18*GRP-001*~");
        let segments = tokenize(&input).unwrap();

        let reference = &segments[1];
        assert_eq!(reference.element_count(), 4);
        assert_eq!(reference.element(3), Some(""));
    }

    #[test]
    fn components_split_on_declared_separator() {
        let input = format!("{ISA}SVC*HC:99213:26*100~");
        let segments = tokenize(&input).unwrap();

        let components: Vec<_> = segments[1].components(1).collect();
        assert_eq!(components, vec!["HC", "99213", "26"]);
    }

    #[test]
    fn repetitions_split_on_isa11_separator() {
        let input = format!("{ISA}EB*1*IND*30^48^98~");
        let segments = tokenize(&input).unwrap();

        let repetitions: Vec<_> = segments[1].repetitions(3).collect();
        assert_eq!(repetitions, vec!["30", "48", "98"]);
    }

    #[test]
    fn alternative_delimiters_are_honored() {
        let input = "ISA|00|          |00|          |ZZ|SENDER         |ZZ|RECEIVER       |210101|1200|^|00501|000000001|0|P|:~\
                     GS|HB|SENDER|RECEIVER|20210101|1200|1|X|005010X279A1~";
        let segments = tokenize(input).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].tag(), "GS");
        assert_eq!(segments[1].element(1), Some("HB"));
    }

    #[test]
    fn newlines_between_segments_are_stripped() {
        let input = format!("{ISA}\r\nGS*HB*S*R*20210101*1200*1*X*005010X279A1~\nST*271*0001~\n");
        let segments = tokenize(&input).unwrap();

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2].tag(), "ST");
    }

    #[test]
    fn empty_input_is_malformed() {
        assert_eq!(tokenize(""), Err(MalformedEnvelope::Empty));
        assert_eq!(tokenize("   \r\n"), Err(MalformedEnvelope::Empty));
    }

    #[test]
    fn missing_isa_prefix_is_malformed() {
        assert_eq!(
            tokenize("GS*HB*SENDER*RECEIVER~"),
            Err(MalformedEnvelope::MissingInterchangeHeader)
        );
    }

    #[test]
    fn truncated_isa_is_malformed() {
        let short = &ISA[..40];
        assert_eq!(
            tokenize(short),
            Err(MalformedEnvelope::TruncatedInterchangeHeader(40))
        );
    }

    #[test]
    fn identical_delimiters_are_rejected() {
        // Element separator and segment terminator both '*'
        let mut doc = String::from(ISA);
        doc.replace_range(105..106, "*");
        assert_eq!(tokenize(&doc), Err(MalformedEnvelope::AmbiguousDelimiters));
    }

    #[test]
    fn empty_segment_tag_is_rejected() {
        let input = format!("{ISA}*ELEMENT1*ELEMENT2~");
        assert_eq!(tokenize(&input), Err(MalformedEnvelope::EmptySegmentTag));
    }
}
