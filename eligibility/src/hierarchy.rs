//! Loop hierarchy assembly from HL segments.
//!
//! A 271 transaction is flat on the wire: HL segments declare their own
//! identifier (HL01), their parent's identifier (HL02), and a level code
//! (HL03). The builder threads those flat segments back into the nested
//! source → receiver → subscriber → dependent structure.
//!
//! Loops are kept in an arena indexed by position, with an identifier map
//! for parent lookups; parent references are stored as plain identifiers,
//! never live references, so the structure has no cycles and no shared
//! ownership.

use std::collections::HashMap;

use thiserror::Error;

use edi271_segment::Segment;

/// Loop type, from the HL03 hierarchical level code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// Level 20: the payer answering the inquiry.
    InformationSource,
    /// Level 21: the provider that asked.
    InformationReceiver,
    /// Level 22: the insured member.
    Subscriber,
    /// Level 23: a dependent of the subscriber.
    Dependent,
}

impl LoopKind {
    pub fn from_level_code(code: &str) -> Option<Self> {
        match code {
            "20" => Some(Self::InformationSource),
            "21" => Some(Self::InformationReceiver),
            "22" => Some(Self::Subscriber),
            "23" => Some(Self::Dependent),
            _ => None,
        }
    }

    pub fn level_code(self) -> &'static str {
        match self {
            Self::InformationSource => "20",
            Self::InformationReceiver => "21",
            Self::Subscriber => "22",
            Self::Dependent => "23",
        }
    }
}

/// One assembled loop. `segments` holds indices into the transaction's
/// segment slice, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    /// HL01 hierarchical identifier.
    pub id: String,
    /// HL02 parent identifier; `None` for the root.
    pub parent: Option<String>,
    pub kind: LoopKind,
    pub segments: Vec<usize>,
}

/// Hierarchy assembly failure; aborts the current transaction only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("HL segment is missing its identifier (HL01)")]
    MissingIdentifier,
    #[error("HL {id} references parent {parent} which has not been seen")]
    OrphanHierarchy { id: String, parent: String },
    #[error("HL {id} declares unknown hierarchical level code {code:?}")]
    UnknownLevelCode { id: String, code: String },
}

/// The assembled loop structure of one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    loops: Vec<Loop>,
    index: HashMap<String, usize>,
    preamble: Vec<usize>,
}

impl Hierarchy {
    /// Thread a transaction's segments into loops, single forward pass.
    ///
    /// Every HL02 must name an identifier already seen; an unseen parent is
    /// an [`HierarchyError::OrphanHierarchy`]. Non-HL segments attach to
    /// the loop currently being built; segments before the first HL (ST,
    /// BHT) form the preamble. A transaction with no subscriber loop is
    /// not a build error; the assembler reports it as a diagnostic.
    pub fn build(segments: &[Segment]) -> Result<Self, HierarchyError> {
        let mut hierarchy = Self::default();
        let mut active: Option<usize> = None;

        for (position, segment) in segments.iter().enumerate() {
            if segment.tag() != "HL" {
                match active {
                    Some(current) => hierarchy.loops[current].segments.push(position),
                    None => hierarchy.preamble.push(position),
                }
                continue;
            }

            let id = segment.element_or_empty(1).trim();
            if id.is_empty() {
                return Err(HierarchyError::MissingIdentifier);
            }

            let parent = match segment.element_or_empty(2).trim() {
                "" => None,
                parent_id => {
                    if !hierarchy.index.contains_key(parent_id) {
                        return Err(HierarchyError::OrphanHierarchy {
                            id: id.to_string(),
                            parent: parent_id.to_string(),
                        });
                    }
                    Some(parent_id.to_string())
                }
            };

            let level = segment.element_or_empty(3).trim();
            let kind = LoopKind::from_level_code(level).ok_or_else(|| {
                HierarchyError::UnknownLevelCode {
                    id: id.to_string(),
                    code: level.to_string(),
                }
            })?;

            let slot = hierarchy.loops.len();
            hierarchy.loops.push(Loop {
                id: id.to_string(),
                parent,
                kind,
                segments: Vec::new(),
            });
            hierarchy.index.insert(id.to_string(), slot);
            active = Some(slot);
        }

        Ok(hierarchy)
    }

    /// All loops in encounter order.
    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    /// Look a loop up by its HL01 identifier.
    pub fn get(&self, id: &str) -> Option<&Loop> {
        self.index.get(id).map(|&slot| &self.loops[slot])
    }

    /// Segment indices seen before the first HL segment.
    pub fn preamble(&self) -> &[usize] {
        &self.preamble
    }

    /// Loops of one kind, in encounter order.
    pub fn of_kind(&self, kind: LoopKind) -> impl Iterator<Item = &Loop> + '_ {
        self.loops.iter().filter(move |l| l.kind == kind)
    }

    /// Ancestor chain of a loop, nearest first.
    ///
    /// Parents always precede children in the stream, so the chain is
    /// finite and cycle-free by construction.
    pub fn ancestors<'h>(&'h self, start: &Loop) -> Vec<&'h Loop> {
        let mut chain = Vec::new();
        let mut parent = start.parent.as_deref();
        while let Some(id) = parent {
            match self.get(id) {
                Some(ancestor) => {
                    chain.push(ancestor);
                    parent = ancestor.parent.as_deref();
                }
                None => break,
            }
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi271_segment::tokenize;
    use pretty_assertions::assert_eq;

    const ISA: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *210101*1200*^*00501*000000001*0*P*:~";

    fn transaction(body: &str) -> String {
        format!("{ISA}{body}")
    }

    #[test]
    fn threads_loops_onto_their_parents() {
        let input = transaction(
            "ST*271*0001~\
             BHT*0022*11*REF123*20210315*0930~\
             HL*1**20*1~NM1*PR*2*ACME HEALTH~\
             HL*2*1*21*1~NM1*1P*2*CLINIC~\
             HL*3*2*22*0~NM1*IL*1*DOE*JANE~EB*1~",
        );
        let segments = tokenize(&input).unwrap();
        // Skip the ISA; transactions start at ST.
        let hierarchy = Hierarchy::build(&segments[1..]).unwrap();

        assert_eq!(hierarchy.loops().len(), 3);
        assert_eq!(hierarchy.preamble().len(), 2);

        let subscriber = hierarchy.get("3").unwrap();
        assert_eq!(subscriber.kind, LoopKind::Subscriber);
        assert_eq!(subscriber.parent.as_deref(), Some("2"));
        assert_eq!(subscriber.segments.len(), 2);

        let chain = hierarchy.ancestors(subscriber);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].kind, LoopKind::InformationReceiver);
        assert_eq!(chain[1].kind, LoopKind::InformationSource);
    }

    #[test]
    fn unseen_parent_is_an_orphan() {
        let input = transaction("ST*271*0001~HL*1**20*1~HL*2*9*21*1~");
        let segments = tokenize(&input).unwrap();

        let err = Hierarchy::build(&segments[1..]).unwrap_err();
        assert_eq!(
            err,
            HierarchyError::OrphanHierarchy {
                id: "2".to_string(),
                parent: "9".to_string(),
            }
        );
    }

    #[test]
    fn self_referencing_loop_is_an_orphan() {
        let input = transaction("ST*271*0001~HL*1*1*20*1~");
        let segments = tokenize(&input).unwrap();

        assert!(matches!(
            Hierarchy::build(&segments[1..]),
            Err(HierarchyError::OrphanHierarchy { .. })
        ));
    }

    #[test]
    fn unknown_level_code_is_rejected() {
        let input = transaction("ST*271*0001~HL*1**99*1~");
        let segments = tokenize(&input).unwrap();

        let err = Hierarchy::build(&segments[1..]).unwrap_err();
        assert_eq!(
            err,
            HierarchyError::UnknownLevelCode {
                id: "1".to_string(),
                code: "99".to_string(),
            }
        );
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let input = transaction("ST*271*0001~HL***20*1~");
        let segments = tokenize(&input).unwrap();

        assert_eq!(
            Hierarchy::build(&segments[1..]),
            Err(HierarchyError::MissingIdentifier)
        );
    }

    #[test]
    fn benefit_segments_keep_encounter_order() {
        let input = transaction(
            "ST*271*0001~HL*1**20*1~HL*2*1*21*1~HL*3*2*22*0~\
             EB*1*IND*30~EB*C*IND*30***22*500~EB*1*IND*30~",
        );
        let segments = tokenize(&input).unwrap();
        let tx = &segments[1..];
        let hierarchy = Hierarchy::build(tx).unwrap();

        let subscriber = hierarchy.get("3").unwrap();
        let codes: Vec<_> = subscriber
            .segments
            .iter()
            .filter(|&&i| tx[i].tag() == "EB")
            .map(|&i| tx[i].element_or_empty(1))
            .collect();
        assert_eq!(codes, vec!["1", "C", "1"]);
    }
}
