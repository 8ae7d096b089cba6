use serde::{Deserialize, Serialize};

use crate::model::ids::{DomainId, QuestionId};

//
// ─── QUESTION KINDS ────────────────────────────────────────────────────────────
//

/// One left/right pair of a matching question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

impl MatchPair {
    #[must_use]
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// Question payload together with its answer key.
///
/// `Choice` covers single- and multi-select; `correct` holds option indices.
/// `TrueFalse` keeps the stored index convention: `correct[0] == 0` means True.
/// `Unsupported` is what a stored row with an unrecognized type (or an
/// unreadable payload) becomes; it is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    Choice {
        options: Vec<String>,
        correct: Vec<u32>,
    },
    TrueFalse {
        correct: Vec<u32>,
    },
    Matching {
        pairs: Vec<MatchPair>,
    },
    Ordering {
        items: Vec<String>,
    },
    #[serde(skip)]
    Unsupported {
        kind: String,
    },
}

impl QuestionKind {
    /// Storage tag of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            QuestionKind::Choice { .. } => "choice",
            QuestionKind::TrueFalse { .. } => "truefalse",
            QuestionKind::Matching { .. } => "matching",
            QuestionKind::Ordering { .. } => "ordering",
            QuestionKind::Unsupported { kind } => kind.as_str(),
        }
    }

    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, QuestionKind::Unsupported { .. })
    }
}

/// A question from the domain-tagged bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    pub domain_ids: Vec<DomainId>,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id,
            text: text.into(),
            kind,
            domain_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_domains(mut self, domains: impl IntoIterator<Item = DomainId>) -> Self {
        self.domain_ids.extend(domains);
        self
    }

    #[must_use]
    pub fn is_tagged(&self, domain: DomainId) -> bool {
        self.domain_ids.contains(&domain)
    }
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// A submitted choice: one option index, or a set of them for multi-select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceAnswer {
    Single(u32),
    Multiple(Vec<u32>),
}

/// An item of a submitted ordering, carrying the index it had in the answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub text: String,
    pub original_index: u32,
}

impl OrderedItem {
    #[must_use]
    pub fn new(text: impl Into<String>, original_index: u32) -> Self {
        Self {
            text: text.into(),
            original_index,
        }
    }
}

/// A learner's submitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Answer {
    Choice(ChoiceAnswer),
    TrueFalse(bool),
    Matching(Vec<MatchPair>),
    Ordering(Vec<OrderedItem>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_uses_lowercase_tags() {
        let kind = QuestionKind::TrueFalse { correct: vec![0] };
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, r#"{"type":"truefalse","correct":[0]}"#);
        assert_eq!(kind.as_str(), "truefalse");
    }

    #[test]
    fn unknown_tag_fails_to_parse() {
        let parsed = serde_json::from_str::<QuestionKind>(r#"{"type":"hotspot","x":1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn choice_answer_accepts_scalar_or_list() {
        let one: Answer = serde_json::from_str(r#"{"type":"choice","value":2}"#).unwrap();
        assert_eq!(one, Answer::Choice(ChoiceAnswer::Single(2)));

        let many: Answer = serde_json::from_str(r#"{"type":"choice","value":[0,3]}"#).unwrap();
        assert_eq!(many, Answer::Choice(ChoiceAnswer::Multiple(vec![0, 3])));
    }

    #[test]
    fn question_tracks_domain_tags() {
        let q = Question::new(QuestionId::new(1), "Q", QuestionKind::Ordering { items: vec![] })
            .with_domains([DomainId::new(3)]);
        assert!(q.is_tagged(DomainId::new(3)));
        assert!(!q.is_tagged(DomainId::new(4)));
    }
}
