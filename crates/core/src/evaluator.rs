//! Correctness checks per question kind.
//!
//! Evaluation never fails: a missing answer, an answer of the wrong shape, an
//! unsupported question kind, or a malformed answer key all grade as incorrect.

use std::collections::BTreeSet;

use crate::model::{Answer, ChoiceAnswer, QuestionKind};

/// Grade `answer` against the answer key carried by `kind`.
#[must_use]
pub fn is_correct(answer: Option<&Answer>, kind: &QuestionKind) -> bool {
    let Some(answer) = answer else {
        return false;
    };

    match (kind, answer) {
        (QuestionKind::Choice { correct, .. }, Answer::Choice(choice)) => {
            choice_matches(choice, correct)
        }
        (QuestionKind::TrueFalse { correct }, Answer::TrueFalse(value)) => {
            match correct.first() {
                Some(0) => *value,
                Some(1) => !*value,
                _ => false,
            }
        }
        // Only the pair count is compared, not which left maps to which right.
        (QuestionKind::Matching { pairs }, Answer::Matching(submitted)) => {
            !pairs.is_empty() && submitted.len() == pairs.len()
        }
        (QuestionKind::Ordering { items }, Answer::Ordering(submitted)) => {
            !items.is_empty()
                && submitted.len() == items.len()
                && submitted
                    .iter()
                    .enumerate()
                    .all(|(pos, item)| usize::try_from(item.original_index) == Ok(pos))
        }
        _ => false,
    }
}

fn choice_matches(choice: &ChoiceAnswer, correct: &[u32]) -> bool {
    match choice {
        ChoiceAnswer::Single(picked) => correct.first() == Some(picked),
        ChoiceAnswer::Multiple(picked) => {
            if correct.is_empty() {
                return false;
            }
            let picked: BTreeSet<u32> = picked.iter().copied().collect();
            let expected: BTreeSet<u32> = correct.iter().copied().collect();
            picked == expected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatchPair, OrderedItem};

    fn choice(correct: &[u32]) -> QuestionKind {
        QuestionKind::Choice {
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct: correct.to_vec(),
        }
    }

    fn all_kinds() -> Vec<QuestionKind> {
        vec![
            choice(&[1]),
            QuestionKind::TrueFalse { correct: vec![0] },
            QuestionKind::Matching {
                pairs: vec![MatchPair::new("a", "1")],
            },
            QuestionKind::Ordering {
                items: vec!["x".into()],
            },
            QuestionKind::Unsupported {
                kind: "hotspot".into(),
            },
        ]
    }

    #[test]
    fn missing_answer_is_always_wrong() {
        for kind in all_kinds() {
            assert!(!is_correct(None, &kind), "{kind:?}");
        }
    }

    #[test]
    fn single_choice_compares_first_key() {
        let kind = choice(&[2]);
        assert!(is_correct(Some(&Answer::Choice(ChoiceAnswer::Single(2))), &kind));
        assert!(!is_correct(Some(&Answer::Choice(ChoiceAnswer::Single(1))), &kind));
    }

    #[test]
    fn multi_choice_ignores_order() {
        let kind = choice(&[0, 2, 3]);
        let orders: [&[u32]; 4] = [&[0, 2, 3], &[3, 2, 0], &[2, 0, 3], &[3, 0, 2]];
        for order in orders {
            let answer = Answer::Choice(ChoiceAnswer::Multiple(order.to_vec()));
            assert!(is_correct(Some(&answer), &kind), "{order:?}");
        }
    }

    #[test]
    fn multi_choice_requires_the_exact_set() {
        let kind = choice(&[0, 2]);
        let subset = Answer::Choice(ChoiceAnswer::Multiple(vec![0]));
        let superset = Answer::Choice(ChoiceAnswer::Multiple(vec![0, 1, 2]));
        assert!(!is_correct(Some(&subset), &kind));
        assert!(!is_correct(Some(&superset), &kind));
    }

    #[test]
    fn malformed_choice_key_is_wrong() {
        let kind = choice(&[]);
        assert!(!is_correct(Some(&Answer::Choice(ChoiceAnswer::Single(0))), &kind));
        assert!(!is_correct(
            Some(&Answer::Choice(ChoiceAnswer::Multiple(vec![]))),
            &kind
        ));
    }

    #[test]
    fn true_false_uses_index_convention() {
        let true_is_right = QuestionKind::TrueFalse { correct: vec![0] };
        let false_is_right = QuestionKind::TrueFalse { correct: vec![1] };
        assert!(is_correct(Some(&Answer::TrueFalse(true)), &true_is_right));
        assert!(!is_correct(Some(&Answer::TrueFalse(false)), &true_is_right));
        assert!(is_correct(Some(&Answer::TrueFalse(false)), &false_is_right));

        let broken = QuestionKind::TrueFalse { correct: vec![] };
        assert!(!is_correct(Some(&Answer::TrueFalse(true)), &broken));
    }

    #[test]
    fn matching_only_checks_pair_count() {
        let kind = QuestionKind::Matching {
            pairs: vec![MatchPair::new("TCP", "reliable"), MatchPair::new("UDP", "fast")],
        };
        let swapped = Answer::Matching(vec![
            MatchPair::new("TCP", "fast"),
            MatchPair::new("UDP", "reliable"),
        ]);
        let short = Answer::Matching(vec![MatchPair::new("TCP", "reliable")]);
        assert!(is_correct(Some(&swapped), &kind));
        assert!(!is_correct(Some(&short), &kind));
    }

    #[test]
    fn ordering_requires_identity_permutation() {
        let kind = QuestionKind::Ordering {
            items: vec!["plan".into(), "do".into(), "check".into()],
        };
        let right = Answer::Ordering(vec![
            OrderedItem::new("plan", 0),
            OrderedItem::new("do", 1),
            OrderedItem::new("check", 2),
        ]);
        let wrong = Answer::Ordering(vec![
            OrderedItem::new("do", 1),
            OrderedItem::new("plan", 0),
            OrderedItem::new("check", 2),
        ]);
        let partial = Answer::Ordering(vec![OrderedItem::new("plan", 0)]);
        assert!(is_correct(Some(&right), &kind));
        assert!(!is_correct(Some(&wrong), &kind));
        assert!(!is_correct(Some(&partial), &kind));
    }

    #[test]
    fn mismatched_shapes_and_unsupported_kinds_are_wrong() {
        assert!(!is_correct(Some(&Answer::TrueFalse(true)), &choice(&[0])));
        let unsupported = QuestionKind::Unsupported {
            kind: "hotspot".into(),
        };
        assert!(!is_correct(
            Some(&Answer::Choice(ChoiceAnswer::Single(0))),
            &unsupported
        ));
    }
}
