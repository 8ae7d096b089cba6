use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an ID from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self::new).map_err(|_| ParseIdError {
                    kind: stringify!($name),
                })
            }
        }
    };
}

define_id!(
    /// Identifies a learner.
    UserId
);
define_id!(
    /// Identifies a question in the shared question bank.
    QuestionId
);
define_id!(
    /// Identifies an exam-blueprint domain.
    DomainId
);
define_id!(
    /// Identifies a certification exam.
    CertificationId
);
define_id!(
    /// Identifies a spaced-repetition card.
    CardId
);
define_id!(
    /// Identifies a recorded simulation result.
    SimulationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prints_raw_value() {
        assert_eq!(UserId::new(42).to_string(), "42");
        assert_eq!(format!("{:?}", DomainId::new(7)), "DomainId(7)");
    }

    #[test]
    fn from_str_round_trips() {
        let id: QuestionId = "123".parse().unwrap();
        assert_eq!(id, QuestionId::new(123));
        assert_eq!(id.to_string().parse::<QuestionId>().unwrap(), id);
    }

    #[test]
    fn from_str_rejects_garbage() {
        let err = "nope".parse::<CertificationId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse CertificationId from string");
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&CardId::new(9)).unwrap();
        assert_eq!(json, "9");
    }
}
