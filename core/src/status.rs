use std::fmt;

use serde::{
    de::{self, Visitor},
    Deserialize, Serialize,
};

/// Classification of one student's submission, produced by the first stage that fails
/// (or by the test stage when every earlier stage succeeded).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Status {
    Absent,

    #[strum(to_string = "Git Clone Error")]
    GitCloneError,

    Incomplete,

    #[strum(to_string = "Compile Error")]
    CompileError,

    #[strum(to_string = "Runtime Error")]
    RuntimeError,

    #[strum(to_string = "Partial Complete")]
    PartialComplete,

    #[strum(to_string = "Complete", serialize = "Completed")]
    Complete,

    #[strum(to_string = "Unknown Error")]
    UnknownError,
}

/// The fixed vocabulary written into the results table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumIter,
)]
pub enum DisplayStatus {
    Absent,

    Incomplete,

    #[strum(to_string = "Runtime Error")]
    RuntimeError,

    #[strum(to_string = "Partial Complete")]
    PartialComplete,

    Complete,

    #[strum(to_string = "Unknown Error")]
    UnknownError,
}

impl Status {
    pub fn display(self) -> DisplayStatus {
        use Status::*;
        match self {
            Absent => DisplayStatus::Absent,
            GitCloneError | Incomplete | CompileError => DisplayStatus::Incomplete,
            RuntimeError => DisplayStatus::RuntimeError,
            PartialComplete => DisplayStatus::PartialComplete,
            Complete => DisplayStatus::Complete,
            UnknownError => DisplayStatus::UnknownError,
        }
    }
}

impl From<Status> for DisplayStatus {
    fn from(s: Status) -> Self {
        s.display()
    }
}

impl DisplayStatus {
    /// Maps any label (display or internal) to the display vocabulary.
    /// Labels nobody recognizes become `Unknown Error` instead of being dropped.
    pub fn normalize(label: &str) -> Self {
        match label.trim().parse::<Status>() {
            Ok(s) => s.display(),
            Err(_) => {
                log::debug!("Unrecognized status label {:?}", label);
                DisplayStatus::UnknownError
            }
        }
    }

    pub fn is_success(self) -> bool {
        self == DisplayStatus::Complete
    }
}

impl Serialize for DisplayStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DisplayStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DisplayStatusVisitor;

        impl<'de> Visitor<'de> for DisplayStatusVisitor {
            type Value = DisplayStatus;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a status label string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(DisplayStatus::normalize(v))
            }
        }

        deserializer.deserialize_str(DisplayStatusVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_status_has_a_display_and_survives_normalization() {
        for s in Status::iter() {
            assert_eq!(DisplayStatus::normalize(&s.to_string()), s.display());
        }
    }

    #[test]
    fn display_labels_are_fixed_points() {
        for d in DisplayStatus::iter() {
            assert_eq!(DisplayStatus::normalize(&d.to_string()), d);
        }
    }

    #[test]
    fn stage_errors_collapse_to_incomplete() {
        assert_eq!(Status::GitCloneError.display(), DisplayStatus::Incomplete);
        assert_eq!(Status::CompileError.display(), DisplayStatus::Incomplete);
        assert_eq!(Status::Incomplete.display(), DisplayStatus::Incomplete);
        assert_eq!(Status::RuntimeError.display(), DisplayStatus::RuntimeError);
    }

    #[test]
    fn normalize_is_lenient_but_never_drops() {
        assert_eq!(DisplayStatus::normalize(" complete "), DisplayStatus::Complete);
        assert_eq!(DisplayStatus::normalize("Completed"), DisplayStatus::Complete);
        assert_eq!(
            DisplayStatus::normalize("compile error"),
            DisplayStatus::Incomplete
        );
        assert_eq!(DisplayStatus::normalize(""), DisplayStatus::UnknownError);
        assert_eq!(
            DisplayStatus::normalize("Needs review"),
            DisplayStatus::UnknownError
        );
    }

    #[test]
    fn serde_uses_display_labels() {
        let json = serde_json::to_string(&DisplayStatus::PartialComplete).unwrap();
        assert_eq!(json, r#""Partial Complete""#);

        let got: Vec<DisplayStatus> =
            serde_json::from_str(r#"["Runtime Error", "Git Clone Error", "???"]"#).unwrap();
        assert_eq!(
            got,
            vec![
                DisplayStatus::RuntimeError,
                DisplayStatus::Incomplete,
                DisplayStatus::UnknownError
            ]
        );
    }
}
