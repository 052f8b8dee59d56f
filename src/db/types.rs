use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub(crate) struct $name(Uuid);

        impl $name {
            pub(crate) fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value.trim()).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

typed_id!(WorksheetId);
typed_id!(StudentId);
typed_id!(ClassId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "worksheetstatus", rename_all = "lowercase")]
pub(crate) enum WorksheetStatus {
    Uploaded,
    Processing,
    Grading,
    Graded,
    Error,
}

impl WorksheetStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Grading => "grading",
            Self::Graded => "graded",
            Self::Error => "error",
        }
    }

    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, Self::Graded | Self::Error)
    }
}

/// Fine-grained pipeline marker. Ordering follows the normal stage sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "processingstage", rename_all = "lowercase")]
pub(crate) enum ProcessingStage {
    Uploaded,
    Ocr,
    Grading,
    Completed,
    Failed,
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StageName {
    Ocr,
    Grading,
    Feedback,
}

impl StageName {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Grading => "grading",
            Self::Feedback => "feedback",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
