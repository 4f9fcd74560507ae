use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeltaError;

/// The closed set of content kinds an artifact can hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    #[default]
    Text,
    Code,
    Image,
    Sheet,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Text,
        ArtifactKind::Code,
        ArtifactKind::Image,
        ArtifactKind::Sheet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Text => "text",
            ArtifactKind::Code => "code",
            ArtifactKind::Image => "image",
            ArtifactKind::Sheet => "sheet",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = DeltaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ArtifactKind::Text),
            "code" => Ok(ArtifactKind::Code),
            "image" => Ok(ArtifactKind::Image),
            "sheet" => Ok(ArtifactKind::Sheet),
            other => Err(DeltaError::UnknownKind(other.to_string())),
        }
    }
}
