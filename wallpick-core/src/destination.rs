use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wallpaper slot a commit targets.
///
/// `Both` only exists at request time. The workflow expands it into
/// independent `Home` and `Lock` attempts, so persisters never see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Home,
    Lock,
    Both,
}

impl Destination {
    /// The physical destinations this request stands for.
    pub fn expand(self) -> &'static [Destination] {
        match self {
            Destination::Home => &[Destination::Home],
            Destination::Lock => &[Destination::Lock],
            Destination::Both => &[Destination::Home, Destination::Lock],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Destination::Home => "home",
            Destination::Lock => "lock",
            Destination::Both => "both",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home" | "home-screen" => Ok(Destination::Home),
            "lock" | "lock-screen" => Ok(Destination::Lock),
            "both" => Ok(Destination::Both),
            other => Err(format!("unknown destination '{}', expected home, lock or both", other)),
        }
    }
}

/// Per-destination result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Pending,
    Succeeded,
    /// The persister's reason, kept as-is.
    Failed(String),
}

impl CommitOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CommitOutcome::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CommitOutcome::Failed(_))
    }
}
