//! Activation status, derived from what is on disk.
//!
//! Nothing about activation is persisted. [`derive`] turns a snapshot of
//! on-disk observations into a status so the rule can be tested on its own.

use serde::Serialize;
use std::fmt;

/// Facts gathered for one version of one bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observations {
    /// The `current` pointer names this version.
    pub is_current: bool,
    /// The version directory exists (the pointer may dangle).
    pub tree_present: bool,
    /// Rendered templates found at their host paths.
    pub templates_present: usize,
    pub templates_expected: usize,
    /// Host `bin` links pointing at this version's executables.
    pub links_present: usize,
    pub links_expected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationStatus {
    /// No `current` pointer.
    NotInstalled,
    /// Installed, but another version is current.
    NotCurrent,
    /// Current, nothing materialized on the host.
    Inactive,
    /// Current, some host files or links missing.
    Partial,
    /// Current and fully materialized.
    Active,
}

impl ActivationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInstalled => "not installed",
            Self::NotCurrent => "not current",
            Self::Inactive => "inactive",
            Self::Partial => "partial",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the activation status of a version from observations.
pub fn derive(obs: &Observations) -> ActivationStatus {
    if !obs.is_current {
        return ActivationStatus::NotCurrent;
    }
    if !obs.tree_present {
        return ActivationStatus::Inactive;
    }

    let present = obs.templates_present + obs.links_present;
    let expected = obs.templates_expected + obs.links_expected;

    if present >= expected {
        ActivationStatus::Active
    } else if present == 0 {
        ActivationStatus::Inactive
    } else {
        ActivationStatus::Partial
    }
}
