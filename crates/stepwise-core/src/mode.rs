//! # Modes
//!
//! A mode is a named rule set deciding which optional behavior and condition
//! types may be skipped. Only types that declare themselves optional can be
//! skipped; mandatory types always run, whatever the mode says.
//!
//! | Rule | Optional type listed | Optional type not listed |
//! |------|----------------------|--------------------------|
//! | Whitelist | runs | skipped |
//! | Blacklist | skipped | runs |

use crate::primitives::DEFAULT_MODE_NAME;
use crate::types::StepwiseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Type rule of a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "types", rename_all = "lowercase")]
pub enum TypeRule {
    /// Listed optional types always run; every other optional type is skipped.
    Whitelist(BTreeSet<String>),
    /// Listed optional types are skipped.
    Blacklist(BTreeSet<String>),
}

impl TypeRule {
    pub fn whitelist<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Whitelist(types.into_iter().map(Into::into).collect())
    }

    pub fn blacklist<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Blacklist(types.into_iter().map(Into::into).collect())
    }
}

/// A named skip rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    name: String,
    rule: TypeRule,
}

impl Mode {
    pub fn new(name: impl Into<String>, rule: TypeRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn rule(&self) -> &TypeRule {
        &self.rule
    }

    /// Check if a leaf of `type_name` is skipped under this mode.
    #[must_use]
    pub fn is_skipped(&self, type_name: &str, optional: bool) -> bool {
        if !optional {
            return false;
        }
        match &self.rule {
            TypeRule::Whitelist(types) => !types.contains(type_name),
            TypeRule::Blacklist(types) => types.contains(type_name),
        }
    }
}

impl Default for Mode {
    /// The built-in mode that skips nothing.
    fn default() -> Self {
        Self::new(DEFAULT_MODE_NAME, TypeRule::Blacklist(BTreeSet::new()))
    }
}

/// Named modes plus the currently selected one.
///
/// The default mode is always present and cannot be replaced.
#[derive(Debug, Clone)]
pub struct ModeCollection {
    modes: Vec<Mode>,
    selected: usize,
}

impl ModeCollection {
    /// Create a collection holding only the default mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            modes: vec![Mode::default()],
            selected: 0,
        }
    }

    /// Add a mode, replacing any existing mode with the same name.
    pub fn add(&mut self, mode: Mode) -> Result<(), StepwiseError> {
        if mode.name() == DEFAULT_MODE_NAME {
            return Err(StepwiseError::InvalidMode(format!(
                "mode '{}' is built in and cannot be redefined",
                DEFAULT_MODE_NAME
            )));
        }
        match self.modes.iter_mut().find(|m| m.name() == mode.name()) {
            Some(existing) => *existing = mode,
            None => self.modes.push(mode),
        }
        Ok(())
    }

    /// Select a mode by name.
    pub fn select(&mut self, name: &str) -> Result<&Mode, StepwiseError> {
        let index = self
            .modes
            .iter()
            .position(|m| m.name() == name)
            .ok_or_else(|| StepwiseError::UnknownMode(name.to_string()))?;
        self.selected = index;
        Ok(&self.modes[index])
    }

    /// Currently selected mode.
    #[must_use]
    pub fn current(&self) -> &Mode {
        &self.modes[self.selected]
    }

    /// Look up a mode by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Mode> {
        self.modes.iter().find(|m| m.name() == name)
    }

    /// All modes, default first.
    #[must_use]
    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }
}

impl Default for ModeCollection {
    fn default() -> Self {
        Self::new()
    }
}
