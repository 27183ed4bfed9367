//! Guide-step navigation driven by gesture actions.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationCommand {
    Next,
    Previous,
}

impl NavigationCommand {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "next" | "forward" => Ok(Self::Next),
            "previous" | "prev" | "back" => Ok(Self::Previous),
            other => Err(anyhow!("unknown navigation command '{}'", other)),
        }
    }
}

/// Maps classifier labels to navigation commands. Unbound labels are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GestureBindings {
    bindings: BTreeMap<String, NavigationCommand>,
}

impl Default for GestureBindings {
    fn default() -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert("Thumb_Up".to_string(), NavigationCommand::Next);
        bindings.insert("Thumb_Down".to_string(), NavigationCommand::Previous);
        Self { bindings }
    }
}

impl GestureBindings {
    pub fn empty() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    pub fn bind(&mut self, label: &str, command: NavigationCommand) {
        self.bindings.insert(label.to_string(), command);
    }

    pub fn command_for(&self, label: &str) -> Option<NavigationCommand> {
        self.bindings.get(label).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NavigationCommand)> {
        self.bindings
            .iter()
            .map(|(label, command)| (label.as_str(), *command))
    }
}

impl FromIterator<(String, NavigationCommand)> for GestureBindings {
    fn from_iter<I: IntoIterator<Item = (String, NavigationCommand)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// Position within a fixed number of guide steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepCursor {
    current: usize,
    total: usize,
}

impl StepCursor {
    pub fn new(total: usize) -> Result<Self> {
        if total == 0 {
            return Err(anyhow!("a guide needs at least one step"));
        }
        Ok(Self { current: 0, total })
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Move the cursor. Returns `false` when already at the boundary.
    pub fn apply(&mut self, command: NavigationCommand) -> bool {
        match command {
            NavigationCommand::Next if self.current + 1 < self.total => {
                self.current += 1;
                true
            }
            NavigationCommand::Previous if self.current > 0 => {
                self.current -= 1;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_cover_thumbs_only() {
        let bindings = GestureBindings::default();
        assert_eq!(bindings.command_for("Thumb_Up"), Some(NavigationCommand::Next));
        assert_eq!(
            bindings.command_for("Thumb_Down"),
            Some(NavigationCommand::Previous)
        );
        assert_eq!(bindings.command_for("Open_Palm"), None);
        assert_eq!(bindings.command_for("thumb_up"), None);
    }

    #[test]
    fn cursor_clamps_at_both_ends() {
        let mut cursor = StepCursor::new(3).unwrap();
        assert!(!cursor.apply(NavigationCommand::Previous));
        assert!(cursor.apply(NavigationCommand::Next));
        assert!(cursor.apply(NavigationCommand::Next));
        assert!(!cursor.apply(NavigationCommand::Next));
        assert_eq!(cursor.current(), 2);
        assert!(cursor.apply(NavigationCommand::Previous));
        assert_eq!(cursor.current(), 1);
    }

    #[test]
    fn single_step_guide_never_moves() {
        let mut cursor = StepCursor::new(1).unwrap();
        assert!(!cursor.apply(NavigationCommand::Next));
        assert!(!cursor.apply(NavigationCommand::Previous));
        assert!(StepCursor::new(0).is_err());
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(NavigationCommand::parse(" Back ").unwrap(), NavigationCommand::Previous);
        assert_eq!(NavigationCommand::parse("forward").unwrap(), NavigationCommand::Next);
        assert!(NavigationCommand::parse("jump").is_err());
    }
}
