//! Kernel-owned plugin descriptors and their lifecycle state.

use crate::plugin::context::PluginError;
use crate::plugin::version::{HostVersion, PluginValidator, ValidationMode};
use std::fmt::{Display, Formatter};

/// Lifecycle state of one discovered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Discovered, not yet validated.
    Unloaded,
    Validated,
    Initialized,
    Failed,
}

impl PluginState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Validated => "validated",
            Self::Initialized => "initialized",
            Self::Failed => "failed",
        }
    }
}

impl Display for PluginState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub id: String,
    pub declared_version: HostVersion,
    pub mode: ValidationMode,
    pub state: PluginState,
    /// Set when `state` is `Failed`.
    pub failure: Option<PluginError>,
}

impl PluginDescriptor {
    pub(crate) fn discovered(id: &str, validator: PluginValidator) -> Self {
        Self {
            id: id.to_string(),
            declared_version: validator.declared,
            mode: validator.mode,
            state: PluginState::Unloaded,
            failure: None,
        }
    }

    pub fn validator(&self) -> PluginValidator {
        PluginValidator::new(self.declared_version, self.mode)
    }

    pub(crate) fn fail(&mut self, error: PluginError) {
        self.state = PluginState::Failed;
        self.failure = Some(error);
    }
}

/// Plugin ids are lowercase ASCII words joined by single `.`, `_` or `-`.
pub fn is_valid_plugin_id(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return false;
    }

    let mut prev_separator = false;
    for c in chars {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            prev_separator = false;
        } else if matches!(c, '.' | '_' | '-') && !prev_separator {
            prev_separator = true;
        } else {
            return false;
        }
    }
    !prev_separator
}

#[cfg(test)]
mod tests {
    use super::is_valid_plugin_id;

    #[test]
    fn accepts_dotted_lowercase_ids() {
        assert!(is_valid_plugin_id("builtin.user_session"));
        assert!(is_valid_plugin_id("pictures-2"));
    }

    #[test]
    fn rejects_malformed_ids() {
        for value in ["", "Admin", ".lead", "trail.", "double..dot", "sp ace"] {
            assert!(!is_valid_plugin_id(value), "{value} should be rejected");
        }
    }
}
