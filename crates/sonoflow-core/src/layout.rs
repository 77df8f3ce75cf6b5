//! Axis-layout descriptors for rank-4 tensor frames.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A four-character axis-layout descriptor such as `NCHW`.
///
/// Each character labels one tensor axis. The descriptor itself is only a
/// validated label string; how labels map to axis positions is decided by
/// the conversion code that consumes descriptor pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AxisLayout(String);

impl AxisLayout {
    /// Parse and validate a descriptor.
    pub fn new(descriptor: &str) -> Result<Self, LayoutError> {
        if descriptor.len() != 4 || !descriptor.is_ascii() {
            return Err(LayoutError::InvalidDescriptor(descriptor.to_string()));
        }
        Ok(Self(descriptor.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The label byte at a descriptor position (0..4).
    pub fn label_at(&self, position: usize) -> u8 {
        self.0.as_bytes()[position]
    }
}

impl Default for AxisLayout {
    fn default() -> Self {
        Self("NCHW".to_string())
    }
}

impl fmt::Display for AxisLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AxisLayout {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AxisLayout {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<AxisLayout> for String {
    fn from(layout: AxisLayout) -> Self {
        layout.0
    }
}

/// Errors from descriptor parsing.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Axis layout must be exactly four ASCII characters, got '{0}'")]
    InvalidDescriptor(String),
}
