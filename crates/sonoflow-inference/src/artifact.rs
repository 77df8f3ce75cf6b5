//! Load-state tracking for session artifacts.
//!
//! A session owns three independently loaded artifacts: the model and the
//! two expression programs. Each slot remembers whether loading was ever
//! attempted and whether it succeeded, so callers can inspect exactly which
//! piece of a partially configured session is missing.

/// Externally visible load state of one artifact slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// No load has been attempted, or the slot was deliberately skipped.
    Unloaded,
    /// The artifact is present and usable.
    Loaded,
    /// A load was attempted and failed.
    LoadFailed,
}

/// An artifact slot holding the value when loading succeeded.
#[derive(Debug, Default)]
pub enum Artifact<T> {
    #[default]
    Unloaded,
    Loaded(T),
    Failed,
}

impl<T> Artifact<T> {
    pub fn state(&self) -> ArtifactState {
        match self {
            Self::Unloaded => ArtifactState::Unloaded,
            Self::Loaded(_) => ArtifactState::Loaded,
            Self::Failed => ArtifactState::LoadFailed,
        }
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}
