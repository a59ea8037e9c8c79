use std::path::PathBuf;

use crate::config::Config;
use crate::effects::{Effects, SharedEffects};

/// Configuration and collaborators shared by every command handler.
pub struct CommandContext {
    config: Config,
    effects: SharedEffects,
}

impl CommandContext {
    #[must_use]
    pub fn new(config: Config, effects: SharedEffects) -> Self {
        Self { config, effects }
    }

    pub fn effects(&self) -> &dyn Effects {
        self.effects.as_ref()
    }

    /// `explicit`, falling back to the configured scratch parent.
    pub(crate) fn scratch_dir(&self, explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| self.config.scratch_dir().cloned())
    }
}
