//! Tracer configuration

use std::path::{Path, PathBuf};

use crate::error::ProbeError;

/// Environment variable naming the viewer executable
pub const VIEWER_ENV: &str = "STROBE_VIEWER";

/// Settings for [`crate::Tracer::start`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracerConfig {
    viewer_path: Option<PathBuf>,
}

impl TracerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the viewer path from [`VIEWER_ENV`]; an empty value counts as unset
    #[must_use]
    pub fn from_env() -> Self {
        let viewer_path = std::env::var_os(VIEWER_ENV).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self { viewer_path }
    }

    #[must_use]
    pub fn viewer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.viewer_path = Some(path.into());
        self
    }

    /// Configured viewer executable
    ///
    /// # Errors
    /// Returns [`ProbeError::MissingViewer`] when no path was set.
    pub fn viewer(&self) -> Result<&Path, ProbeError> {
        self.viewer_path.as_deref().ok_or(ProbeError::MissingViewer(VIEWER_ENV))
    }
}
