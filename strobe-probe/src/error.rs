//! Setup errors for the producer side
//!
//! Only setup can fail. Once a [`crate::Tracer`] is running, `record` never
//! reports errors to the host; a dead viewer just disables tracing.

use std::path::PathBuf;
use strobe_common::ChannelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Failed to spawn viewer {path}: {source}")]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No viewer executable configured (set {0})")]
    MissingViewer(&'static str),
}
