//! Viewer process launch and liveness probing

use log::{debug, info};
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::error::ProbeError;

/// Non-blocking check that the consumer is still draining the ring
pub trait ConsumerLiveness: Send {
    /// `false` once the consumer has exited or can no longer be probed
    fn is_alive(&mut self) -> bool;
}

/// Viewer launched by [`spawn_consumer`]
#[derive(Debug)]
pub struct ConsumerProcess {
    child: Child,
}

impl ConsumerProcess {
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl ConsumerLiveness for ConsumerProcess {
    fn is_alive(&mut self) -> bool {
        // Reaps the child if it exited, so no zombie is left behind
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("Viewer {} exited with {status}", self.child.id());
                false
            }
            Err(e) => {
                debug!("Viewer {} could not be probed: {e}", self.child.id());
                false
            }
        }
    }
}

/// Launch the viewer with the channel name as its only argument
///
/// The viewer inherits stderr so its log output stays visible; stdin is
/// closed.
///
/// # Errors
/// Returns [`ProbeError::SpawnFailed`] if the executable cannot be started.
pub fn spawn_consumer(path: &Path, channel_name: &str) -> Result<ConsumerProcess, ProbeError> {
    let child = Command::new(path)
        .arg(channel_name)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|source| ProbeError::SpawnFailed { path: path.to_path_buf(), source })?;
    info!("Spawned viewer {} (pid {}) on channel {channel_name}", path.display(), child.id());
    Ok(ConsumerProcess { child })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_spawn_missing_executable_fails() {
        let err = spawn_consumer(Path::new("/nonexistent/strobe-viewer"), "/strobe_shm_1_1")
            .expect_err("spawn should fail");
        assert!(matches!(err, ProbeError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_exited_consumer_is_dead() {
        // `sh` treats the argument as a script path that does not exist and exits
        let mut consumer =
            spawn_consumer(Path::new("/bin/sh"), "/strobe_shm_missing_script").expect("spawn sh");
        let deadline = Instant::now() + Duration::from_secs(10);
        while consumer.is_alive() {
            assert!(Instant::now() < deadline, "sh did not exit");
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!consumer.is_alive());
    }
}
