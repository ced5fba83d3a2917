//! CLI argument definitions

use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "strobe",
    version,
    about = "Live timeline viewer for strobe traces",
    after_help = "\
The producer normally launches strobe itself with the channel name as the only
argument. Run it by hand to attach to a channel printed by the producer:

EXAMPLES:
    strobe /strobe_shm_4242_917263512                 Open the timeline window
    strobe /strobe_shm_4242_917263512 --headless      Drain and log statistics"
)]
pub struct Args {
    /// Shared-memory channel name created by the producer
    #[arg(value_name = "CHANNEL")]
    pub channel: String,

    /// Seconds of history kept in the timeline
    #[arg(long, value_name = "SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub retention: u64,

    /// Drain the channel and log statistics without opening a window
    #[arg(long)]
    pub headless: bool,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    pub duration: u64,
}

impl Args {
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention)
    }

    /// `None` when running without a time limit
    #[must_use]
    pub fn duration_limit(&self) -> Option<Duration> {
        (self.duration > 0).then(|| Duration::from_secs(self.duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_only_uses_defaults() {
        let args = Args::try_parse_from(["strobe", "/strobe_shm_1_2"]).expect("valid args");
        assert_eq!(args.channel, "/strobe_shm_1_2");
        assert_eq!(args.retention(), Duration::from_secs(30));
        assert!(!args.headless);
        assert_eq!(args.duration_limit(), None);
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "strobe",
            "/strobe_shm_1_2",
            "--headless",
            "--retention",
            "5",
            "--duration",
            "12",
        ])
        .expect("valid args");
        assert!(args.headless);
        assert_eq!(args.retention(), Duration::from_secs(5));
        assert_eq!(args.duration_limit(), Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_channel_is_required() {
        assert!(Args::try_parse_from(["strobe"]).is_err());
    }

    #[test]
    fn test_zero_retention_rejected() {
        assert!(Args::try_parse_from(["strobe", "/x", "--retention", "0"]).is_err());
    }
}
