//! Verbosity of the FFmpeg libraries.
//!
//! The in-process decoder used by the fallback path logs through FFmpeg's own
//! logger, straight to stderr, independently of the `log` facade. The
//! `framecut` binary sets it from `--log_level`; library users can call
//! [`set_ffmpeg_log_level`] themselves.
//!
//! The external `ffmpeg` process used by the fast path always runs with
//! `-loglevel error`; its stderr is captured and attached to the error when a
//! batch fails.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use ffmpeg_next::util::log::Level;

use crate::error::FramecutError;

/// FFmpeg log level, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FfmpegLogLevel {
    /// Nothing at all.
    Quiet,
    /// Only conditions the process cannot survive.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors. The default for `framecut`.
    #[default]
    Error,
    /// Warnings.
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Everything.
    Trace,
}

impl FfmpegLogLevel {
    /// Every level, quietest first.
    pub const ALL: [FfmpegLogLevel; 9] = [
        FfmpegLogLevel::Quiet,
        FfmpegLogLevel::Panic,
        FfmpegLogLevel::Fatal,
        FfmpegLogLevel::Error,
        FfmpegLogLevel::Warning,
        FfmpegLogLevel::Info,
        FfmpegLogLevel::Verbose,
        FfmpegLogLevel::Debug,
        FfmpegLogLevel::Trace,
    ];

    /// Name as accepted by `ffmpeg -loglevel`.
    pub fn name(self) -> &'static str {
        match self {
            FfmpegLogLevel::Quiet => "quiet",
            FfmpegLogLevel::Panic => "panic",
            FfmpegLogLevel::Fatal => "fatal",
            FfmpegLogLevel::Error => "error",
            FfmpegLogLevel::Warning => "warning",
            FfmpegLogLevel::Info => "info",
            FfmpegLogLevel::Verbose => "verbose",
            FfmpegLogLevel::Debug => "debug",
            FfmpegLogLevel::Trace => "trace",
        }
    }

    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = FramecutError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.to_ascii_lowercase();
        let value = if value == "warn" { "warning" } else { value.as_str() };
        FfmpegLogLevel::ALL
            .into_iter()
            .find(|level| level.name() == value)
            .ok_or_else(|| FramecutError::InvalidSpec(format!("unknown FFmpeg log level: {value}")))
    }
}

/// Set the FFmpeg library log level for this process.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffmpeg_names() {
        assert_eq!("quiet".parse::<FfmpegLogLevel>().unwrap(), FfmpegLogLevel::Quiet);
        assert_eq!("WARN".parse::<FfmpegLogLevel>().unwrap(), FfmpegLogLevel::Warning);
        assert_eq!("trace".parse::<FfmpegLogLevel>().unwrap(), FfmpegLogLevel::Trace);
        assert!("loud".parse::<FfmpegLogLevel>().is_err());
    }

    #[test]
    fn names_round_trip_through_display() {
        for level in FfmpegLogLevel::ALL {
            assert_eq!(level.to_string().parse::<FfmpegLogLevel>().unwrap(), level);
        }
    }
}
