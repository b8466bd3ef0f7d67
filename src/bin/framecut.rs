use std::{
    error::Error,
    fmt::Arguments,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use colored::Colorize;
use framecut::{
    CancellationToken, ExtractOptions, ExtractionReport, ExtractionSpec, ExtractionStage,
    FfmpegCli, FfmpegLogLevel, FfmpegSource, FrameExtractor, ImageFormat, IntervalMode,
    ProgressCallback, ProgressInfo, VideoMetadata,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  framecut input.mp4 --seconds_interval 2 --image_format png\n  framecut input.mp4 --start_time 00:10 --end_time 00:20 --frames_interval 5 --progress\n  framecut --json\n  framecut --completions zsh > _framecut";

#[derive(Debug, Parser)]
#[command(
    name = "framecut",
    version,
    about = "Extract still frames from a video at fixed frame or time intervals",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Video file, or a name to search for below the current directory.
    /// When omitted, the only video below the current directory is used.
    video: Option<String>,

    /// Directory for the extracted frames.
    /// Defaults to framecut_output/<video>_frames_<interval>.
    #[arg(long = "output_folder")]
    output_folder: Option<PathBuf>,

    /// Start of the window (seconds, MM:SS or HH:MM:SS).
    #[arg(long = "start_time", value_parser = parse_seconds)]
    start_time: Option<f64>,

    /// End of the window (seconds, MM:SS or HH:MM:SS).
    #[arg(long = "end_time", value_parser = parse_seconds)]
    end_time: Option<f64>,

    /// First frame index of the window. Ignored when --start_time is given.
    #[arg(long = "start_frame")]
    start_frame: Option<u64>,

    /// Frame index the window ends before. Ignored when --end_time is given.
    #[arg(long = "end_frame")]
    end_frame: Option<u64>,

    /// Extract every Nth frame.
    #[arg(long = "frames_interval", conflicts_with = "seconds_interval")]
    frames_interval: Option<u64>,

    /// Extract one frame every S seconds.
    #[arg(long = "seconds_interval")]
    seconds_interval: Option<f64>,

    /// Image format (jpg, jpeg, png, webp, bmp, tiff).
    #[arg(long = "image_format", default_value = "jpg", value_parser = parse_image_format)]
    image_format: ImageFormat,

    /// Favour image quality over file size.
    #[arg(long = "enable_lossless")]
    enable_lossless: bool,

    /// Write into a timestamped subfolder of the output folder.
    #[arg(long = "enable_timestamp_folder")]
    enable_timestamp_folder: bool,

    /// Replace frames that already exist instead of skipping them.
    #[arg(long)]
    overwrite: bool,

    /// Never call the external ffmpeg executable.
    #[arg(long = "no_fast_path")]
    no_fast_path: bool,

    /// ffmpeg executable used by the fast path.
    #[arg(long = "ffmpeg_path", default_value = "ffmpeg")]
    ffmpeg_path: PathBuf,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Show debug logging.
    #[arg(long)]
    verbose: bool,

    /// FFmpeg library log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long = "log_level", default_value = "error", value_parser = parse_log_level)]
    log_level: FfmpegLogLevel,

    /// Also write log lines to this file.
    #[arg(long = "log_file")]
    log_file: Option<PathBuf>,

    /// Print a shell completion script and exit.
    #[arg(long, value_enum)]
    completions: Option<Shell>,
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn Error + Send + Sync>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(format!("time must be a non-negative number: {trimmed}").into());
        }
        return Ok(Duration::try_from_secs_f64(seconds)?);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => (0, minutes.parse::<u64>()?, seconds.parse::<f64>()?),
        [hours, minutes, seconds] => (
            hours.parse::<u64>()?,
            minutes.parse::<u64>()?,
            seconds.parse::<f64>()?,
        ),
        _ => return Err(format!("invalid time format: {trimmed}").into()),
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("invalid seconds in {trimmed}").into());
    }

    let whole = hours
        .checked_mul(3600)
        .and_then(|hours| hours.checked_add(minutes.checked_mul(60)?))
        .ok_or_else(|| format!("time out of range: {trimmed}"))?;
    Duration::from_secs(whole)
        .checked_add(Duration::try_from_secs_f64(seconds)?)
        .ok_or_else(|| format!("time out of range: {trimmed}").into())
}

fn parse_seconds(value: &str) -> Result<f64, String> {
    parse_timecode(value)
        .map(|duration| duration.as_secs_f64())
        .map_err(|error| error.to_string())
}

fn parse_image_format(value: &str) -> Result<ImageFormat, String> {
    value.parse().map_err(|error: framecut::FramecutError| error.to_string())
}

fn parse_log_level(value: &str) -> Result<FfmpegLogLevel, String> {
    value.parse().map_err(|error: framecut::FramecutError| error.to_string())
}

fn format_line(out: fern::FormatCallback, message: &Arguments, record: &log::Record) {
    out.finish(format_args!(
        "{} {:<5} [{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        record.level(),
        record.target(),
        message
    ))
}

fn init_logger(verbose: bool, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let terminal_level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug).chain(
        fern::Dispatch::new()
            .level(terminal_level)
            .format(format_line)
            .chain(std::io::stderr()),
    );

    if let Some(path) = log_file {
        let file = fern::log_file(path)
            .map_err(|error| format!("could not open log file {}: {error}", path.display()))?;
        dispatch = dispatch.chain(fern::Dispatch::new().format(format_line).chain(file));
    }

    dispatch.apply()?;
    Ok(())
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg} (eta {eta})",
        )?;
        bar.set_style(style.progress_chars("##-"));
        bar.enable_steady_tick(Duration::from_millis(120));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        match (info.current_frame, info.stage) {
            (Some(frame), _) => self.bar.set_message(format!("frame {frame}")),
            (None, ExtractionStage::FastPath) if info.current < info.total.unwrap_or(0) => {
                self.bar.set_message("running ffmpeg")
            }
            (None, _) => {}
        }
    }
}

fn resolve_video(video: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
    if let Some(video) = video {
        let path = Path::new(video);
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
    }
    Ok(framecut::find_video(video, ".")?)
}

fn build_spec(cli: &Cli, video: &Path) -> Result<ExtractionSpec, Box<dyn Error>> {
    let interval = match (cli.frames_interval, cli.seconds_interval) {
        (Some(frames), _) => IntervalMode::frames(frames)?,
        (None, Some(seconds)) => IntervalMode::seconds(seconds)?,
        (None, None) => IntervalMode::default(),
    };
    let output_dir = cli.output_folder.clone().unwrap_or_else(|| {
        framecut::default_output_dir(video, &framecut::interval_label(interval))
    });

    let mut builder = ExtractionSpec::builder(output_dir)
        .interval(interval)
        .image_format(cli.image_format)
        .lossless(cli.enable_lossless)
        .timestamped(cli.enable_timestamp_folder)
        .overwrite(cli.overwrite);
    if let Some(seconds) = cli.start_time {
        builder = builder.start_time(seconds);
    }
    if let Some(seconds) = cli.end_time {
        builder = builder.end_time(seconds);
    }
    if let Some(frame) = cli.start_frame {
        builder = builder.start_frame(frame);
    }
    if let Some(frame) = cli.end_frame {
        builder = builder.end_frame(frame);
    }
    Ok(builder.build()?)
}

fn print_json(video: &Path, metadata: &VideoMetadata, report: &ExtractionReport) -> Result<(), Box<dyn Error>> {
    let payload = json!({
        "video": video.display().to_string(),
        "frame_count": metadata.frame_count,
        "frames_per_second": metadata.frames_per_second,
        "output_dir": report.output_dir.display().to_string(),
        "selected": report.selected,
        "skipped_existing": report.skipped_existing,
        "written": report.written.iter().map(|file| json!({
            "path": file.path.display().to_string(),
            "sequence_number": file.sequence_number,
            "frame_index": file.source_frame_index,
        })).collect::<Vec<_>>(),
        "failures": report.failures.iter().map(|failure| json!({
            "frame_index": failure.frame_index,
            "sequence_number": failure.sequence_number,
            "error": failure.error.to_string(),
        })).collect::<Vec<_>>(),
        "cancelled": report.cancelled,
        "fast_path_used": report.fast_path_used,
        "fallback_used": report.fallback_used,
        "elapsed_seconds": report.elapsed.as_secs_f64(),
        "ok": report.exit_ok(),
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn print_summary(report: &ExtractionReport) {
    if report.selected == 0 {
        println!("{} {}", "warning:".yellow().bold(), "no frames selected".yellow());
        return;
    }

    let line = format!(
        "Extracted {} frame(s) to {} ({} already present)",
        report.written.len(),
        report.output_dir.display(),
        report.skipped_existing
    );
    if report.exit_ok() {
        println!("{} {}", "success:".green().bold(), line.green());
    } else {
        println!("{} {}", "error:".red().bold(), line.red());
    }

    if !report.failures.is_empty() {
        println!(
            "{} {}",
            "failed:".red().bold(),
            format!("{} frame(s): {:?}", report.failures.len(), report.failed_indices()).red()
        );
    }
    if !report.cancelled.is_empty() {
        println!(
            "{} {}",
            "cancelled:".yellow().bold(),
            format!("{} frame(s) not extracted", report.cancelled.len()).yellow()
        );
    }
}

fn run() -> Result<bool, Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "framecut", &mut std::io::stdout());
        return Ok(true);
    }

    init_logger(cli.verbose, cli.log_file.as_deref())?;
    framecut::set_ffmpeg_log_level(cli.log_level);

    let video = resolve_video(cli.video.as_deref())?;
    let spec = build_spec(&cli, &video)?;
    let metadata = VideoMetadata::read(&video)?;
    log::info!(
        "{}: {} frames @ {:.3} fps, {}x{} {}",
        video.display(),
        metadata.frame_count,
        metadata.frames_per_second,
        metadata.width,
        metadata.height,
        metadata.codec
    );

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    let mut options = ExtractOptions::new()
        .with_cancellation(token)
        .with_fast_path(!cli.no_fast_path);
    let progress_bar = if cli.progress {
        let progress = Arc::new(BarProgress::new()?);
        options = options.with_progress(progress.clone());
        Some(progress)
    } else {
        None
    };

    let extractor = FrameExtractor::new(
        &video,
        metadata.clone(),
        FfmpegCli::with_program(&cli.ffmpeg_path),
        FfmpegSource::new(&video),
    );
    let report = extractor.run(&spec, &options)?;

    if let Some(progress) = progress_bar {
        progress.bar.finish_with_message("done");
    }

    if cli.json {
        print_json(&video, &metadata, &report)?;
    } else {
        print_summary(&report);
    }

    Ok(report.exit_ok())
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_timecode_formats() {
        let seconds = parse_timecode("75").unwrap();
        assert_eq!(seconds.as_secs(), 75);

        let mm_ss = parse_timecode("01:15").unwrap();
        assert_eq!(mm_ss.as_secs(), 75);

        let hh_mm_ss = parse_timecode("00:01:15.5").unwrap();
        assert_eq!(hh_mm_ss.as_secs_f64(), 75.5);

        assert!(parse_timecode("").is_err());
        assert!(parse_timecode("1:2:3:4").is_err());
    }

    #[test]
    fn parse_timecode_rejects_out_of_range_values() {
        assert!(parse_timecode("1e300").is_err());
        assert!(parse_timecode("99999999999999999:00:00").is_err());
        assert!(parse_timecode("00:00:1e300").is_err());
        assert!(parse_seconds("1e300").is_err());

        // Past the end of any real video, but still representable.
        assert_eq!(parse_seconds("1000000").unwrap(), 1_000_000.0);
    }

    #[test]
    fn interval_flags_conflict() {
        let result = Cli::try_parse_from([
            "framecut",
            "in.mp4",
            "--frames_interval",
            "5",
            "--seconds_interval",
            "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn underscore_flags_are_accepted() {
        let cli = Cli::try_parse_from([
            "framecut",
            "in.mp4",
            "--start_time",
            "00:10",
            "--image_format",
            "jpeg",
            "--enable_lossless",
        ])
        .unwrap();
        assert_eq!(cli.start_time, Some(10.0));
        assert_eq!(cli.image_format, ImageFormat::Jpg);
        assert!(cli.enable_lossless);
        assert_eq!(cli.log_level, FfmpegLogLevel::Error);
    }

    #[test]
    fn default_output_folder_names_interval() {
        let cli = Cli::try_parse_from(["framecut", "clip.mp4", "--seconds_interval", "2"]).unwrap();
        let spec = build_spec(&cli, Path::new("clip.mp4")).unwrap();
        assert_eq!(
            spec.output_dir(),
            Path::new("framecut_output").join("clip_frames_2s_interval")
        );
    }
}
