//! Locating input videos and naming default output folders.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::FramecutError;

/// Container extensions accepted as input, lower case.
pub const SUPPORTED_VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "avi", "mov", "mkv", "flv", "wmv"];

/// Root folder for default output directories.
pub const DEFAULT_OUTPUT_ROOT: &str = "framecut_output";

/// Whether `path` has one of the [`SUPPORTED_VIDEO_EXTENSIONS`], ignoring case.
pub fn is_supported_video<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            SUPPORTED_VIDEO_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(extension))
        })
}

/// Find the video to work on below `search_dir`.
///
/// With a `name`, the first supported video whose file name matches it
/// case-insensitively is returned; the name may be given with or without
/// its extension. Without a name there must be exactly one supported video.
/// Directories are searched recursively in name order.
///
/// # Errors
///
/// Returns [`FramecutError::VideoUnreadable`] if nothing matches, or if no
/// name was given and the choice is ambiguous.
pub fn find_video<P: AsRef<Path>>(
    name: Option<&str>,
    search_dir: P,
) -> Result<PathBuf, FramecutError> {
    let search_dir = search_dir.as_ref();
    let mut candidates = Vec::new();
    collect_videos(search_dir, &mut candidates)?;

    let not_found = |reason: String| FramecutError::VideoUnreadable {
        path: search_dir.to_path_buf(),
        reason,
    };

    match name {
        Some(name) => {
            let wanted = Path::new(name)
                .file_name()
                .and_then(|file_name| file_name.to_str())
                .unwrap_or(name);
            candidates
                .into_iter()
                .find(|candidate| matches_name(candidate, wanted))
                .ok_or_else(|| not_found(format!("no supported video named `{name}`")))
        }
        None => match candidates.len() {
            0 => Err(not_found("no supported video found".to_string())),
            1 => Ok(candidates.remove(0)),
            n => Err(not_found(format!(
                "{n} videos found; pass the one to extract from"
            ))),
        },
    }
}

/// Default output directory for `video`:
/// `framecut_output/<stem>_frames_<label>`.
pub fn default_output_dir<P: AsRef<Path>>(video: P, label: &str) -> PathBuf {
    let stem = video
        .as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    Path::new(DEFAULT_OUTPUT_ROOT).join(format!("{stem}_frames_{label}"))
}

fn matches_name(candidate: &Path, wanted: &str) -> bool {
    let file_name = candidate.file_name().and_then(|name| name.to_str());
    let stem = candidate.file_stem().and_then(|stem| stem.to_str());
    [file_name, stem]
        .into_iter()
        .flatten()
        .any(|name| name.eq_ignore_ascii_case(wanted))
}

fn collect_videos(directory: &Path, found: &mut Vec<PathBuf>) -> Result<(), FramecutError> {
    let mut entries: Vec<(PathBuf, fs::FileType)> = fs::read_dir(directory)?
        .filter_map(Result::ok)
        .filter_map(|entry| Some((entry.path(), entry.file_type().ok()?)))
        .collect();
    entries.sort_by(|(left, _), (right, _)| left.cmp(right));

    for (path, file_type) in entries {
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if hidden {
            continue;
        }
        // `file_type` does not follow links.
        if file_type.is_dir() {
            if let Err(error) = collect_videos(&path, found) {
                log::debug!("skipping {}: {error}", path.display());
            }
        } else if file_type.is_symlink() && path.is_dir() {
            log::debug!("not following linked directory {}", path.display());
        } else if is_supported_video(&path) {
            found.push(path);
        }
    }
    Ok(())
}
