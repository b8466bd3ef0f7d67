//! Detection of frames that are already on disk.
//!
//! A target counts as extracted when the file its sequence number maps to is
//! present as a regular file. Writes are atomic, so a present file is a
//! complete file; temporary files and staging directories use names that can
//! never match.
//!
//! Matching is by position in the selection. It is exact when the
//! [`ExtractionSpec`](crate::ExtractionSpec) and the video are unchanged
//! between runs; with different options the same name may refer to a
//! different source frame, which the scanner cannot detect. It does log a warning when it sees numbered files beyond the end
//! of the current selection, which is a strong hint of that situation.

use std::fs;

use crate::{output::OutputLayout, selection::FrameTarget};

/// Outcome of [`OutputScanner::filter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Targets that still need extracting, in order.
    pub pending: Vec<FrameTarget>,
    /// Targets whose output file already exists, in order.
    pub existing: Vec<FrameTarget>,
}

/// Read-only inspection of an output directory.
#[derive(Debug, Clone, Copy)]
pub struct OutputScanner<'a> {
    layout: &'a OutputLayout,
}

impl<'a> OutputScanner<'a> {
    /// Scan the directory described by `layout`.
    pub fn new(layout: &'a OutputLayout) -> Self {
        Self { layout }
    }

    /// Split `targets` into pending and already-extracted ones.
    ///
    /// A missing output directory means nothing has been extracted.
    pub fn filter(&self, targets: &[FrameTarget]) -> ScanResult {
        let (existing, pending): (Vec<FrameTarget>, Vec<FrameTarget>) = targets
            .iter()
            .partition(|target| self.is_extracted(target));

        if !existing.is_empty() {
            log::info!(
                "{} of {} frames already present in {}",
                existing.len(),
                targets.len(),
                self.layout.directory().display()
            );
        }
        self.warn_about_strays(targets.len() as u64);

        ScanResult { pending, existing }
    }

    /// Whether the output file for `target` is already present.
    pub fn is_extracted(&self, target: &FrameTarget) -> bool {
        fs::metadata(self.layout.path(target.sequence_number))
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
    }

    fn warn_about_strays(&self, selected: u64) {
        let Ok(entries) = fs::read_dir(self.layout.directory()) else {
            return;
        };

        let strays = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| self.layout.parse_sequence_number(&name))
            .filter(|&number| number == 0 || number > selected)
            .count();

        if strays > 0 {
            log::warn!(
                "{strays} numbered frame(s) in {} fall outside the current selection of {selected}; \
                 the directory may hold output from a run with different options",
                self.layout.directory().display()
            );
        }
    }
}
