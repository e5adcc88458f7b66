use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::RunSummary;

/// The coarse phases of a run, reported before each one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Downloading,
    Extracting,
    Shuffling { pass: u8, of: u8 },
    Assembling,
    Packaging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Downloading => write!(f, "Downloading graphics dump..."),
            Stage::Extracting => write!(f, "Extracting graphics dump..."),
            Stage::Shuffling { pass, of } => write!(f, "Shuffling textures (pass {pass} of {of})..."),
            Stage::Assembling => write!(f, "Assembling mod folder..."),
            Stage::Packaging => write!(f, "Packaging mod archive..."),
        }
    }
}

/// Receives progress from a run.
///
/// `progress` carries the percentage (0..=100) of files processed in the
/// current shuffle pass and is called once per shuffled directory, which
/// is where a front end should redraw. `completed` is called exactly once,
/// after the mod archive has been written.
pub trait ProgressSink {
    fn stage(&mut self, _stage: Stage) {}

    fn progress(&mut self, percent: f32);

    fn completed(&mut self, _archive: &Path) {}
}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ProgressSink for Silent {
    fn progress(&mut self, _percent: f32) {}
}

/// Messages a worker thread sends back to a display thread.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Stage(Stage),
    Progress(f32),
    Completed(PathBuf),
    Finished(RunSummary),
    Failed(String),
}

// A disconnected receiver means the display went away; the run carries on.
impl ProgressSink for mpsc::Sender<RunEvent> {
    fn stage(&mut self, stage: Stage) {
        let _ = self.send(RunEvent::Stage(stage));
    }

    fn progress(&mut self, percent: f32) {
        let _ = self.send(RunEvent::Progress(percent));
    }

    fn completed(&mut self, archive: &Path) {
        let _ = self.send(RunEvent::Completed(archive.to_path_buf()));
    }
}
