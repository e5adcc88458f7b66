use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod extract;
pub mod fetch;
pub mod package;
pub mod progress;
pub mod shuffle;

pub use progress::{ProgressSink, RunEvent, Silent, Stage};
pub use shuffle::ShuffleReport;

pub const GRAPHICS_DUMP_URL: &str = "https://www.dropbox.com/scl/fi/tvr8hafluov3no8tmmpzm/Celeste-Graphics-Dump-v1400.zip?rlkey=oeb5tlngtftl9p4wb39rrnpg4&st=r2ku2zbd&dl=1";
pub const GRAPHICS_DUMP_FILENAME: &str = "Celeste Graphics Dump v1400.zip";

/// Folder the graphics dump is expanded into, under the output directory.
pub const DUMP_FOLDER: &str = "celeste_graphics";
/// Mod folder name, also the base name of the final archive.
pub const MOD_FOLDER: &str = "Celeste_Randomized_Textures";

pub const MIN_PASSES: u8 = 1;
pub const MAX_PASSES: u8 = 4;

/// Where the graphics dump comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetSource {
    Remote { url: String, file_name: String },
    /// An already downloaded dump. It is copied, never consumed.
    Local(PathBuf),
}

impl Default for AssetSource {
    fn default() -> Self {
        AssetSource::Remote {
            url: GRAPHICS_DUMP_URL.to_string(),
            file_name: GRAPHICS_DUMP_FILENAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomiserSettings {
    pub output_path: PathBuf,
    pub passes: u8,
    /// Fixed seed for reproducible shuffles; a random one is drawn when unset.
    pub seed: Option<u64>,
    pub source: AssetSource,
    /// Also write a spoiler log listing every rename.
    pub debug: bool,
}

impl RandomiserSettings {
    pub fn new(output_path: impl Into<PathBuf>, passes: u8) -> Self {
        Self {
            output_path: output_path.into(),
            passes,
            seed: None,
            source: AssetSource::default(),
            debug: false,
        }
    }

    /// Builds settings from the raw text of the two input fields.
    ///
    /// The directory is checked before the pass count, so when both are
    /// wrong the directory error is the one reported.
    pub fn from_inputs(output_path: &str, passes: &str) -> Result<Self> {
        let output_path = PathBuf::from(output_path.trim());
        check_output_dir(&output_path)?;
        let settings = Self::new(output_path, parse_passes(passes)?);
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        check_output_dir(&self.output_path)?;

        if !(MIN_PASSES..=MAX_PASSES).contains(&self.passes) {
            return Err(pass_range_error());
        }

        Ok(())
    }

    pub fn dump_folder(&self) -> PathBuf {
        self.output_path.join(DUMP_FOLDER)
    }

    pub fn mod_folder(&self) -> PathBuf {
        self.output_path.join(MOD_FOLDER)
    }

    pub fn spoiler_path(&self) -> PathBuf {
        self.output_path.join(format!("{MOD_FOLDER}_spoiler.txt"))
    }
}

fn check_output_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || !path.is_dir() {
        return Err(RandomiserError::Validation(
            "Please select a valid directory.".to_string(),
        ));
    }
    Ok(())
}

fn pass_range_error() -> RandomiserError {
    RandomiserError::Validation(format!(
        "Please enter a number between {MIN_PASSES} and {MAX_PASSES}."
    ))
}

/// Parses a pass count typed by the user. Only plain digits are accepted.
pub fn parse_passes(text: &str) -> Result<u8> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(pass_range_error());
    }

    match text.parse::<u8>() {
        Ok(n) if (MIN_PASSES..=MAX_PASSES).contains(&n) => Ok(n),
        _ => Err(pass_range_error()),
    }
}

#[derive(Debug, Error)]
pub enum RandomiserError {
    #[error("{0}")]
    Validation(String),
    #[error("failed to fetch {url}: {reason}")]
    Transfer { url: String, reason: String },
    #[error("failed to extract {}: {source}", path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to package {}: {source}", path.display())]
    Packaging {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RandomiserError>;

pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| RandomiserError::Filesystem {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub archive: PathBuf,
    pub seed: u64,
    pub passes: u8,
    pub directories: usize,
    pub files: usize,
    pub spoiler_log: Option<PathBuf>,
}

/// Runs the whole pipeline: fetch, extract, shuffle, assemble, package.
///
/// Validation happens before anything touches the disk. Any later failure
/// aborts the run and leaves whatever was already produced in place.
pub fn run(settings: RandomiserSettings, sink: &mut dyn ProgressSink) -> Result<RunSummary> {
    settings.validate()?;
    sink.progress(0.0);

    let seed = settings
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen::<u64>());
    log::info!(
        "randomising into {} with {} pass(es), seed {}",
        settings.output_path.display(),
        settings.passes,
        seed
    );

    sink.stage(Stage::Downloading);
    let dump_zip = fetch::fetch_archive(&settings.source, &settings.output_path)?;

    sink.stage(Stage::Extracting);
    let dump_folder = settings.dump_folder();
    let extracted = extract::extract_archive(&dump_zip, &dump_folder)?;
    log::info!("extracted {} file(s) into {}", extracted, dump_folder.display());

    let mut rng = StdRng::seed_from_u64(seed);
    let report = shuffle::shuffle_tree(&dump_folder, settings.passes, &mut rng, sink)?;

    sink.stage(Stage::Assembling);
    let mod_folder = settings.mod_folder();
    fs::create_dir_all(&mod_folder).at(&mod_folder)?;
    package::write_manifest(&mod_folder)?;
    package::move_contents(&dump_folder, &mod_folder)?;
    fs::remove_dir_all(&dump_folder).at(&dump_folder)?;

    sink.stage(Stage::Packaging);
    let archive = package::package_folder(&mod_folder)?;

    let spoiler_log = if settings.debug {
        let path = settings.spoiler_path();
        fs::write(&path, report.spoiler_log(seed)).at(&path)?;
        Some(path)
    } else {
        None
    };

    let summary = RunSummary {
        archive,
        seed,
        passes: settings.passes,
        directories: report.directories_per_pass(),
        files: report.files_per_pass(),
        spoiler_log,
    };
    log::info!(
        "wrote {} ({} file(s) across {} folder(s))",
        summary.archive.display(),
        summary.files,
        summary.directories
    );

    sink.completed(&summary.archive);
    Ok(summary)
}
