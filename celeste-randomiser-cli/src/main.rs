use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use celeste_randomiser_core::{
    run, AssetSource, ProgressSink, RandomiserSettings, Stage, GRAPHICS_DUMP_FILENAME,
    GRAPHICS_DUMP_URL, MAX_PASSES, MIN_PASSES,
};

#[derive(Debug, Parser)]
#[command(
    name = "celeste-randomiser",
    version,
    about = "Shuffles Celeste texture names and packages them as an Everest mod"
)]
struct Args {
    /// Existing directory that receives the mod archive.
    #[arg(long)]
    output: PathBuf,

    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(i64::from(MIN_PASSES)..=i64::from(MAX_PASSES))
    )]
    passes: u8,

    #[arg(long)]
    seed: Option<u64>,

    /// Use an already downloaded graphics dump instead of fetching it.
    #[arg(long, value_name = "ZIP", conflicts_with = "url")]
    archive: Option<PathBuf>,

    #[arg(long, default_value = GRAPHICS_DUMP_URL, hide_default_value = true)]
    url: String,

    /// Also write a spoiler log listing every rename.
    #[arg(long, default_value_t = false)]
    debug: bool,
}

struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40.magenta/blue}] {pos:>3}% {msg}") {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }
}

impl ProgressSink for BarSink {
    fn stage(&mut self, stage: Stage) {
        self.bar.set_message(stage.to_string());
    }

    fn progress(&mut self, percent: f32) {
        self.bar.set_position(percent.round().clamp(0.0, 100.0) as u64);
    }

    fn completed(&mut self, archive: &Path) {
        self.bar.finish_with_message(format!("wrote {}", archive.display()));
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let source = match args.archive {
        Some(path) => AssetSource::Local(path),
        None => AssetSource::Remote {
            url: args.url,
            file_name: GRAPHICS_DUMP_FILENAME.to_string(),
        },
    };

    let settings = RandomiserSettings {
        output_path: args.output,
        passes: args.passes,
        seed: args.seed,
        source,
        debug: args.debug,
    };

    let mut sink = BarSink::new();
    match run(settings, &mut sink) {
        Ok(summary) => {
            println!(
                "Textures have been randomized and the mod has been created: {} (seed {})",
                summary.archive.display(),
                summary.seed
            );
            if let Some(spoiler) = summary.spoiler_log {
                println!("Spoiler log: {}", spoiler.display());
            }
        }
        Err(err) => {
            sink.bar.abandon();
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
