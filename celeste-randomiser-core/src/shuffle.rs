//! Per-directory filename shuffling.
//!
//! Every directory in the tree is a group: the names of the files directly
//! inside it are permuted among themselves, so file contents never change
//! and never leave their directory. Renames go through a temporary name
//! first so a final name is never taken while the batch is half done.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{IoResultExt, ProgressSink, RandomiserError, Result, Stage};

/// Appended to target names during the first rename phase.
const TEMP_MARKER: &str = ".temp";

/// One directory's worth of work in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryShuffle {
    /// Relative to the shuffled root.
    pub dir: PathBuf,
    /// `(original, target)`: the file that was called `original` is now called `target`.
    pub renames: Vec<(OsString, OsString)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub directories: Vec<DirectoryShuffle>,
}

impl PassReport {
    pub fn files(&self) -> usize {
        self.directories.iter().map(|d| d.renames.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShuffleReport {
    pub passes: Vec<PassReport>,
}

impl ShuffleReport {
    pub fn directories_per_pass(&self) -> usize {
        self.passes.first().map_or(0, |p| p.directories.len())
    }

    pub fn files_per_pass(&self) -> usize {
        self.passes.first().map_or(0, PassReport::files)
    }

    /// Human readable list of every rename, pass by pass.
    pub fn spoiler_log(&self, seed: u64) -> String {
        let mut log = format!("Celeste texture randomiser seed: {seed}\n");
        for (index, pass) in self.passes.iter().enumerate() {
            let _ = writeln!(log, "\n== pass {} ==", index + 1);
            for group in &pass.directories {
                let _ = writeln!(log, "[{}]", display_dir(&group.dir));
                for (original, target) in &group.renames {
                    let _ = writeln!(
                        log,
                        "  {} -> {}",
                        original.to_string_lossy(),
                        target.to_string_lossy()
                    );
                }
            }
        }
        log
    }
}

fn display_dir(dir: &Path) -> String {
    if dir.as_os_str().is_empty() {
        ".".to_string()
    } else {
        dir.display().to_string()
    }
}

/// Shuffles filenames under `root`, `passes` times.
pub fn shuffle_tree<R: Rng + ?Sized>(
    root: &Path,
    passes: u8,
    rng: &mut R,
    sink: &mut dyn ProgressSink,
) -> Result<ShuffleReport> {
    shuffle_tree_with(root, passes, rng, sink, |from, to| fs::rename(from, to))
}

/// [`shuffle_tree`] with the rename primitive supplied by the caller.
pub fn shuffle_tree_with<R, F>(
    root: &Path,
    passes: u8,
    rng: &mut R,
    sink: &mut dyn ProgressSink,
    mut rename: F,
) -> Result<ShuffleReport>
where
    R: Rng + ?Sized,
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let mut report = ShuffleReport::default();

    for pass in 1..=passes {
        sink.stage(Stage::Shuffling { pass, of: passes });

        let groups = collect_groups(root)?;
        let total_files: usize = groups.iter().map(|g| g.files.len()).sum();
        let mut processed_files = 0usize;
        let mut pass_report = PassReport::default();

        for group in groups.into_iter().filter(|g| !g.files.is_empty()) {
            let target = target_order(&group.files, rng);
            shuffle_directory(&group, &target, &mut rename)?;

            processed_files += group.files.len();
            sink.progress(processed_files as f32 / total_files as f32 * 100.0);
            log::debug!(
                "pass {pass}: shuffled {} file(s) in {}",
                group.files.len(),
                group.path.display()
            );

            let dir = group
                .path
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| group.path.clone());
            pass_report.directories.push(DirectoryShuffle {
                dir,
                renames: group.files.into_iter().zip(target).collect(),
            });
        }

        if total_files == 0 {
            sink.progress(100.0);
        }

        log::info!(
            "pass {pass}/{passes}: shuffled {total_files} file(s) in {} folder(s)",
            pass_report.directories.len()
        );
        report.passes.push(pass_report);
    }

    Ok(report)
}

struct DirectoryGroup {
    path: PathBuf,
    /// Files directly inside `path`, sorted by name.
    files: Vec<OsString>,
    /// Every entry name in `path`, files and subdirectories alike.
    occupied: HashSet<OsString>,
}

fn collect_groups(root: &Path) -> Result<Vec<DirectoryGroup>> {
    let mut groups = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.into_path();
        let mut files = Vec::new();
        let mut occupied = HashSet::new();
        for child in fs::read_dir(&path).at(&path)? {
            let child = child.at(&path)?;
            let name = child.file_name();
            if child.file_type().at(&child.path())?.is_file() {
                files.push(name.clone());
            }
            occupied.insert(name);
        }
        // A given seed must reproduce the same renames on any filesystem.
        files.sort();

        groups.push(DirectoryGroup {
            path,
            files,
            occupied,
        });
    }

    Ok(groups)
}

fn walk_error(root: &Path, err: walkdir::Error) -> RandomiserError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
    RandomiserError::Filesystem { path, source }
}

/// A uniformly random reordering of `names`.
pub fn target_order<R: Rng + ?Sized>(names: &[OsString], rng: &mut R) -> Vec<OsString> {
    let mut shuffled = names.to_vec();
    shuffled.shuffle(rng);
    shuffled
}

/// Picks a suffix such that no `name + suffix` is already in `occupied`.
fn temp_suffix(names: &[OsString], occupied: &HashSet<OsString>) -> OsString {
    let free = |suffix: &OsStr| {
        names.iter().all(|name| {
            let mut temp = name.clone();
            temp.push(suffix);
            !occupied.contains(&temp)
        })
    };

    let mut suffix = OsString::from(TEMP_MARKER);
    let mut attempt = 1u32;
    while !free(suffix.as_os_str()) {
        suffix = OsString::from(format!("{TEMP_MARKER}{attempt}"));
        attempt += 1;
    }
    suffix
}

/// Two-phase rename of one directory: everything to a temporary name, then
/// every temporary to its final name.
fn shuffle_directory<F>(group: &DirectoryGroup, target: &[OsString], rename: &mut F) -> Result<()>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let suffix = temp_suffix(&group.files, &group.occupied);
    let temp_path = |name: &OsString| {
        let mut temp = name.clone();
        temp.push(&suffix);
        group.path.join(temp)
    };

    for (original, shuffled) in group.files.iter().zip(target) {
        let from = group.path.join(original);
        rename(&from, &temp_path(shuffled)).at(&from)?;
    }

    for shuffled in target {
        let from = temp_path(shuffled);
        rename(&from, &group.path.join(shuffled)).at(&from)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Silent;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{BTreeMap, HashMap};

    fn write(path: &Path, data: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, data).unwrap();
    }

    /// name -> contents for the files directly in `dir`.
    fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().unwrap().is_file())
            .map(|e| {
                (
                    e.file_name().to_string_lossy().into_owned(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    fn sorted_values(map: &BTreeMap<String, Vec<u8>>) -> Vec<Vec<u8>> {
        let mut values: Vec<_> = map.values().cloned().collect();
        values.sort();
        values
    }

    fn tree_totals(root: &Path) -> (usize, u64) {
        WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .fold((0, 0), |(n, bytes), e| {
                (n + 1, bytes + e.metadata().unwrap().len())
            })
    }

    fn sample_tree(root: &Path) {
        for (i, name) in ["a.png", "b.png", "c.png", "d.png", "e.png"].iter().enumerate() {
            write(&root.join("Atlases").join(name), format!("atlas-{i}").as_bytes());
        }
        write(&root.join("Atlases/Gameplay/x.png"), b"x-bytes");
        write(&root.join("Atlases/Gameplay/y.png"), b"y-bytes-longer");
        write(&root.join("Portraits/madeline.png"), b"madeline");
        fs::create_dir_all(root.join("Empty")).unwrap();
    }

    struct Recorder {
        progress: Vec<f32>,
        stages: Vec<Stage>,
        completed: usize,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                progress: Vec::new(),
                stages: Vec::new(),
                completed: 0,
            }
        }
    }

    impl ProgressSink for Recorder {
        fn stage(&mut self, stage: Stage) {
            self.stages.push(stage);
        }

        fn progress(&mut self, percent: f32) {
            self.progress.push(percent);
        }

        fn completed(&mut self, _archive: &Path) {
            self.completed += 1;
        }
    }

    #[test]
    fn contents_are_conserved_per_directory() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());
        let dirs = ["Atlases", "Atlases/Gameplay", "Portraits"];
        let before: Vec<_> = dirs.iter().map(|d| snapshot(&dir.path().join(d))).collect();

        let mut rng = StdRng::seed_from_u64(7);
        shuffle_tree(dir.path(), 1, &mut rng, &mut Silent).unwrap();

        for (d, before) in dirs.iter().zip(before) {
            let after = snapshot(&dir.path().join(d));
            let before_names: Vec<_> = before.keys().collect();
            let after_names: Vec<_> = after.keys().collect();
            assert_eq!(before_names, after_names, "names in {d}");
            assert_eq!(sorted_values(&before), sorted_values(&after), "contents in {d}");
        }
        assert_eq!(
            snapshot(&dir.path().join("Portraits"))["madeline.png"],
            b"madeline"
        );
    }

    #[test]
    fn passes_keep_file_count_and_size() {
        for passes in 1..=4u8 {
            let dir = tempfile::tempdir().unwrap();
            sample_tree(dir.path());
            let before = tree_totals(dir.path());

            let mut rng = StdRng::seed_from_u64(u64::from(passes));
            let report = shuffle_tree(dir.path(), passes, &mut rng, &mut Silent).unwrap();

            assert_eq!(tree_totals(dir.path()), before);
            assert_eq!(report.passes.len(), usize::from(passes));
            assert_eq!(report.files_per_pass(), 8);
            assert_eq!(report.directories_per_pass(), 3);
        }
    }

    #[test]
    fn no_rename_targets_an_occupied_name() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());

        let mut renames = 0usize;
        let mut rng = StdRng::seed_from_u64(99);
        shuffle_tree_with(dir.path(), 2, &mut rng, &mut Silent, |from, to| {
            assert!(from.exists(), "source {} vanished", from.display());
            assert!(!to.exists(), "{} already taken", to.display());
            renames += 1;
            fs::rename(from, to)
        })
        .unwrap();

        // Two renames per file per pass.
        assert_eq!(renames, 8 * 2 * 2);
    }

    #[test]
    fn temp_names_avoid_existing_marker_files() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a"), b"1");
        write(&dir.path().join("a.temp"), b"2");
        write(&dir.path().join("b"), b"3");

        let mut rng = StdRng::seed_from_u64(3);
        shuffle_tree_with(dir.path(), 3, &mut rng, &mut Silent, |from, to| {
            assert!(!to.exists(), "{} already taken", to.display());
            fs::rename(from, to)
        })
        .unwrap();

        let after = snapshot(dir.path());
        assert_eq!(after.len(), 3);
        assert_eq!(sorted_values(&after), vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn temp_names_avoid_subdirectory_names() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a"), b"1");
        write(&dir.path().join("b"), b"2");
        write(&dir.path().join("a.temp/inner.png"), b"inner");

        let mut rng = StdRng::seed_from_u64(11);
        shuffle_tree_with(dir.path(), 2, &mut rng, &mut Silent, |from, to| {
            assert!(!to.exists(), "{} already taken", to.display());
            fs::rename(from, to)
        })
        .unwrap();

        let after = snapshot(dir.path());
        assert_eq!(after.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(sorted_values(&after), vec![b"1".to_vec(), b"2".to_vec()]);
        assert!(dir.path().join("a.temp").is_dir());
        assert_eq!(
            fs::read(dir.path().join("a.temp/inner.png")).unwrap(),
            b"inner"
        );
    }

    #[test]
    fn temp_suffix_skips_subdirectory_names() {
        let names = vec![OsString::from("a"), OsString::from("b")];
        let occupied: HashSet<OsString> = names
            .iter()
            .cloned()
            .chain([OsString::from("a.temp")])
            .collect();
        assert_eq!(temp_suffix(&names, &occupied), OsString::from(".temp1"));
    }

    #[test]
    fn temp_suffix_skips_taken_markers() {
        let names = vec![OsString::from("a"), OsString::from("a.temp")];
        let occupied: HashSet<OsString> = names
            .iter()
            .cloned()
            .chain([OsString::from("a.temp1")])
            .collect();
        assert_eq!(temp_suffix(&names, &occupied), OsString::from(".temp2"));
    }

    #[test]
    fn progress_reaches_100_each_pass() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());

        let mut rec = Recorder::new();
        let mut rng = StdRng::seed_from_u64(1);
        shuffle_tree(dir.path(), 2, &mut rng, &mut rec).unwrap();

        // Three non-empty directories per pass.
        assert_eq!(rec.progress.len(), 6);
        assert!(rec.progress.windows(2).take(2).all(|w| w[0] < w[1]));
        assert_eq!(rec.progress[2], 100.0);
        assert_eq!(rec.progress[5], 100.0);
        assert_eq!(
            rec.stages,
            vec![
                Stage::Shuffling { pass: 1, of: 2 },
                Stage::Shuffling { pass: 2, of: 2 }
            ]
        );
        assert_eq!(rec.completed, 0);
    }

    #[test]
    fn empty_tree_reports_full_progress() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("only/dirs")).unwrap();

        let mut rec = Recorder::new();
        let mut rng = StdRng::seed_from_u64(1);
        let report = shuffle_tree(dir.path(), 1, &mut rng, &mut rec).unwrap();

        assert_eq!(rec.progress, vec![100.0]);
        assert_eq!(report.files_per_pass(), 0);
    }

    #[test]
    fn single_file_keeps_its_name() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("B/c.txt"), b"ccc");

        let mut rng = StdRng::seed_from_u64(5);
        let report = shuffle_tree(dir.path(), 1, &mut rng, &mut Silent).unwrap();

        assert_eq!(fs::read(dir.path().join("B/c.txt")).unwrap(), b"ccc");
        let group = &report.passes[0].directories[0];
        assert_eq!(group.dir, Path::new("B"));
        assert_eq!(
            group.renames,
            vec![(OsString::from("c.txt"), OsString::from("c.txt"))]
        );
    }

    #[test]
    fn rename_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());

        let mut rng = StdRng::seed_from_u64(1);
        let err = shuffle_tree_with(dir.path(), 1, &mut rng, &mut Silent, |_, _| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        })
        .unwrap_err();
        assert!(matches!(err, RandomiserError::Filesystem { .. }));
    }

    #[test]
    fn missing_root_is_a_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = shuffle_tree(&dir.path().join("gone"), 1, &mut rng, &mut Silent).unwrap_err();
        assert!(matches!(err, RandomiserError::Filesystem { .. }));
    }

    #[test]
    fn spoiler_log_lists_renames() {
        let report = ShuffleReport {
            passes: vec![PassReport {
                directories: vec![DirectoryShuffle {
                    dir: PathBuf::from("A"),
                    renames: vec![
                        (OsString::from("a.png"), OsString::from("b.png")),
                        (OsString::from("b.png"), OsString::from("a.png")),
                    ],
                }],
            }],
        };
        let log = report.spoiler_log(42);
        assert!(log.starts_with("Celeste texture randomiser seed: 42\n"));
        assert!(log.contains("== pass 1 =="));
        assert!(log.contains("[A]\n  a.png -> b.png\n  b.png -> a.png\n"));
    }

    #[test]
    fn permutations_are_uniform() {
        // k = 5 has 120 permutations; chi-square with 119 degrees of freedom.
        let names: Vec<OsString> = ["a", "b", "c", "d", "e"].iter().map(OsString::from).collect();
        let trials = 12_000usize;
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let mut counts: HashMap<Vec<OsString>, usize> = HashMap::new();
        for _ in 0..trials {
            *counts.entry(target_order(&names, &mut rng)).or_default() += 1;
        }

        assert_eq!(counts.len(), 120);
        let expected = trials as f64 / 120.0;
        let chi_square: f64 = counts
            .values()
            .map(|&observed| {
                let diff = observed as f64 - expected;
                diff * diff / expected
            })
            .sum();
        // The 99.9th percentile of chi-square(119) is about 167.
        assert!(chi_square < 170.0, "chi-square {chi_square}");
        assert!(counts[&names] < trials / 60, "identity drawn too often");
    }
}
