//! locate discovers makefiles on disk.
//!
//! Both locators finish all directory I/O before returning their
//! iterator, so OS resources are released on every exit path,
//! including consumer early exit.

extern crate walkdir;

use crate::data::Makefile;
use crate::error::PipelineError;
use crate::iter::{ListIterator, PullIterator};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// GNU_MAKEFILE_NAMES lists the filenames GNU Make recognizes, in
/// ascending priority: GNUmakefile is preferred over makefile over
/// Makefile.
pub const GNU_MAKEFILE_NAMES: [&str; 3] = ["Makefile", "makefile", "GNUmakefile"];

/// FilenamePriorities ranks candidate makefile names.
///
/// Priorities derive from list order: a later position means a higher
/// priority. An empty table matches nothing.
pub struct FilenamePriorities {
    priorities: HashMap<String, usize>,
}

impl FilenamePriorities {
    /// new constructs an empty table.
    pub fn new() -> FilenamePriorities {
        FilenamePriorities {
            priorities: HashMap::new(),
        }
    }

    /// from_list derives priorities from list order.
    pub fn from_list(filenames: &[&str]) -> FilenamePriorities {
        let mut priorities: HashMap<String, usize> = HashMap::new();

        for (index, name) in filenames.iter().enumerate() {
            priorities.insert(name.to_string(), index + 1);
        }

        FilenamePriorities { priorities }
    }

    /// best picks the highest-priority matching filename, if any.
    pub fn best<'a>(&self, filenames: &'a [String]) -> Option<&'a str> {
        let mut best_name: Option<&str> = None;
        let mut best_priority: usize = 0;

        for name in filenames {
            if let Some(priority) = self.priorities.get(name) {
                if *priority > best_priority {
                    best_name = Some(name);
                    best_priority = *priority;
                }
            }
        }

        best_name
    }
}

impl Default for FilenamePriorities {
    /// default generates an empty table.
    fn default() -> Self {
        FilenamePriorities::new()
    }
}

fn file_names(dir: &Path) -> Result<Vec<String>, PipelineError> {
    let mut names: Vec<String> = Vec::new();

    for entry in fs::read_dir(dir).map_err(|err| PipelineError::locator(dir, err))? {
        let entry: fs::DirEntry = entry.map_err(|err| PipelineError::locator(dir, err))?;

        if entry.file_type().map_err(|err| PipelineError::locator(dir, err))?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }

    Ok(names)
}

fn canonical(dir: &Path) -> Result<PathBuf, PipelineError> {
    fs::canonicalize(dir).map_err(|err| PipelineError::locator(dir, err))
}

/// FlatMakefileLocator finds the best makefile in one directory.
pub struct FlatMakefileLocator {
    priorities: FilenamePriorities,
}

impl FlatMakefileLocator {
    /// new constructs a FlatMakefileLocator over a priority table.
    pub fn new(priorities: FilenamePriorities) -> FlatMakefileLocator {
        FlatMakefileLocator { priorities }
    }

    /// makefiles yields at most one descriptor, with an absolute,
    /// canonicalized execution path.
    pub fn makefiles(&self, dir: &Path) -> Result<ListIterator<Makefile>, PipelineError> {
        let names: Vec<String> = file_names(dir)?;
        let mut found: Vec<Makefile> = Vec::new();

        if let Some(name) = self.priorities.best(&names) {
            found.push(Makefile::new(canonical(dir)?, name));
        }

        Ok(ListIterator::new(found))
    }
}

/// NestedMakefileLocator walks a directory tree top-down for
/// makefiles.
///
/// The root directory is skipped: only nested makefiles are
/// reported. A directory without a matching filename has its whole
/// subtree pruned, limiting discovery to contiguous project regions.
pub struct NestedMakefileLocator {
    priorities: FilenamePriorities,
}

impl NestedMakefileLocator {
    /// new constructs a NestedMakefileLocator over a priority table.
    pub fn new(priorities: FilenamePriorities) -> NestedMakefileLocator {
        NestedMakefileLocator { priorities }
    }

    /// makefiles walks the tree under `dir` and yields descriptors in
    /// walk order.
    pub fn makefiles(&self, dir: &Path) -> Result<ListIterator<Makefile>, PipelineError> {
        let mut found: Vec<Makefile> = Vec::new();
        let mut walk = walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter();

        loop {
            let entry: walkdir::DirEntry = match walk.next() {
                None => break,
                Some(entry) => entry.map_err(|err| walk_error(dir, err))?,
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let names: Vec<String> = file_names(entry.path())?;

            match self.priorities.best(&names) {
                Some(name) => {
                    if entry.depth() > 0 {
                        let makefile: Makefile = Makefile::new(canonical(entry.path())?, name);
                        debug!(makefile = %makefile.path().display(), "discovered nested makefile");
                        found.push(makefile);
                    }
                }
                None => {
                    if entry.depth() == 0 {
                        break;
                    }

                    walk.skip_current_dir();
                }
            }
        }

        Ok(ListIterator::new(found))
    }
}

fn walk_error(dir: &Path, err: walkdir::Error) -> PipelineError {
    let path: PathBuf = err
        .path()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| dir.to_path_buf());
    let source: io::Error = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("directory walk failed"));
    PipelineError::locator(path, source)
}

#[test]
fn test_priority_tie_break() {
    let priorities: FilenamePriorities =
        FilenamePriorities::from_list(&["does_not_exist", "Makefile", "GNUmakefile"]);
    let names: Vec<String> = vec!["Makefile".to_string(), "GNUmakefile".to_string()];
    assert_eq!(priorities.best(&names), Some("GNUmakefile"));
}

#[test]
fn test_empty_priorities_match_nothing() {
    let priorities: FilenamePriorities = FilenamePriorities::new();
    let names: Vec<String> = vec!["Makefile".to_string()];
    assert_eq!(priorities.best(&names), None);
}

#[test]
fn test_flat_locator() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Makefile"), "all:\n").unwrap();
    std::fs::write(dir.path().join("GNUmakefile"), "all:\n").unwrap();

    let locator = FlatMakefileLocator::new(FilenamePriorities::from_list(&[
        "does_not_exist",
        "Makefile",
        "GNUmakefile",
    ]));
    let mut it: ListIterator<Makefile> = locator.makefiles(dir.path()).unwrap();

    it.advance().unwrap();
    assert_eq!(it.current().unwrap().file_path, "GNUmakefile");
    it.advance().unwrap();
    assert!(it.at_end());
}

#[test]
fn test_flat_locator_without_match() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "").unwrap();

    let locator = FlatMakefileLocator::new(FilenamePriorities::from_list(&["Makefile"]));
    let mut it: ListIterator<Makefile> = locator.makefiles(dir.path()).unwrap();
    it.advance().unwrap();
    assert!(it.at_end());
}

#[test]
fn test_nested_locator_prunes_on_miss() {
    let dir = tempfile::tempdir().unwrap();
    let root: &Path = dir.path();
    std::fs::write(root.join("Makefile"), "all:\n").unwrap();
    std::fs::create_dir_all(root.join("sub1")).unwrap();
    std::fs::write(root.join("sub1/Makefile"), "all:\n").unwrap();
    std::fs::create_dir_all(root.join("sub2/deep")).unwrap();
    std::fs::write(root.join("sub2/deep/Makefile"), "all:\n").unwrap();

    let locator = NestedMakefileLocator::new(FilenamePriorities::from_list(&["Makefile"]));
    let mut it: ListIterator<Makefile> = locator.makefiles(root).unwrap();

    // The root is skipped; sub2 has no makefile, hiding sub2/deep.
    it.advance().unwrap();
    let makefile: &Makefile = it.current().unwrap();
    assert_eq!(makefile.exec_path, std::fs::canonicalize(root.join("sub1")).unwrap());
    assert_eq!(makefile.file_path, "Makefile");

    it.advance().unwrap();
    assert!(it.at_end());
}

#[test]
fn test_nested_locator_root_miss_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root: &Path = dir.path();
    std::fs::create_dir_all(root.join("sub")).unwrap();
    std::fs::write(root.join("sub/Makefile"), "all:\n").unwrap();

    let locator = NestedMakefileLocator::new(FilenamePriorities::from_list(&["Makefile"]));
    let mut it: ListIterator<Makefile> = locator.makefiles(root).unwrap();
    it.advance().unwrap();
    assert!(it.at_end());
}

#[test]
fn test_nested_locator_walk_order_and_priorities() {
    let dir = tempfile::tempdir().unwrap();
    let root: &Path = dir.path();
    std::fs::write(root.join("Makefile"), "all:\n").unwrap();
    std::fs::create_dir_all(root.join("a")).unwrap();
    std::fs::write(root.join("a/makefile"), "all:\n").unwrap();
    std::fs::write(root.join("a/Makefile"), "all:\n").unwrap();
    std::fs::create_dir_all(root.join("b")).unwrap();
    std::fs::write(root.join("b/GNUmakefile"), "all:\n").unwrap();

    let locator = NestedMakefileLocator::new(FilenamePriorities::from_list(&GNU_MAKEFILE_NAMES));
    let mut it: ListIterator<Makefile> = locator.makefiles(root).unwrap();

    it.advance().unwrap();
    assert_eq!(it.current().unwrap().file_path, "makefile");
    it.advance().unwrap();
    assert_eq!(it.current().unwrap().file_path, "GNUmakefile");
    it.advance().unwrap();
    assert!(it.at_end());
}
