//! gnumake orchestrates the external `make` binary: argument
//! scanning, database dumps, target listings, and nested-rule
//! generation.

extern crate serde_json;

use crate::data::{Makefile, Target};
use crate::error::PipelineError;
use crate::iter::{IteratorConcatenator, ListIterator, PullIterator};
use crate::locate::{FilenamePriorities, FlatMakefileLocator, GNU_MAKEFILE_NAMES, NestedMakefileLocator};
use crate::pipeline::{self, PipelineMode, TargetIterator};
use crate::storage::{DirectoryMapping, cache_file_name};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::{debug, info, warn};

/// normalize_path resolves `.` and `..` components lexically, without
/// touching the filesystem, so directories that do not exist yet can
/// still be reasoned about.
fn normalize_path(path: &Path) -> PathBuf {
    let mut result: PathBuf = PathBuf::new();

    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {
                result.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(part) => {
                result.push(part);
            }
        }
    }

    result
}

/// execution_directory scans make-style arguments for `-C` and
/// `--directory` options and resolves the directory make would
/// execute in, starting from the current working directory.
pub fn execution_directory(args: &[String]) -> Result<PathBuf, PipelineError> {
    let mut dir: PathBuf = std::env::current_dir()?;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let value: Option<String> = if arg == "-C" || arg == "--directory" {
            let next: &String = iter.next().ok_or_else(|| {
                PipelineError::InvalidArguments(format!("{} requires a directory", arg))
            })?;
            Some(next.clone())
        } else if let Some(rest) = arg.strip_prefix("--directory=") {
            Some(rest.to_string())
        } else if let Some(rest) = arg.strip_prefix("-C") {
            if rest.is_empty() {
                None
            } else {
                Some(rest.to_string())
            }
        } else {
            None
        };

        if let Some(value) = value {
            let path: PathBuf = PathBuf::from(&value);

            dir = if path.is_absolute() {
                normalize_path(&path)
            } else {
                normalize_path(&dir.join(path))
            };
        }
    }

    Ok(dir)
}

/// TargetListing is the scoped iterator over one makefile's targets,
/// backed by a live `make -np` child process.
///
/// Dropping the listing closes the stdout pipe before reaping the
/// child, so resources are released even when the consumer bails
/// early.
pub struct TargetListing {
    iterator: Option<TargetIterator>,
    child: Option<Child>,
}

impl TargetListing {
    fn new(iterator: TargetIterator, child: Child) -> TargetListing {
        TargetListing {
            iterator: Some(iterator),
            child: Some(child),
        }
    }

    /// finish closes the pipeline and reaps the child process,
    /// failing when make exited unsuccessfully.
    pub fn finish(mut self) -> Result<(), PipelineError> {
        self.iterator = None;

        if let Some(mut child) = self.child.take() {
            let status: ExitStatus = child.wait()?;

            if !status.success() {
                return Err(PipelineError::Io(io::Error::other(format!(
                    "make exited with {}",
                    status
                ))));
            }
        }

        Ok(())
    }
}

impl PullIterator for TargetListing {
    type Item = Target;

    fn current(&self) -> Option<&Target> {
        self.iterator.as_ref().and_then(|it| it.current())
    }

    fn current_mut(&mut self) -> Option<&mut Target> {
        self.iterator.as_mut().and_then(|it| it.current_mut())
    }

    fn at_start(&self) -> bool {
        self.iterator.as_ref().map(|it| it.at_start()).unwrap_or(false)
    }

    fn at_end(&self) -> bool {
        self.iterator.as_ref().map(|it| it.at_end()).unwrap_or(true)
    }

    fn advance(&mut self) -> Result<(), PipelineError> {
        match self.iterator.as_mut() {
            Some(it) => it.advance(),
            None => Ok(()),
        }
    }
}

impl Drop for TargetListing {
    fn drop(&mut self) {
        // The pipe must close before the wait, or a child still
        // writing would block forever.
        self.iterator = None;

        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

/// GnuMake drives the external make binary.
pub struct GnuMake {
    executable: String,
    mode: PipelineMode,
    storage: DirectoryMapping,
}

impl GnuMake {
    /// new constructs a GnuMake wrapper.
    pub fn new(executable: &str, mode: PipelineMode, storage: DirectoryMapping) -> GnuMake {
        GnuMake {
            executable: executable.to_string(),
            mode,
            storage,
        }
    }

    /// nested_makefiles discovers makefiles nested under a directory,
    /// excluding the directory itself.
    pub fn nested_makefiles(&self, dir: &Path) -> Result<ListIterator<Makefile>, PipelineError> {
        let locator = NestedMakefileLocator::new(FilenamePriorities::from_list(&GNU_MAKEFILE_NAMES));
        locator.makefiles(dir)
    }

    /// target_listing runs `make --print-data-base --just-print` for
    /// one makefile and returns the scoped target iterator over its
    /// database dump.
    pub fn target_listing(&self, makefile: &Makefile) -> Result<TargetListing, PipelineError> {
        debug!(
            makefile = %makefile.path().display(),
            executable = %self.executable,
            "reading make database"
        );

        let mut child: Child = Command::new(&self.executable)
            .arg("--print-data-base")
            .arg("--just-print")
            .arg("-C")
            .arg(makefile.exec_dir())
            .arg("-f")
            .arg(&makefile.file_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Io(io::Error::other("make stdout unavailable")))?;
        let iterator: TargetIterator =
            pipeline::target_iterator(BufReader::new(stdout), makefile, self.mode)?;
        Ok(TargetListing::new(iterator, child))
    }

    /// target_listing_file locates the cached listing for one
    /// makefile.
    pub fn target_listing_file(&self, makefile: &Makefile) -> PathBuf {
        self.storage
            .target_listing
            .join(cache_file_name(&makefile.path(), "json"))
    }

    /// update_target_listing_file refreshes the cached JSON target
    /// listing for one makefile.
    pub fn update_target_listing_file(&self, makefile: &Makefile) -> Result<PathBuf, PipelineError> {
        self.storage.ensure()?;

        let mut listing: TargetListing = self.target_listing(makefile)?;
        let mut targets: Vec<Target> = Vec::new();

        loop {
            listing.advance()?;

            match listing.current() {
                Some(target) => targets.push(target.clone()),
                None => break,
            }
        }

        listing.finish()?;

        let path: PathBuf = self.target_listing_file(makefile);
        let json: String =
            serde_json::to_string_pretty(&targets).map_err(|err| PipelineError::Io(io::Error::other(err)))?;
        fs::write(&path, json)?;
        info!(listing = %path.display(), count = targets.len(), "updated target listing");
        Ok(path)
    }

    /// read_target_listing loads the cached listing for one makefile,
    /// when present.
    pub fn read_target_listing(
        &self,
        makefile: &Makefile,
    ) -> Result<Option<Vec<Target>>, PipelineError> {
        let path: PathBuf = self.target_listing_file(makefile);

        if !path.is_file() {
            return Ok(None);
        }

        let text: String = fs::read_to_string(&path)?;
        let targets: Vec<Target> =
            serde_json::from_str(&text).map_err(|err| PipelineError::Io(io::Error::other(err)))?;
        Ok(Some(targets))
    }

    /// nested_rule_text renders the parent makefile forwarding every
    /// nested target into its own subdirectory.
    pub fn nested_rule_text(&self, dir: &Path) -> Result<String, PipelineError> {
        let root: PathBuf = fs::canonicalize(dir).map_err(|err| PipelineError::locator(dir, err))?;

        let mut makefiles: Vec<Makefile> = Vec::new();
        let mut found = self.nested_makefiles(&root)?;

        loop {
            found.advance()?;

            match found.current() {
                Some(makefile) => makefiles.push(makefile.clone()),
                None => break,
            }
        }

        let listings: Vec<TargetListing> = makefiles
            .iter()
            .map(|makefile| self.target_listing(makefile))
            .collect::<Result<Vec<TargetListing>, PipelineError>>()?;

        let mut targets = IteratorConcatenator::new(ListIterator::new(listings));
        let mut text: String = String::new();

        loop {
            targets.advance()?;

            let target: &Target = match targets.current() {
                Some(target) => target,
                None => break,
            };

            if let Some(rule) = forwarding_rule(&root, target) {
                text.push_str(&rule);
            }
        }

        for makefile in &makefiles {
            text.push_str(&catch_all_rule(&root, makefile));
        }

        Ok(text)
    }

    /// update_nested_rule_file refreshes the generated nested-rule
    /// makefile for a directory tree.
    pub fn update_nested_rule_file(&self, dir: &Path) -> Result<PathBuf, PipelineError> {
        self.storage.ensure()?;

        let text: String = self.nested_rule_text(dir)?;
        let path: PathBuf = self
            .storage
            .nested_rule
            .join(cache_file_name(&fs::canonicalize(dir).map_err(|err| PipelineError::locator(dir, err))?, "mk"));
        fs::write(&path, text)?;
        info!(rules = %path.display(), "updated nested rule file");
        Ok(path)
    }

    /// run_make executes the real make with the user's arguments plus
    /// the generated rule file.
    ///
    /// Passing any `-f` suppresses make's default makefile search, so
    /// when the user supplied none, the best makefile in the
    /// execution directory is passed explicitly ahead of the rule
    /// file to keep its first target the default goal.
    pub fn run_make(&self, args: &[String], rule_file: &Path) -> Result<ExitStatus, PipelineError> {
        let mut command: Command = Command::new(&self.executable);

        if !has_file_argument(args) {
            let exec_dir: PathBuf = execution_directory(args)?;
            let locator = FlatMakefileLocator::new(FilenamePriorities::from_list(&GNU_MAKEFILE_NAMES));
            let mut found = locator.makefiles(&exec_dir)?;
            found.advance()?;

            if let Some(makefile) = found.current() {
                command.arg("-f").arg(&makefile.file_path);
            } else {
                warn!(
                    directory = %exec_dir.display(),
                    "no makefile in execution directory; running with generated rules only"
                );
            }
        }

        command.arg("-f").arg(rule_file);
        command.args(args);

        debug!(executable = %self.executable, "running make");
        Ok(command.status()?)
    }
}

fn has_file_argument(args: &[String]) -> bool {
    args.iter().any(|arg| {
        arg == "-f"
            || arg == "--file"
            || arg == "--makefile"
            || arg.starts_with("--file=")
            || arg.starts_with("--makefile=")
            || (arg.starts_with("-f") && arg.len() > 2)
    })
}

fn rule_subdir(root: &Path, makefile: &Makefile) -> String {
    match makefile.exec_dir().strip_prefix(root) {
        Ok(relative) => relative.display().to_string(),
        Err(_) => makefile.exec_dir().display().to_string(),
    }
}

/// forwarding_rule renders one rule forwarding a nested target into
/// its subdirectory. Special targets (.PHONY and friends) define no
/// forwardable work and yield nothing.
fn forwarding_rule(root: &Path, target: &Target) -> Option<String> {
    if target.path.starts_with('.') {
        return None;
    }

    let subdir: String = rule_subdir(root, &target.makefile);

    let mut rule: String = String::new();
    let _ = writeln!(rule, "{}/{}:", subdir, target.path);
    let _ = writeln!(
        rule,
        "\t$(MAKE) -C {} -f {} {}",
        subdir, target.makefile.file_path, target.path
    );
    let _ = writeln!(rule);
    Some(rule)
}

/// catch_all_rule renders the pattern rule forwarding any target not
/// named in a nested makefile's listing into its subdirectory.
fn catch_all_rule(root: &Path, makefile: &Makefile) -> String {
    let subdir: String = rule_subdir(root, makefile);

    let mut rule: String = String::new();
    let _ = writeln!(rule, "{}/%:", subdir);
    let _ = writeln!(
        rule,
        "\t$(MAKE) -C {} -f {} $*",
        subdir, makefile.file_path
    );
    let _ = writeln!(rule);
    rule
}

#[test]
fn test_normalize_path() {
    assert_eq!(
        normalize_path(Path::new("/etc/../usr")),
        PathBuf::from("/usr")
    );
    assert_eq!(
        normalize_path(Path::new("/a/./b/c/..")),
        PathBuf::from("/a/b")
    );
    assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));
}

#[test]
fn test_execution_directory() {
    let cwd: PathBuf = std::env::current_dir().unwrap();

    let args = |text: &str| -> Vec<String> {
        text.split_whitespace().map(|arg| arg.to_string()).collect()
    };

    assert_eq!(execution_directory(&args("-h")).unwrap(), cwd);
    assert_eq!(execution_directory(&args("-f Makefile -np")).unwrap(), cwd);
    assert_eq!(
        execution_directory(&args("-f Makefile -np -C /etc/usr")).unwrap(),
        PathBuf::from("/etc/usr")
    );
    assert_eq!(
        execution_directory(&args("-f Makefile -np -C / --directory etc --directory=usr"))
            .unwrap(),
        PathBuf::from("/etc/usr")
    );
    assert_eq!(
        execution_directory(&args(
            "-f Makefile -np -C / --directory etc -C .. --directory=usr"
        ))
        .unwrap(),
        PathBuf::from("/usr")
    );
    assert_eq!(
        execution_directory(&args("-C sub/project")).unwrap(),
        normalize_path(&cwd.join("sub/project"))
    );
    assert!(matches!(
        execution_directory(&args("-f Makefile -np -C")),
        Err(PipelineError::InvalidArguments(_))
    ));
}

#[test]
fn test_forwarding_rule() {
    let target: Target = Target {
        path: "all".to_string(),
        prerequisites: vec!["main.o".to_string()],
        order_only_prerequisites: Vec::new(),
        recipe_lines: vec!["cc -o all main.o".to_string()],
        makefile: Makefile::new("/work/project/sub1", "Makefile"),
    };

    let rule: String = forwarding_rule(Path::new("/work/project"), &target).unwrap();
    assert_eq!(rule, "sub1/all:\n\t$(MAKE) -C sub1 -f Makefile all\n\n");
}

#[test]
fn test_catch_all_rule() {
    let makefile: Makefile = Makefile::new("/work/project/sub1", "Makefile");
    let rule: String = catch_all_rule(Path::new("/work/project"), &makefile);
    assert_eq!(rule, "sub1/%:\n\t$(MAKE) -C sub1 -f Makefile $*\n\n");
}

#[test]
fn test_forwarding_rule_skips_special_targets() {
    let target: Target = Target {
        path: ".PHONY".to_string(),
        prerequisites: vec!["all".to_string()],
        order_only_prerequisites: Vec::new(),
        recipe_lines: Vec::new(),
        makefile: Makefile::new("/work/project/sub1", "Makefile"),
    };

    assert!(forwarding_rule(Path::new("/work/project"), &target).is_none());
}

#[test]
fn test_has_file_argument() {
    let args = |text: &str| -> Vec<String> {
        text.split_whitespace().map(|arg| arg.to_string()).collect()
    };

    assert!(has_file_argument(&args("-f Makefile")));
    assert!(has_file_argument(&args("--file=Makefile")));
    assert!(has_file_argument(&args("-fMakefile")));
    assert!(!has_file_argument(&args("-C sub all")));
}
