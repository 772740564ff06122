//! data models makefiles and their targets.

extern crate serde;

use self::serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Makefile locates one makefile: the absolute directory in which
/// make would run, and the filename relative to it.
///
/// Equality is structural.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Makefile {
    /// exec_path denotes the absolute execution directory.
    pub exec_path: PathBuf,

    /// file_path denotes the makefile name relative to exec_path.
    pub file_path: String,
}

impl Makefile {
    /// new constructs a Makefile descriptor.
    pub fn new<P: Into<PathBuf>>(exec_path: P, file_path: &str) -> Makefile {
        Makefile {
            exec_path: exec_path.into(),
            file_path: file_path.to_string(),
        }
    }

    /// path joins the execution directory with the makefile name.
    pub fn path(&self) -> PathBuf {
        self.exec_path.join(&self.file_path)
    }

    /// exec_path borrows the execution directory.
    pub fn exec_dir(&self) -> &Path {
        &self.exec_path
    }
}

/// Target is one extracted makefile target.
///
/// Targets are value objects: identifier text is copied out of the
/// parser eagerly, so a Target stays valid after its pipeline is
/// gone.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Target {
    /// path denotes the target name as written in the rule header.
    pub path: String,

    /// prerequisites collects normal prerequisites, in rule order,
    /// duplicates allowed.
    pub prerequisites: Vec<String>,

    /// order_only_prerequisites collects the prerequisites listed
    /// after `|`, in rule order.
    pub order_only_prerequisites: Vec<String>,

    /// recipe_lines collects recipe lines with the trailing tab and
    /// newline stripped.
    pub recipe_lines: Vec<String>,

    /// makefile denotes the makefile that owns this target.
    pub makefile: Makefile,
}

#[test]
fn test_makefile_equality() {
    let left: Makefile = Makefile::new("/work/project", "Makefile");
    let right: Makefile = Makefile::new("/work/project", "Makefile");
    let other: Makefile = Makefile::new("/work/project", "makefile");
    assert_eq!(left, right);
    assert_ne!(left, other);
    assert_eq!(left.path(), PathBuf::from("/work/project/Makefile"));
}

#[test]
fn test_target_serialization_round_trip() {
    let target: Target = Target {
        path: "objdir/bar.o".to_string(),
        prerequisites: vec!["src/bar.c".to_string()],
        order_only_prerequisites: vec!["objdir".to_string()],
        recipe_lines: vec!["touch $@".to_string()],
        makefile: Makefile::new("/work/project", "Makefile"),
    };

    let json: String = serde_json::to_string(&target).unwrap();
    let back: Target = serde_json::from_str(&json).unwrap();
    assert_eq!(target, back);
}
