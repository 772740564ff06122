//! filters selects the target-definition region of a make database
//! dump.
//!
//! Each filter is a stateful acceptor for ConditionFilter: it is
//! shown each line, steps a transition table keyed on anchor-line
//! matches, and is then queried for a forwarding verdict.

extern crate lazy_static;
extern crate regex;

use crate::iter::Condition;
use crate::line::Line;

/// DATABASE_ANCHOR opens the database dump in `make -np` output.
///
/// `make -np` prints recipes before the database itself, so the
/// anchor is a line that appears only inside the database dump and
/// never in recipe text.
pub const DATABASE_ANCHOR: &str = "# Pattern-specific Variable Values";

/// FILE_SECTION_START opens the file definition section.
pub const FILE_SECTION_START: &str = "# Files";

/// FILE_SECTION_END terminates the file definition section.
pub const FILE_SECTION_END: &str = "# files hash-table stats:";

lazy_static::lazy_static! {
    /// INFORMATIONAL_PATTERN matches make's verbose explanatory
    /// comments: a hash followed by two spaces. Target-defining
    /// comments use a single space and pass through.
    pub static ref INFORMATIONAL_PATTERN: regex::Regex = regex::Regex::new(r"^#  ").unwrap();
}

/// DatabaseSectionFilter drops every line preceding the database
/// dump.
///
/// Two states: suppressing (initial) and forwarding. The anchor line
/// switches to forwarding, where the filter stays for the rest of the
/// run. The anchor itself is forwarded.
pub struct DatabaseSectionFilter {
    forwarding: bool,
}

impl DatabaseSectionFilter {
    /// new constructs a DatabaseSectionFilter in suppressing state.
    pub fn new() -> DatabaseSectionFilter {
        DatabaseSectionFilter { forwarding: false }
    }
}

impl Default for DatabaseSectionFilter {
    /// default generates a suppressing DatabaseSectionFilter.
    fn default() -> Self {
        DatabaseSectionFilter::new()
    }
}

impl Condition<Line> for DatabaseSectionFilter {
    fn observe(&mut self, item: &Line) {
        if item.content() == DATABASE_ANCHOR {
            self.forwarding = true;
        }
    }

    fn verdict(&self) -> bool {
        self.forwarding
    }
}

/// FileSectionState enumerates the file-section filter's states.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FileSectionState {
    /// Suppress precedes the section start anchor.
    Suppress,

    /// Armed follows the start anchor; the anchor line itself is not
    /// forwarded.
    Armed,

    /// Forward is inside the section.
    Forward,

    /// Finished follows the end anchor and is terminal, so a later
    /// spurious start anchor in user content cannot reopen the
    /// section.
    Finished,
}

/// FileSectionFilter keeps only the lines strictly between the file
/// section anchors.
pub struct FileSectionFilter {
    state: FileSectionState,
}

impl FileSectionFilter {
    /// new constructs a FileSectionFilter in suppressing state.
    pub fn new() -> FileSectionFilter {
        FileSectionFilter {
            state: FileSectionState::Suppress,
        }
    }
}

impl Default for FileSectionFilter {
    /// default generates a suppressing FileSectionFilter.
    fn default() -> Self {
        FileSectionFilter::new()
    }
}

impl Condition<Line> for FileSectionFilter {
    fn observe(&mut self, item: &Line) {
        use FileSectionState::*;

        let content: &str = item.content();

        self.state = if content == FILE_SECTION_START {
            match self.state {
                Suppress => Armed,
                Armed => Forward,
                Forward => Forward,
                Finished => Finished,
            }
        } else if content == FILE_SECTION_END {
            match self.state {
                Suppress => Suppress,
                Armed => Suppress,
                Forward => Finished,
                Finished => Finished,
            }
        } else {
            match self.state {
                Suppress => Suppress,
                Armed => Forward,
                Forward => Forward,
                Finished => Finished,
            }
        };
    }

    fn verdict(&self) -> bool {
        self.state == FileSectionState::Forward
    }
}

/// InformationalCommentFilter drops make's verbose explanatory
/// comments.
///
/// Line-local: the verdict depends only on the most recent line.
pub struct InformationalCommentFilter {
    forwarding: bool,
}

impl InformationalCommentFilter {
    /// new constructs an InformationalCommentFilter in forwarding
    /// state.
    pub fn new() -> InformationalCommentFilter {
        InformationalCommentFilter { forwarding: true }
    }
}

impl Default for InformationalCommentFilter {
    /// default generates a forwarding InformationalCommentFilter.
    fn default() -> Self {
        InformationalCommentFilter::new()
    }
}

impl Condition<Line> for InformationalCommentFilter {
    fn observe(&mut self, item: &Line) {
        self.forwarding = !INFORMATIONAL_PATTERN.is_match(item.content());
    }

    fn verdict(&self) -> bool {
        self.forwarding
    }
}

#[cfg(test)]
fn run_filter<C: Condition<Line>>(condition: C, lines: &[&str]) -> Vec<String> {
    let items: Vec<Line> = lines.iter().map(|line| Line::new(line).unwrap()).collect();
    let source = crate::iter::ListIterator::new(items);
    let filter = crate::iter::ConditionFilter::new(source, condition);
    crate::iter::Items::new(filter)
        .map(|item| item.unwrap().content().to_string())
        .collect()
}

#[test]
fn test_database_section_filter() {
    let output: Vec<String> = run_filter(
        DatabaseSectionFilter::new(),
        &[
            "recipe echo",
            "# Files",
            DATABASE_ANCHOR,
            "# Files",
            "all: foo",
        ],
    );
    assert_eq!(output, vec![DATABASE_ANCHOR, "# Files", "all: foo"]);
}

#[test]
fn test_file_section_filter_brackets() {
    let output: Vec<String> = run_filter(
        FileSectionFilter::new(),
        &[
            "# Variables",
            FILE_SECTION_START,
            "all: foo",
            "\ttouch all",
            FILE_SECTION_END,
            "junk",
        ],
    );
    assert_eq!(output, vec!["all: foo", "\ttouch all"]);
}

#[test]
fn test_file_section_filter_is_terminal() {
    let output: Vec<String> = run_filter(
        FileSectionFilter::new(),
        &[
            FILE_SECTION_START,
            "all: foo",
            FILE_SECTION_END,
            FILE_SECTION_START,
            "not forwarded",
        ],
    );
    assert_eq!(output, vec!["all: foo"]);
}

#[test]
fn test_file_section_start_anchor_not_forwarded() {
    let output: Vec<String> = run_filter(FileSectionFilter::new(), &[FILE_SECTION_START, "x"]);
    assert_eq!(output, vec!["x"]);
}

#[test]
fn test_informational_comment_filter() {
    let output: Vec<String> = run_filter(
        InformationalCommentFilter::new(),
        &[
            "#  Implicit rule search has not been done.",
            "# Not a target:",
            "all: foo",
            "#  Phony target (prerequisite of .PHONY).",
            "\ttouch all",
        ],
    );
    assert_eq!(output, vec!["# Not a target:", "all: foo", "\ttouch all"]);
}

#[cfg(test)]
fn run_filter_twice<C: Condition<Line>>(mut condition: C, lines: &[&str]) -> Vec<String> {
    // Two chained condition filters driving one shared acceptor: the
    // outer filter re-observes every line the inner filter forwards.
    let mut output: Vec<String> = Vec::new();

    for line in lines {
        let item: Line = Line::new(line).unwrap();
        condition.observe(&item);

        if condition.verdict() {
            condition.observe(&item);

            if condition.verdict() {
                output.push(item.content().to_string());
            }
        }
    }

    output
}

#[test]
fn test_filter_idempotence() {
    let lines: Vec<&str> = vec![
        "junk",
        DATABASE_ANCHOR,
        FILE_SECTION_START,
        "#  informational",
        "all: foo",
        FILE_SECTION_END,
        "tail",
    ];

    assert_eq!(
        run_filter(DatabaseSectionFilter::new(), &lines),
        run_filter_twice(DatabaseSectionFilter::new(), &lines)
    );
    assert_eq!(
        run_filter(FileSectionFilter::new(), &lines),
        run_filter_twice(FileSectionFilter::new(), &lines)
    );
    assert_eq!(
        run_filter(InformationalCommentFilter::new(), &lines),
        run_filter_twice(InformationalCommentFilter::new(), &lines)
    );
}
