//! pipeline assembles the make database parse stages into target
//! iterators.
//!
//! One stage catalogue, three assemblies: the buffered assembly
//! drains each intermediate stage into memory before feeding the
//! next, the streaming assembly wraps every stage boundary in a
//! markable adapter so memory stays bounded by lookahead, and the
//! balanced assembly streams the large dump through paragraph lexing
//! while buffering each small paragraph. All three produce identical
//! target sequences.

extern crate tracing;

use crate::data::{Makefile, Target};
use crate::emit::RuleTargetIterator;
use crate::error::PipelineError;
use crate::filters::{DatabaseSectionFilter, FileSectionFilter, InformationalCommentFilter};
use crate::grammar::{MakefileRuleLexer, MakefileRuleParser, TargetParagraphLexer};
use crate::iter::{ConditionFilter, PullIterator};
use crate::line::{FileLineIterator, LineToCharIterator};
use crate::stream::{
    IteratorToCharStreamAdapter, IteratorToTokenStreamAdapter, StringCharStream,
    TokenSourceToIteratorAdapter, TokenToCharIterator, VecTokenStream,
};
use std::io::BufRead;
use tracing::debug;

/// PipelineMode selects a pipeline assembly.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PipelineMode {
    /// Buffered drains each stage into memory; lowest constant
    /// overhead.
    Buffered,

    /// Streaming bounds memory by lookahead at every stage boundary.
    Streaming,

    /// Balanced streams the dump and buffers each paragraph.
    Balanced,
}

impl PipelineMode {
    /// from_optimization maps a command-line optimization choice to
    /// an assembly: `time` buffers, `memory` streams, `balanced`
    /// mixes.
    pub fn from_optimization(name: &str) -> Option<PipelineMode> {
        match name {
            "time" => Some(PipelineMode::Buffered),
            "memory" => Some(PipelineMode::Streaming),
            "balanced" => Some(PipelineMode::Balanced),
            _ => None,
        }
    }
}

/// TargetIterator is the pipeline's boxed output: a lazy sequence of
/// targets in input order.
pub type TargetIterator = Box<dyn PullIterator<Item = Target>>;

/// section_chars builds the shared front of every assembly: raw dump
/// lines, gated down to the file definition section, stripped of
/// informational comments, flattened to characters.
fn section_chars<R: BufRead + 'static>(reader: R) -> impl PullIterator<Item = char> + 'static {
    let lines = FileLineIterator::new(reader);
    let database_section = ConditionFilter::new(lines, DatabaseSectionFilter::new());
    let file_section = ConditionFilter::new(database_section, FileSectionFilter::new());
    let no_comments = ConditionFilter::new(file_section, InformationalCommentFilter::new());
    LineToCharIterator::new(no_comments)
}

fn drain_chars<I: PullIterator<Item = char>>(mut source: I) -> Result<String, PipelineError> {
    let mut text: String = String::new();

    if source.at_start() {
        source.advance()?;
    }

    loop {
        let c: char = match source.current() {
            Some(c) => *c,
            None => break,
        };

        text.push(c);
        source.advance()?;
    }

    Ok(text)
}

/// target_iterator assembles the parse pipeline for one makefile's
/// database dump.
pub fn target_iterator<R: BufRead + 'static>(
    reader: R,
    makefile: &Makefile,
    mode: PipelineMode,
) -> Result<TargetIterator, PipelineError> {
    debug!(?mode, makefile = %makefile.path().display(), "assembling parse pipeline");

    match mode {
        PipelineMode::Buffered => buffered_target_iterator(reader, makefile),
        PipelineMode::Streaming => streaming_target_iterator(reader, makefile),
        PipelineMode::Balanced => balanced_target_iterator(reader, makefile),
    }
}

fn buffered_target_iterator<R: BufRead + 'static>(
    reader: R,
    makefile: &Makefile,
) -> Result<TargetIterator, PipelineError> {
    let section_text: String = drain_chars(section_chars(reader))?;
    let paragraph_lexer = TargetParagraphLexer::new(StringCharStream::new(&section_text));
    let paragraph_tokens = TokenSourceToIteratorAdapter::new(paragraph_lexer);
    let paragraph_text: String = drain_chars(TokenToCharIterator::new(paragraph_tokens))?;
    let mut rule_lexer = MakefileRuleLexer::new(StringCharStream::new(&paragraph_text));
    let tokens: VecTokenStream = VecTokenStream::from_source(&mut rule_lexer)?;
    let parser = MakefileRuleParser::new(tokens);
    Ok(Box::new(RuleTargetIterator::new(parser, makefile.clone())))
}

fn streaming_target_iterator<R: BufRead + 'static>(
    reader: R,
    makefile: &Makefile,
) -> Result<TargetIterator, PipelineError> {
    let section = IteratorToCharStreamAdapter::new(section_chars(reader))?;
    let paragraph_lexer = TargetParagraphLexer::new(section);
    let paragraph_tokens = TokenSourceToIteratorAdapter::new(paragraph_lexer);
    let paragraph_chars = TokenToCharIterator::new(paragraph_tokens);
    let paragraphs = IteratorToCharStreamAdapter::new(paragraph_chars)?;
    let rule_lexer = MakefileRuleLexer::new(paragraphs);
    let rule_tokens = TokenSourceToIteratorAdapter::new(rule_lexer);
    let tokens = IteratorToTokenStreamAdapter::new(rule_tokens)?;
    let parser = MakefileRuleParser::new(tokens);
    Ok(Box::new(RuleTargetIterator::new(parser, makefile.clone())))
}

fn balanced_target_iterator<R: BufRead + 'static>(
    reader: R,
    makefile: &Makefile,
) -> Result<TargetIterator, PipelineError> {
    let section = IteratorToCharStreamAdapter::new(section_chars(reader))?;
    let paragraph_lexer = TargetParagraphLexer::new(section);
    let paragraph_tokens = TokenSourceToIteratorAdapter::new(paragraph_lexer);
    let paragraph_text: String = drain_chars(TokenToCharIterator::new(paragraph_tokens))?;
    let mut rule_lexer = MakefileRuleLexer::new(StringCharStream::new(&paragraph_text));
    let tokens: VecTokenStream = VecTokenStream::from_source(&mut rule_lexer)?;
    let parser = MakefileRuleParser::new(tokens);
    Ok(Box::new(RuleTargetIterator::new(parser, makefile.clone())))
}

#[cfg(test)]
const SAMPLE_DUMP: &str = "\
make: Entering directory '/work/project'
echo building
# Files
# GNU Make 4.3
# Built for x86_64-pc-linux-gnu
# Pattern-specific Variable Values

# No pattern-specific variable values.

# Variables

# automatic
<D = $(patsubst %/,%,$(dir $<))
# environment
HOME = /home/build

# Files

# Not a target:
Makefile:
#  Implicit rule search has been done.
#  File has not been updated.

objdir/bar.o: src/bar.c | objdir
#  Implicit rule search has not been done.
#  Last modified 2024-01-01 00:00:00
	touch $@

all: objdir/foo.o objdir/bar.o
#  Phony target (prerequisite of .PHONY).

a b c: d | e

objdir:
	mkdir $(OBJDIR)
	touch \\
	stamp

# Not a target:
src/bar.c:

# files hash-table stats:
# Load=8/1024=1%, Rehash=0, Collisions=0/15=0%
";

#[cfg(test)]
fn collect_targets(mode: PipelineMode) -> Vec<Target> {
    let makefile: Makefile = Makefile::new("/work/project", "Makefile");
    let reader = std::io::Cursor::new(SAMPLE_DUMP);
    let it: TargetIterator = target_iterator(reader, &makefile, mode).unwrap();
    crate::iter::Items::new(it).map(|item| item.unwrap()).collect()
}

#[test]
fn test_buffered_assembly_extracts_targets() {
    let targets: Vec<Target> = collect_targets(PipelineMode::Buffered);
    let paths: Vec<&str> = targets.iter().map(|target| target.path.as_str()).collect();
    assert_eq!(paths, vec!["objdir/bar.o", "all", "a", "b", "c", "objdir"]);

    assert_eq!(targets[0].prerequisites, vec!["src/bar.c"]);
    assert_eq!(targets[0].order_only_prerequisites, vec!["objdir"]);
    assert_eq!(targets[0].recipe_lines, vec!["touch $@"]);

    assert_eq!(
        targets[1].prerequisites,
        vec!["objdir/foo.o", "objdir/bar.o"]
    );
    assert!(targets[1].order_only_prerequisites.is_empty());
    assert!(targets[1].recipe_lines.is_empty());

    for target in &targets[2..5] {
        assert_eq!(target.prerequisites, vec!["d"]);
        assert_eq!(target.order_only_prerequisites, vec!["e"]);
        assert!(target.recipe_lines.is_empty());
    }

    assert_eq!(
        targets[5].recipe_lines,
        vec!["mkdir $(OBJDIR)", "touch \\", "stamp"]
    );
}

#[test]
fn test_assemblies_are_equivalent() {
    let buffered: Vec<Target> = collect_targets(PipelineMode::Buffered);
    let streaming: Vec<Target> = collect_targets(PipelineMode::Streaming);
    let balanced: Vec<Target> = collect_targets(PipelineMode::Balanced);
    assert_eq!(buffered, streaming);
    assert_eq!(buffered, balanced);
}

#[test]
fn test_premature_file_anchor_is_gated() {
    // A recipe echo equal to the file section anchor appears before
    // the database dump; the database filter keeps it away from the
    // file section filter.
    let targets: Vec<Target> = collect_targets(PipelineMode::Streaming);
    assert!(targets.iter().all(|target| target.path != "# GNU Make 4.3"));
    assert_eq!(targets.len(), 6);
}

#[test]
fn test_targets_attach_makefile() {
    let makefile: Makefile = Makefile::new("/work/project", "Makefile");
    let targets: Vec<Target> = collect_targets(PipelineMode::Balanced);
    assert!(targets.iter().all(|target| target.makefile == makefile));
}

#[test]
fn test_optimization_names() {
    assert_eq!(
        PipelineMode::from_optimization("time"),
        Some(PipelineMode::Buffered)
    );
    assert_eq!(
        PipelineMode::from_optimization("memory"),
        Some(PipelineMode::Streaming)
    );
    assert_eq!(
        PipelineMode::from_optimization("balanced"),
        Some(PipelineMode::Balanced)
    );
    assert_eq!(PipelineMode::from_optimization("fast"), None);
}
