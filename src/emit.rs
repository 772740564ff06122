//! emit turns parsed rule contexts into Target values.

use crate::data::{Makefile, Target};
use crate::error::PipelineError;
use crate::grammar::{MakefileRuleContext, MakefileRuleParser};
use crate::iter::PullIterator;
use crate::stream::TokenStream;

/// trim_recipe_line strips at most one trailing tab, then at most one
/// trailing newline. No other characters change.
pub fn trim_recipe_line(line: &str) -> String {
    let mut end: usize = line.len();

    if line[..end].ends_with('\t') {
        end -= 1;
    }

    if line[..end].ends_with('\n') {
        end -= 1;
    }

    line[..end].to_string()
}

/// build_target synthesizes the target at `index` within a rule
/// context, copying identifier text eagerly and attaching the owning
/// makefile. `index` must be within the context's target list.
pub fn build_target(context: &MakefileRuleContext, index: usize, makefile: &Makefile) -> Target {
    Target {
        path: context.targets[index].clone(),
        prerequisites: context.prerequisites.clone(),
        order_only_prerequisites: context.order_only_prerequisites.clone(),
        recipe_lines: context
            .recipe_lines
            .iter()
            .map(|line| trim_recipe_line(line))
            .collect(),
        makefile: makefile.clone(),
    }
}

/// RuleTargetIterator pulls rule contexts from the parser and emits
/// one Target per (context, target-index) pair, in header order.
///
/// The grammar's ParseCancelled signal marks end of input; it is
/// caught here and never reaches the caller.
pub struct RuleTargetIterator<S> {
    parser: MakefileRuleParser<S>,
    makefile: Makefile,
    context: Option<MakefileRuleContext>,
    index: usize,
    target: Option<Target>,
    ended: bool,
}

impl<S: TokenStream> RuleTargetIterator<S> {
    /// new constructs a RuleTargetIterator in start state.
    pub fn new(parser: MakefileRuleParser<S>, makefile: Makefile) -> RuleTargetIterator<S> {
        RuleTargetIterator {
            parser,
            makefile,
            context: None,
            index: 0,
            target: None,
            ended: false,
        }
    }

    fn generate_target(&mut self) {
        if let Some(context) = &self.context {
            self.target = Some(build_target(context, self.index, &self.makefile));
        }
    }

    fn next_context(&mut self) -> Result<(), PipelineError> {
        loop {
            match self.parser.declaration() {
                Ok(Some(context)) => {
                    self.context = Some(context);
                    self.index = 0;
                    self.generate_target();
                    return Ok(());
                }
                Ok(None) => continue,
                Err(err) if err.is_parse_cancelled() => {
                    self.context = None;
                    self.target = None;
                    self.ended = true;
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<S: TokenStream> PullIterator for RuleTargetIterator<S> {
    type Item = Target;

    fn current(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    fn current_mut(&mut self) -> Option<&mut Target> {
        self.target.as_mut()
    }

    fn at_start(&self) -> bool {
        self.target.is_none() && !self.ended
    }

    fn at_end(&self) -> bool {
        self.ended
    }

    fn advance(&mut self) -> Result<(), PipelineError> {
        if self.ended {
            return Ok(());
        }

        let fan_out: bool = match &self.context {
            Some(context) => self.index + 1 < context.targets.len(),
            None => false,
        };

        if fan_out {
            self.index += 1;
            self.generate_target();
            return Ok(());
        }

        self.next_context()
    }
}

#[test]
fn test_trim_recipe_line() {
    assert_eq!(trim_recipe_line("touch $@\n"), "touch $@");
    assert_eq!(trim_recipe_line("touch $@\n\t"), "touch $@");
    assert_eq!(trim_recipe_line("touch $@"), "touch $@");
    assert_eq!(trim_recipe_line("\n\t"), "");
    assert_eq!(trim_recipe_line("\n"), "");
    assert_eq!(trim_recipe_line(""), "");

    // Only one of each is removed, and nothing else changes.
    assert_eq!(trim_recipe_line("x\n\n"), "x\n");
    assert_eq!(trim_recipe_line("x\t\n"), "x\t");
    assert_eq!(trim_recipe_line("x \\\n\t"), "x \\");
    assert_eq!(trim_recipe_line("x\r\n"), "x\r");
}

#[cfg(test)]
fn target_iterator_over(
    text: &str,
    makefile: &Makefile,
) -> RuleTargetIterator<crate::stream::VecTokenStream> {
    let mut lexer =
        crate::grammar::MakefileRuleLexer::new(crate::stream::StringCharStream::new(text));
    let stream = crate::stream::VecTokenStream::from_source(&mut lexer).unwrap();
    RuleTargetIterator::new(MakefileRuleParser::new(stream), makefile.clone())
}

#[test]
fn test_multi_target_fan_out() {
    let makefile: Makefile = Makefile::new("/work", "Makefile");
    let it = target_iterator_over("a b c: d | e\n", &makefile);
    let targets: Vec<Target> = crate::iter::Items::new(it)
        .map(|item| item.unwrap())
        .collect();

    assert_eq!(targets.len(), 3);

    for (target, path) in targets.iter().zip(["a", "b", "c"]) {
        assert_eq!(target.path, path);
        assert_eq!(target.prerequisites, vec!["d"]);
        assert_eq!(target.order_only_prerequisites, vec!["e"]);
        assert!(target.recipe_lines.is_empty());
        assert_eq!(target.makefile, makefile);
    }
}

#[test]
fn test_backslash_continuation_rule_target() {
    let makefile: Makefile = Makefile::new("/work", "Makefile");
    let text =
        "next/target : next\\ source\\\nanother-source\\\n\t and-another-source;|:recipes!!;; # Oh\tboy!\n";
    let it = target_iterator_over(text, &makefile);
    let targets: Vec<Target> = crate::iter::Items::new(it)
        .map(|item| item.unwrap())
        .collect();

    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].path, "next/target");
    assert_eq!(
        targets[0].prerequisites,
        vec!["next\\ source", "another-source", "and-another-source"]
    );
    assert!(targets[0].order_only_prerequisites.is_empty());
    assert_eq!(targets[0].recipe_lines, vec!["|:recipes!!;; # Oh\tboy!"]);
}

#[test]
fn test_recipe_lines_trimmed() {
    let makefile: Makefile = Makefile::new("/work", "Makefile");
    let it = target_iterator_over("objdir:\n\tmkdir $(OBJDIR)\n\ttouch stamp\n", &makefile);
    let targets: Vec<Target> = crate::iter::Items::new(it)
        .map(|item| item.unwrap())
        .collect();

    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].path, "objdir");
    assert_eq!(targets[0].recipe_lines, vec!["mkdir $(OBJDIR)", "touch stamp"]);
}

#[test]
fn test_emitter_state_walk() {
    let makefile: Makefile = Makefile::new("/work", "Makefile");
    let mut it = target_iterator_over("\n\na: b\n\nc: d\n", &makefile);

    assert!(it.at_start());
    it.advance().unwrap();
    assert_eq!(it.current().unwrap().path, "a");
    it.advance().unwrap();
    assert_eq!(it.current().unwrap().path, "c");
    it.advance().unwrap();
    assert!(it.at_end());
    it.advance().unwrap();
    assert!(it.at_end());
}

#[test]
fn test_emitter_empty_input() {
    let makefile: Makefile = Makefile::new("/work", "Makefile");
    let mut it = target_iterator_over("", &makefile);
    assert!(it.at_start());
    it.advance().unwrap();
    assert!(it.at_end());
}
