//! grammar lexes and parses makefile rule text from `make -np`
//! database dumps.
//!
//! Two lexers and one parser work against the markable stream
//! contracts: TargetParagraphLexer splits the filtered file section
//! into per-target paragraphs, MakefileRuleLexer tokenizes rule
//! headers and recipes, and MakefileRuleParser assembles rule
//! contexts. End of input surfaces in-band as an EOF token from the
//! lexers and as ParseCancelled from the parser.

use crate::error::PipelineError;
use crate::stream::{CharStream, EOF, Token, TokenSource, TokenStream};

/// EOL tags a line break between declarations.
pub const EOL: i32 = 1;

/// IDENTIFIER tags a target or prerequisite name.
pub const IDENTIFIER: i32 = 2;

/// COLON tags the rule separator.
pub const COLON: i32 = 3;

/// PIPE tags the order-only prerequisite separator.
pub const PIPE: i32 = 4;

/// RECIPE_LINE tags one line of recipe text.
pub const RECIPE_LINE: i32 = 5;

/// PARAGRAPH tags one target paragraph.
pub const PARAGRAPH: i32 = 6;

/// NOT_A_TARGET_MARKER precedes non-target file entries in `make -np`
/// output.
pub const NOT_A_TARGET_MARKER: &str = "# Not a target:";

const NEWLINE: i32 = '\n' as i32;
const TAB: i32 = '\t' as i32;
const SPACE: i32 = ' ' as i32;
const HASH: i32 = '#' as i32;
const COLON_CHAR: i32 = ':' as i32;
const SEMICOLON_CHAR: i32 = ';' as i32;
const PIPE_CHAR: i32 = '|' as i32;
const BACKSLASH: i32 = '\\' as i32;

/// TargetParagraphLexer emits one PARAGRAPH token per target
/// paragraph in the filtered file section.
///
/// A paragraph is a maximal run of lines belonging to one rule plus
/// its recipe. A blank-line run ends the paragraph unless the next
/// non-blank line starts with a tab, in which case the recipe
/// continues and the blank lines belong to the paragraph. Paragraphs
/// carrying the `# Not a target:` marker describe files that are not
/// real targets and are dropped.
pub struct TargetParagraphLexer<S> {
    stream: S,
}

impl<S: CharStream> TargetParagraphLexer<S> {
    /// new constructs a TargetParagraphLexer over a character stream.
    pub fn new(stream: S) -> TargetParagraphLexer<S> {
        TargetParagraphLexer { stream }
    }

    fn skip_blank_lines(&mut self) -> Result<(), PipelineError> {
        while self.stream.la(1)? == NEWLINE {
            self.stream.consume()?;
        }

        Ok(())
    }

    fn read_line(&mut self) -> Result<(), PipelineError> {
        loop {
            let c: i32 = self.stream.la(1)?;

            if c == EOF {
                return Ok(());
            }

            self.stream.consume()?;

            if c == NEWLINE {
                return Ok(());
            }
        }
    }

    fn blank_run_continues_recipe(&mut self) -> Result<bool, PipelineError> {
        let marker: i32 = self.stream.mark();
        let outcome: Result<bool, PipelineError> = self.peek_past_blanks();
        self.stream.release(marker);
        outcome
    }

    fn peek_past_blanks(&mut self) -> Result<bool, PipelineError> {
        let origin: usize = self.stream.index();

        while self.stream.la(1)? == NEWLINE {
            self.stream.consume()?;
        }

        let verdict: bool = self.stream.la(1)? == TAB;
        self.stream.seek(origin as isize)?;
        Ok(verdict)
    }

    fn lex_paragraph(&mut self) -> Result<String, PipelineError> {
        let start: usize = self.stream.index();

        loop {
            self.read_line()?;
            let c: i32 = self.stream.la(1)?;

            if c == EOF {
                break;
            }

            if c == NEWLINE {
                if self.blank_run_continues_recipe()? {
                    self.skip_blank_lines()?;
                } else {
                    break;
                }
            }
        }

        let stop: usize = self.stream.index();
        self.stream.get_text(start, stop - 1)
    }

    fn names_real_target(text: &str) -> bool {
        !text.lines().any(|line| line == NOT_A_TARGET_MARKER)
    }
}

impl<S: CharStream> TokenSource for TargetParagraphLexer<S> {
    fn next_token(&mut self) -> Result<Token, PipelineError> {
        loop {
            self.skip_blank_lines()?;

            if self.stream.la(1)? == EOF {
                return Ok(Token::eof());
            }

            let marker: i32 = self.stream.mark();
            let outcome: Result<String, PipelineError> = self.lex_paragraph();
            self.stream.release(marker);
            let text: String = outcome?;

            if Self::names_real_target(&text) {
                return Ok(Token::new(PARAGRAPH, &text));
            }
        }
    }
}

/// MakefileRuleLexer tokenizes makefile rule text.
///
/// Identifiers accept backslash escapes (`\:`, `\ `, and so on) with
/// the backslashes kept in the token text. A backslash line
/// continuation in a rule header reads as whitespace. Recipe text is
/// entered after a `;` inline marker or a newline-tab pair; each
/// RECIPE_LINE token carries its trailing newline plus, when present,
/// the tab introducing the next recipe line. A recipe continuation
/// splits into separate RECIPE_LINE tokens at each escaped newline.
/// Comments are consumed silently.
pub struct MakefileRuleLexer<S> {
    stream: S,
    continuing_recipe: bool,
}

impl<S: CharStream> MakefileRuleLexer<S> {
    /// new constructs a MakefileRuleLexer over a character stream.
    pub fn new(stream: S) -> MakefileRuleLexer<S> {
        MakefileRuleLexer {
            stream,
            continuing_recipe: false,
        }
    }

    fn skip_comment(&mut self) -> Result<(), PipelineError> {
        loop {
            let c: i32 = self.stream.la(1)?;

            if c == EOF || c == NEWLINE {
                return Ok(());
            }

            self.stream.consume()?;
        }
    }

    fn text_since(&mut self, start: usize) -> Result<String, PipelineError> {
        let stop: usize = self.stream.index();

        if stop > start {
            self.stream.get_text(start, stop - 1)
        } else {
            Ok(String::new())
        }
    }

    fn identifier_token(&mut self) -> Result<Token, PipelineError> {
        let marker: i32 = self.stream.mark();
        let start: usize = self.stream.index();
        let outcome: Result<String, PipelineError> = self.lex_identifier(start);
        self.stream.release(marker);
        Ok(Token::new(IDENTIFIER, &outcome?))
    }

    fn lex_identifier(&mut self, start: usize) -> Result<String, PipelineError> {
        loop {
            let c: i32 = self.stream.la(1)?;

            if c == BACKSLASH {
                let next: i32 = self.stream.la(2)?;

                if next == NEWLINE {
                    break;
                }

                self.stream.consume()?;

                if next == EOF {
                    break;
                }

                self.stream.consume()?;
                continue;
            }

            if c == EOF
                || c == SPACE
                || c == TAB
                || c == NEWLINE
                || c == COLON_CHAR
                || c == SEMICOLON_CHAR
                || c == PIPE_CHAR
                || c == HASH
            {
                break;
            }

            self.stream.consume()?;
        }

        self.text_since(start)
    }

    fn recipe_line_token(&mut self) -> Result<Token, PipelineError> {
        let marker: i32 = self.stream.mark();
        let start: usize = self.stream.index();
        let outcome: Result<String, PipelineError> = self.lex_recipe_line(start);
        self.stream.release(marker);
        Ok(Token::new(RECIPE_LINE, &outcome?))
    }

    fn lex_recipe_line(&mut self, start: usize) -> Result<String, PipelineError> {
        loop {
            let c: i32 = self.stream.la(1)?;

            if c == EOF {
                break;
            }

            if c == BACKSLASH && self.stream.la(2)? == NEWLINE {
                self.stream.consume()?;
                self.stream.consume()?;

                if self.stream.la(1)? == TAB {
                    self.stream.consume()?;
                }

                self.continuing_recipe = true;
                break;
            }

            self.stream.consume()?;

            if c == NEWLINE {
                if self.stream.la(1)? == TAB {
                    self.stream.consume()?;
                    self.continuing_recipe = true;
                }

                break;
            }
        }

        self.text_since(start)
    }
}

impl<S: CharStream> TokenSource for MakefileRuleLexer<S> {
    fn next_token(&mut self) -> Result<Token, PipelineError> {
        loop {
            if self.continuing_recipe {
                self.continuing_recipe = false;
                return self.recipe_line_token();
            }

            let c: i32 = self.stream.la(1)?;

            if c == EOF {
                return Ok(Token::eof());
            }

            if c == NEWLINE {
                self.stream.consume()?;

                if self.stream.la(1)? == TAB {
                    self.stream.consume()?;
                    return self.recipe_line_token();
                }

                return Ok(Token::new(EOL, "\n"));
            }

            if c == SPACE || c == TAB {
                self.stream.consume()?;
                continue;
            }

            if c == HASH {
                self.skip_comment()?;
                continue;
            }

            if c == COLON_CHAR {
                self.stream.consume()?;
                return Ok(Token::new(COLON, ":"));
            }

            if c == PIPE_CHAR {
                self.stream.consume()?;
                return Ok(Token::new(PIPE, "|"));
            }

            if c == SEMICOLON_CHAR {
                self.stream.consume()?;
                return self.recipe_line_token();
            }

            if c == BACKSLASH && self.stream.la(2)? == NEWLINE {
                self.stream.consume()?;
                self.stream.consume()?;
                continue;
            }

            return self.identifier_token();
        }
    }
}

/// MakefileRuleContext is one parsed rule: target names, prerequisite
/// lists, and raw recipe line texts.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MakefileRuleContext {
    /// targets collects the rule's target names in header order.
    pub targets: Vec<String>,

    /// prerequisites collects normal prerequisites in header order.
    pub prerequisites: Vec<String>,

    /// order_only_prerequisites collects the prerequisites after `|`.
    pub order_only_prerequisites: Vec<String>,

    /// recipe_lines collects raw RECIPE_LINE texts, untrimmed.
    pub recipe_lines: Vec<String>,
}

/// MakefileRuleParser assembles rule contexts from a token stream.
pub struct MakefileRuleParser<S> {
    stream: S,
}

impl<S: TokenStream> MakefileRuleParser<S> {
    /// new constructs a MakefileRuleParser over a token stream.
    pub fn new(stream: S) -> MakefileRuleParser<S> {
        MakefileRuleParser { stream }
    }

    fn peek(&mut self) -> Result<Token, PipelineError> {
        self.stream
            .lt(1)?
            .ok_or_else(|| PipelineError::Parse("token stream returned no token".to_string()))
    }

    /// declaration parses the next declaration. Blank declarations
    /// return None; end of input surfaces as ParseCancelled.
    pub fn declaration(&mut self) -> Result<Option<MakefileRuleContext>, PipelineError> {
        let token: Token = self.peek()?;

        if token.is_eof() {
            return Err(PipelineError::ParseCancelled);
        }

        match token.token_type {
            EOL | RECIPE_LINE => {
                self.stream.consume()?;
                Ok(None)
            }
            IDENTIFIER => Ok(Some(self.makefile_rule()?)),
            // A rule header with no targets is unparseable; the
            // emitter treats it as end of input.
            COLON => Err(PipelineError::ParseCancelled),
            _ => Err(PipelineError::Parse(format!(
                "unexpected token {:?} in declaration",
                token.text
            ))),
        }
    }

    fn makefile_rule(&mut self) -> Result<MakefileRuleContext, PipelineError> {
        let mut context: MakefileRuleContext = MakefileRuleContext::default();

        while self.peek()?.token_type == IDENTIFIER {
            context.targets.push(self.peek()?.text);
            self.stream.consume()?;
        }

        if self.peek()?.token_type != COLON {
            return Err(PipelineError::Parse(format!(
                "expected ':' after targets, found {:?}",
                self.peek()?.text
            )));
        }

        self.stream.consume()?;

        while self.peek()?.token_type == IDENTIFIER {
            context.prerequisites.push(self.peek()?.text);
            self.stream.consume()?;
        }

        if self.peek()?.token_type == PIPE {
            self.stream.consume()?;

            while self.peek()?.token_type == IDENTIFIER {
                context
                    .order_only_prerequisites
                    .push(self.peek()?.text);
                self.stream.consume()?;
            }
        }

        loop {
            let token: Token = self.peek()?;

            match token.token_type {
                RECIPE_LINE => {
                    context.recipe_lines.push(token.text);
                    self.stream.consume()?;
                }
                EOL => {
                    self.stream.consume()?;
                }
                _ => break,
            }
        }

        Ok(context)
    }
}

#[cfg(test)]
fn rule_lexer(text: &str) -> MakefileRuleLexer<crate::stream::StringCharStream> {
    MakefileRuleLexer::new(crate::stream::StringCharStream::new(text))
}

#[cfg(test)]
fn assert_token<L: TokenSource>(lexer: &mut L, token_type: i32, text: &str) {
    let token: Token = lexer.next_token().unwrap();
    assert_eq!((token.token_type, token.text.as_str()), (token_type, text));
}

#[test]
fn test_rule_lexer_tokenization() {
    let text = "# A comment\n\
\\backslash\\target\\:: source\\ |\t\\back\tslash\\ \n\
\t  Hurray:|;#\t it works\\quite\\well\\\n\
  And this is still recipe text \\\n\
\tAnd this tab is removed # Not a comment!\n\
# Interspersed comment\n\
\n\
\t  More recipe (trailing spaces)  \n\
next/target : next\\ source\\\n\
another-source\\\n\
\t and-another-source;|:recipes!!;; # Oh\tboy!\n\
\t :#I can't wait...\n\
# Still in the recipe\n\
\t ...until this recipe is over!\n\
# New line with lone tab\n\
\t\n\
all:|;\n\
\n\
\t\n\
\t\\\n\
and here is the recipe finally\n\
clean:;\n\
dist:;\n\
\t\n";
    let mut lexer = rule_lexer(text);

    assert_token(&mut lexer, EOL, "\n");
    assert_token(&mut lexer, IDENTIFIER, "\\backslash\\target\\:");
    assert_token(&mut lexer, COLON, ":");
    assert_token(&mut lexer, IDENTIFIER, "source\\ ");
    assert_token(&mut lexer, PIPE, "|");
    assert_token(&mut lexer, IDENTIFIER, "\\back");
    assert_token(&mut lexer, IDENTIFIER, "slash\\ ");
    assert_token(&mut lexer, RECIPE_LINE, "  Hurray:|;#\t it works\\quite\\well\\\n");
    assert_token(&mut lexer, RECIPE_LINE, "  And this is still recipe text \\\n\t");
    assert_token(&mut lexer, RECIPE_LINE, "And this tab is removed # Not a comment!\n");
    assert_token(&mut lexer, EOL, "\n");
    assert_token(&mut lexer, RECIPE_LINE, "  More recipe (trailing spaces)  \n");
    assert_token(&mut lexer, IDENTIFIER, "next/target");
    assert_token(&mut lexer, COLON, ":");
    assert_token(&mut lexer, IDENTIFIER, "next\\ source");
    assert_token(&mut lexer, IDENTIFIER, "another-source");
    assert_token(&mut lexer, IDENTIFIER, "and-another-source");
    assert_token(&mut lexer, RECIPE_LINE, "|:recipes!!;; # Oh\tboy!\n\t");
    assert_token(&mut lexer, RECIPE_LINE, " :#I can't wait...\n");
    assert_token(&mut lexer, RECIPE_LINE, " ...until this recipe is over!\n");
    assert_token(&mut lexer, RECIPE_LINE, "\n");
    assert_token(&mut lexer, IDENTIFIER, "all");
    assert_token(&mut lexer, COLON, ":");
    assert_token(&mut lexer, PIPE, "|");
    assert_token(&mut lexer, RECIPE_LINE, "\n");
    assert_token(&mut lexer, RECIPE_LINE, "\n\t");
    assert_token(&mut lexer, RECIPE_LINE, "\\\n");
    assert_token(&mut lexer, RECIPE_LINE, "and here is the recipe finally\n");
    assert_token(&mut lexer, IDENTIFIER, "clean");
    assert_token(&mut lexer, COLON, ":");
    assert_token(&mut lexer, RECIPE_LINE, "\n");
    assert_token(&mut lexer, IDENTIFIER, "dist");
    assert_token(&mut lexer, COLON, ":");
    assert_token(&mut lexer, RECIPE_LINE, "\n\t");
    assert_token(&mut lexer, RECIPE_LINE, "\n");

    let token: Token = lexer.next_token().unwrap();
    assert!(token.is_eof());
    assert_eq!(token.text, "<EOF>");

    // The lexer keeps answering with EOF once exhausted.
    assert!(lexer.next_token().unwrap().is_eof());
}

#[test]
fn test_rule_lexer_streaming_adapter_matches_buffered() {
    let text = "a b c: d | e\n\tfirst\n\tsecond \\\ncontinued\n";

    let mut buffered = rule_lexer(text);

    let chars = crate::iter::ListIterator::new(text.chars().collect());
    let adapter = crate::stream::IteratorToCharStreamAdapter::new(chars).unwrap();
    let mut streaming = MakefileRuleLexer::new(adapter);

    loop {
        let expected: Token = buffered.next_token().unwrap();
        let actual: Token = streaming.next_token().unwrap();
        assert_eq!(expected, actual);

        if expected.is_eof() {
            break;
        }
    }
}

#[cfg(test)]
fn paragraph_lexer(text: &str) -> TargetParagraphLexer<crate::stream::StringCharStream> {
    TargetParagraphLexer::new(crate::stream::StringCharStream::new(text))
}

#[test]
fn test_paragraph_lexer_splits_on_blank_lines() {
    let mut lexer = paragraph_lexer("a: b\n\tcc a\n\nb: c\n");
    assert_token(&mut lexer, PARAGRAPH, "a: b\n\tcc a\n");
    assert_token(&mut lexer, PARAGRAPH, "b: c\n");
    assert!(lexer.next_token().unwrap().is_eof());
}

#[test]
fn test_paragraph_lexer_keeps_continued_recipes() {
    // The blank line is followed by a tab line, so the recipe
    // continues within one paragraph.
    let mut lexer = paragraph_lexer("a: b\n\tfirst\n\n\tsecond\n\nnext: c\n");
    assert_token(&mut lexer, PARAGRAPH, "a: b\n\tfirst\n\n\tsecond\n");
    assert_token(&mut lexer, PARAGRAPH, "next: c\n");
    assert!(lexer.next_token().unwrap().is_eof());
}

#[test]
fn test_paragraph_lexer_drops_non_targets() {
    let text = "# Not a target:\nfoo.c:\n\nall: foo\n\ttouch all\n\n# Not a target:\nbar.c:\n";
    let mut lexer = paragraph_lexer(text);
    assert_token(&mut lexer, PARAGRAPH, "all: foo\n\ttouch all\n");
    assert!(lexer.next_token().unwrap().is_eof());
}

#[test]
fn test_paragraph_lexer_empty_input() {
    let mut lexer = paragraph_lexer("");
    assert!(lexer.next_token().unwrap().is_eof());

    let mut lexer = paragraph_lexer("\n\n\n");
    assert!(lexer.next_token().unwrap().is_eof());
}

#[cfg(test)]
fn rule_parser(
    text: &str,
) -> MakefileRuleParser<crate::stream::VecTokenStream> {
    let mut lexer = rule_lexer(text);
    let stream = crate::stream::VecTokenStream::from_source(&mut lexer).unwrap();
    MakefileRuleParser::new(stream)
}

#[test]
fn test_parser_multi_target_rule() {
    let mut parser = rule_parser("a b c: d | e\n");
    let context: MakefileRuleContext = parser.declaration().unwrap().unwrap();
    assert_eq!(context.targets, vec!["a", "b", "c"]);
    assert_eq!(context.prerequisites, vec!["d"]);
    assert_eq!(context.order_only_prerequisites, vec!["e"]);
    assert!(context.recipe_lines.is_empty());

    assert!(matches!(
        parser.declaration(),
        Err(PipelineError::ParseCancelled)
    ));
}

#[test]
fn test_parser_backslash_continuation_rule() {
    let text = "next/target : next\\ source\\\nanother-source\\\n\t and-another-source;|:recipes!!;; # Oh\tboy!\n";
    let mut parser = rule_parser(text);
    let context: MakefileRuleContext = parser.declaration().unwrap().unwrap();
    assert_eq!(context.targets, vec!["next/target"]);
    assert_eq!(
        context.prerequisites,
        vec!["next\\ source", "another-source", "and-another-source"]
    );
    assert!(context.order_only_prerequisites.is_empty());
    assert_eq!(context.recipe_lines, vec!["|:recipes!!;; # Oh\tboy!\n"]);
}

#[test]
fn test_parser_blank_declarations() {
    let mut parser = rule_parser("\n\na: b\n");
    assert!(parser.declaration().unwrap().is_none());
    assert!(parser.declaration().unwrap().is_none());
    let context: MakefileRuleContext = parser.declaration().unwrap().unwrap();
    assert_eq!(context.targets, vec!["a"]);
    assert!(matches!(
        parser.declaration(),
        Err(PipelineError::ParseCancelled)
    ));
}

#[test]
fn test_parser_groups_recipes_across_comments_and_blanks() {
    let text = "a: b\n\tfirst\n# Interspersed comment\n\n\tsecond\nnext: c\n";
    let mut parser = rule_parser(text);

    let context: MakefileRuleContext = parser.declaration().unwrap().unwrap();
    assert_eq!(context.targets, vec!["a"]);
    assert_eq!(context.recipe_lines, vec!["first\n", "second\n"]);

    let context: MakefileRuleContext = parser.declaration().unwrap().unwrap();
    assert_eq!(context.targets, vec!["next"]);
}

#[test]
fn test_parser_zero_target_rule_cancels() {
    let mut parser = rule_parser(": d\n");
    assert!(matches!(
        parser.declaration(),
        Err(PipelineError::ParseCancelled)
    ));
}
