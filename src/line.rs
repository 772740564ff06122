//! line models single lines of text and line-level iteration.

use crate::error::PipelineError;
use crate::iter::PullIterator;
use std::io::BufRead;

/// Line holds one line of text with no interior line terminator.
///
/// A single trailing `\n` is stripped during construction.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Line {
    content: String,
}

impl Line {
    /// new constructs a Line from an already-newline-bounded fragment.
    ///
    /// Construction fails when the fragment contains a line break
    /// anywhere but the final position.
    pub fn new(fragment: &str) -> Result<Line, PipelineError> {
        let content: &str = fragment.strip_suffix('\n').unwrap_or(fragment);

        if content.contains('\n') {
            return Err(PipelineError::MalformedLine(fragment.to_string()));
        }

        Ok(Line {
            content: content.to_string(),
        })
    }

    /// content borrows the line text, without terminator.
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// FileLineIterator pulls lines from a buffered reader.
///
/// The only blocking operation in the parse pipeline happens here,
/// when the underlying byte source is a file or a child-process pipe.
pub struct FileLineIterator<R> {
    reader: R,
    line: Option<Line>,
    ended: bool,
}

impl<R: BufRead> FileLineIterator<R> {
    /// new constructs a FileLineIterator in start state.
    pub fn new(reader: R) -> FileLineIterator<R> {
        FileLineIterator {
            reader,
            line: None,
            ended: false,
        }
    }
}

impl<R: BufRead> PullIterator for FileLineIterator<R> {
    type Item = Line;

    fn current(&self) -> Option<&Line> {
        self.line.as_ref()
    }

    fn current_mut(&mut self) -> Option<&mut Line> {
        self.line.as_mut()
    }

    fn at_start(&self) -> bool {
        self.line.is_none() && !self.ended
    }

    fn at_end(&self) -> bool {
        self.ended
    }

    fn advance(&mut self) -> Result<(), PipelineError> {
        if self.ended {
            return Ok(());
        }

        let mut buffer: String = String::new();
        let count: usize = self.reader.read_line(&mut buffer)?;

        if count == 0 {
            self.ended = true;
            self.line = None;
        } else {
            self.line = Some(Line::new(&buffer)?);
        }

        Ok(())
    }
}

/// LineToCharIterator flattens lines into characters, reinserting a
/// `\n` terminator after each line.
pub struct LineToCharIterator<I> {
    source: I,
    chars: Option<Vec<char>>,
    index: usize,
}

impl<I> LineToCharIterator<I>
where
    I: PullIterator<Item = Line>,
{
    /// new constructs a LineToCharIterator in start state.
    pub fn new(source: I) -> LineToCharIterator<I> {
        LineToCharIterator {
            source,
            chars: None,
            index: 0,
        }
    }

    fn load_line(&mut self) {
        match self.source.current() {
            Some(line) => {
                let mut chars: Vec<char> = line.content().chars().collect();
                chars.push('\n');
                self.chars = Some(chars);
                self.index = 0;
            }
            None => {
                self.chars = None;
            }
        }
    }
}

impl<I> PullIterator for LineToCharIterator<I>
where
    I: PullIterator<Item = Line>,
{
    type Item = char;

    fn current(&self) -> Option<&char> {
        self.chars.as_ref().map(|chars| &chars[self.index])
    }

    fn current_mut(&mut self) -> Option<&mut char> {
        let index: usize = self.index;
        self.chars.as_mut().map(|chars| &mut chars[index])
    }

    fn at_start(&self) -> bool {
        self.source.at_start()
    }

    fn at_end(&self) -> bool {
        !self.at_start() && self.chars.is_none()
    }

    fn advance(&mut self) -> Result<(), PipelineError> {
        if self.at_end() {
            return Ok(());
        }

        if let Some(chars) = &self.chars {
            if self.index + 1 < chars.len() {
                self.index += 1;
                return Ok(());
            }
        }

        self.source.advance()?;
        self.load_line();
        Ok(())
    }
}

#[test]
fn test_line_strips_single_terminator() {
    assert_eq!(Line::new("all: foo\n").unwrap().content(), "all: foo");
    assert_eq!(Line::new("all: foo").unwrap().content(), "all: foo");
    assert_eq!(Line::new("\n").unwrap().content(), "");
    assert_eq!(Line::new("").unwrap().content(), "");
}

#[test]
fn test_line_rejects_interior_break() {
    assert!(Line::new("a\nb").is_err());
    assert!(Line::new("a\n\n").is_err());
}

#[test]
fn test_file_line_iterator() {
    let reader = std::io::Cursor::new("one\ntwo\n\nfour");
    let mut it = FileLineIterator::new(reader);
    assert!(it.at_start());

    let mut collected: Vec<String> = Vec::new();

    loop {
        it.advance().unwrap();

        match it.current() {
            Some(line) => collected.push(line.content().to_string()),
            None => break,
        }
    }

    assert!(it.at_end());
    assert_eq!(collected, vec!["one", "two", "", "four"]);
}

#[test]
fn test_line_to_char_iterator() {
    let lines: Vec<Line> = vec![
        Line::new("ab").unwrap(),
        Line::new("").unwrap(),
        Line::new("c").unwrap(),
    ];
    let source = crate::iter::ListIterator::new(lines);
    let it = LineToCharIterator::new(source);
    let collected: String = crate::iter::Items::new(it)
        .map(|item| item.unwrap())
        .collect();
    assert_eq!(collected, "ab\n\nc\n");
}
