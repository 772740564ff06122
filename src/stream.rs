//! stream adapts forward-only pull iterators into random-access,
//! markable character and token streams for the lexers and parser.
//!
//! The adapters run a three-state machine: I (cursor inside the
//! buffered suffix), E (cursor at end, buffer non-empty), EE (cursor
//! at end, buffer empty). There is no start state. Any `mark` must be
//! paired with a `release`; a leaked mark prevents buffer collection
//! and grows memory without bound, which is a resource leak rather
//! than a correctness error.

use crate::error::PipelineError;
use crate::fifo::ManagedFifo;
use crate::iter::PullIterator;

/// EOF is the in-band end sentinel for character lookahead.
pub const EOF: i32 = -1;

/// TOKEN_EOF is the type tag of the end-of-input token produced by
/// lexers.
pub const TOKEN_EOF: i32 = -1;

/// Token carries a type tag and literal text.
///
/// Tokens are produced by the lexers and are opaque to the pipeline
/// except for type and text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    /// token_type denotes the symbol id, with TOKEN_EOF reserved for
    /// end of input.
    pub token_type: i32,

    /// text denotes the literal matched text.
    pub text: String,
}

impl Token {
    /// new constructs a Token.
    pub fn new(token_type: i32, text: &str) -> Token {
        Token {
            token_type,
            text: text.to_string(),
        }
    }

    /// eof constructs the end-of-input token.
    pub fn eof() -> Token {
        Token::new(TOKEN_EOF, "<EOF>")
    }

    /// is_eof reports whether this token marks end of input.
    pub fn is_eof(&self) -> bool {
        self.token_type == TOKEN_EOF
    }
}

/// IntStream is the random-access stream contract shared by character
/// and token streams.
///
/// `index` and `seek` speak in global positions: a monotonically
/// increasing count over the stream's entire history, independent of
/// buffer trimming.
pub trait IntStream {
    /// consume advances past the current item. Fails with ReadPastEnd
    /// at end of stream.
    fn consume(&mut self) -> Result<(), PipelineError>;

    /// la looks `offset` positions ahead (`1` is the current item;
    /// negative offsets look back) and returns the item's integer
    /// value, or the EOF sentinel past the end.
    fn la(&mut self, offset: isize) -> Result<i32, PipelineError>;

    /// mark pins the current position and returns a release handle.
    /// At end of stream the reserved zero handle is returned, which
    /// release accepts as a no-op.
    fn mark(&mut self) -> i32;

    /// release unpins a mark handle and triggers a garbage-collection
    /// pass. Unknown handles are tolerated.
    fn release(&mut self, marker: i32);

    /// index queries the current global position; equals size at end
    /// of stream.
    fn index(&self) -> usize;

    /// seek repositions the cursor at any previously seen position
    /// still buffered, or pulls forward toward a not-yet-read
    /// position. Negative targets and collected positions fail with
    /// ReleasedPosition.
    fn seek(&mut self, index: isize) -> Result<(), PipelineError>;

    /// size counts the items observed so far. It grows as the
    /// underlying source is pulled.
    fn size(&self) -> usize;
}

/// CharStream extends IntStream with inclusive substring extraction.
pub trait CharStream: IntStream {
    /// get_text extracts the inclusive global index range
    /// `start..=stop`. Fails with ReleasedPosition when `start` has
    /// been collected, or ReadPastEnd when the range runs past the
    /// end of the stream.
    fn get_text(&mut self, start: usize, stop: usize) -> Result<String, PipelineError>;
}

/// TokenStream extends IntStream with token lookups.
pub trait TokenStream: IntStream {
    /// lt looks `offset` positions ahead and returns the token there.
    /// Past the end the lexer's own EOF token is returned; an offset
    /// reaching before the start of the stream returns None.
    fn lt(&mut self, offset: isize) -> Result<Option<Token>, PipelineError>;

    /// get returns the token at a global index, or the EOF token past
    /// the end.
    fn get(&mut self, index: usize) -> Result<Token, PipelineError>;
}

/// TokenSource produces tokens one at a time.
///
/// A source must eventually yield an EOF-typed token and keep
/// yielding it; the end signal is in-band.
pub trait TokenSource {
    /// next_token produces the next token.
    fn next_token(&mut self) -> Result<Token, PipelineError>;
}

/// StreamFeed pulls one more item into a markable stream buffer, or
/// reports exhaustion with None.
trait StreamFeed {
    type Item: Clone;

    fn next_item(&mut self) -> Result<Option<Self::Item>, PipelineError>;
}

/// MarkableCore runs the I/E/EE machine over a lookahead buffer and a
/// feed.
struct MarkableCore<F: StreamFeed> {
    buffer: ManagedFifo<F::Item>,
    feed: F,
}

impl<F: StreamFeed> MarkableCore<F> {
    fn new(mut feed: F) -> Result<MarkableCore<F>, PipelineError> {
        let mut buffer: ManagedFifo<F::Item> = ManagedFifo::new();

        if let Some(item) = feed.next_item()? {
            buffer.push(item);
        }

        Ok(MarkableCore { buffer, feed })
    }

    fn current(&self) -> Option<&F::Item> {
        self.buffer.current()
    }

    fn current_mut(&mut self) -> Option<&mut F::Item> {
        self.buffer.current_mut()
    }

    fn has_current(&self) -> bool {
        self.buffer.has_current()
    }

    fn at_end(&self) -> bool {
        !self.buffer.has_current()
    }

    fn advance(&mut self) -> Result<(), PipelineError> {
        if self.at_end() {
            return Ok(());
        }

        if self.buffer.cursor() + 1 >= self.buffer.len() {
            if let Some(item) = self.feed.next_item()? {
                self.buffer.push(item);
            }
        }

        self.buffer.advance();
        Ok(())
    }

    fn index(&self) -> usize {
        if self.has_current() {
            self.buffer.current_global_index()
        } else {
            self.size()
        }
    }

    fn size(&self) -> usize {
        self.buffer.global_count()
    }

    fn mark(&mut self) -> i32 {
        if self.has_current() {
            self.buffer.new_mark()
        } else {
            0
        }
    }

    fn release(&mut self, marker: i32) {
        self.buffer.release_mark(marker);
        self.buffer.collect();
    }

    fn consume(&mut self) -> Result<(), PipelineError> {
        if self.has_current() {
            self.advance()
        } else {
            Err(PipelineError::ReadPastEnd)
        }
    }

    fn seek(&mut self, target: isize) -> Result<(), PipelineError> {
        if target < 0 {
            return Err(PipelineError::ReleasedPosition(target));
        }

        let index: usize = target as usize;

        if index >= self.size() {
            if self.has_current() {
                // Walk forward, pulling the source, until the target
                // or exhaustion.
                let last: usize = self.buffer.global_count() - 1;
                self.buffer.move_to_global_index(last);

                while self.has_current() && self.index() < index {
                    self.advance()?;
                }
            }

            return Ok(());
        }

        if index >= self.buffer.lowest_global_index() {
            self.buffer.move_to_global_index(index);
            Ok(())
        } else {
            Err(PipelineError::ReleasedPosition(target))
        }
    }

    /// item_at reads the item at a global index without disturbing
    /// the cursor, pinning the current position for the duration.
    fn item_at(&mut self, target: isize) -> Result<Option<F::Item>, PipelineError> {
        let marker: i32 = self.mark();
        let original: usize = self.index();
        let outcome: Result<Option<F::Item>, PipelineError> = self.item_at_pinned(target, original);
        self.buffer.release_mark(marker);
        outcome
    }

    fn item_at_pinned(
        &mut self,
        target: isize,
        original: usize,
    ) -> Result<Option<F::Item>, PipelineError> {
        self.seek(target)?;
        let item: Option<F::Item> = self.buffer.current().cloned();
        self.seek(original as isize)?;
        Ok(item)
    }

    /// read_span reads `length` items starting at a global index
    /// without disturbing the cursor.
    fn read_span(&mut self, start: usize, length: usize) -> Result<Vec<F::Item>, PipelineError> {
        let marker: i32 = self.mark();
        let original: usize = self.index();
        let outcome: Result<Vec<F::Item>, PipelineError> =
            self.read_span_pinned(start, length, original);
        self.buffer.release_mark(marker);
        outcome
    }

    fn read_span_pinned(
        &mut self,
        start: usize,
        length: usize,
        original: usize,
    ) -> Result<Vec<F::Item>, PipelineError> {
        self.seek(start as isize)?;
        let mut items: Vec<F::Item> = Vec::with_capacity(length);

        for _ in 0..length {
            match self.buffer.current() {
                Some(item) => items.push(item.clone()),
                None => return Err(PipelineError::ReadPastEnd),
            }

            self.advance()?;
        }

        self.seek(original as isize)?;
        Ok(items)
    }

    fn offset_to_index(&self, offset: isize) -> isize {
        let base: isize = self.index() as isize + offset;

        if offset > 0 { base - 1 } else { base }
    }
}

struct CharFeed<I> {
    source: I,
}

impl<I> StreamFeed for CharFeed<I>
where
    I: PullIterator<Item = char>,
{
    type Item = char;

    fn next_item(&mut self) -> Result<Option<char>, PipelineError> {
        if self.source.at_start() || self.source.has_current() {
            self.source.advance()?;
        }

        Ok(self.source.current().copied())
    }
}

struct TokenFeed<I> {
    source: I,
    eof: Option<Token>,
}

impl<I> StreamFeed for TokenFeed<I>
where
    I: PullIterator<Item = Token>,
{
    type Item = Token;

    fn next_item(&mut self) -> Result<Option<Token>, PipelineError> {
        // Once the EOF token has been sighted the source stays parked
        // on it, so it can keep answering past-end lookups.
        if self.eof.is_some() {
            return Ok(None);
        }

        if self.source.at_start() || self.source.has_current() {
            self.source.advance()?;
        }

        match self.source.current() {
            Some(token) if token.is_eof() => {
                self.eof = Some(token.clone());
                Ok(None)
            }
            Some(token) => Ok(Some(token.clone())),
            None => Err(PipelineError::Parse(
                "token source ended without an EOF token".to_string(),
            )),
        }
    }
}

/// IteratorToCharStreamAdapter presents a character pull iterator as
/// a markable character stream.
pub struct IteratorToCharStreamAdapter<I: PullIterator<Item = char>> {
    core: MarkableCore<CharFeed<I>>,
}

impl<I> IteratorToCharStreamAdapter<I>
where
    I: PullIterator<Item = char>,
{
    /// new constructs the adapter, pulling the source out of start
    /// state.
    pub fn new(source: I) -> Result<IteratorToCharStreamAdapter<I>, PipelineError> {
        Ok(IteratorToCharStreamAdapter {
            core: MarkableCore::new(CharFeed { source })?,
        })
    }

    fn la1(&self) -> i32 {
        match self.core.current() {
            Some(c) => *c as i32,
            None => EOF,
        }
    }
}

impl<I> PullIterator for IteratorToCharStreamAdapter<I>
where
    I: PullIterator<Item = char>,
{
    type Item = char;

    fn current(&self) -> Option<&char> {
        self.core.current()
    }

    fn current_mut(&mut self) -> Option<&mut char> {
        self.core.current_mut()
    }

    fn at_start(&self) -> bool {
        false
    }

    fn at_end(&self) -> bool {
        self.core.at_end()
    }

    fn advance(&mut self) -> Result<(), PipelineError> {
        self.core.advance()
    }
}

impl<I> IntStream for IteratorToCharStreamAdapter<I>
where
    I: PullIterator<Item = char>,
{
    fn consume(&mut self) -> Result<(), PipelineError> {
        self.core.consume()
    }

    fn la(&mut self, offset: isize) -> Result<i32, PipelineError> {
        // The hot path for lexers reads the current character
        // without seeking.
        if offset == 1 {
            return Ok(self.la1());
        }

        let target: isize = self.core.offset_to_index(offset);

        match self.core.item_at(target)? {
            Some(c) => Ok(c as i32),
            None => Ok(EOF),
        }
    }

    fn mark(&mut self) -> i32 {
        self.core.mark()
    }

    fn release(&mut self, marker: i32) {
        self.core.release(marker);
    }

    fn index(&self) -> usize {
        self.core.index()
    }

    fn seek(&mut self, index: isize) -> Result<(), PipelineError> {
        self.core.seek(index)
    }

    fn size(&self) -> usize {
        self.core.size()
    }
}

impl<I> CharStream for IteratorToCharStreamAdapter<I>
where
    I: PullIterator<Item = char>,
{
    fn get_text(&mut self, start: usize, stop: usize) -> Result<String, PipelineError> {
        if start > stop + 1 {
            return Err(PipelineError::ReadPastEnd);
        }

        let length: usize = stop + 1 - start;
        let items: Vec<char> = self.core.read_span(start, length)?;
        Ok(items.into_iter().collect())
    }
}

/// IteratorToTokenStreamAdapter presents a token pull iterator as a
/// markable token stream.
///
/// A token stream must return a real EOF token when asked past the
/// end, and only the upstream lexer can fabricate one. The source
/// must therefore yield an EOF-typed token before it ends; the
/// adapter treats that token as its own end signal, so the pull facet
/// reports end as soon as the EOF token is sighted while `lt` keeps
/// returning it for past-end lookups.
pub struct IteratorToTokenStreamAdapter<I: PullIterator<Item = Token>> {
    core: MarkableCore<TokenFeed<I>>,
}

impl<I> IteratorToTokenStreamAdapter<I>
where
    I: PullIterator<Item = Token>,
{
    /// new constructs the adapter, pulling the source out of start
    /// state.
    pub fn new(source: I) -> Result<IteratorToTokenStreamAdapter<I>, PipelineError> {
        Ok(IteratorToTokenStreamAdapter {
            core: MarkableCore::new(TokenFeed { source, eof: None })?,
        })
    }

    fn eof_token(&self) -> Result<Token, PipelineError> {
        self.core
            .feed
            .eof
            .clone()
            .ok_or_else(|| PipelineError::Parse("token source ended without an EOF token".to_string()))
    }
}

impl<I> PullIterator for IteratorToTokenStreamAdapter<I>
where
    I: PullIterator<Item = Token>,
{
    type Item = Token;

    fn current(&self) -> Option<&Token> {
        self.core.current()
    }

    fn current_mut(&mut self) -> Option<&mut Token> {
        self.core.current_mut()
    }

    fn at_start(&self) -> bool {
        false
    }

    fn at_end(&self) -> bool {
        self.core.at_end()
    }

    fn advance(&mut self) -> Result<(), PipelineError> {
        self.core.advance()
    }
}

impl<I> IntStream for IteratorToTokenStreamAdapter<I>
where
    I: PullIterator<Item = Token>,
{
    fn consume(&mut self) -> Result<(), PipelineError> {
        self.core.consume()
    }

    fn la(&mut self, offset: isize) -> Result<i32, PipelineError> {
        let token: Option<Token> = self.lt(offset)?;
        Ok(token.map(|t| t.token_type).unwrap_or(TOKEN_EOF))
    }

    fn mark(&mut self) -> i32 {
        self.core.mark()
    }

    fn release(&mut self, marker: i32) {
        self.core.release(marker);
    }

    fn index(&self) -> usize {
        self.core.index()
    }

    fn seek(&mut self, index: isize) -> Result<(), PipelineError> {
        self.core.seek(index)
    }

    fn size(&self) -> usize {
        self.core.size()
    }
}

impl<I> TokenStream for IteratorToTokenStreamAdapter<I>
where
    I: PullIterator<Item = Token>,
{
    fn lt(&mut self, offset: isize) -> Result<Option<Token>, PipelineError> {
        let target: isize = self.core.offset_to_index(offset);

        if target < 0 {
            // Known runtime behavior: a lookup reaching before the
            // start of the stream answers with a null token.
            return Ok(None);
        }

        match self.core.item_at(target)? {
            Some(token) => Ok(Some(token)),
            None => Ok(Some(self.eof_token()?)),
        }
    }

    fn get(&mut self, index: usize) -> Result<Token, PipelineError> {
        match self.core.item_at(index as isize)? {
            Some(token) => Ok(token),
            None => self.eof_token(),
        }
    }
}

/// StringCharStream is the buffered assembly's in-memory character
/// stream.
pub struct StringCharStream {
    chars: Vec<char>,
    index: usize,
}

impl StringCharStream {
    /// new constructs a StringCharStream over drained text.
    pub fn new(text: &str) -> StringCharStream {
        StringCharStream {
            chars: text.chars().collect(),
            index: 0,
        }
    }
}

impl IntStream for StringCharStream {
    fn consume(&mut self) -> Result<(), PipelineError> {
        if self.index < self.chars.len() {
            self.index += 1;
            Ok(())
        } else {
            Err(PipelineError::ReadPastEnd)
        }
    }

    fn la(&mut self, offset: isize) -> Result<i32, PipelineError> {
        if offset == 0 {
            return Ok(0);
        }

        let adjusted: isize = if offset < 0 { offset + 1 } else { offset };
        let target: isize = self.index as isize + adjusted - 1;

        if target < 0 || target as usize >= self.chars.len() {
            Ok(EOF)
        } else {
            Ok(self.chars[target as usize] as i32)
        }
    }

    fn mark(&mut self) -> i32 {
        0
    }

    fn release(&mut self, _marker: i32) {}

    fn index(&self) -> usize {
        self.index
    }

    fn seek(&mut self, index: isize) -> Result<(), PipelineError> {
        if index < 0 {
            return Err(PipelineError::ReleasedPosition(index));
        }

        self.index = (index as usize).min(self.chars.len());
        Ok(())
    }

    fn size(&self) -> usize {
        self.chars.len()
    }
}

impl CharStream for StringCharStream {
    fn get_text(&mut self, start: usize, stop: usize) -> Result<String, PipelineError> {
        if start > stop + 1 {
            return Err(PipelineError::ReadPastEnd);
        }

        if stop >= self.chars.len() {
            return Err(PipelineError::ReadPastEnd);
        }

        Ok(self.chars[start..=stop].iter().collect())
    }
}

/// VecTokenStream is the buffered assembly's in-memory token stream,
/// holding a fully drained token sequence ending with the EOF token.
pub struct VecTokenStream {
    tokens: Vec<Token>,
    index: usize,
}

impl VecTokenStream {
    /// from_source drains a token source through its EOF token.
    pub fn from_source<S: TokenSource>(source: &mut S) -> Result<VecTokenStream, PipelineError> {
        let mut tokens: Vec<Token> = Vec::new();

        loop {
            let token: Token = source.next_token()?;
            let ended: bool = token.is_eof();
            tokens.push(token);

            if ended {
                break;
            }
        }

        Ok(VecTokenStream { tokens, index: 0 })
    }

    fn last_token(&self) -> Token {
        self.tokens[self.tokens.len() - 1].clone()
    }
}

impl IntStream for VecTokenStream {
    fn consume(&mut self) -> Result<(), PipelineError> {
        if self.tokens[self.index].is_eof() {
            Err(PipelineError::ReadPastEnd)
        } else {
            self.index += 1;
            Ok(())
        }
    }

    fn la(&mut self, offset: isize) -> Result<i32, PipelineError> {
        let token: Option<Token> = self.lt(offset)?;
        Ok(token.map(|t| t.token_type).unwrap_or(TOKEN_EOF))
    }

    fn mark(&mut self) -> i32 {
        0
    }

    fn release(&mut self, _marker: i32) {}

    fn index(&self) -> usize {
        self.index
    }

    fn seek(&mut self, index: isize) -> Result<(), PipelineError> {
        if index < 0 {
            return Err(PipelineError::ReleasedPosition(index));
        }

        self.index = (index as usize).min(self.tokens.len() - 1);
        Ok(())
    }

    fn size(&self) -> usize {
        self.tokens.len()
    }
}

impl TokenStream for VecTokenStream {
    fn lt(&mut self, offset: isize) -> Result<Option<Token>, PipelineError> {
        if offset == 0 {
            return Ok(None);
        }

        let adjusted: isize = if offset > 0 { offset - 1 } else { offset };
        let target: isize = self.index as isize + adjusted;

        if target < 0 {
            return Ok(None);
        }

        if target as usize >= self.tokens.len() {
            return Ok(Some(self.last_token()));
        }

        Ok(Some(self.tokens[target as usize].clone()))
    }

    fn get(&mut self, index: usize) -> Result<Token, PipelineError> {
        if index >= self.tokens.len() {
            Ok(self.last_token())
        } else {
            Ok(self.tokens[index].clone())
        }
    }
}

/// TokenSourceToIteratorAdapter pulls a token source as an iterator.
///
/// The EOF token appears as a regular item; advancing past it reaches
/// end state.
pub struct TokenSourceToIteratorAdapter<L> {
    source: L,
    token: Option<Token>,
    ended: bool,
}

impl<L: TokenSource> TokenSourceToIteratorAdapter<L> {
    /// new constructs the adapter in start state.
    pub fn new(source: L) -> TokenSourceToIteratorAdapter<L> {
        TokenSourceToIteratorAdapter {
            source,
            token: None,
            ended: false,
        }
    }
}

impl<L: TokenSource> PullIterator for TokenSourceToIteratorAdapter<L> {
    type Item = Token;

    fn current(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    fn current_mut(&mut self) -> Option<&mut Token> {
        self.token.as_mut()
    }

    fn at_start(&self) -> bool {
        self.token.is_none() && !self.ended
    }

    fn at_end(&self) -> bool {
        self.ended
    }

    fn advance(&mut self) -> Result<(), PipelineError> {
        if self.ended {
            return Ok(());
        }

        match &self.token {
            Some(token) if token.is_eof() => {
                self.token = None;
                self.ended = true;
            }
            _ => {
                // A token source is never empty: an otherwise empty
                // source still generates one EOF token.
                self.token = Some(self.source.next_token()?);
            }
        }

        Ok(())
    }
}

/// TokenToCharIterator flattens token texts back into characters,
/// skipping blank tokens and stopping at the first EOF token.
pub struct TokenToCharIterator<I> {
    source: I,
    text: Option<Vec<char>>,
    index: usize,
}

impl<I> TokenToCharIterator<I>
where
    I: PullIterator<Item = Token>,
{
    /// new constructs a TokenToCharIterator in start state.
    pub fn new(source: I) -> TokenToCharIterator<I> {
        TokenToCharIterator {
            source,
            text: None,
            index: 0,
        }
    }
}

impl<I> PullIterator for TokenToCharIterator<I>
where
    I: PullIterator<Item = Token>,
{
    type Item = char;

    fn current(&self) -> Option<&char> {
        self.text.as_ref().map(|text| &text[self.index])
    }

    fn current_mut(&mut self) -> Option<&mut char> {
        let index: usize = self.index;
        self.text.as_mut().map(|text| &mut text[index])
    }

    fn at_start(&self) -> bool {
        self.source.at_start()
    }

    fn at_end(&self) -> bool {
        !self.at_start() && self.text.is_none()
    }

    fn advance(&mut self) -> Result<(), PipelineError> {
        if self.at_end() {
            return Ok(());
        }

        if let Some(text) = &self.text {
            if self.index + 1 < text.len() {
                self.index += 1;
                return Ok(());
            }
        }

        loop {
            self.source.advance()?;

            match self.source.current() {
                Some(token) if token.is_eof() => {
                    self.text = None;
                    break;
                }
                Some(token) => {
                    let chars: Vec<char> = token.text.chars().collect();

                    if !chars.is_empty() {
                        self.text = Some(chars);
                        self.index = 0;
                        break;
                    }
                }
                None => {
                    self.text = None;
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
fn char_adapter(text: &str) -> IteratorToCharStreamAdapter<crate::iter::ListIterator<char>> {
    let source = crate::iter::ListIterator::new(text.chars().collect());
    IteratorToCharStreamAdapter::new(source).unwrap()
}

#[test]
fn test_char_adapter_lookahead() {
    let mut stream = char_adapter("abc");
    assert_eq!(stream.la(1).unwrap(), 'a' as i32);
    assert_eq!(stream.la(2).unwrap(), 'b' as i32);
    assert_eq!(stream.la(3).unwrap(), 'c' as i32);
    assert_eq!(stream.la(4).unwrap(), EOF);

    // Lookahead does not disturb the cursor.
    assert_eq!(stream.index(), 0);
    assert_eq!(stream.la(1).unwrap(), 'a' as i32);

    stream.consume().unwrap();
    assert_eq!(stream.la(1).unwrap(), 'b' as i32);
    assert_eq!(stream.la(-1).unwrap(), 'a' as i32);
}

#[test]
fn test_char_adapter_consume_past_end() {
    let mut stream = char_adapter("x");
    stream.consume().unwrap();
    assert!(stream.at_end());
    assert!(matches!(
        stream.consume(),
        Err(PipelineError::ReadPastEnd)
    ));
    assert_eq!(stream.la(1).unwrap(), EOF);
    assert_eq!(stream.index(), stream.size());
}

#[test]
fn test_char_adapter_mark_seek_round_trip() {
    let mut stream = char_adapter("abcdef");
    let marker: i32 = stream.mark();
    assert!(marker > 0);

    stream.consume().unwrap();
    stream.consume().unwrap();
    assert_eq!(stream.index(), 2);

    stream.seek(0).unwrap();
    assert_eq!(stream.la(1).unwrap(), 'a' as i32);
    stream.seek(2).unwrap();
    assert_eq!(stream.la(1).unwrap(), 'c' as i32);

    stream.release(marker);
}

#[test]
fn test_char_adapter_garbage_collection() {
    let mut stream = char_adapter("abcdef");
    stream.consume().unwrap();
    stream.consume().unwrap();
    stream.consume().unwrap();

    // No marks are active, so releasing the zero sentinel collects
    // everything behind the cursor.
    stream.release(0);
    assert!(matches!(
        stream.seek(0),
        Err(PipelineError::ReleasedPosition(0))
    ));
    assert_eq!(stream.la(1).unwrap(), 'd' as i32);
}

#[test]
fn test_char_adapter_mark_pins_prefix() {
    let mut stream = char_adapter("abcdef");
    let marker: i32 = stream.mark();
    stream.consume().unwrap();
    stream.consume().unwrap();
    stream.release(0);

    // The outstanding mark still pins index 0.
    stream.seek(0).unwrap();
    assert_eq!(stream.la(1).unwrap(), 'a' as i32);
    stream.seek(2).unwrap();
    stream.release(marker);

    assert!(matches!(
        stream.seek(0),
        Err(PipelineError::ReleasedPosition(0))
    ));
}

#[test]
fn test_char_adapter_seek_to_end() {
    let mut stream = char_adapter("abc");
    stream.seek(10).unwrap();
    assert!(stream.at_end());
    assert_eq!(stream.index(), 3);
    assert_eq!(stream.size(), 3);

    // E state: a buffered position remains reachable.
    stream.seek(2).unwrap();
    assert_eq!(stream.la(1).unwrap(), 'c' as i32);
}

#[test]
fn test_char_adapter_mark_at_end_is_zero() {
    let mut stream = char_adapter("");
    assert!(stream.at_end());
    assert_eq!(stream.mark(), 0);
    stream.release(0);
}

#[test]
fn test_char_adapter_get_text() {
    let mut stream = char_adapter("hello");
    stream.consume().unwrap();
    assert_eq!(stream.get_text(0, 4).unwrap(), "hello");
    assert_eq!(stream.get_text(1, 3).unwrap(), "ell");
    assert_eq!(stream.index(), 1);
    assert!(matches!(
        stream.get_text(0, 5),
        Err(PipelineError::ReadPastEnd)
    ));
}

#[test]
fn test_string_char_stream() {
    let mut stream = StringCharStream::new("ab");
    assert_eq!(stream.la(1).unwrap(), 'a' as i32);
    stream.consume().unwrap();
    assert_eq!(stream.la(1).unwrap(), 'b' as i32);
    assert_eq!(stream.la(-1).unwrap(), 'a' as i32);
    stream.consume().unwrap();
    assert_eq!(stream.la(1).unwrap(), EOF);
    assert!(stream.consume().is_err());
    assert_eq!(stream.get_text(0, 1).unwrap(), "ab");
}

#[cfg(test)]
struct ScriptedTokenSource {
    tokens: Vec<Token>,
    index: usize,
}

#[cfg(test)]
impl TokenSource for ScriptedTokenSource {
    fn next_token(&mut self) -> Result<Token, PipelineError> {
        let token: Token = if self.index < self.tokens.len() {
            self.tokens[self.index].clone()
        } else {
            Token::eof()
        };
        self.index += 1;
        Ok(token)
    }
}

#[test]
fn test_token_source_adapter_yields_eof_then_ends() {
    let source = ScriptedTokenSource {
        tokens: vec![Token::new(1, "a")],
        index: 0,
    };
    let mut it = TokenSourceToIteratorAdapter::new(source);
    assert!(it.at_start());

    it.advance().unwrap();
    assert_eq!(it.current().unwrap().text, "a");

    it.advance().unwrap();
    assert!(it.current().unwrap().is_eof());

    it.advance().unwrap();
    assert!(it.at_end());
}

#[test]
fn test_token_stream_adapter_in_band_eof() {
    let tokens: Vec<Token> = vec![Token::new(1, "a"), Token::new(1, "b"), Token::eof()];
    let source = crate::iter::ListIterator::new(tokens);
    let mut stream = IteratorToTokenStreamAdapter::new(source).unwrap();

    assert_eq!(stream.lt(1).unwrap().unwrap().text, "a");
    assert_eq!(stream.lt(2).unwrap().unwrap().text, "b");

    // Past-end lookups answer with the lexer's own EOF token.
    assert!(stream.lt(3).unwrap().unwrap().is_eof());
    assert!(stream.lt(9).unwrap().unwrap().is_eof());

    // The iterator facet never exposes the EOF token.
    stream.consume().unwrap();
    stream.consume().unwrap();
    assert!(stream.at_end());
    assert_eq!(stream.index(), 2);
    assert!(stream.lt(1).unwrap().unwrap().is_eof());

    // A lookup reaching before the start answers with a null token.
    assert!(stream.lt(-5).unwrap().is_none());
}

#[test]
fn test_token_stream_adapter_empty_source() {
    let tokens: Vec<Token> = vec![Token::eof()];
    let source = crate::iter::ListIterator::new(tokens);
    let mut stream = IteratorToTokenStreamAdapter::new(source).unwrap();
    assert!(stream.at_end());
    assert!(stream.lt(1).unwrap().unwrap().is_eof());
    assert!(stream.consume().is_err());
}

#[test]
fn test_vec_token_stream() {
    let mut source = ScriptedTokenSource {
        tokens: vec![Token::new(1, "a"), Token::new(2, "b")],
        index: 0,
    };
    let mut stream = VecTokenStream::from_source(&mut source).unwrap();
    assert_eq!(stream.size(), 3);
    assert_eq!(stream.lt(1).unwrap().unwrap().text, "a");
    stream.consume().unwrap();
    assert_eq!(stream.lt(1).unwrap().unwrap().text, "b");
    assert_eq!(stream.lt(-1).unwrap().unwrap().text, "a");
    stream.consume().unwrap();
    assert!(stream.lt(1).unwrap().unwrap().is_eof());
    assert!(stream.consume().is_err());
}

#[test]
fn test_token_to_char_iterator() {
    let tokens: Vec<Token> = vec![
        Token::new(1, "ab"),
        Token::new(1, ""),
        Token::new(1, "c"),
        Token::eof(),
        Token::new(1, "never"),
    ];
    let source = crate::iter::ListIterator::new(tokens);
    let it = TokenToCharIterator::new(source);
    let collected: String = crate::iter::Items::new(it)
        .map(|item| item.unwrap())
        .collect();
    assert_eq!(collected, "abc");
}
