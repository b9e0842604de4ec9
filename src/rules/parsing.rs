//! Minimal parser combinators over an immutable text [`Cursor`].
//!
//! Parsers are PEG-style: each one either fails or yields a value together
//! with the advanced cursor. Alternatives are tried in order and the first
//! success wins; nothing is retained from failed attempts.

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;

/// A view `(text, start, end)` into a shared source string.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Cursor {
            text,
            start: 0,
            end: text.len(),
        }
    }

    /// The unconsumed part of the input.
    pub fn rest(&self) -> &'a str {
        &self.text[self.start..self.end]
    }

    pub fn source(&self) -> &'a str {
        self.text
    }

    pub fn position(&self) -> usize {
        self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Moves the start forward by `len` bytes. `len` must end on a char
    /// boundary of the remaining input.
    pub fn advance(self, len: usize) -> Self {
        Cursor {
            start: (self.start + len).min(self.end),
            ..self
        }
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("rest", &self.rest())
            .finish()
    }
}

/// Result of a single parse attempt.
pub type Parsed<'a, T> = Option<(T, Cursor<'a>)>;

type ParseFn<T> = dyn for<'a> Fn(Cursor<'a>) -> Parsed<'a, T> + Send + Sync;

/// A shareable parser producing values of type `T`.
pub struct Parser<T> {
    inner: Arc<ParseFn<T>>,
}

impl<T> Clone for Parser<T> {
    fn clone(&self) -> Self {
        Parser {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Parser<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(Cursor<'a>) -> Parsed<'a, T> + Send + Sync + 'static,
    {
        Parser { inner: Arc::new(f) }
    }

    pub fn parse<'a>(&self, cursor: Cursor<'a>) -> Parsed<'a, T> {
        (self.inner)(cursor)
    }

    /// Parses `text`, returning the value only when the whole input is consumed.
    pub fn parse_all(&self, text: &str) -> Option<T> {
        match self.parse(Cursor::new(text)) {
            Some((value, rest)) if rest.is_empty() => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> Parser<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        transform(f, self)
    }
}

/// Matches `literal` exactly at the cursor.
pub fn txt(literal: &'static str) -> Parser<()> {
    Parser::new(move |cursor: Cursor<'_>| {
        cursor
            .rest()
            .starts_with(literal)
            .then(|| ((), cursor.advance(literal.len())))
    })
}

/// Matches `literal` at the cursor, ignoring ASCII case.
pub fn txt_ignore_case(literal: &'static str) -> Parser<()> {
    Parser::new(move |cursor: Cursor<'_>| {
        cursor
            .rest()
            .get(..literal.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(literal))
            .map(|_| ((), cursor.advance(literal.len())))
    })
}

/// Matches `rex` at the cursor. The expression must be anchored with `^`.
pub fn regex(rex: &'static Regex) -> Parser<String> {
    Parser::new(move |cursor: Cursor<'_>| {
        let found = rex.find(cursor.rest())?;
        (found.start() == 0).then(|| (found.as_str().to_string(), cursor.advance(found.end())))
    })
}

/// Runs `first` then `second`, yielding both values.
pub fn seq<A, B>(first: Parser<A>, second: Parser<B>) -> Parser<(A, B)>
where
    A: 'static,
    B: 'static,
{
    Parser::new(move |cursor: Cursor<'_>| {
        let (a, cursor) = first.parse(cursor)?;
        let (b, cursor) = second.parse(cursor)?;
        Some(((a, b), cursor))
    })
}

/// Runs three parsers in order, yielding all values.
pub fn seq3<A, B, C>(first: Parser<A>, second: Parser<B>, third: Parser<C>) -> Parser<(A, B, C)>
where
    A: 'static,
    B: 'static,
    C: 'static,
{
    Parser::new(move |cursor: Cursor<'_>| {
        let (a, cursor) = first.parse(cursor)?;
        let (b, cursor) = second.parse(cursor)?;
        let (c, cursor) = third.parse(cursor)?;
        Some(((a, b, c), cursor))
    })
}

/// `seq` picking the second value.
pub fn preceded<A: 'static, B: 'static>(first: Parser<A>, second: Parser<B>) -> Parser<B> {
    seq(first, second).map(|(_, b)| b)
}

/// `seq` picking the first value.
pub fn terminated<A: 'static, B: 'static>(first: Parser<A>, second: Parser<B>) -> Parser<A> {
    seq(first, second).map(|(a, _)| a)
}

/// `seq3` picking the middle value.
pub fn delimited<A, B, C>(open: Parser<A>, inner: Parser<B>, close: Parser<C>) -> Parser<B>
where
    A: 'static,
    B: 'static,
    C: 'static,
{
    seq3(open, inner, close).map(|(_, b, _)| b)
}

/// Ordered choice: the first alternative that succeeds wins.
pub fn union<T: 'static>(alternatives: Vec<Parser<T>>) -> Parser<T> {
    Parser::new(move |cursor: Cursor<'_>| {
        alternatives
            .iter()
            .find_map(|alternative| alternative.parse(cursor))
    })
}

/// Never fails. Yields `None` without consuming input when `parser` fails.
pub fn maybe<T: 'static>(parser: Parser<T>) -> Parser<Option<T>> {
    Parser::new(move |cursor: Cursor<'_>| match parser.parse(cursor) {
        Some((value, cursor)) => Some((Some(value), cursor)),
        None => Some((None, cursor)),
    })
}

/// Never fails. Applies `parser` greedily, collecting the values in order.
pub fn repeat<T: 'static>(parser: Parser<T>) -> Parser<Vec<T>> {
    Parser::new(move |mut cursor: Cursor<'_>| {
        let mut values = Vec::new();
        while let Some((value, next)) = parser.parse(cursor) {
            values.push(value);
            // an empty match would repeat forever
            if next.position() == cursor.position() {
                break;
            }
            cursor = next;
        }
        Some((values, cursor))
    })
}

/// Applies `ctor` to the value of a successful `parser`.
pub fn transform<T, U, F>(ctor: F, parser: Parser<T>) -> Parser<U>
where
    T: 'static,
    U: 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    Parser::new(move |cursor: Cursor<'_>| {
        parser
            .parse(cursor)
            .map(|(value, cursor)| (ctor(value), cursor))
    })
}

/// Like [`transform`], but `ctor` may reject the value.
pub fn try_transform<T, U, F>(ctor: F, parser: Parser<T>) -> Parser<U>
where
    T: 'static,
    U: 'static,
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
{
    Parser::new(move |cursor: Cursor<'_>| {
        let (value, cursor) = parser.parse(cursor)?;
        ctor(value).map(|value| (value, cursor))
    })
}

/// Always succeeds without consuming input.
pub fn epsilon<T>(value: T) -> Parser<T>
where
    T: Clone + Send + Sync + 'static,
{
    Parser::new(move |cursor: Cursor<'_>| Some((value.clone(), cursor)))
}

/// A parser whose definition is supplied after construction, for
/// recursive grammar rules.
pub struct ForwardRef<T> {
    slot: Arc<OnceLock<Parser<T>>>,
}

/// Creates an unbound [`ForwardRef`].
pub fn forward_ref<T: 'static>() -> ForwardRef<T> {
    ForwardRef {
        slot: Arc::new(OnceLock::new()),
    }
}

impl<T: 'static> ForwardRef<T> {
    /// A handle that parses with whatever the reference is bound to.
    /// Fails while unbound.
    pub fn parser(&self) -> Parser<T> {
        let slot = self.slot.clone();
        Parser::new(move |cursor: Cursor<'_>| slot.get()?.parse(cursor))
    }

    /// Binds the reference. Consumes it, so a reference is bound at most once.
    pub fn bind(self, parser: Parser<T>) {
        if self.slot.set(parser).is_err() {
            log::warn!("forward reference bound twice");
        }
    }
}

type TailCtor<I, U, O> = Arc<dyn Fn(I, U) -> O + Send + Sync>;
type DefaultCtor<I, O> = Arc<dyn Fn(I) -> O + Send + Sync>;

/// Builder for [`step`] parsers.
pub struct Step<I, U, O> {
    initial: Parser<I>,
    tails: Vec<(Parser<U>, TailCtor<I, U, O>)>,
}

/// Parses `initial`, then decides what to build from the first tail that
/// follows it.
///
/// Each tail is tried in order against the remaining input; the first one
/// that succeeds has its constructor applied to `(initial, tail)`. When no
/// tail matches, [`Step::default`] builds from the initial value alone and
/// [`Step::build`] fails.
pub fn step<I: 'static, U: 'static, O: 'static>(initial: Parser<I>) -> Step<I, U, O> {
    Step {
        initial,
        tails: Vec::new(),
    }
}

impl<I: 'static, U: 'static, O: 'static> Step<I, U, O> {
    pub fn tail<F>(mut self, tail: Parser<U>, ctor: F) -> Self
    where
        F: Fn(I, U) -> O + Send + Sync + 'static,
    {
        self.tails.push((tail, Arc::new(ctor)));
        self
    }

    /// Finishes the parser, failing when no tail matches.
    pub fn build(self) -> Parser<O> {
        self.finish(None)
    }

    /// Finishes the parser, falling back to `ctor(initial)` when no tail matches.
    pub fn default<F>(self, ctor: F) -> Parser<O>
    where
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        self.finish(Some(Arc::new(ctor)))
    }

    fn finish(self, default: Option<DefaultCtor<I, O>>) -> Parser<O> {
        let Step { initial, tails } = self;
        Parser::new(move |cursor: Cursor<'_>| {
            let (value, cursor) = initial.parse(cursor)?;
            for (tail, ctor) in &tails {
                if let Some((tail_value, cursor)) = tail.parse(cursor) {
                    return Some((ctor(value, tail_value), cursor));
                }
            }
            default.as_ref().map(|ctor| (ctor(value), cursor))
        })
    }
}
