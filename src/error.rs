use std::error;
use std::fmt;

/// Aborts compilation because the compiler itself reached a state that should be impossible.
/// These are never user errors.
#[macro_export]
macro_rules! ice {
    ($($arg:tt)+) => {
        panic!("internal compiler error: {}", format_args!($($arg)+))
    };
}

#[derive(Debug, Clone)]
pub struct Error<T> {
    pub kind: T,
    file: Option<std::path::PathBuf>,
    location: Option<Location>,
    snippet: Option<Snippet>,
    contexts: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub const fn new(offset: usize) -> Self {
        Self { offset, len: 1 }
    }
    pub const fn with_len(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }
    /// Span covering both `self` and `other`
    #[must_use]
    pub fn to(self, other: Span) -> Self {
        let start = self.offset.min(other.offset);
        let end = (self.offset + self.len).max(other.offset + other.len);
        Self {
            offset: start,
            len: end - start,
        }
    }
    pub const fn as_range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
    pub fn snippet_from_source(&self, source: &SourceMetadata) -> Option<Snippet> {
        let mut offset = 0;
        let mut last = None;
        for (i, line) in source.input().split_terminator('\n').enumerate() {
            let next_offset = offset + line.len() + 1;
            if next_offset > self.offset {
                // offset is somewhere in the current line
                return Some(Snippet {
                    position: Position {
                        line: i,
                        col: self.offset - offset,
                    },
                    line: line.to_string(),
                });
            }
            last = Some((i, offset, line));
            offset = next_offset;
        }
        // past the end of the input: point right after the last character
        last.map(|(i, line_offset, line)| Snippet {
            position: Position {
                line: i,
                col: line.len().min(self.offset.saturating_sub(line_offset)),
            },
            line: line.to_string(),
        })
    }
    pub fn location(&self, source: &SourceMetadata) -> Location {
        let position = self
            .snippet_from_source(source)
            .map(|snippet| snippet.position)
            .unwrap_or_default();
        Location {
            file: source.file_name().to_string(),
            line: position.line + 1,
            col: position.col + 1,
        }
    }
}

#[derive(Debug)]
pub struct SourceMetadata<'a> {
    file: Option<std::path::PathBuf>,
    source: &'a str,
}

impl<'a> SourceMetadata<'a> {
    pub const fn input(&self) -> &'a str {
        self.source
    }
    pub const fn new(source: &'a str) -> Self {
        Self { file: None, source }
    }
    #[must_use]
    pub fn with_file(mut self, file: std::path::PathBuf) -> Self {
        self.file = Some(file);
        self
    }
    pub fn file_name(&self) -> &str {
        self.file
            .as_ref()
            .and_then(|x| x.to_str())
            .unwrap_or("<unknown source>")
    }
}

/// A human readable place in the source: `file:line:col`, both 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

pub type ErrorCallback<'a> = Box<dyn FnMut(&Location, fmt::Arguments<'_>) + 'a>;

/// Forwards front end diagnostics to a callback, or to stderr when there is none.
/// Reporting never stops the caller; it only counts.
#[derive(Default)]
pub struct Reporter<'a> {
    callback: Option<ErrorCallback<'a>>,
    errors: usize,
}

impl<'a> Reporter<'a> {
    pub fn new() -> Self {
        Self {
            callback: None,
            errors: 0,
        }
    }
    #[must_use]
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&Location, fmt::Arguments<'_>) + 'a,
    {
        self.callback = Some(Box::new(callback));
        self
    }
    pub fn report(&mut self, location: &Location, args: fmt::Arguments<'_>) {
        self.errors += 1;
        match self.callback.as_mut() {
            Some(callback) => callback(location, args),
            None => eprintln!("{} {}", location, args),
        }
    }
    pub const fn error_count(&self) -> usize {
        self.errors
    }
}

impl fmt::Debug for Reporter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("has_callback", &self.callback.is_some())
            .field("errors", &self.errors)
            .finish()
    }
}

impl<T> Error<T> {
    pub const fn new(kind: T) -> Self {
        Self {
            kind,
            snippet: None,
            file: None,
            location: None,
            contexts: Vec::new(),
        }
    }
    pub fn map_kind<F, U>(self, mapper: F) -> Error<U>
    where
        F: Fn(T) -> U,
    {
        Error {
            kind: mapper(self.kind),
            snippet: self.snippet,
            file: self.file,
            location: self.location,
            contexts: self.contexts,
        }
    }
    #[must_use]
    pub fn with_source(mut self, span: Span, source: &SourceMetadata) -> Self {
        self.file = source.file.clone();
        self.location = Some(span.location(source));
        self.snippet = span.snippet_from_source(source);
        self
    }
    #[must_use]
    pub fn add_context(mut self, ctx: &'static str) -> Self {
        self.contexts.push(ctx);
        self
    }
    pub const fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }
}

#[derive(Debug, Clone)]
pub enum WantedSpec<T> {
    Specific(T),
    Description(&'static str),
}

impl<T: fmt::Display> fmt::Display for WantedSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Description(desc) => f.write_str(desc),
            Self::Specific(t) => write!(f, "{}", t),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Snippet {
    position: Position,
    line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub col: usize,
    pub line: usize,
}

impl<T: error::Error + 'static> error::Error for Error<T> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl<T: fmt::Display> fmt::Display for Error<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let whiles = self
            .contexts
            .iter()
            .copied()
            .fold(String::new(), |acc, next| acc + "\nwhile " + next);
        let snippet = if let Some(snip) = &self.snippet {
            snip
        } else {
            return write!(f, "{}{}", self.kind, whiles);
        };
        let file = self
            .file
            .as_ref()
            .and_then(|x| x.to_str())
            .unwrap_or("<unknown source>");

        write!(
            f,
            "\
{kind}
   --> {file}:{line}:{col}
    |
{line:3} | {snippet}
    | {marker:>0$}{whiles}",
            snippet.position.col + 1,
            marker = '^',
            line = snippet.position.line + 1,
            col = snippet.position.col + 1,
            file = file,
            kind = self.kind,
            snippet = snippet.line,
            whiles = whiles,
        )
    }
}

/// Every error a pass found, in the order it found them.
#[derive(Debug, Clone)]
pub struct ErrorList<T>(pub Vec<Error<T>>);

impl<T> ErrorList<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Error<T>> {
        self.0.iter()
    }
}

impl<T> From<Vec<Error<T>>> for ErrorList<T> {
    fn from(errors: Vec<Error<T>>) -> Self {
        Self(errors)
    }
}

impl<T: fmt::Display> fmt::Display for ErrorList<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "error: {}", error)?;
        }
        Ok(())
    }
}

impl<T: fmt::Debug + fmt::Display> error::Error for ErrorList<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_one_based() {
        let meta = SourceMetadata::new("fn main() = 1;\nfn other() = 2;\n");
        let loc = Span::new(18).location(&meta);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.col, 4);
        assert_eq!(loc.to_string(), "<unknown source>:2:4");
    }

    #[test]
    fn first_char_of_line_belongs_to_that_line() {
        let meta = SourceMetadata::new("ab\ncd");
        let loc = Span::new(3).location(&meta);
        assert_eq!((loc.line, loc.col), (2, 1));
    }

    #[test]
    fn reporter_uses_callback_and_counts() {
        let mut seen = Vec::new();
        {
            let mut reporter = Reporter::new().with_callback(|loc, args| {
                seen.push(format!("{} {}", loc, args));
            });
            let loc = Location {
                file: "a.tt".into(),
                line: 1,
                col: 2,
            };
            reporter.report(&loc, format_args!("bad {}", 42));
            assert_eq!(reporter.error_count(), 1);
        }
        assert_eq!(seen, vec!["a.tt:1:2 bad 42".to_string()]);
    }

    #[test]
    fn display_without_location_is_just_the_kind() {
        let err = Error::new("no function called 'main' found");
        assert_eq!(err.to_string(), "no function called 'main' found");
    }
}
