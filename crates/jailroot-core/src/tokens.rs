//! On-demand splitting of delimited list strings.
//!
//! Minimal replacement for a consuming `strsep(3)`, which not every libc
//! provides. Adjacent delimiters yield empty tokens; skipping them is the
//! caller's job, not hidden here.

/// Cursor over a delimited list, yielding one token per call.
///
/// The cursor holds the unconsumed remainder and becomes exhausted after
/// handing out the token that follows the last delimiter.
#[derive(Debug)]
pub struct TokenSplitter<'a> {
    rest: Option<&'a str>,
    delimiters: &'a str,
}

impl<'a> TokenSplitter<'a> {
    /// Creates a splitter over `list`, treating any character of
    /// `delimiters` as a separator.
    #[must_use]
    pub const fn new(list: &'a str, delimiters: &'a str) -> Self {
        Self {
            rest: Some(list),
            delimiters,
        }
    }
}

impl<'a> Iterator for TokenSplitter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        match rest.find(|c: char| self.delimiters.contains(c)) {
            Some(at) => {
                let width = rest[at..].chars().next().map_or(1, char::len_utf8);
                self.rest = Some(&rest[at + width..]);
                Some(&rest[..at])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}
