use std::fmt::{Display, Formatter};

/// A raw `ra_svn` wire protocol item.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SvnItem {
    /// A protocol word token.
    Word(String),
    /// A protocol number token.
    Number(u64),
    /// A protocol string token (raw bytes; may not be valid UTF-8).
    String(Vec<u8>),
    /// A protocol list token.
    List(Vec<SvnItem>),
    /// A protocol boolean token.
    Bool(bool),
}

impl SvnItem {
    pub(crate) fn word(word: &str) -> Self {
        SvnItem::Word(word.to_string())
    }

    pub(crate) fn string(bytes: impl AsRef<[u8]>) -> Self {
        SvnItem::String(bytes.as_ref().to_vec())
    }

    pub(crate) fn as_word(&self) -> Option<&str> {
        match self {
            SvnItem::Word(w) => Some(w),
            _ => None,
        }
    }

    pub(crate) fn as_u64(&self) -> Option<u64> {
        match self {
            SvnItem::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string payload if it is valid UTF-8.
    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            SvnItem::String(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub(crate) fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SvnItem::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub(crate) fn as_list(&self) -> Option<&[SvnItem]> {
        match self {
            SvnItem::List(items) => Some(items),
            _ => None,
        }
    }

    /// Reads a `( ? value )` optional tuple or a bare value as text.
    pub(crate) fn as_wordish(&self) -> Option<String> {
        match self {
            SvnItem::List(items) => items.first().and_then(SvnItem::as_wordish),
            SvnItem::Word(w) => Some(w.clone()),
            SvnItem::String(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

impl Display for SvnItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SvnItem::Word(w) => write!(f, "{w}"),
            SvnItem::Number(n) => write!(f, "{n}"),
            SvnItem::String(s) => write!(f, "<{} bytes>", s.len()),
            SvnItem::List(items) => write!(f, "({} items)", items.len()),
            SvnItem::Bool(b) => write!(f, "{b}"),
        }
    }
}
