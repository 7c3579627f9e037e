use std::fmt::{Display, Formatter};

/// The revision a fetch should read.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Revision {
    /// The youngest revision, resolved by the server.
    #[default]
    Head,
    /// A specific revision number.
    Number(u64),
}

impl Revision {
    /// Parses a caller-supplied revision specifier.
    ///
    /// Only non-negative integer literals select a specific revision. Anything
    /// else (empty, `HEAD`, negative, non-numeric, out of range) means
    /// [`Revision::Head`]; this never fails.
    ///
    /// ```
    /// # use svnread::Revision;
    /// assert_eq!(Revision::parse_lenient("42"), Revision::Number(42));
    /// assert_eq!(Revision::parse_lenient("HEAD"), Revision::Head);
    /// assert_eq!(Revision::parse_lenient("-1"), Revision::Head);
    /// ```
    pub fn parse_lenient(spec: &str) -> Self {
        spec.parse::<i64>()
            .ok()
            .and_then(|n| u64::try_from(n).ok())
            .map_or(Self::Head, Self::Number)
    }

    /// Returns the revision number, or `None` for [`Revision::Head`].
    pub fn number(self) -> Option<u64> {
        match self {
            Self::Head => None,
            Self::Number(n) => Some(n),
        }
    }

    /// Returns the peg-revision suffix used by the command-line client.
    pub(crate) fn peg(self) -> String {
        match self {
            Self::Head => "HEAD".to_string(),
            Self::Number(n) => n.to_string(),
        }
    }
}

impl From<Option<&str>> for Revision {
    fn from(spec: Option<&str>) -> Self {
        spec.map_or(Self::Head, Self::parse_lenient)
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Head => f.write_str("HEAD"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}
