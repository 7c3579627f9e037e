//! Well-known property names, the text media type gate and the `attributes`
//! text block.

use std::fmt::Write as _;

use crate::PropertyList;

/// Declared media type of a file.
pub const MIME_TYPE: &str = "svn:mime-type";
/// Revision that was served for the file.
pub const ENTRY_REVISION: &str = "svn:entry:revision";
/// Line ending style applied on checkout.
pub const EOL_STYLE: &str = "svn:eol-style";
/// MD5 of the stored contents, in lowercase hex.
pub const ENTRY_CHECKSUM: &str = "svn:entry:checksum";
/// Revision in which the file last changed.
pub const ENTRY_COMMITTED_REV: &str = "svn:entry:committed-rev";
/// Date of the last change.
pub const ENTRY_COMMITTED_DATE: &str = "svn:entry:committed-date";
/// Author of the last change.
pub const ENTRY_LAST_AUTHOR: &str = "svn:entry:last-author";
/// Repository UUID.
pub const ENTRY_UUID: &str = "svn:entry:uuid";

/// Returns `true` when a declared media type denotes text content.
///
/// A missing media type counts as text, as do `text/*` and the two image
/// types Subversion treats as text (`image/x-xbitmap`, `image/x-xpixmap`).
/// Parameters such as `; charset=utf-8` are ignored.
///
/// ```
/// # use svnread::props::is_text_mime_type;
/// assert!(is_text_mime_type(None));
/// assert!(is_text_mime_type(Some("text/xml; charset=utf-8")));
/// assert!(!is_text_mime_type(Some("application/octet-stream")));
/// ```
pub fn is_text_mime_type(mime_type: Option<&str>) -> bool {
    let Some(mime_type) = mime_type else {
        return true;
    };
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/") || essence == "image/x-xbitmap" || essence == "image/x-xpixmap"
}

/// Returns `true` when the property list declares text content.
pub fn has_text_mime_type(props: &PropertyList) -> bool {
    let mime_type = props
        .get(MIME_TYPE)
        .map(|value| String::from_utf8_lossy(value));
    is_text_mime_type(mime_type.as_deref())
}

/// How keys and values are written into the `attributes` block.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AttributeEncoding {
    /// Keys and values are written between quotes as they are, without any
    /// escaping. Embedded quotes or newlines end up in the output verbatim.
    #[default]
    Raw,
    /// Keys and values are written as JSON string literals.
    Escaped,
}

/// Serializes a property list into the `attributes` text block.
///
/// Each property becomes one `  "key" : "value"` line; lines are separated by
/// commas and the block is enclosed in braces. Values are decoded as UTF-8,
/// replacing invalid sequences.
///
/// ```
/// # use svnread::PropertyList;
/// # use svnread::props::{serialize_attributes, AttributeEncoding};
/// let mut props = PropertyList::new();
/// props.insert("svn:entry:revision".into(), b"7".to_vec());
/// props.insert("svn:mime-type".into(), b"text/plain".to_vec());
/// assert_eq!(
///     serialize_attributes(&props, AttributeEncoding::Raw),
///     "{\n  \"svn:entry:revision\" : \"7\",\n  \"svn:mime-type\" : \"text/plain\"\n}"
/// );
/// ```
pub fn serialize_attributes(props: &PropertyList, encoding: AttributeEncoding) -> String {
    let mut out = String::from("{");
    for (idx, (key, value)) in props.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        let value = String::from_utf8_lossy(value);
        let _ = write!(
            out,
            "\n  {} : {}",
            quote(key, encoding),
            quote(&value, encoding)
        );
    }
    out.push_str("\n}");
    out
}

fn quote(text: &str, encoding: AttributeEncoding) -> String {
    match encoding {
        AttributeEncoding::Raw => format!("\"{text}\""),
        AttributeEncoding::Escaped => serde_json::Value::from(text).to_string(),
    }
}
