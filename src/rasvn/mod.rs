//! Minimal `ra_svn` protocol layer: item model, wire encoding, connection
//! and response parsers.

pub(crate) mod conn;
mod item;
pub(crate) mod parse;
mod wire;

pub(crate) use item::SvnItem;
