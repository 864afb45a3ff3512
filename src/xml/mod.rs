//! XML record parsing
//!
//! Repository responses are small XML documents. [`XmlDocument`] parses one
//! body into an element tree and answers tag-name searches and simple path
//! queries over it.

mod document;

pub use document::{Element, Result, XmlDocument, XmlError};
