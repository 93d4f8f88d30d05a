//! Tree-sitter parsing for the languages the bridge lints and maps.
//!
//! Grammars come from `ast-grep-language`; parsing goes through the raw
//! `tree-sitter` API so error and definition nodes can be walked directly.

pub mod errors;
pub mod lang;
pub mod parser;

pub use errors::TreeSitterError;
pub use lang::Lang;
pub use parser::{ParsedSource, SourceParser, SyntaxIssue};
