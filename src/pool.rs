//! Thread-local parser pooling.
//!
//! One parser per language per thread, created on first use and reused for
//! every later file in that language.

use crate::ts::{Lang, SourceParser, TreeSitterError};
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static PARSERS: RefCell<HashMap<Lang, SourceParser>> = RefCell::new(HashMap::new());
}

/// Execute `f` with this thread's parser for `lang`.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use patch_bridge::pool::with_parser;
/// use patch_bridge::ts::Lang;
///
/// let has_errors = with_parser(Lang::Rust, |parser| {
///     parser.parse_with_source("fn main() {}").map(|parsed| parsed.has_errors())
/// })??;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(lang: Lang, f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut SourceParser) -> R,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(lang) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(SourceParser::new(lang)?)
            }
        };
        Ok(f(parser))
    })
}
