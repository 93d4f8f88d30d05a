//! SEARCH/REPLACE application against in-memory file contents.
//!
//! [`PatchApplier`] takes the current text of a file plus one search block
//! and one replace block, strips the quoting clients wrap around code, and
//! rewrites the first matching location. Matching tries, in order:
//!
//! 1. exact whole-line match
//! 2. match ignoring a uniform leading-whitespace offset, re-indenting the
//!    replacement to fit
//! 3. the same two after dropping a spurious blank first search line
//! 4. piecewise match around `...` elision lines
//! 5. plain substring match
//!
//! An empty search block appends the replacement to the file.

pub mod errors;
pub mod fence;
mod matcher;

use std::path::Path;

pub use errors::PatchError;
pub use fence::Fence;
pub use matcher::MatchStrategy;

/// Result of a successful application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patched {
    pub text: String,
    pub strategy: MatchStrategy,
}

/// Applies SEARCH/REPLACE blocks using a configured fence.
#[derive(Debug, Clone, Default)]
pub struct PatchApplier {
    fence: Fence,
}

impl PatchApplier {
    pub fn new(fence: Fence) -> Self {
        Self { fence }
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Apply one block to `current`, the present contents of `file`.
    ///
    /// `file` is only used to recognise a leading filename line inside the
    /// blocks. Nothing is read from or written to disk.
    pub fn apply(
        &self,
        file: &Path,
        current: &str,
        search: &str,
        replace: &str,
    ) -> Result<Patched, PatchError> {
        let file_name = file.file_name().and_then(|name| name.to_str());
        let part = self.fence.strip(search, file_name);
        let replacement = self.fence.strip(replace, file_name);

        // Only a truly empty block appends; whitespace-only text is searched for
        if part.is_empty() {
            return Ok(Patched {
                text: append(current, &replacement),
                strategy: MatchStrategy::Append,
            });
        }

        match matcher::replace_first_match(current, &part, &replacement)? {
            Some((text, strategy)) => Ok(Patched { text, strategy }),
            None => Err(PatchError::NoMatch {
                search: search.to_string(),
                hint: matcher::closest_chunk(current, &part),
            }),
        }
    }
}

/// Apply one block with the given fence, returning only the new text.
pub fn apply(current: &str, search: &str, replace: &str, fence: &Fence) -> Result<String, PatchError> {
    PatchApplier::new(fence.clone())
        .apply(Path::new(""), current, search, replace)
        .map(|patched| patched.text)
}

// A newline is inserted only when the file has content that lacks one.
fn append(current: &str, replacement: &str) -> String {
    let mut text = current.to_string();
    if !replacement.is_empty() && !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(replacement);
    text
}
