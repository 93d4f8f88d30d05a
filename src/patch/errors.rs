use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("SEARCH block failed to match:\n{search}")]
    NoMatch {
        /// The search text as submitted, before fence stripping
        search: String,
        /// Closest run of lines in the file, if one is similar enough
        hint: Option<String>,
    },

    #[error("unpaired ... in SEARCH/REPLACE block")]
    UnpairedEllipsis,

    #[error("unmatched ... in SEARCH/REPLACE block")]
    MismatchedEllipsis,

    #[error("elided SEARCH section matched {count} times, expected exactly 1")]
    ElidedSection { count: usize },
}

impl PatchError {
    /// True for the plain "search text not found" case.
    pub fn is_no_match(&self) -> bool {
        matches!(self, PatchError::NoMatch { .. })
    }
}
