use crate::ts::Lang;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to set {0:?} grammar for parser")]
    LanguageSet(Lang),

    #[error("failed to parse {0:?} source")]
    ParseFailed(Lang),
}
