use crate::args::ArgsError;
use crate::resolver::ResolveError;
use thiserror::Error;

/// Why an insert produced no edit.
#[derive(Debug, Error)]
pub enum InsertError {
    #[error("No mixin call found at the cursor.")]
    NotFound,
    #[error("Found +{name}(...), but no target rule is configured for it.")]
    UnknownRule { name: String },
    #[error("Found +{name}(...), but rule type `{kind}` is not supported.")]
    UnsupportedShape { name: String, kind: String },
    #[error(transparent)]
    Parse(#[from] ArgsError),
    #[error(transparent)]
    Resolution(#[from] ResolveError),
}

impl InsertError {
    /// "Nothing to do here" outcomes, as opposed to a broken operation.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            InsertError::NotFound
                | InsertError::UnknownRule { .. }
                | InsertError::UnsupportedShape { .. }
        )
    }
}
