use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown consistency level `{0}`")]
    InvalidConsistency(String),
    #[error("Mutation has no {0}")]
    MissingTarget(&'static str),
    #[error("Mutation for `{0}` has an empty row key")]
    EmptyKey(String),
    #[error("Expected `column=value`, got `{0}`")]
    MalformedAssignment(String),
}
