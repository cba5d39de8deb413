//! Error handling.

mod types;

pub use types::{
    ArtifactErrorKind, CommandErrorKind, SetupError, SetupResult, ValidationErrorKind,
};
