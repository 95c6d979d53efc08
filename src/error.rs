//! The error taxonomy (§7, component J). All compiler errors are fatal; there is no local
//! recovery, so every fallible API simply returns `Result<T, CompileError>` and propagates with
//! `?`. This mirrors the teacher's preference for a flat `thiserror` enum over an exception
//! hierarchy.

use thiserror::Error;

/// One variant per §7 error kind. `Parse` is a reserved variant: this core has no parser, but
/// an external front end constructing IR through the builder can still report through it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("binding error: unresolved identifier `{name}`")]
    Binding { name: String },

    #[error("type error: {message}")]
    Type { message: String },

    #[error("structural error: {message}")]
    Structural { message: String },

    #[error("lowering precondition error: {construct} should have been lowered before emission")]
    LoweringPrecondition { construct: String },

    #[error("unimplemented: TODO {construct}")]
    Unimplemented { construct: String },
}

impl CompileError {
    pub fn structural(message: impl Into<String>) -> Self {
        CompileError::Structural {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        CompileError::Type {
            message: message.into(),
        }
    }

    pub fn binding(name: impl Into<String>) -> Self {
        CompileError::Binding { name: name.into() }
    }

    pub fn unimplemented(construct: impl Into<String>) -> Self {
        CompileError::Unimplemented {
            construct: construct.into(),
        }
    }

    pub fn lowering_precondition(construct: impl Into<String>) -> Self {
        CompileError::LoweringPrecondition {
            construct: construct.into(),
        }
    }

    /// Maps this error onto the process exit codes named in §6. Embedders that want the
    /// driver's exit-code convention can use this; the driver itself remains out of scope.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Parse { .. } => -1,
            CompileError::Binding { .. } => -2,
            CompileError::Type { .. } => -3,
            CompileError::Structural { .. } => -4,
            CompileError::LoweringPrecondition { .. } => -5,
            CompileError::Unimplemented { .. } => -6,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
