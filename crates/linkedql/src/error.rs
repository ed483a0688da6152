use linkedql_quadstore::StoreError;

/// Errors raised while compiling or running a LinkedQL query.
///
/// `MalformedStep` and `UnresolvedTag` are compile-time errors: they abort
/// compilation before any iteration starts. `TypeMismatch` may surface either
/// at compile time (an unorderable comparison operand) or lazily, from the
/// result stream, together with `StoreFault`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkedQlError {
    #[error("malformed step: {0}")]
    MalformedStep(String),

    #[error("unresolved tag `{0}`")]
    UnresolvedTag(String),

    #[error("type mismatch in {operation}: {detail}")]
    TypeMismatch {
        operation: &'static str,
        detail: String,
    },

    #[error("store fault: {0}")]
    StoreFault(#[from] StoreError),
}

impl LinkedQlError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        LinkedQlError::MalformedStep(msg.into())
    }

    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            LinkedQlError::MalformedStep(_) | LinkedQlError::UnresolvedTag(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkedQlError>;
