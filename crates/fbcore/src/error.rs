#[derive(Debug, thiserror::Error)]
pub enum FbError {
    #[error("{what} mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("tile layout mismatch: expected {expected:?}, got {actual:?}")]
    LayoutMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("aov '{0}' not found")]
    UnknownAov(String),
    #[error("aov '{0}' is a reference and owns no storage")]
    ReferenceAov(String),
    #[error("aov index {0} out of range")]
    AovIndexOutOfRange(usize),
    #[error("malformed dump: {0}")]
    Format(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FbError {
    pub(crate) fn mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }
}
