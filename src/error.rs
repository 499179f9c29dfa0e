use std::backtrace::Backtrace;
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The error taxonomy of the crate.
///
/// Structural/model errors ([`WcspError::ScopeMismatch`],
/// [`WcspError::NoConstraints`], the cost-bound errors) are raised
/// synchronously and abort the operation that triggered them. Process-level
/// errors from the external solver are raised after scratch-file cleanup has
/// been attempted.
#[derive(Debug, thiserror::Error)]
pub enum WcspError {
    /// An assignment's length does not match the arity of the constraint it
    /// was given to.
    #[error("assignment has {tuple_len} values but the constraint scope has {scope_len} variables")]
    ScopeMismatch { tuple_len: usize, scope_len: usize },

    /// Normalization was requested on a problem without any constraints.
    #[error("the problem contains no constraints")]
    NoConstraints,

    /// The running cost sum wrapped while computing the hard-cost bound.
    #[error("numeric overflow while computing the hard-cost bound")]
    NumericOverflow,

    /// The computed infeasibility cost exceeds what the external solver can
    /// represent. Distinct from [`WcspError::NumericOverflow`] so callers can
    /// rescale their weights upstream.
    #[error("maximum cost exceeded: {top} > {max}")]
    MaxCostExceeded { top: u64, max: u64 },

    /// The configured solver binary could not be found or is not executable.
    #[error("solver executable `{0}` cannot be found")]
    SolverNotFound(String),

    /// The solver process exited with a non-zero status.
    #[error("solver returned a non-zero exit code: {0}")]
    SolverFailed(i32),

    /// A problem file, or an assembled problem on the write path, did not
    /// follow the WCSP format invariants.
    #[error("malformed problem: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Inner: {inner}\n{backtrace}")]
    Inner {
        inner: Box<WcspError>,
        backtrace: Box<Backtrace>,
    },
}

impl Error {
    /// The underlying [`WcspError`], for matching on the failure kind.
    pub fn kind(&self) -> &WcspError {
        match self {
            Error::Inner { inner, .. } => inner,
        }
    }
}

impl From<WcspError> for Error {
    fn from(inner: WcspError) -> Self {
        Error::Inner {
            inner: Box::new(inner),
            backtrace: Box::new(std::backtrace::Backtrace::capture()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        WcspError::from(err).into()
    }
}
