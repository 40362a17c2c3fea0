use std::fmt;

use strum::{Display, IntoStaticStr};

/// A source construct that has no expression-only equivalent.
///
/// Every case carries its own message so callers can report exactly what was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Unsupported {
    #[strum(to_string = "'break' cannot be expressed without early loop exit")]
    Break,
    #[strum(to_string = "'continue' cannot be expressed without early loop exit")]
    Continue,
    #[strum(to_string = "'yield' requires suspend/resume semantics")]
    Yield,
    #[strum(to_string = "'yield from' requires suspend/resume semantics")]
    YieldFrom,
    #[strum(to_string = "'await' requires suspend/resume semantics")]
    Await,
    #[strum(to_string = "'async' functions, loops and context managers are not supported")]
    Async,
    #[strum(to_string = "'del' would explicitly unbind a name")]
    Delete,
    #[strum(to_string = "'pass' has no expression equivalent")]
    Pass,
    #[strum(to_string = "'global' declarations cannot be honoured by expressions")]
    Global,
    #[strum(to_string = "'nonlocal' declarations cannot be honoured by expressions")]
    Nonlocal,
    #[strum(to_string = "'try' with 'except*' is not supported")]
    ExceptionGroup,
    #[strum(to_string = "starred assignment targets are not supported inside functions")]
    StarredTarget,
    #[strum(to_string = "unsupported assignment target")]
    AssignTarget,
    #[strum(to_string = "loop targets must be names or tuples of names")]
    LoopTarget,
    #[strum(to_string = "a loop target cannot be rebound inside the loop body")]
    LoopTargetRebound,
    #[strum(to_string = "bare 'raise' is only supported inside an 'except' body")]
    BareRaise,
    #[strum(to_string = "relative imports are not supported")]
    RelativeImport,
    #[strum(to_string = "'from ... import *' is not supported")]
    StarImport,
    #[strum(to_string = "class bodies may only contain methods, assignments and a docstring")]
    ClassBody,
    #[strum(to_string = "class keywords other than 'metaclass' are not supported")]
    ClassKeyword,
}

/// Error returned when a module cannot be lowered.
///
/// Lowering is fail-fast: the first error aborts the pass and no partial output is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    Unsupported(Unsupported),
    /// A user identifier starts with the prefix reserved for synthetic names.
    ReservedIdentifier { name: String, prefix: String },
    /// Input nesting exceeded [`LowerOptions::max_nesting_depth`](crate::LowerOptions).
    NestingTooDeep { limit: usize },
}

impl fmt::Display for LowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(construct) => write!(f, "Exprify does not support this construct: {construct}"),
            Self::ReservedIdentifier { name, prefix } => {
                write!(f, "identifier '{name}' uses the reserved prefix '{prefix}'")
            }
            Self::NestingTooDeep { limit } => write!(f, "input nesting exceeds the limit of {limit} levels"),
        }
    }
}

impl std::error::Error for LowerError {}

impl From<Unsupported> for LowerError {
    fn from(construct: Unsupported) -> Self {
        Self::Unsupported(construct)
    }
}

/// Error returned by the JSON entry point of the driver.
#[derive(Debug)]
pub enum DriverError {
    /// Input was not a valid serialized module.
    Decode(serde_json::Error),
    /// The lowered program could not be serialized.
    Encode(serde_json::Error),
    Lower(LowerError),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "invalid module tree: {err}"),
            Self::Encode(err) => write!(f, "failed to serialize program: {err}"),
            Self::Lower(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(err) | Self::Encode(err) => Some(err),
            Self::Lower(err) => Some(err),
        }
    }
}

impl From<LowerError> for DriverError {
    fn from(err: LowerError) -> Self {
        Self::Lower(err)
    }
}
