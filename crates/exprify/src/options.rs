/// Maximum statement/expression nesting handled by the recursive lowering pass.
///
/// In debug builds, we use a lower limit because stack frames are much larger
/// (no inlining, debug info, etc.).
#[cfg(not(debug_assertions))]
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 400;
/// Maximum statement/expression nesting handled by the recursive lowering pass.
///
/// In debug builds, we use a lower limit because stack frames are much larger
/// (no inlining, debug info, etc.).
#[cfg(debug_assertions)]
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 120;

/// Configuration for one compiler.
///
/// Use `LowerOptions::default()` for the defaults, or build custom options
/// with the builder pattern.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LowerOptions {
    /// Maximum nesting of statements and expressions. `None` disables the check.
    pub max_nesting_depth: Option<usize>,
    /// Pass declared base classes (and a `metaclass=` keyword) to the class construction
    /// call. When false, bases and class keywords are dropped and every lowered class
    /// derives from `object` only.
    pub keep_class_bases: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: Some(DEFAULT_MAX_NESTING_DEPTH),
            keep_class_bases: false,
        }
    }
}

impl LowerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn max_nesting_depth(mut self, limit: usize) -> Self {
        self.max_nesting_depth = Some(limit);
        self
    }

    /// Disables the nesting depth check.
    #[must_use]
    pub fn unlimited_nesting(mut self) -> Self {
        self.max_nesting_depth = None;
        self
    }

    #[must_use]
    pub fn keep_class_bases(mut self, keep: bool) -> Self {
        self.keep_class_bases = keep;
        self
    }
}
