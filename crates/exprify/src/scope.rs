//! Lexical scope bookkeeping for the lowering pass.
//!
//! Each function (or lambda) body being lowered gets a [`Scope`]. Besides the known local
//! names, a scope carries the stack of shadow dictionaries opened by enclosing `try`
//! statements: while a shadow dictionary is open, reads of the names it holds and every
//! write in the scope go through the dictionary instead of the local binding, so the
//! thunks the `try` is split into can share state with their enclosing function.

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

/// A known local binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Local {
    /// The name is bound on every path reaching the current point.
    ///
    /// Only definite locals are snapshotted into a new shadow dictionary; reading a
    /// conditional one could fail before the `try` body even starts.
    pub definite: bool,
}

/// One open shadow dictionary.
#[derive(Debug, Clone)]
pub(crate) struct ShadowFrame {
    /// Synthetic variable holding the dictionary.
    pub dict: String,
    /// Keys present in the dictionary from the moment it is created.
    pub guaranteed: IndexSet<String>,
    /// Keys certainly present at the current point of the part of the `try` being lowered.
    pub settled: IndexSet<String>,
    /// Every key the dictionary may hold at the current point.
    pub keys: IndexSet<String>,
    /// Keys written inside this `try` statement, in first-write order.
    pub written: IndexSet<String>,
    /// Branch depth of the scope when the dictionary was opened. Writes made deeper may
    /// be skipped at runtime.
    branch_base: usize,
}

/// How to initialise a newly opened shadow dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShadowInit {
    /// Outermost level: copy these locals (which are all definitely bound) by name.
    Snapshot(Vec<String>),
    /// Nested level: copy everything from the enclosing dictionary.
    CopyOf(String),
}

/// Where a read of a name is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution<'a> {
    /// Lookup in the named shadow dictionary, which certainly holds the name.
    Shadow(&'a str),
    /// Lookup in the named shadow dictionary if it holds the name, plain reference otherwise.
    MaybeShadow(&'a str),
    /// Plain name reference.
    Direct,
    /// Not bound in this scope; an enclosing scope decides.
    Unknown,
}

/// Where a write to a name must go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteTarget {
    /// Ordinary name binding.
    Direct,
    /// Update of the named shadow dictionary.
    Shadow(String),
}

/// One lexical function-or-module level.
///
/// The module scope is the one at the bottom of a [`ScopeStack`].
#[derive(Debug, Default)]
pub(crate) struct Scope {
    locals: IndexMap<String, Local>,
    shadows: SmallVec<[ShadowFrame; 2]>,
    /// Loop and comprehension targets currently in effect, innermost last.
    ///
    /// These live in comprehension scopes of the lowered code and are always read directly.
    masked: Vec<String>,
    /// Number of enclosing branches (if/else arms, loop bodies) inside this scope.
    branch_depth: usize,
    /// Synthetic parameter names of the enclosing `except` handler thunks, innermost last.
    handlers: Vec<String>,
}

impl Scope {
    /// A function scope whose parameters are its initial locals.
    pub fn function(params: impl IntoIterator<Item = String>) -> Self {
        Self {
            locals: params.into_iter().map(|name| (name, Local { definite: true })).collect(),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn local(&self, name: &str) -> Option<Local> {
        self.locals.get(name).copied()
    }

    /// Where a read of `name` is served from, as far as this scope knows.
    pub fn resolve_read(&self, name: &str) -> Resolution<'_> {
        if self.is_masked(name) {
            return Resolution::Direct;
        }
        if let Some(frame) = self.shadows.last()
            && frame.keys.contains(name)
        {
            return if frame.settled.contains(name) {
                Resolution::Shadow(&frame.dict)
            } else {
                Resolution::MaybeShadow(&frame.dict)
            };
        }
        if self.locals.contains_key(name) {
            Resolution::Direct
        } else {
            Resolution::Unknown
        }
    }

    /// Records a write to `name` and reports where the value must be stored.
    pub fn record_write(&mut self, name: &str) -> WriteTarget {
        if let Some(frame) = self.shadows.last_mut() {
            frame.keys.insert(name.to_owned());
            frame.written.insert(name.to_owned());
            if self.branch_depth == frame.branch_base {
                frame.settled.insert(name.to_owned());
            }
            return WriteTarget::Shadow(frame.dict.clone());
        }
        let definite = self.branch_depth == 0;
        self.locals
            .entry(name.to_owned())
            .and_modify(|local| local.definite |= definite)
            .or_insert(Local { definite });
        WriteTarget::Direct
    }

    pub fn is_masked(&self, name: &str) -> bool {
        self.masked.iter().any(|masked| masked == name)
    }

    /// Masks loop targets for the duration of a loop body; undo with [`unmask`](Self::unmask).
    pub fn mask(&mut self, names: Vec<String>) -> usize {
        let count = names.len();
        self.masked.extend(names);
        count
    }

    pub fn unmask(&mut self, count: usize) {
        self.masked.truncate(self.masked.len().saturating_sub(count));
    }

    pub fn enter_branch(&mut self) {
        self.branch_depth += 1;
    }

    pub fn exit_branch(&mut self) {
        self.branch_depth = self.branch_depth.saturating_sub(1);
    }

    pub fn shadow_depth(&self) -> usize {
        self.shadows.len()
    }

    /// Opens a shadow dictionary named `dict` and returns how to fill it.
    pub fn open_shadow(&mut self, dict: String) -> ShadowInit {
        let (init, guaranteed, keys) = match self.shadows.last() {
            Some(outer) => (
                ShadowInit::CopyOf(outer.dict.clone()),
                outer.settled.clone(),
                outer.keys.clone(),
            ),
            None => {
                let definite: IndexSet<String> = self
                    .locals
                    .iter()
                    .filter(|(_, local)| local.definite)
                    .map(|(name, _)| name.clone())
                    .collect();
                (
                    ShadowInit::Snapshot(definite.iter().cloned().collect()),
                    definite.clone(),
                    definite,
                )
            }
        };
        self.shadows.push(ShadowFrame {
            dict,
            settled: guaranteed.clone(),
            guaranteed,
            keys,
            written: IndexSet::new(),
            branch_base: self.branch_depth,
        });
        init
    }

    /// Keys certainly present in the innermost shadow dictionary at this point.
    pub fn settled_keys(&self) -> IndexSet<String> {
        self.shadows.last().map(|frame| frame.settled.clone()).unwrap_or_default()
    }

    /// Starts lowering another part of the innermost `try`, which runs with `settled` keys
    /// present, or only the guaranteed ones when `None`.
    pub fn reset_settled(&mut self, settled: Option<IndexSet<String>>) {
        if let Some(frame) = self.shadows.last_mut() {
            let settled = settled.unwrap_or_else(|| frame.guaranteed.clone());
            frame.settled = settled;
        }
    }

    /// Closes the innermost shadow dictionary.
    pub fn close_shadow(&mut self) -> Option<ShadowFrame> {
        self.shadows.pop()
    }

    pub fn push_handler(&mut self, param: String) {
        self.handlers.push(param);
    }

    pub fn pop_handler(&mut self) {
        self.handlers.pop();
    }

    /// Parameter holding the exception of the innermost enclosing handler.
    pub fn current_handler(&self) -> Option<&str> {
        self.handlers.last().map(String::as_str)
    }
}

/// Non-empty stack of scopes; the module scope is always at the bottom.
#[derive(Debug)]
pub(crate) struct ScopeStack {
    module: Scope,
    functions: Vec<Scope>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self {
            module: Scope::default(),
            functions: Vec::new(),
        }
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Scope {
        self.functions.last().unwrap_or(&self.module)
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        self.functions.last_mut().unwrap_or(&mut self.module)
    }

    /// Number of function scopes above the module scope.
    pub fn depth(&self) -> usize {
        self.functions.len()
    }

    pub fn push_function(&mut self, params: impl IntoIterator<Item = String>) {
        self.functions.push(Scope::function(params));
    }

    /// Resolves a read of `name`, walking outwards from the innermost scope.
    ///
    /// A name that is not bound in a function scope may belong to a shadow dictionary of
    /// an enclosing scope, e.g. a lambda defined inside a `try` body.
    pub fn resolve_read(&self, name: &str) -> Resolution<'_> {
        for scope in self.functions.iter().rev().chain(std::iter::once(&self.module)) {
            match scope.resolve_read(name) {
                Resolution::Unknown => {}
                found => return found,
            }
        }
        Resolution::Unknown
    }

    /// Pops the innermost function scope. The module scope is never popped.
    pub fn pop_function(&mut self) {
        debug_assert!(!self.functions.is_empty(), "module scope cannot be popped");
        self.functions.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_shadow_snapshots_definite_locals() {
        let mut scope = Scope::function(["a".to_owned()]);
        scope.record_write("b");
        scope.enter_branch();
        scope.record_write("c");
        scope.exit_branch();
        assert_eq!(
            scope.open_shadow("d".to_owned()),
            ShadowInit::Snapshot(vec!["a".to_owned(), "b".to_owned()])
        );
        assert_eq!(scope.resolve_read("a"), Resolution::Shadow("d"));
        assert_eq!(scope.resolve_read("c"), Resolution::Direct);
        assert_eq!(scope.resolve_read("zzz"), Resolution::Unknown);
    }

    #[test]
    fn nested_shadow_copies_enclosing_dict() {
        let mut scope = Scope::function(["a".to_owned()]);
        scope.open_shadow("outer".to_owned());
        assert_eq!(scope.record_write("x"), WriteTarget::Shadow("outer".to_owned()));
        assert_eq!(scope.open_shadow("inner".to_owned()), ShadowInit::CopyOf("outer".to_owned()));
        assert_eq!(scope.resolve_read("x"), Resolution::Shadow("inner"));
        assert_eq!(scope.shadow_depth(), 2);
        let inner = scope.close_shadow().unwrap();
        assert!(inner.written.is_empty());
        assert_eq!(scope.shadow_depth(), 1);
    }

    /// A key written on some paths only is looked up behind a membership test.
    #[test]
    fn conditional_shadow_write_is_not_settled() {
        let mut scope = Scope::function(Vec::new());
        scope.enter_branch();
        scope.record_write("x");
        scope.exit_branch();
        assert_eq!(scope.open_shadow("d".to_owned()), ShadowInit::Snapshot(Vec::new()));
        scope.enter_branch();
        scope.record_write("x");
        scope.exit_branch();
        assert_eq!(scope.resolve_read("x"), Resolution::MaybeShadow("d"));
        scope.record_write("y");
        assert_eq!(scope.resolve_read("y"), Resolution::Shadow("d"));
        let after_body = scope.settled_keys();
        scope.reset_settled(None);
        assert_eq!(scope.resolve_read("y"), Resolution::MaybeShadow("d"));
        scope.reset_settled(Some(after_body));
        assert_eq!(scope.resolve_read("y"), Resolution::Shadow("d"));
    }

    #[test]
    fn masked_names_read_directly() {
        let mut scope = Scope::function(["i".to_owned()]);
        scope.open_shadow("d".to_owned());
        let count = scope.mask(vec!["i".to_owned()]);
        assert_eq!(scope.resolve_read("i"), Resolution::Direct);
        scope.unmask(count);
        assert_eq!(scope.resolve_read("i"), Resolution::Shadow("d"));
    }

    #[test]
    fn inner_function_reads_enclosing_shadow() {
        let mut stack = ScopeStack::new();
        stack.push_function(["a".to_owned()]);
        stack.current_mut().open_shadow("d".to_owned());
        stack.push_function(["b".to_owned()]);
        assert_eq!(stack.resolve_read("a"), Resolution::Shadow("d"));
        assert_eq!(stack.resolve_read("b"), Resolution::Direct);
        assert_eq!(stack.resolve_read("len"), Resolution::Unknown);
        stack.pop_function();
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn conditional_write_becomes_definite_later() {
        let mut scope = Scope::function(Vec::new());
        scope.enter_branch();
        scope.record_write("x");
        scope.exit_branch();
        assert_eq!(scope.local("x"), Some(Local { definite: false }));
        scope.record_write("x");
        assert_eq!(scope.local("x"), Some(Local { definite: true }));
    }
}
