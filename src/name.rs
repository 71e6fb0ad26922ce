//! Identifier derivation for instrumented coroutines.
//!
//! Every timer reports under a dotted identifier of the form
//! `module.function`, or `module.Type.function` when the coroutine is a
//! method. The module and function parts come from a [`CoroutinePath`]
//! supplied at wrap time (the [`coroutine_path!`] macro captures the caller's
//! `module_path!()`); the type part comes from an explicit [`Receiver`] hook.
//!
//! Naming is an explicit opt-in, never inferred: there is no parameter
//! sniffing, and a wrapped free function simply gets `module.function`.

use std::fmt;

/// The module and function parts of a coroutine's identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoroutinePath {
    module: &'static str,
    function: &'static str,
}

impl CoroutinePath {
    /// Creates a path from a module path and a function name.
    #[must_use]
    pub const fn new(module: &'static str, function: &'static str) -> Self {
        Self { module, function }
    }

    /// Returns the module path.
    #[must_use]
    pub const fn module(&self) -> &'static str {
        self.module
    }

    /// Returns the function name.
    #[must_use]
    pub const fn function(&self) -> &'static str {
        self.function
    }
}

impl fmt::Display for CoroutinePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&derive_identifier(self, None))
    }
}

/// Captures a [`CoroutinePath`] for the current module.
///
/// ```
/// use coroutime::coroutine_path;
///
/// let path = coroutine_path!("fetch_rows");
/// assert!(path.to_string().ends_with(".fetch_rows") || path.to_string() == "fetch_rows");
/// ```
#[macro_export]
macro_rules! coroutine_path {
    ($function:expr) => {
        $crate::name::CoroutinePath::new(::core::module_path!(), $function)
    };
}

/// Opt-in hook supplying the receiver-type part of an identifier.
///
/// With `Receiver::None` the identifier is `module.function`. A `Static`
/// receiver names the type at wrap time (free-standing constructors,
/// classmethod-style factories). `FirstCall` derives the name from the
/// arguments of an invocation, which lets one wrapped method label itself
/// after the concrete receiver it is called on; returning `None` from the
/// hook falls back to the bare `module.function` form.
///
/// Under the default aggregate identifier scope the hook runs once, on the
/// first invocation, and every later invocation reuses that identifier.
pub enum Receiver<Args> {
    /// No receiver part.
    None,
    /// A fixed type name, decided at wrap time.
    Static(&'static str),
    /// Derive the type name from the first invocation's arguments.
    FirstCall(Box<dyn Fn(&Args) -> Option<String> + Send + Sync>),
}

impl<Args> Receiver<Args> {
    /// Resolves the receiver name for one invocation.
    #[must_use]
    pub fn name(&self, args: &Args) -> Option<String> {
        match self {
            Self::None => None,
            Self::Static(name) => Some((*name).to_string()),
            Self::FirstCall(hook) => hook(args),
        }
    }
}

impl<Args> Default for Receiver<Args> {
    fn default() -> Self {
        Self::None
    }
}

impl<Args> fmt::Debug for Receiver<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("Receiver::None"),
            Self::Static(name) => f.debug_tuple("Receiver::Static").field(name).finish(),
            Self::FirstCall(_) => f.write_str("Receiver::FirstCall(..)"),
        }
    }
}

/// Joins a path and an optional receiver into a dotted identifier.
///
/// `::` separators in the module path are normalized to `.` and empty
/// segments are dropped, so `my_app::db` plus receiver `Connection` and
/// function `query` becomes `my_app.db.Connection.query`.
#[must_use]
pub fn derive_identifier(path: &CoroutinePath, receiver: Option<&str>) -> String {
    path.module
        .split("::")
        .chain(receiver.into_iter())
        .chain(std::iter::once(path.function))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}
