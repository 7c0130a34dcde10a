//! Generic error handling for the outer layers of memprobe.
//!
//! The probe and the configuration loader expose their own typed errors. Code that strings them together, such as the
//! C ABI loading its configuration, deals in [`GenericError`] and attaches context as errors bubble up.

use std::fmt::Display;

/// An opaque error with a chain of contexts and sources.
pub type GenericError = anyhow::Error;

mod sealed {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Extension methods for attaching context to a fallible result.
///
/// These wrap `anyhow::Context` under different names, as `snafu::ResultExt::context` would otherwise collide with it
/// in any module that imports both.
pub trait ErrorContext<T>: sealed::Sealed {
    /// Converts the error into a [`GenericError`] with `context` as its outermost message.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Like [`error_context`][Self::error_context], but only builds the context if there is an error.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        anyhow::Context::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        anyhow::Context::with_context(self, f)
    }
}
