use trackable::error::ErrorKindExt;

/// Crate specific `Error` type.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(trackable::error::TrackableError<ErrorKind>);
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        ErrorKind::Other.cause(e).into()
    }
}

/// Possible error kinds.
///
/// Running out of space has no kind:
/// an allocation that does not fit returns `Ok(None)` instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed a malformed argument.
    ///
    /// E.g., a zero-sized request, an empty external buffer,
    /// a non power-of-two alignment, or a reallocation variant
    /// that does not match the ownership of the buffer.
    ///
    /// # Typical remedy
    ///
    /// - Fix the calling program
    InvalidInput,

    /// A rollback target lies outside `[base, top]` of the allocator.
    ///
    /// Popping an empty stack is reported with this kind too.
    /// The rollback is refused and the allocator state is left untouched.
    InvalidRollbackTarget,

    /// A `copy_to` destination cannot hold the source contents.
    ///
    /// E.g., the destination is too small or its alignment differs.
    IncompatibleCopy,

    /// The internal bookkeeping is inconsistent.
    ///
    /// This indicates a bug, or a stale mark being used after the buffer was reused.
    InconsistentState,

    /// Other errors.
    Other,
}
impl trackable::error::ErrorKind for ErrorKind {}
