use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A routine suspended on a future that is not a sequence command.
    ///
    /// Routines may only await yield points of their own [`Sequence`]
    /// handle; anything else leaves the interpreter unable to make
    /// progress. The routine is dropped and its conversation retires on
    /// the next event.
    ///
    /// [`Sequence`]: crate::Sequence
    #[error("routine suspended outside a sequence command")]
    ForeignSuspend,

    /// The asynchronous operation behind an `Await` command failed.
    ///
    /// The conversation is left exactly where it was: the pending command
    /// is retained and the next event re-invokes the operation.
    #[error("sequence operation failed")]
    Operation(#[source] anyhow::Error),

    /// The routine body itself returned an error.
    #[error("sequence routine failed")]
    Routine(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
