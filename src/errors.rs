/// Host-facing error types.
///
/// Inside the runtime, failure is a first-class value: the error sentinel
/// propagates stickily through operations. This enum covers the seams
/// where the runtime meets the host instead: the syscall bridge and the
/// arena-handle registry, before those failures are folded back into the
/// sentinel at the generated-code boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtError {
    #[error("syscall bridge I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file descriptor {0}")]
    BadFd(i64),

    #[error("unknown syscall {0:?}")]
    UnknownSyscall(String),

    #[error("malformed syscall arguments")]
    BadSyscallArgs,

    #[error("invalid or already released arena handle")]
    BadHandle,
}
