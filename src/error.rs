use thiserror::Error;

/// Failures surfaced by the reader controller.
#[derive(Debug, Error)]
pub enum Error {
    /// The session was started on a transport that is not open.
    #[error("serial port is not open")]
    PortClosed,

    /// The operation was canceled, either by the caller or because a
    /// lifecycle callback arrived out of order.
    #[error("operation canceled: {reason}")]
    Canceled { reason: &'static str },

    /// The controller shut down before the operation was dispatched.
    #[error("reader shut down before the operation completed")]
    ShutDown,

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}
