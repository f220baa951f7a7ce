use thiserror::Error;

/// Returned by `run` when the tray was requested but the host has none.
pub const STATUS_TRAY_UNAVAILABLE: i32 = -1;
pub const STATUS_TOOLKIT_INIT_FAILED: i32 = -2;
pub const STATUS_ALREADY_STARTED: i32 = -3;
pub const STATUS_INVALID_HANDLE: i32 = -4;
pub const STATUS_LOOP_PANICKED: i32 = -5;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("system tray is not available on this host")]
    TrayUnavailable,
    #[error("failed to initialize toolkit: {0:#}")]
    ToolkitInit(anyhow::Error),
    #[error("event loop was already started on this handle")]
    AlreadyStarted,
    #[error("tray loop thread panicked")]
    LoopPanicked,
}

impl BridgeError {
    /// Negative status reported across the C boundary. Never collides with
    /// a dispatch exit code, which is always non-negative.
    pub fn status(&self) -> i32 {
        match self {
            BridgeError::TrayUnavailable => STATUS_TRAY_UNAVAILABLE,
            BridgeError::ToolkitInit(_) => STATUS_TOOLKIT_INIT_FAILED,
            BridgeError::AlreadyStarted => STATUS_ALREADY_STARTED,
            BridgeError::LoopPanicked => STATUS_LOOP_PANICKED,
        }
    }
}
