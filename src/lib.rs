//! Thread-safe bridge between a native system tray event loop and a host that
//! polls for what the user did.
//!
//! The loop runs on one thread; configuration, polling and quit requests may
//! come from any other. See [`TrayBridge`] for the lifecycle and [`ffi`] for
//! the C ABI.

pub mod bridge;
pub mod config;
pub mod error;
pub mod event;
pub mod ffi;
pub mod paths;
pub mod service;
pub mod toolkit;

pub use bridge::TrayBridge;
pub use config::{IconData, MenuEntry, PendingConfiguration, TrayConfig};
pub use error::BridgeError;
pub use event::{ActivationReason, Event, EventKind, EventQueue};
pub use service::TrayService;
