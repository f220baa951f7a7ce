//! The native side of the bridge.
//!
//! A [`Toolkit`] owns the real application, tray icon and context menu. It is
//! created on the loop thread and never leaves it; other threads reach it only
//! through a [`Scheduler`], which queues a [`DeferredCall`] onto the loop's own
//! task queue.

mod headless;
pub mod icon;
pub mod platform;
#[cfg(test)]
pub(crate) mod testing;

pub use headless::{HeadlessController, HeadlessSnapshot, HeadlessToolkit};

use crate::config::IconData;
use crate::event::ActivationReason;
use anyhow::Result;
use std::sync::Arc;

pub type ActivationCallback = Box<dyn Fn(ActivationReason) + Send + 'static>;
pub type TriggerCallback = Box<dyn Fn() + Send + 'static>;

/// Work executed on the loop thread with access to the live toolkit.
pub type DeferredCall = Box<dyn FnOnce(&mut dyn TrayHost) + Send + 'static>;

/// Operations that are only legal on the loop thread once the loop is live.
pub trait TrayHost {
    /// Appends an entry to the context menu and calls `on_triggered` on the
    /// loop thread whenever it is chosen.
    fn add_menu_item(&mut self, label: &str, on_triggered: TriggerCallback);

    /// Makes the blocking dispatch in [`Toolkit::exec`] return `exit_code`.
    fn quit(&mut self, exit_code: i32);
}

pub trait Toolkit: TrayHost {
    /// Silences the toolkit's own warning channels.
    fn suppress_diagnostics(&mut self) {}

    /// Process-wide identity. Called before [`Toolkit::initialize`]; empty
    /// strings mean "keep the toolkit default".
    fn set_application_metadata(&mut self, organization: &str, identity: &str);

    fn initialize(&mut self, args: &[String]) -> Result<()>;

    /// Decodes and applies the window and tray icon. Returns `false` if the
    /// bytes could not be decoded.
    fn set_icon(&mut self, icon: &IconData) -> bool;

    fn is_tray_available(&self) -> bool;

    fn show_tray(&mut self, on_activated: ActivationCallback) -> Result<()>;

    fn scheduler(&self) -> Arc<dyn Scheduler>;

    /// Runs the blocking dispatch until [`TrayHost::quit`] is called.
    fn exec(&mut self) -> i32;

    /// Drops the tray and any process-wide hooks set up during startup.
    /// Called once when `run` finishes, whether or not dispatch was entered.
    fn release(&mut self) {}
}

/// Thread-safe entry into the loop thread's task queue.
pub trait Scheduler: Send + Sync {
    /// Queues `call` to run on the loop thread. Never runs it inline.
    fn post(&self, call: DeferredCall);
}
