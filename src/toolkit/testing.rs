use super::{ActivationCallback, HeadlessToolkit, Scheduler, Toolkit, TrayHost, TriggerCallback};
use crate::config::IconData;
use anyhow::Result;
use std::sync::Arc;

/// Headless toolkit whose dispatch panics, for unwinding paths.
pub(crate) struct PanickingToolkit {
    inner: HeadlessToolkit,
}

impl PanickingToolkit {
    pub(crate) fn new() -> Self {
        Self {
            inner: HeadlessToolkit::new(),
        }
    }
}

impl TrayHost for PanickingToolkit {
    fn add_menu_item(&mut self, label: &str, on_triggered: TriggerCallback) {
        self.inner.add_menu_item(label, on_triggered);
    }

    fn quit(&mut self, exit_code: i32) {
        self.inner.quit(exit_code);
    }
}

impl Toolkit for PanickingToolkit {
    fn set_application_metadata(&mut self, organization: &str, identity: &str) {
        self.inner.set_application_metadata(organization, identity);
    }

    fn initialize(&mut self, args: &[String]) -> Result<()> {
        self.inner.initialize(args)
    }

    fn set_icon(&mut self, icon: &IconData) -> bool {
        self.inner.set_icon(icon)
    }

    fn is_tray_available(&self) -> bool {
        self.inner.is_tray_available()
    }

    fn show_tray(&mut self, on_activated: ActivationCallback) -> Result<()> {
        self.inner.show_tray(on_activated)
    }

    fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.inner.scheduler()
    }

    fn exec(&mut self) -> i32 {
        panic!("tray backend failed during dispatch");
    }
}
