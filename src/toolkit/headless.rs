//! In-process toolkit with no display. Activations and menu clicks are
//! simulated through a [`HeadlessController`] and delivered on the loop thread,
//! exactly where a native toolkit would fire its callbacks.

use super::icon::decode_icon;
use super::{ActivationCallback, DeferredCall, Scheduler, Toolkit, TrayHost, TriggerCallback};
use crate::config::IconData;
use crate::event::ActivationReason;
use anyhow::Result;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

enum Message {
    Deferred(DeferredCall),
    Activate(ActivationReason),
    TriggerIndex(usize),
    TriggerLabel(String),
}

/// What the simulated desktop would currently show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadlessSnapshot {
    pub diagnostics_suppressed: bool,
    pub organization: String,
    pub identity: String,
    pub args: Option<Vec<String>>,
    pub icon_size: Option<(u32, u32)>,
    pub tray_visible: bool,
    pub menu: Vec<String>,
    pub dispatch_entered: bool,
    pub exit_code: Option<i32>,
    pub released: bool,
}

pub struct HeadlessToolkit {
    tray_available: bool,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
    snapshot: Arc<Mutex<HeadlessSnapshot>>,
    on_activated: Option<ActivationCallback>,
    items: Vec<(String, TriggerCallback)>,
    exit_code: Option<i32>,
}

impl HeadlessToolkit {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            tray_available: true,
            sender,
            receiver,
            snapshot: Arc::new(Mutex::new(HeadlessSnapshot::default())),
            on_activated: None,
            items: Vec::new(),
            exit_code: None,
        }
    }

    pub fn with_tray_available(mut self, available: bool) -> Self {
        self.tray_available = available;
        self
    }

    pub fn controller(&self) -> HeadlessController {
        HeadlessController {
            sender: self.sender.clone(),
            snapshot: Arc::clone(&self.snapshot),
        }
    }

    fn update(&self, f: impl FnOnce(&mut HeadlessSnapshot)) {
        f(&mut *lock(&self.snapshot));
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Deferred(call) => call(self),
            Message::Activate(reason) => match &self.on_activated {
                Some(on_activated) => on_activated(reason),
                None => log::debug!("Activation {:?} ignored, no tray shown", reason),
            },
            Message::TriggerIndex(index) => match self.items.get(index) {
                Some((_, on_triggered)) => on_triggered(),
                None => log::warn!("No menu item at index {}", index),
            },
            Message::TriggerLabel(label) => {
                match self.items.iter().find(|(l, _)| *l == label) {
                    Some((_, on_triggered)) => on_triggered(),
                    None => log::warn!("No menu item labelled {:?}", label),
                }
            }
        }
    }
}

impl Default for HeadlessToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl TrayHost for HeadlessToolkit {
    fn add_menu_item(&mut self, label: &str, on_triggered: TriggerCallback) {
        self.items.push((label.to_string(), on_triggered));
        self.update(|s| s.menu.push(label.to_string()));
    }

    fn quit(&mut self, exit_code: i32) {
        log::debug!("Headless loop quitting with code {}", exit_code);
        self.exit_code = Some(exit_code);
        self.update(|s| s.exit_code = Some(exit_code));
    }
}

impl Toolkit for HeadlessToolkit {
    fn suppress_diagnostics(&mut self) {
        self.update(|s| s.diagnostics_suppressed = true);
    }

    fn set_application_metadata(&mut self, organization: &str, identity: &str) {
        self.update(|s| {
            s.organization = organization.to_string();
            s.identity = identity.to_string();
        });
    }

    fn initialize(&mut self, args: &[String]) -> Result<()> {
        self.update(|s| s.args = Some(args.to_vec()));
        Ok(())
    }

    fn set_icon(&mut self, icon: &IconData) -> bool {
        let Some(decoded) = decode_icon(icon) else {
            return false;
        };
        self.update(|s| s.icon_size = Some((decoded.width, decoded.height)));
        true
    }

    fn is_tray_available(&self) -> bool {
        self.tray_available
    }

    fn show_tray(&mut self, on_activated: ActivationCallback) -> Result<()> {
        if !self.tray_available {
            anyhow::bail!("no notification area on this host");
        }
        self.on_activated = Some(on_activated);
        self.update(|s| s.tray_visible = true);
        Ok(())
    }

    fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::new(HeadlessScheduler {
            sender: self.sender.clone(),
        })
    }

    fn exec(&mut self) -> i32 {
        self.update(|s| s.dispatch_entered = true);

        while self.exit_code.is_none() {
            // The toolkit keeps its own sender alive, so this only fails if
            // the channel is torn down under us.
            let Ok(message) = self.receiver.recv() else {
                break;
            };
            self.handle(message);
        }

        self.exit_code.unwrap_or(0)
    }

    fn release(&mut self) {
        self.on_activated = None;
        self.items.clear();
        self.update(|s| s.released = true);
    }
}

struct HeadlessScheduler {
    sender: Sender<Message>,
}

impl Scheduler for HeadlessScheduler {
    fn post(&self, call: DeferredCall) {
        if self.sender.send(Message::Deferred(call)).is_err() {
            log::debug!("Headless loop is gone, dropping deferred call");
        }
    }
}

/// Simulates user input from any thread. Input sent before the loop starts
/// is delivered once dispatch begins, after the initial menu replay.
#[derive(Clone)]
pub struct HeadlessController {
    sender: Sender<Message>,
    snapshot: Arc<Mutex<HeadlessSnapshot>>,
}

impl HeadlessController {
    pub fn activate(&self, reason: ActivationReason) {
        self.send(Message::Activate(reason));
    }

    pub fn trigger_item(&self, index: usize) {
        self.send(Message::TriggerIndex(index));
    }

    pub fn trigger_label(&self, label: &str) {
        self.send(Message::TriggerLabel(label.to_string()));
    }

    pub fn snapshot(&self) -> HeadlessSnapshot {
        lock(&self.snapshot).clone()
    }

    fn send(&self, message: Message) {
        if self.sender.send(message).is_err() {
            log::debug!("Headless loop is gone, dropping simulated input");
        }
    }
}

fn lock(snapshot: &Mutex<HeadlessSnapshot>) -> MutexGuard<'_, HeadlessSnapshot> {
    snapshot.lock().unwrap_or_else(PoisonError::into_inner)
}
