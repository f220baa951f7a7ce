//! The handle a host holds for the lifetime of its tray.
//!
//! Configuration and polling may come from any thread. `run` blocks the thread
//! that calls it and becomes the loop thread: the toolkit is created there and
//! every toolkit mutation happens there, either during startup or through
//! deferred calls posted to the toolkit's scheduler.

mod state;

use self::state::{BridgeState, Phase};
use crate::config::{IconData, MenuEntry, PendingConfiguration, StartupSettings};
use crate::error::BridgeError;
use crate::event::{Event, EventQueue};
use crate::toolkit::{ActivationCallback, Toolkit, TrayHost, TriggerCallback};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct TrayBridge {
    state: Mutex<BridgeState>,
    events: Arc<EventQueue>,
}

impl TrayBridge {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState::new()),
            events: Arc::new(EventQueue::new()),
        }
    }

    pub fn set_identity(&self, identity: &str) {
        self.configure("identity", |config| config.identity = identity.to_string());
    }

    pub fn set_organization(&self, organization: &str) {
        self.configure("organization", |config| {
            config.organization = organization.to_string()
        });
    }

    /// Stores icon bytes for decoding at startup. Bytes that fail to decode
    /// leave the tray iconless; no error is raised.
    pub fn set_icon(&self, bytes: impl Into<Vec<u8>>, format: &str) {
        let icon = IconData::new(bytes, format);
        self.configure("icon", |config| config.icon = Some(icon));
    }

    pub fn enable_tray(&self) {
        self.configure("tray flag", |config| config.tray_enabled = true);
    }

    /// Adds a context menu entry. Before the loop is live the entry is
    /// buffered and replayed in submission order; afterwards it is posted to
    /// the loop thread and appears once the loop gets to it.
    pub fn add_menu_item(&self, label: &str, id: &str) {
        let item = MenuEntry::new(label, id);
        let mut state = self.lock_state();

        if state.phase.buffers_menu_items() {
            state.config.menu_items.push(item);
            return;
        }

        match &state.phase {
            Phase::Running(_) if !state.config.tray_enabled => {
                log::debug!("Tray disabled, ignoring menu item {:?}", item.id)
            }
            Phase::Running(scheduler) => {
                let events = Arc::clone(&self.events);
                scheduler.post(Box::new(move |host| register_menu_item(host, &events, item)));
            }
            _ => log::warn!("Ignoring menu item {:?}: tray loop has exited", item.id),
        }
    }

    /// Runs the tray on the calling thread until quit. Returns the dispatch
    /// exit code, or an error if the loop could not be entered.
    ///
    /// The bridge ends up exited however `run` leaves, including by unwinding
    /// out of a panicking toolkit.
    pub fn run<T: Toolkit>(&self, mut toolkit: T, args: &[String]) -> Result<i32, BridgeError> {
        let settings = self.begin_start()?;
        let _exited = MarkExitedOnDrop(self);

        let result = self.start_and_dispatch(&mut toolkit, settings, args);
        toolkit.release();

        match &result {
            Ok(code) => log::info!("Tray loop exited with code {}", code),
            Err(e) => log::error!("Tray loop did not start: {}", e),
        }
        result
    }

    /// Removes the oldest event. Never waits; an empty queue yields `Event::None`.
    pub fn poll_event(&self) -> Event {
        self.events.pop()
    }

    pub fn drain_events(&self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Asks the loop to quit from any thread. The toolkit's quit runs later on
    /// the loop thread; this call only schedules it.
    pub fn request_quit_safe(&self) {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        match &state.phase {
            Phase::Running(scheduler) => {
                log::debug!("Posting quit to tray loop");
                scheduler.post(Box::new(|host| host.quit(0)));
            }
            Phase::Configuring | Phase::Starting => {
                log::debug!("Quit requested before tray loop started");
                state.quit_requested = true;
            }
            Phase::Exited => log::debug!("Quit requested after tray loop exited"),
        }
    }

    /// True from the moment `run` is accepted until it returns.
    pub fn is_running(&self) -> bool {
        matches!(self.lock_state().phase, Phase::Starting | Phase::Running(_))
    }

    pub fn has_exited(&self) -> bool {
        matches!(self.lock_state().phase, Phase::Exited)
    }

    pub fn tray_enabled(&self) -> bool {
        self.lock_state().config.tray_enabled
    }

    pub fn pending_menu_items(&self) -> Vec<MenuEntry> {
        self.lock_state().config.menu_items.clone()
    }

    fn configure(&self, what: &str, apply: impl FnOnce(&mut PendingConfiguration)) {
        let mut state = self.lock_state();
        if !state.phase.accepts_configuration() {
            log::warn!("Ignoring {} change while tray loop is {}", what, state.phase.name());
            return;
        }
        apply(&mut state.config);
    }

    fn begin_start(&self) -> Result<StartupSettings, BridgeError> {
        let mut state = self.lock_state();
        if !state.phase.accepts_configuration() {
            return Err(BridgeError::AlreadyStarted);
        }
        state.phase = Phase::Starting;
        Ok(state.config.startup_settings())
    }

    fn start_and_dispatch<T: Toolkit>(
        &self,
        toolkit: &mut T,
        settings: StartupSettings,
        args: &[String],
    ) -> Result<i32, BridgeError> {
        toolkit.suppress_diagnostics();
        toolkit.set_application_metadata(&settings.organization, &settings.identity);
        toolkit.initialize(args).map_err(BridgeError::ToolkitInit)?;

        if let Some(icon) = &settings.icon {
            if !toolkit.set_icon(icon) {
                log::warn!("Icon could not be decoded, continuing without one");
            }
        }

        if settings.tray_enabled {
            if !toolkit.is_tray_available() {
                return Err(BridgeError::TrayUnavailable);
            }
            toolkit
                .show_tray(activation_callback(&self.events))
                .map_err(|e| {
                    log::warn!("{:#}", e);
                    BridgeError::TrayUnavailable
                })?;
        }

        self.go_live(toolkit);

        log::info!("Entering tray event loop");
        Ok(toolkit.exec())
    }

    /// Publishes the scheduler and takes the menu buffer under one lock, so a
    /// concurrent `add_menu_item` is either replayed here or posted, never both.
    /// Without a tray there is no menu to replay into.
    fn go_live<T: Toolkit>(&self, toolkit: &mut T) {
        let scheduler = toolkit.scheduler();

        let (pending, quit_requested, tray_enabled) = {
            let mut state = self.lock_state();
            state.phase = Phase::Running(Arc::clone(&scheduler));
            (
                state.config.take_menu_items(),
                std::mem::take(&mut state.quit_requested),
                state.config.tray_enabled,
            )
        };

        if tray_enabled {
            log::debug!("Replaying {} buffered menu item(s)", pending.len());
            for item in pending {
                register_menu_item(toolkit, &self.events, item);
            }
        } else if !pending.is_empty() {
            log::debug!("Tray disabled, discarding {} buffered menu item(s)", pending.len());
        }

        if quit_requested {
            scheduler.post(Box::new(|host| host.quit(0)));
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TrayBridge {
    fn default() -> Self {
        Self::new()
    }
}

struct MarkExitedOnDrop<'a>(&'a TrayBridge);

impl Drop for MarkExitedOnDrop<'_> {
    fn drop(&mut self) {
        self.0.lock_state().phase = Phase::Exited;
    }
}

impl Drop for TrayBridge {
    fn drop(&mut self) {
        let undrained = self.events.len();
        if undrained > 0 {
            log::debug!("Dropping tray bridge with {} undrained event(s)", undrained);
        }
    }
}

fn register_menu_item(host: &mut dyn TrayHost, events: &Arc<EventQueue>, item: MenuEntry) {
    let MenuEntry { label, id } = item;
    host.add_menu_item(&label, menu_callback(Arc::clone(events), id));
}

fn menu_callback(events: Arc<EventQueue>, id: String) -> TriggerCallback {
    Box::new(move || events.push(Event::MenuItemSelected(id.clone())))
}

fn activation_callback(events: &Arc<EventQueue>) -> ActivationCallback {
    let events = Arc::clone(events);
    Box::new(move |reason| match Event::from_activation(reason) {
        Some(event) => events.push(event),
        None => log::debug!("Ignoring {:?} activation", reason),
    })
}
