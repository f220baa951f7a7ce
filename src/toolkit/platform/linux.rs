//! GTK main loop with a `tray-icon` status icon.
//!
//! Everything here lives on the loop thread. `tray-icon` reports clicks and
//! menu selections through global handlers; they are forwarded into a channel
//! that a GLib timer drains on the loop thread, so callbacks fire in the order
//! the desktop delivered them. AppIndicator hosts do not report icon clicks,
//! only menu selections.
//!
//! A tray is only considered available when a StatusNotifierWatcher owns its
//! name on the session bus; without one the icon would never be shown.

use crate::config::IconData;
use crate::event::ActivationReason;
use crate::toolkit::icon::{decode_icon, RgbaIcon};
use crate::toolkit::{ActivationCallback, DeferredCall, Scheduler, Toolkit, TrayHost, TriggerCallback};
use anyhow::{Context, Result};
use gtk::gdk_pixbuf::{Colorspace, Pixbuf};
use gtk::glib::{self, ToVariant};
use gtk::gio;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tray_icon::menu::{Menu, MenuEvent, MenuId, MenuItem};
use tray_icon::{Icon, MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent};

const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(50);
const NOISY_DOMAINS: &[&str] = &["Gtk", "Gdk", "GLib-GObject", "libappindicator"];
const WATCHER_NAMES: &[&str] = &["org.kde.StatusNotifierWatcher", "org.freedesktop.StatusNotifierWatcher"];
const DBUS_TIMEOUT_MS: i32 = 1000;

thread_local! {
    static LOOP_STATE: RefCell<Option<Rc<RefCell<LoopState>>>> = const { RefCell::new(None) };
}

enum ToolkitSignal {
    Tray(ActivationReason),
    Menu(MenuId),
}

#[derive(Default)]
struct LoopState {
    tooltip: String,
    icon: Option<Icon>,
    menu: Option<Menu>,
    tray: Option<TrayIcon>,
    on_activated: Option<ActivationCallback>,
    actions: HashMap<MenuId, TriggerCallback>,
    next_item: u64,
    exit_code: i32,
}

pub struct GtkToolkit {
    state: Rc<RefCell<LoopState>>,
}

impl GtkToolkit {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LoopState::default())),
        }
    }
}

impl Default for GtkToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl TrayHost for GtkToolkit {
    fn add_menu_item(&mut self, label: &str, on_triggered: TriggerCallback) {
        let state = &mut *self.state.borrow_mut();

        // Ids are ours, not the caller's: duplicate caller ids must still map
        // to distinct entries.
        let id = MenuId::new(format!("tray-bridge-{}", state.next_item));
        state.next_item += 1;

        let menu = match &state.menu {
            Some(menu) => menu.clone(),
            None => {
                let menu = Menu::new();
                if let Some(tray) = &state.tray {
                    tray.set_menu(Some(Box::new(menu.clone())));
                }
                state.menu = Some(menu.clone());
                menu
            }
        };

        let item = MenuItem::with_id(id.clone(), label, true, None);
        if let Err(e) = menu.append(&item) {
            log::error!("Failed to add menu item {:?}: {}", label, e);
            return;
        }

        log::debug!("Registered menu item {:?} as {}", label, id.0);
        state.actions.insert(id, on_triggered);
    }

    fn quit(&mut self, exit_code: i32) {
        log::info!("Quitting GTK main loop");
        self.state.borrow_mut().exit_code = exit_code;
        gtk::main_quit();
    }
}

impl Toolkit for GtkToolkit {
    fn suppress_diagnostics(&mut self) {
        for domain in NOISY_DOMAINS {
            glib::log_set_handler(
                Some(*domain),
                glib::LogLevels::LEVEL_WARNING | glib::LogLevels::LEVEL_MESSAGE,
                false,
                false,
                |domain, level, message| {
                    log::debug!("[{}] {:?}: {}", domain.unwrap_or("glib"), level, message);
                },
            );
        }
    }

    fn set_application_metadata(&mut self, organization: &str, identity: &str) {
        if !identity.is_empty() {
            glib::set_prgname(Some(identity));
            glib::set_application_name(identity);
        }

        let tooltip = match (organization.is_empty(), identity.is_empty()) {
            (true, true) => String::new(),
            (true, false) => identity.to_string(),
            (false, true) => organization.to_string(),
            (false, false) => format!("{} ({})", identity, organization),
        };
        self.state.borrow_mut().tooltip = tooltip;
    }

    fn initialize(&mut self, args: &[String]) -> Result<()> {
        log::debug!("Initializing GTK with {} argument(s)", args.len());
        gtk::init().context("Failed to initialize GTK")?;

        LOOP_STATE.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&self.state)));
        Ok(())
    }

    fn set_icon(&mut self, icon: &IconData) -> bool {
        let Some(decoded) = decode_icon(icon) else {
            return false;
        };

        apply_window_icon(&decoded);

        match Icon::from_rgba(decoded.rgba, decoded.width, decoded.height) {
            Ok(icon) => {
                let mut state = self.state.borrow_mut();
                if let Some(tray) = &state.tray {
                    if let Err(e) = tray.set_icon(Some(icon.clone())) {
                        log::warn!("Failed to update tray icon: {}", e);
                    }
                }
                state.icon = Some(icon);
                true
            }
            Err(e) => {
                log::warn!("Icon rejected by tray backend: {}", e);
                false
            }
        }
    }

    fn is_tray_available(&self) -> bool {
        let has_display = gtk::gdk::Display::default().is_some();
        let watcher = if has_display { watcher_present() } else { Ok(false) };
        tray_available(has_display, watcher)
    }

    fn show_tray(&mut self, on_activated: ActivationCallback) -> Result<()> {
        let (tray, menu) = {
            let state = self.state.borrow();
            let menu = state.menu.clone().unwrap_or_else(Menu::new);

            let mut builder = TrayIconBuilder::new()
                .with_menu(Box::new(menu.clone()))
                .with_tooltip(&state.tooltip);
            if let Some(icon) = state.icon.clone() {
                builder = builder.with_icon(icon);
            }
            (builder.build().context("Failed to create tray icon")?, menu)
        };

        let (sender, receiver) = mpsc::channel();
        forward_desktop_events(sender);

        {
            let state = &mut *self.state.borrow_mut();
            state.tray = Some(tray);
            state.menu = Some(menu);
            state.on_activated = Some(on_activated);
        }

        drain_signals_on_loop(Rc::clone(&self.state), receiver);
        Ok(())
    }

    fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::new(GtkScheduler)
    }

    fn exec(&mut self) -> i32 {
        gtk::main();
        self.state.borrow().exit_code
    }

    fn release(&mut self) {
        TrayIconEvent::set_event_handler(None::<fn(TrayIconEvent)>);
        MenuEvent::set_event_handler(None::<fn(MenuEvent)>);
        LOOP_STATE.with(|slot| slot.borrow_mut().take());

        let mut state = self.state.borrow_mut();
        state.on_activated = None;
        state.actions.clear();
        state.tray = None;
        log::debug!("Released GTK tray state");
    }
}

/// Posts deferred calls as GLib idle sources on the default main context,
/// which `gtk::main` iterates on the loop thread.
struct GtkScheduler;

impl Scheduler for GtkScheduler {
    fn post(&self, call: DeferredCall) {
        glib::idle_add_once(move || {
            LOOP_STATE.with(|slot| {
                let state = slot.borrow().clone();
                match state {
                    Some(state) => call(&mut GtkToolkit { state }),
                    None => log::debug!("GTK loop is gone, dropping deferred call"),
                }
            })
        });
    }
}

/// Asks the session bus whether any StatusNotifierWatcher is running.
fn watcher_present() -> Result<bool> {
    let connection = gio::bus_get_sync(gio::BusType::Session, gio::Cancellable::NONE)
        .context("Failed to connect to the session bus")?;

    for name in WATCHER_NAMES {
        let reply = connection
            .call_sync(
                Some("org.freedesktop.DBus"),
                "/org/freedesktop/DBus",
                "org.freedesktop.DBus",
                "NameHasOwner",
                Some(&(*name,).to_variant()),
                None,
                gio::DBusCallFlags::NONE,
                DBUS_TIMEOUT_MS,
                gio::Cancellable::NONE,
            )
            .with_context(|| format!("NameHasOwner({}) failed", name))?;

        if let Some((true,)) = reply.get::<(bool,)>() {
            log::debug!("Notification host found: {}", name);
            return Ok(true);
        }
    }
    Ok(false)
}

fn tray_available(has_display: bool, watcher: Result<bool>) -> bool {
    if !has_display {
        log::warn!("No display available for a tray icon");
        return false;
    }
    match watcher {
        Ok(true) => true,
        Ok(false) => {
            log::warn!("No StatusNotifierWatcher on the session bus");
            false
        }
        Err(e) => {
            log::warn!("Could not query notification host: {:#}", e);
            false
        }
    }
}

fn forward_desktop_events(sender: Sender<ToolkitSignal>) {
    let tray_sender = sender.clone();
    TrayIconEvent::set_event_handler(Some(move |event: TrayIconEvent| {
        if let Some(reason) = activation_reason(&event) {
            let _ = tray_sender.send(ToolkitSignal::Tray(reason));
        }
    }));

    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        let _ = sender.send(ToolkitSignal::Menu(event.id));
    }));
}

fn drain_signals_on_loop(state: Rc<RefCell<LoopState>>, receiver: Receiver<ToolkitSignal>) {
    glib::timeout_add_local(SIGNAL_POLL_INTERVAL, move || {
        while let Ok(signal) = receiver.try_recv() {
            dispatch_signal(&state, signal);
        }
        glib::ControlFlow::Continue
    });
}

fn dispatch_signal(state: &Rc<RefCell<LoopState>>, signal: ToolkitSignal) {
    let state = state.borrow();
    match signal {
        ToolkitSignal::Tray(reason) => {
            if let Some(on_activated) = &state.on_activated {
                on_activated(reason);
            }
        }
        ToolkitSignal::Menu(id) => match state.actions.get(&id) {
            Some(on_triggered) => on_triggered(),
            None => log::debug!("Menu event for unknown item: {}", id.0),
        },
    }
}

fn activation_reason(event: &TrayIconEvent) -> Option<ActivationReason> {
    match event {
        TrayIconEvent::Click {
            button: MouseButton::Left,
            button_state: MouseButtonState::Up,
            ..
        } => Some(ActivationReason::Trigger),
        TrayIconEvent::Click {
            button: MouseButton::Right,
            button_state: MouseButtonState::Up,
            ..
        } => Some(ActivationReason::Context),
        TrayIconEvent::Click {
            button: MouseButton::Middle,
            button_state: MouseButtonState::Up,
            ..
        } => Some(ActivationReason::MiddleClick),
        TrayIconEvent::DoubleClick {
            button: MouseButton::Left,
            ..
        } => Some(ActivationReason::DoubleClick),
        _ => None,
    }
}

fn apply_window_icon(icon: &RgbaIcon) {
    let (Ok(width), Ok(height)) = (i32::try_from(icon.width), i32::try_from(icon.height)) else {
        return;
    };
    let bytes = glib::Bytes::from_owned(icon.rgba.clone());
    let pixbuf = Pixbuf::from_bytes(&bytes, Colorspace::Rgb, true, 8, width, height, width * 4);
    gtk::Window::set_default_icon(&pixbuf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tray_needs_display_and_watcher() {
        let cases = [
            (true, Ok(true), true),
            (true, Ok(false), false),
            (true, Err(anyhow::anyhow!("no session bus")), false),
            (false, Ok(true), false),
        ];

        for (has_display, watcher, expected) in cases {
            assert_eq!(tray_available(has_display, watcher), expected, "display: {}", has_display);
        }
    }
}
