mod queue;

pub use queue::EventQueue;

use serde::Serialize;

/// Something the user did to the tray, as seen by the polling side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Event {
    /// Nothing was queued.
    None,
    /// Single click (or platform trigger) on the tray icon.
    TrayActivated,
    /// Double click on the tray icon.
    TrayDoubleActivated,
    /// A context menu entry was chosen; carries the caller-assigned id.
    MenuItemSelected(String),
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    None = 0,
    TrayActivated = 1,
    TrayDoubleActivated = 2,
    MenuItemSelected = 3,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::None => EventKind::None,
            Event::TrayActivated => EventKind::TrayActivated,
            Event::TrayDoubleActivated => EventKind::TrayDoubleActivated,
            Event::MenuItemSelected(_) => EventKind::MenuItemSelected,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Event::None)
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Event::MenuItemSelected(id) => Some(id),
            _ => None,
        }
    }

    pub fn into_payload(self) -> Option<String> {
        match self {
            Event::MenuItemSelected(id) => Some(id),
            _ => None,
        }
    }

    /// Maps a tray activation to the event it produces, if any.
    /// Context-menu and middle clicks are handled by the toolkit itself.
    pub fn from_activation(reason: ActivationReason) -> Option<Event> {
        match reason {
            ActivationReason::Trigger => Some(Event::TrayActivated),
            ActivationReason::DoubleClick => Some(Event::TrayDoubleActivated),
            ActivationReason::Context | ActivationReason::MiddleClick => None,
        }
    }
}

/// Why the toolkit reported an activation of the tray icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationReason {
    Trigger,
    DoubleClick,
    Context,
    MiddleClick,
}
