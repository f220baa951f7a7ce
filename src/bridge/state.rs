use crate::config::PendingConfiguration;
use crate::toolkit::Scheduler;
use std::sync::Arc;

pub enum Phase {
    /// Accepting configuration; menu items are buffered.
    Configuring,
    /// `run` is bringing the toolkit up; menu items are still buffered.
    Starting,
    /// The loop is live; work reaches it only through the scheduler.
    Running(Arc<dyn Scheduler>),
    Exited,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Configuring => "configuring",
            Phase::Starting => "starting",
            Phase::Running(_) => "running",
            Phase::Exited => "exited",
        }
    }

    pub fn accepts_configuration(&self) -> bool {
        matches!(self, Phase::Configuring)
    }

    pub fn buffers_menu_items(&self) -> bool {
        matches!(self, Phase::Configuring | Phase::Starting)
    }
}

pub struct BridgeState {
    pub phase: Phase,
    pub config: PendingConfiguration,
    /// Quit asked for before the loop was live; replayed once it is.
    pub quit_requested: bool,
}

impl BridgeState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Configuring,
            config: PendingConfiguration::new(),
            quit_requested: false,
        }
    }
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::new()
    }
}
