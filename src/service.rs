//! Runs a bridge on its own thread so the caller's thread stays free for
//! polling, which is how a host without a native main loop drives the tray.

use crate::bridge::TrayBridge;
use crate::error::BridgeError;
use crate::toolkit::Toolkit;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const LOOP_THREAD_NAME: &str = "tray-loop";

pub struct TrayService {
    bridge: Arc<TrayBridge>,
    handle: Option<JoinHandle<Result<i32, BridgeError>>>,
}

impl TrayService {
    /// Starts the loop thread. `make_toolkit` runs on that thread, since
    /// native toolkits must be created where they are dispatched.
    pub fn spawn<T, F>(bridge: Arc<TrayBridge>, make_toolkit: F, args: Vec<String>) -> Result<Self>
    where
        T: Toolkit,
        F: FnOnce() -> T + Send + 'static,
    {
        let loop_bridge = Arc::clone(&bridge);
        let handle = thread::Builder::new()
            .name(LOOP_THREAD_NAME.to_string())
            .spawn(move || loop_bridge.run(make_toolkit(), &args))
            .context("Failed to spawn tray loop thread")?;

        log::info!("Tray loop thread started");
        Ok(Self {
            bridge,
            handle: Some(handle),
        })
    }

    pub fn bridge(&self) -> &Arc<TrayBridge> {
        &self.bridge
    }

    /// True once `run` has returned, whether it exited or failed to start.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Requests a quit and waits for the loop thread.
    pub fn stop(mut self) -> Result<i32, BridgeError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<i32, BridgeError> {
        let Some(handle) = self.handle.take() else {
            return Ok(0);
        };

        self.bridge.request_quit_safe();
        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                log::error!("Tray loop thread panicked");
                Err(BridgeError::LoopPanicked)
            }
        }
    }
}

impl Drop for TrayService {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Tray loop ended with error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ActivationReason, Event};
    use crate::toolkit::HeadlessToolkit;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loop_runs_on_named_thread_and_stops_cleanly() {
        // Arrange
        let bridge = Arc::new(TrayBridge::new());
        bridge.enable_tray();
        let (tx, rx) = mpsc::channel();

        // Act
        let service = TrayService::spawn(
            Arc::clone(&bridge),
            move || {
                tx.send(thread::current().name().map(str::to_string)).unwrap();
                HeadlessToolkit::new()
            },
            vec!["tray-test".to_string()],
        )
        .unwrap();
        let thread_name = rx.recv().unwrap();
        assert!(Arc::ptr_eq(service.bridge(), &bridge));
        wait_for(|| bridge.is_running());
        let code = service.stop();

        // Assert
        assert_eq!(thread_name.as_deref(), Some(LOOP_THREAD_NAME));
        assert_eq!(code.unwrap(), 0);
        assert!(bridge.has_exited());
    }

    #[test]
    fn events_are_polled_from_the_caller_thread() {
        // Arrange
        let bridge = Arc::new(TrayBridge::new());
        bridge.enable_tray();
        bridge.add_menu_item("Quit", "quit");
        let (tx, rx) = mpsc::channel();
        let service = TrayService::spawn(
            Arc::clone(&bridge),
            move || {
                let toolkit = HeadlessToolkit::new();
                tx.send(toolkit.controller()).unwrap();
                toolkit
            },
            Vec::new(),
        )
        .unwrap();
        let controller = rx.recv().unwrap();

        // Act
        controller.activate(ActivationReason::Trigger);
        controller.trigger_label("Quit");
        wait_for(|| bridge.pending_events() == 2);

        // Assert
        assert_eq!(bridge.poll_event(), Event::TrayActivated);
        assert_eq!(bridge.poll_event(), Event::MenuItemSelected("quit".into()));
        assert_eq!(bridge.poll_event(), Event::None);
        assert_eq!(service.stop().unwrap(), 0);
    }

    #[test]
    fn startup_failure_is_returned_from_stop() {
        let bridge = Arc::new(TrayBridge::new());
        bridge.enable_tray();

        let service = TrayService::spawn(
            Arc::clone(&bridge),
            || HeadlessToolkit::new().with_tray_available(false),
            Vec::new(),
        )
        .unwrap();
        wait_for(|| service.is_finished());

        assert!(matches!(service.stop(), Err(BridgeError::TrayUnavailable)));
    }

    #[test]
    fn panicking_loop_is_reported() {
        let bridge = Arc::new(TrayBridge::new());

        let service = TrayService::spawn(
            Arc::clone(&bridge),
            || -> HeadlessToolkit { panic!("toolkit construction failed") },
            Vec::new(),
        )
        .unwrap();
        wait_for(|| service.is_finished());

        assert!(matches!(service.stop(), Err(BridgeError::LoopPanicked)));
    }

    #[test]
    fn dropping_the_service_quits_the_loop() {
        let bridge = Arc::new(TrayBridge::new());

        let service = TrayService::spawn(Arc::clone(&bridge), HeadlessToolkit::new, Vec::new()).unwrap();
        wait_for(|| bridge.is_running());
        drop(service);

        assert!(bridge.has_exited());
    }
}
