//! C ABI over [`TrayBridge`].
//!
//! Handles are opaque pointers from `tray_bridge_create`, released once with
//! `tray_bridge_cleanup`. A menu selection payload returned by
//! `tray_bridge_poll_event` belongs to the caller and must be passed to
//! `tray_bridge_free_payload` exactly once.

use crate::bridge::TrayBridge;
use crate::error::{STATUS_INVALID_HANDLE, STATUS_LOOP_PANICKED};
use crate::event::{Event, EventKind};
use crate::toolkit::{platform, Toolkit};
use std::ffi::{c_char, c_int, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

static OUTSTANDING_PAYLOADS: AtomicUsize = AtomicUsize::new(0);

#[repr(C)]
#[derive(Debug)]
pub struct RawEvent {
    pub kind: EventKind,
    /// NUL-terminated menu item id, or null for every other kind.
    pub payload: *mut c_char,
}

impl RawEvent {
    fn none() -> Self {
        Self {
            kind: EventKind::None,
            payload: ptr::null_mut(),
        }
    }
}

impl From<Event> for RawEvent {
    fn from(event: Event) -> Self {
        let kind = event.kind();
        let payload = match event.into_payload() {
            Some(id) => {
                OUTSTANDING_PAYLOADS.fetch_add(1, Ordering::SeqCst);
                to_c_string(id).into_raw()
            }
            None => ptr::null_mut(),
        };
        Self { kind, payload }
    }
}

#[no_mangle]
pub extern "C" fn tray_bridge_create() -> *mut TrayBridge {
    Box::into_raw(Box::new(TrayBridge::new()))
}

/// # Safety
/// `handle` must be null or a live pointer from `tray_bridge_create`.
/// `identity` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_set_identity(handle: *const TrayBridge, identity: *const c_char) {
    if let Some(bridge) = bridge_ref(handle) {
        bridge.set_identity(&string_arg(identity));
    }
}

/// # Safety
/// `handle` must be null or a live pointer from `tray_bridge_create`.
/// `organization` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_set_organization(
    handle: *const TrayBridge,
    organization: *const c_char,
) {
    if let Some(bridge) = bridge_ref(handle) {
        bridge.set_organization(&string_arg(organization));
    }
}

/// Copies `len` bytes from `data`; the caller keeps ownership of the buffer.
///
/// # Safety
/// `handle` must be null or a live pointer from `tray_bridge_create`.
/// `data` must be null or valid for reads of `len` bytes.
/// `format` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_set_icon(
    handle: *const TrayBridge,
    data: *const u8,
    len: usize,
    format: *const c_char,
) {
    let Some(bridge) = bridge_ref(handle) else {
        return;
    };
    let bytes = if data.is_null() || len == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(data, len).to_vec()
    };
    bridge.set_icon(bytes, &string_arg(format));
}

/// # Safety
/// `handle` must be null or a live pointer from `tray_bridge_create`.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_enable_tray(handle: *const TrayBridge) {
    if let Some(bridge) = bridge_ref(handle) {
        bridge.enable_tray();
    }
}

/// # Safety
/// `handle` must be null or a live pointer from `tray_bridge_create`.
/// `label` and `id` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_add_menu_item(
    handle: *const TrayBridge,
    label: *const c_char,
    id: *const c_char,
) {
    if let Some(bridge) = bridge_ref(handle) {
        bridge.add_menu_item(&string_arg(label), &string_arg(id));
    }
}

/// Blocks the calling thread in the native loop. Returns the loop's exit
/// code, or a negative status if it could not start.
///
/// # Safety
/// `handle` must be null or a live pointer from `tray_bridge_create`.
/// `argv` must be null or point to `argc` entries, each null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_run(
    handle: *const TrayBridge,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int {
    let Some(bridge) = bridge_ref(handle) else {
        return STATUS_INVALID_HANDLE;
    };

    let args = collect_args(argc, argv);
    run_guarded(bridge, platform::native_toolkit, &args)
}

/// # Safety
/// `handle` must be null or a live pointer from `tray_bridge_create`.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_poll_event(handle: *const TrayBridge) -> RawEvent {
    match bridge_ref(handle) {
        Some(bridge) => RawEvent::from(bridge.poll_event()),
        None => RawEvent::none(),
    }
}

/// # Safety
/// `handle` must be null or a live pointer from `tray_bridge_create`.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_request_quit_safe(handle: *const TrayBridge) {
    if let Some(bridge) = bridge_ref(handle) {
        bridge.request_quit_safe();
    }
}

/// # Safety
/// `payload` must be null or a payload from `tray_bridge_poll_event` that
/// has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_free_payload(payload: *mut c_char) {
    if payload.is_null() {
        return;
    }
    drop(CString::from_raw(payload));
    OUTSTANDING_PAYLOADS.fetch_sub(1, Ordering::SeqCst);
}

/// Releases the handle. A handle whose loop is still running is leaked
/// rather than freed out from under the loop thread.
///
/// # Safety
/// `handle` must be null or a pointer from `tray_bridge_create` that has not
/// been cleaned up yet. It must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn tray_bridge_cleanup(handle: *mut TrayBridge) {
    let Some(bridge) = bridge_ref(handle) else {
        return;
    };
    if bridge.is_running() {
        log::error!("tray_bridge_cleanup called while the tray loop is running; leaking handle");
        return;
    }
    drop(Box::from_raw(handle));
}

/// Payloads handed out by `tray_bridge_poll_event` and not yet freed.
#[no_mangle]
pub extern "C" fn tray_bridge_outstanding_payloads() -> usize {
    OUTSTANDING_PAYLOADS.load(Ordering::SeqCst)
}

/// Runs the loop without letting a panic unwind into the caller's frames.
fn run_guarded<T: Toolkit>(bridge: &TrayBridge, make_toolkit: impl FnOnce() -> T, args: &[String]) -> c_int {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| bridge.run(make_toolkit(), args)));

    match outcome {
        Ok(Ok(code)) => code,
        Ok(Err(e)) => e.status(),
        Err(panic_info) => {
            let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            log::error!("Tray loop panicked: {}", message);
            STATUS_LOOP_PANICKED
        }
    }
}

unsafe fn bridge_ref<'a>(handle: *const TrayBridge) -> Option<&'a TrayBridge> {
    handle.as_ref()
}

unsafe fn string_arg(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

unsafe fn collect_args(argc: c_int, argv: *const *const c_char) -> Vec<String> {
    if argv.is_null() || argc <= 0 {
        return Vec::new();
    }
    (0..argc as usize).map(|i| string_arg(*argv.add(i))).collect()
}

/// Ids cannot carry an interior NUL across the boundary; anything after the
/// first one is cut off.
fn to_c_string(mut id: String) -> CString {
    if let Some(nul) = id.find('\0') {
        id.truncate(nul);
    }
    CString::new(id).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::STATUS_TRAY_UNAVAILABLE;
    use crate::toolkit::testing::PanickingToolkit;
    use std::thread;
    use std::time::{Duration, Instant};

    struct SendHandle(*mut TrayBridge);

    unsafe impl Send for SendHandle {}

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn null_handles_are_ignored() {
        unsafe {
            tray_bridge_set_identity(ptr::null(), c("x").as_ptr());
            tray_bridge_enable_tray(ptr::null());
            tray_bridge_add_menu_item(ptr::null(), c("Quit").as_ptr(), c("quit").as_ptr());
            tray_bridge_request_quit_safe(ptr::null());
            tray_bridge_cleanup(ptr::null_mut());

            let event = tray_bridge_poll_event(ptr::null());
            assert_eq!(event.kind, EventKind::None);
            assert!(event.payload.is_null());
            assert_eq!(tray_bridge_run(ptr::null(), 0, ptr::null()), STATUS_INVALID_HANDLE);
        }
    }

    #[test]
    fn empty_poll_returns_none_without_payload() {
        unsafe {
            let handle = tray_bridge_create();

            for _ in 0..3 {
                let event = tray_bridge_poll_event(handle);
                assert_eq!(event.kind, EventKind::None);
                assert!(event.payload.is_null());
            }

            tray_bridge_cleanup(handle);
        }
    }

    #[test]
    fn configuration_reaches_the_bridge() {
        unsafe {
            // Arrange
            let handle = tray_bridge_create();
            let icon = [1u8, 2, 3];

            // Act
            tray_bridge_set_identity(handle, c("com.example.app").as_ptr());
            tray_bridge_set_organization(handle, ptr::null());
            tray_bridge_set_icon(handle, icon.as_ptr(), icon.len(), c("png").as_ptr());
            tray_bridge_enable_tray(handle);
            tray_bridge_add_menu_item(handle, c("Open").as_ptr(), c("open_app").as_ptr());
            tray_bridge_add_menu_item(handle, c("Quit").as_ptr(), ptr::null());

            // Assert
            let bridge = &*handle;
            assert!(bridge.tray_enabled());
            let ids: Vec<String> = bridge.pending_menu_items().into_iter().map(|i| i.id).collect();
            assert_eq!(ids, vec!["open_app".to_string(), String::new()]);

            tray_bridge_cleanup(handle);
        }
    }

    #[cfg(not(all(feature = "native", target_os = "linux")))]
    #[test]
    fn run_without_native_tray_reports_unavailable() {
        unsafe {
            let handle = tray_bridge_create();
            tray_bridge_enable_tray(handle);
            let arg = c("app");
            let argv = [arg.as_ptr()];

            let status = tray_bridge_run(handle, 1, argv.as_ptr());

            assert_eq!(status, STATUS_TRAY_UNAVAILABLE);
            tray_bridge_cleanup(handle);
        }
    }

    #[cfg(not(all(feature = "native", target_os = "linux")))]
    #[test]
    fn cleanup_is_refused_while_the_loop_runs() {
        unsafe {
            // Arrange
            let handle = tray_bridge_create();
            let runner = {
                let handle = SendHandle(handle);
                thread::spawn(move || {
                    let handle = handle;
                    tray_bridge_run(handle.0, 0, ptr::null())
                })
            };
            wait_until(|| (*handle).is_running());

            // Act
            tray_bridge_cleanup(handle);

            // Assert
            assert!((*handle).is_running());
            assert_eq!(tray_bridge_poll_event(handle).kind, EventKind::None);
            tray_bridge_request_quit_safe(handle);
            assert_eq!(runner.join().unwrap(), 0);
            assert!((*handle).has_exited());
            tray_bridge_cleanup(handle);
        }
    }

    #[test]
    fn panicking_loop_reports_status_and_can_be_cleaned_up() {
        unsafe {
            // Arrange
            let handle = tray_bridge_create();
            tray_bridge_enable_tray(handle);
            tray_bridge_add_menu_item(handle, c("Open").as_ptr(), c("open_app").as_ptr());

            // Act
            let status = run_guarded(&*handle, PanickingToolkit::new, &[]);

            // Assert
            assert_eq!(status, STATUS_LOOP_PANICKED);
            assert!((*handle).has_exited());
            assert!(!(*handle).is_running());
            tray_bridge_request_quit_safe(handle);
            tray_bridge_cleanup(handle);
        }
    }

    #[test]
    fn guarded_run_passes_through_exit_codes_and_statuses() {
        let cases: [(bool, c_int); 2] = [(true, 0), (false, STATUS_TRAY_UNAVAILABLE)];

        for (tray_available, expected) in cases {
            let bridge = TrayBridge::new();
            bridge.enable_tray();
            bridge.request_quit_safe();

            let status = run_guarded(
                &bridge,
                || crate::toolkit::HeadlessToolkit::new().with_tray_available(tray_available),
                &[],
            );

            assert_eq!(status, expected, "tray available: {}", tray_available);
        }
    }

    #[test]
    fn invalid_utf8_is_converted_lossily() {
        let bytes = [b'o', b'k', 0xff, 0];
        let s = unsafe { string_arg(bytes.as_ptr() as *const c_char) };

        assert_eq!(s, "ok\u{fffd}");
    }

    #[test]
    fn interior_nul_truncates_id() {
        let cases = [("quit", "quit"), ("a\0b", "a"), ("\0", ""), ("", "")];

        for (input, expected) in cases {
            let converted = to_c_string(input.to_string());
            assert_eq!(converted.to_str().unwrap(), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn argv_entries_are_collected_in_order() {
        let first = c("app");
        let second = c("--verbose");
        let argv = [first.as_ptr(), ptr::null(), second.as_ptr()];

        let args = unsafe { collect_args(3, argv.as_ptr()) };

        assert_eq!(args, vec!["app".to_string(), String::new(), "--verbose".to_string()]);
        assert!(unsafe { collect_args(-1, argv.as_ptr()) }.is_empty());
    }
}
