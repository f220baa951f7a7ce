#[cfg(all(feature = "native", target_os = "linux"))]
mod linux;

#[cfg(all(feature = "native", target_os = "linux"))]
pub use linux::GtkToolkit;

#[cfg(all(feature = "native", target_os = "linux"))]
pub type NativeToolkit = GtkToolkit;

#[cfg(not(all(feature = "native", target_os = "linux")))]
pub type NativeToolkit = super::HeadlessToolkit;

/// Toolkit used when the caller does not bring its own. Must be called on
/// the thread that will run the loop.
#[cfg(all(feature = "native", target_os = "linux"))]
pub fn native_toolkit() -> NativeToolkit {
    GtkToolkit::new()
}

/// Without native support there is no notification area, so any `run` that
/// asks for a tray reports it as unavailable.
#[cfg(not(all(feature = "native", target_os = "linux")))]
pub fn native_toolkit() -> NativeToolkit {
    log::warn!("Built without native tray support; tray requests will be refused");
    super::HeadlessToolkit::new().with_tray_available(false)
}
