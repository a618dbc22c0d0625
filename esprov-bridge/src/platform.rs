//! Seams over the OS Bluetooth and location managers.
//!
//! On a phone these wrap the platform adapter singletons; here they are
//! explicitly constructed service objects handed to the bridges. The
//! `request_*` methods only launch the OS flow (enable dialog, permission
//! dialog) and return once it is on screen; the outcome arrives later
//! through the owning bridge's `on_*` methods, called by the embedder when
//! it receives the OS callback.

/// Failure to launch an OS flow (no activity attached, intent rejected).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PlatformError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationProvider {
    Gps,
    Network,
}

pub trait BluetoothPlatform: Send + Sync + 'static {
    /// Whether the Bluetooth radio is currently enabled.
    fn is_enabled(&self) -> bool;

    fn has_scan_permission(&self) -> bool;

    fn has_connect_permission(&self) -> bool;

    /// Launch the OS Bluetooth permission dialog.
    fn request_permissions(&self) -> Result<(), PlatformError>;

    /// Launch the OS enable-Bluetooth flow.
    fn request_enable(&self) -> Result<(), PlatformError>;
}

pub trait LocationPlatform: Send + Sync + 'static {
    fn has_permission(&self) -> bool;

    /// Launch the OS location permission dialog.
    fn request_permission(&self) -> Result<(), PlatformError>;

    /// Whether the given provider is enabled. Callers treat an `Err` as
    /// "not enabled" rather than propagating it.
    fn provider_enabled(&self, provider: LocationProvider) -> Result<bool, PlatformError>;

    /// Launch the OS enable-location flow.
    fn request_enable(&self) -> Result<(), PlatformError>;
}
