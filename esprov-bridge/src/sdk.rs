//! Seam over the vendor provisioning SDK.
//!
//! The real SDK (ESPProvision on iOS, ESPProvisioning on Android) owns the
//! BLE transport, the proof-of-possession session handshake and the GATT
//! exchange. This crate only consumes its callback surface, modeled here as
//! event channels: one receiver per operation, events delivered in the
//! order the SDK reports them.

use esprov_proto::WifiNetwork;
use tokio::sync::{mpsc, oneshot};

/// An error reported by the vendor SDK.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SdkError(pub String);

/// Events produced by a device scan.
#[derive(Debug)]
pub enum ScanEvent<P> {
    /// The scan could not start at all (radio off, adapter unavailable).
    StartFailed,
    Found {
        name: String,
        service_uuid: String,
        peripheral: P,
    },
    Completed,
    Failed { message: String },
}

/// Events produced by a connection attempt. The first event decides the
/// outcome.
#[derive(Debug)]
pub enum ConnectionEvent<S> {
    Connected(S),
    Failed,
    Disconnected,
}

/// Failure reasons the device itself reports during provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFailureReason {
    AuthFailed,
    NetworkNotFound,
    DeviceDisconnected,
    Unknown,
}

impl DeviceFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceFailureReason::AuthFailed => "AUTH_FAILED",
            DeviceFailureReason::NetworkNotFound => "NETWORK_NOT_FOUND",
            DeviceFailureReason::DeviceDisconnected => "DEVICE_DISCONNECTED",
            DeviceFailureReason::Unknown => "UNKNOWN",
        }
    }
}

/// Phases of the vendor's provisioning exchange: session creation, config
/// sent, config applied, then success or failure signaled by the device.
/// `ConfigSent` and `ConfigApplied` are progress-only; everything else is
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    SessionFailed { message: String },
    ConfigSent,
    ConfigFailed { message: String },
    ConfigApplied,
    ConfigApplyFailed { message: String },
    DeviceFailure { reason: DeviceFailureReason },
    Success,
    Failed { message: String },
}

pub trait EspSdk: Send + Sync + 'static {
    /// Handle to a device seen during a scan, needed to target a connect.
    type Peripheral: Clone + Send + Sync + 'static;
    type Session: EspSession;

    /// Start a BLE scan for provisionable devices. Events arrive until
    /// `Completed` or a failure; dropping the receiver abandons the scan.
    fn search_devices(&self) -> mpsc::Receiver<ScanEvent<Self::Peripheral>>;

    /// Open a secure session with a previously discovered device.
    fn connect(
        &self,
        peripheral: &Self::Peripheral,
        service_uuid: &str,
    ) -> mpsc::Receiver<ConnectionEvent<Self::Session>>;
}

pub trait EspSession: Send + Sync + 'static {
    /// Set the shared secret establishing the secure session. Must be set
    /// before scanning networks or provisioning.
    fn set_proof_of_possession(&self, proof: &str);

    /// Ask the device for the Wi-Fi networks it can see.
    fn scan_wifi_networks(&self) -> oneshot::Receiver<Result<Vec<WifiNetwork>, SdkError>>;

    /// Run the multi-phase provisioning exchange.
    fn provision(&self, ssid: &str, password: &str) -> mpsc::Receiver<ProvisionEvent>;

    /// Tear down the session.
    fn disconnect(&self) -> oneshot::Receiver<()>;
}
