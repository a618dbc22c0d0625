//! ESP device discovery, connection and Wi-Fi provisioning bridge.
//!
//! Owns a single connection slot: at most one device is connected per
//! bridge instance, and the operations that need a device (`scan_wifi_networks`,
//! `provision`, `disconnect`) fail fast when it is empty.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use esprov_proto::{BleDevice, ErrorCode, Fault, WifiNetwork};

use crate::platform::{BluetoothPlatform, LocationPlatform, LocationProvider};
use crate::sdk::{ConnectionEvent, EspSdk, EspSession, ProvisionEvent, ScanEvent};

struct Discovered<P> {
    device: BleDevice,
    peripheral: P,
}

struct Connected<S> {
    device: BleDevice,
    session: S,
}

pub struct ProvisioningBridge<S: EspSdk, B: BluetoothPlatform, L: LocationPlatform> {
    sdk: Arc<S>,
    bluetooth: Arc<B>,
    location: Arc<L>,
    /// Devices seen in the last scan, keyed by advertised service UUID.
    discovered: Mutex<HashMap<String, Discovered<S::Peripheral>>>,
    connected: Mutex<Option<Arc<Connected<S::Session>>>>,
}

impl<S, B, L> ProvisioningBridge<S, B, L>
where
    S: EspSdk,
    B: BluetoothPlatform,
    L: LocationPlatform,
{
    pub fn new(sdk: Arc<S>, bluetooth: Arc<B>, location: Arc<L>) -> Self {
        Self {
            sdk,
            bluetooth,
            location,
            discovered: Mutex::new(HashMap::new()),
            connected: Mutex::new(None),
        }
    }

    /// Scan for provisionable devices. Entries are deduplicated by service
    /// UUID, first sighting wins; the full list is delivered once the scan
    /// completes, or the first hard failure is delivered instead.
    pub async fn search_devices(&self) -> Result<Vec<BleDevice>, Fault> {
        self.preflight()?;
        self.discovered.lock().unwrap().clear();

        let mut events = self.sdk.search_devices();
        let mut found: Vec<BleDevice> = Vec::new();
        loop {
            let event = match events.recv().await {
                Some(event) => event,
                None => return Err(Fault::new(ErrorCode::ScanError, "Scan ended without completing.")),
            };
            match event {
                ScanEvent::StartFailed => {
                    return Err(Fault::new(ErrorCode::BluetoothError, "Enable Bluetooth to scan."));
                }
                ScanEvent::Found { name, service_uuid, peripheral } => {
                    // Permissions can be revoked mid-scan; abort rather than
                    // deliver a partial list.
                    if !self.bluetooth.has_connect_permission() {
                        return Err(Fault::new(ErrorCode::BluetoothError, "Enable Bluetooth permission."));
                    }
                    let mut discovered = self.discovered.lock().unwrap();
                    if discovered.contains_key(&service_uuid) {
                        continue;
                    }
                    let device = BleDevice { name, service_uuid: service_uuid.clone() };
                    found.push(device.clone());
                    discovered.insert(service_uuid, Discovered { device, peripheral });
                }
                ScanEvent::Completed => {
                    log::debug!("scan completed with {} device(s)", found.len());
                    return Ok(found);
                }
                ScanEvent::Failed { message } => {
                    return Err(Fault::new(ErrorCode::ScanError, message));
                }
            }
        }
    }

    /// Connect to a device seen in the last scan. On success it becomes
    /// this bridge's connected device; on failure the slot is left empty.
    pub async fn connect(&self, service_uuid: &str) -> Result<bool, Fault> {
        if let Err(fault) = self.preflight() {
            *self.connected.lock().unwrap() = None;
            return Err(fault);
        }

        let (device, peripheral) = {
            let discovered = self.discovered.lock().unwrap();
            match discovered.get(service_uuid) {
                Some(entry) => (entry.device.clone(), entry.peripheral.clone()),
                None => {
                    return Err(Fault::new(
                        ErrorCode::ConnectionError,
                        "Device not found. Scan for devices first.",
                    ));
                }
            }
        };

        let mut events = self.sdk.connect(&peripheral, service_uuid);
        match events.recv().await {
            Some(ConnectionEvent::Connected(session)) => {
                log::info!("connected to {}", device.service_uuid);
                *self.connected.lock().unwrap() = Some(Arc::new(Connected { device, session }));
                Ok(true)
            }
            Some(ConnectionEvent::Disconnected) => {
                *self.connected.lock().unwrap() = None;
                Err(Fault::new(ErrorCode::ConnectionError, "Device disconnected."))
            }
            Some(ConnectionEvent::Failed) | None => {
                *self.connected.lock().unwrap() = None;
                Err(Fault::new(ErrorCode::ConnectionError, "Failed to connect to device."))
            }
        }
    }

    /// The currently connected device, if any.
    pub fn connected_device(&self) -> Option<BleDevice> {
        self.connected.lock().unwrap().as_ref().map(|c| c.device.clone())
    }

    /// Set the proof of possession on the secure session and ask the device
    /// for the Wi-Fi networks it can see. Connection state is unchanged.
    pub async fn scan_wifi_networks(&self, proof: &str) -> Result<Vec<WifiNetwork>, Fault> {
        let connected = self.require_connected()?;
        connected.session.set_proof_of_possession(proof);
        match connected.session.scan_wifi_networks().await {
            Ok(Ok(networks)) => Ok(networks),
            Ok(Err(e)) => Err(Fault::new(ErrorCode::WifiScanError, e.to_string())),
            Err(_) => Err(Fault::new(ErrorCode::WifiScanError, "Wi-Fi scan ended without a result.")),
        }
    }

    /// Send Wi-Fi credentials through the vendor's multi-phase exchange.
    /// The first terminal phase decides the outcome. Only a failure the
    /// device itself reports tears the connection down.
    pub async fn provision(&self, ssid: &str, password: &str) -> Result<bool, Fault> {
        let connected = self.require_connected()?;
        let mut events = connected.session.provision(ssid, password);
        loop {
            let event = match events.recv().await {
                Some(event) => event,
                None => {
                    return Err(Fault::new(
                        ErrorCode::WifiConnectionError,
                        "Provisioning ended without a result.",
                    ));
                }
            };
            match event {
                ProvisionEvent::ConfigSent => log::debug!("wifi config sent"),
                ProvisionEvent::ConfigApplied => log::debug!("wifi config applied"),
                ProvisionEvent::Success => return Ok(true),
                ProvisionEvent::SessionFailed { message }
                | ProvisionEvent::ConfigFailed { message }
                | ProvisionEvent::Failed { message } => {
                    return Err(Fault::new(ErrorCode::WifiConnectionError, message));
                }
                ProvisionEvent::ConfigApplyFailed { message } => {
                    return Err(Fault::new(ErrorCode::ConnectionError, message));
                }
                ProvisionEvent::DeviceFailure { reason } => {
                    log::warn!("device reported provisioning failure: {}", reason.as_str());
                    let _ = connected.session.disconnect().await;
                    *self.connected.lock().unwrap() = None;
                    return Err(Fault::new(ErrorCode::WifiConnectionError, reason.as_str()));
                }
            }
        }
    }

    /// Tear down the connected device and clear the slot.
    pub async fn disconnect(&self) -> Result<bool, Fault> {
        let connected = match self.connected.lock().unwrap().take() {
            Some(connected) => connected,
            None => return Err(Fault::new(ErrorCode::DisconnectError, "No device connected.")),
        };
        let _ = connected.session.disconnect().await;
        Ok(true)
    }

    /// Preconditions shared by discovery and connect, checked in the order
    /// the guidance messages should appear to the user.
    fn preflight(&self) -> Result<(), Fault> {
        if !self.location.has_permission() {
            return Err(Fault::new(ErrorCode::LocationError, "Enable location permission."));
        }
        if !(self.bluetooth.has_scan_permission() && self.bluetooth.has_connect_permission()) {
            return Err(Fault::new(ErrorCode::BluetoothError, "Enable Bluetooth permission."));
        }
        if !self.location_service_enabled() {
            return Err(Fault::new(ErrorCode::LocationError, "Enable location service."));
        }
        if !self.bluetooth.is_enabled() {
            return Err(Fault::new(ErrorCode::BluetoothError, "Enable Bluetooth service."));
        }
        Ok(())
    }

    fn location_service_enabled(&self) -> bool {
        let enabled = |provider| self.location.provider_enabled(provider).unwrap_or(false);
        enabled(LocationProvider::Gps) || enabled(LocationProvider::Network)
    }

    fn require_connected(&self) -> Result<Arc<Connected<S::Session>>, Fault> {
        self.connected
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Fault::new(ErrorCode::ConnectionError, "No device connected."))
    }
}
