//! In-memory platform and SDK backend.
//!
//! Stands in for the OS adapters and the vendor provisioning SDK so the
//! whole call surface can run headless. The world is described by a
//! [`SimConfig`]; OS dialogs are auto-answered per `accept_dialogs` and
//! their outcomes surface as [`PlatformEvent`]s for the embedder to feed
//! back into the bridges.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use esprov_proto::WifiNetwork;
use rand::Rng;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use crate::platform::{BluetoothPlatform, LocationPlatform, LocationProvider, PlatformError};
use crate::sdk::{
    ConnectionEvent, DeviceFailureReason, EspSdk, EspSession, ProvisionEvent, ScanEvent, SdkError,
};

/// Outcome of a simulated OS dialog, to be routed into the matching
/// bridge callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    BluetoothEnableResult,
    BluetoothPermissionResult(bool),
    LocationEnableResult(bool),
    LocationPermissionResult(bool),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub bluetooth_enabled: bool,
    pub bluetooth_granted: bool,
    pub location_granted: bool,
    pub gps_enabled: bool,
    pub network_location_enabled: bool,
    /// When true, simulated dialogs are accepted; when false, dismissed.
    pub accept_dialogs: bool,
    pub devices: Vec<SimDevice>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bluetooth_enabled: true,
            bluetooth_granted: true,
            location_granted: true,
            gps_enabled: true,
            network_location_enabled: false,
            accept_dialogs: true,
            devices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimDevice {
    pub name: String,
    pub service_uuid: String,
    pub proof_of_possession: String,
    #[serde(default)]
    pub networks: Vec<SimNetwork>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimNetwork {
    pub name: String,
    pub rssi: i32,
    pub security: u8,
    pub password: String,
}

/// The complete simulated environment. Handed to the dispatcher as three
/// separate Arcs so each bridge owns its own seam.
pub struct SimWorld {
    pub bluetooth: Arc<SimBluetooth>,
    pub location: Arc<SimLocation>,
    pub sdk: Arc<SimSdk>,
}

impl SimWorld {
    pub fn new(config: SimConfig) -> (Self, mpsc::UnboundedReceiver<PlatformEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let world = Self {
            bluetooth: Arc::new(SimBluetooth {
                enabled: AtomicBool::new(config.bluetooth_enabled),
                granted: AtomicBool::new(config.bluetooth_granted),
                accept_dialogs: config.accept_dialogs,
                events: events.clone(),
            }),
            location: Arc::new(SimLocation {
                granted: AtomicBool::new(config.location_granted),
                gps: AtomicBool::new(config.gps_enabled),
                network: AtomicBool::new(config.network_location_enabled),
                accept_dialogs: config.accept_dialogs,
                events,
            }),
            sdk: Arc::new(SimSdk {
                devices: config.devices.into_iter().map(Arc::new).collect(),
            }),
        };
        (world, rx)
    }
}

pub struct SimBluetooth {
    enabled: AtomicBool,
    granted: AtomicBool,
    accept_dialogs: bool,
    events: mpsc::UnboundedSender<PlatformEvent>,
}

impl BluetoothPlatform for SimBluetooth {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn has_scan_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn has_connect_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_permissions(&self) -> Result<(), PlatformError> {
        if self.accept_dialogs {
            self.granted.store(true, Ordering::SeqCst);
        }
        let granted = self.granted.load(Ordering::SeqCst);
        let _ = self.events.send(PlatformEvent::BluetoothPermissionResult(granted));
        Ok(())
    }

    fn request_enable(&self) -> Result<(), PlatformError> {
        if self.accept_dialogs {
            self.enabled.store(true, Ordering::SeqCst);
        }
        let _ = self.events.send(PlatformEvent::BluetoothEnableResult);
        Ok(())
    }
}

pub struct SimLocation {
    granted: AtomicBool,
    gps: AtomicBool,
    network: AtomicBool,
    accept_dialogs: bool,
    events: mpsc::UnboundedSender<PlatformEvent>,
}

impl LocationPlatform for SimLocation {
    fn has_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_permission(&self) -> Result<(), PlatformError> {
        if self.accept_dialogs {
            self.granted.store(true, Ordering::SeqCst);
        }
        let granted = self.granted.load(Ordering::SeqCst);
        let _ = self.events.send(PlatformEvent::LocationPermissionResult(granted));
        Ok(())
    }

    fn provider_enabled(&self, provider: LocationProvider) -> Result<bool, PlatformError> {
        Ok(match provider {
            LocationProvider::Gps => self.gps.load(Ordering::SeqCst),
            LocationProvider::Network => self.network.load(Ordering::SeqCst),
        })
    }

    fn request_enable(&self) -> Result<(), PlatformError> {
        if self.accept_dialogs {
            self.gps.store(true, Ordering::SeqCst);
        }
        let _ = self.events.send(PlatformEvent::LocationEnableResult(self.accept_dialogs));
        Ok(())
    }
}

pub struct SimSdk {
    devices: Vec<Arc<SimDevice>>,
}

#[derive(Clone)]
pub struct SimPeripheral(Arc<SimDevice>);

impl EspSdk for SimSdk {
    type Peripheral = SimPeripheral;
    type Session = SimSession;

    fn search_devices(&self) -> mpsc::Receiver<ScanEvent<SimPeripheral>> {
        let (tx, rx) = mpsc::channel(self.devices.len() + 1);
        let devices = self.devices.clone();
        tokio::spawn(async move {
            for device in devices {
                let event = ScanEvent::Found {
                    name: device.name.clone(),
                    service_uuid: device.service_uuid.clone(),
                    peripheral: SimPeripheral(Arc::clone(&device)),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(ScanEvent::Completed).await;
        });
        rx
    }

    fn connect(
        &self,
        peripheral: &SimPeripheral,
        _service_uuid: &str,
    ) -> mpsc::Receiver<ConnectionEvent<SimSession>> {
        let (tx, rx) = mpsc::channel(1);
        let session = SimSession {
            device: Arc::clone(&peripheral.0),
            proof: Arc::new(std::sync::Mutex::new(String::new())),
        };
        tokio::spawn(async move {
            let _ = tx.send(ConnectionEvent::Connected(session)).await;
        });
        rx
    }
}

#[derive(Clone)]
pub struct SimSession {
    device: Arc<SimDevice>,
    proof: Arc<std::sync::Mutex<String>>,
}

impl SimSession {
    fn proof_matches(&self) -> bool {
        *self.proof.lock().unwrap() == self.device.proof_of_possession
    }
}

impl EspSession for SimSession {
    fn set_proof_of_possession(&self, proof: &str) {
        *self.proof.lock().unwrap() = proof.to_string();
    }

    fn scan_wifi_networks(&self) -> oneshot::Receiver<Result<Vec<WifiNetwork>, SdkError>> {
        let (tx, rx) = oneshot::channel();
        let result = if self.proof_matches() {
            let mut rng = rand::thread_rng();
            Ok(self
                .device
                .networks
                .iter()
                .map(|n| WifiNetwork {
                    name: n.name.clone(),
                    // A little jitter so repeated scans look live.
                    rssi: n.rssi + rng.gen_range(-4..=4),
                    security: n.security,
                })
                .collect())
        } else {
            Err(SdkError("session handshake rejected".to_string()))
        };
        let _ = tx.send(result);
        rx
    }

    fn provision(&self, ssid: &str, password: &str) -> mpsc::Receiver<ProvisionEvent> {
        let events = if !self.proof_matches() {
            vec![ProvisionEvent::SessionFailed {
                message: "session handshake rejected".to_string(),
            }]
        } else {
            match self.device.networks.iter().find(|n| n.name == ssid) {
                None => vec![
                    ProvisionEvent::ConfigSent,
                    ProvisionEvent::DeviceFailure { reason: DeviceFailureReason::NetworkNotFound },
                ],
                Some(network) if network.password != password => vec![
                    ProvisionEvent::ConfigSent,
                    ProvisionEvent::ConfigApplied,
                    ProvisionEvent::DeviceFailure { reason: DeviceFailureReason::AuthFailed },
                ],
                Some(_) => vec![
                    ProvisionEvent::ConfigSent,
                    ProvisionEvent::ConfigApplied,
                    ProvisionEvent::Success,
                ],
            }
        };
        let (tx, rx) = mpsc::channel(events.len());
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        rx
    }

    fn disconnect(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_describe_a_permissive_world() {
        let config: SimConfig = serde_json::from_str("{}").unwrap();
        assert!(config.bluetooth_enabled);
        assert!(config.accept_dialogs);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn device_networks_default_to_empty() {
        let config: SimConfig = serde_json::from_str(
            r#"{
                "devices": [{
                    "name": "PROV_abc",
                    "service_uuid": "uuid-1",
                    "proof_of_possession": "pop"
                }]
            }"#,
        )
        .unwrap();
        assert!(config.devices[0].networks.is_empty());
    }

    #[tokio::test]
    async fn dismissed_dialogs_leave_state_untouched() {
        let config = SimConfig {
            bluetooth_granted: false,
            accept_dialogs: false,
            ..SimConfig::default()
        };
        let (world, mut events) = SimWorld::new(config);

        world.bluetooth.request_permissions().unwrap();
        assert!(!world.bluetooth.has_scan_permission());
        assert_eq!(events.recv().await, Some(PlatformEvent::BluetoothPermissionResult(false)));
    }
}
