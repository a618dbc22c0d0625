//! Hand-driven platform and SDK doubles for the bridge tests.

use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use esprov_proto::WifiNetwork;
use tokio::sync::{mpsc, oneshot};

use crate::platform::{BluetoothPlatform, LocationPlatform, LocationProvider, PlatformError};
use crate::sdk::{ConnectionEvent, EspSdk, EspSession, ProvisionEvent, ScanEvent, SdkError};

pub fn found(name: &str, service_uuid: &str) -> ScanEvent<String> {
    ScanEvent::Found {
        name: name.to_string(),
        service_uuid: service_uuid.to_string(),
        peripheral: service_uuid.to_string(),
    }
}

pub struct TestBluetooth {
    enabled: AtomicBool,
    granted: AtomicBool,
    fail_launches: AtomicBool,
    permission_dialogs: AtomicUsize,
    enable_flows: AtomicUsize,
    /// When >= 0, connect-permission checks beyond this count report false.
    connect_checks_left: AtomicIsize,
}

impl TestBluetooth {
    pub fn new(enabled: bool, granted: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            granted: AtomicBool::new(granted),
            fail_launches: AtomicBool::new(false),
            permission_dialogs: AtomicUsize::new(0),
            enable_flows: AtomicUsize::new(0),
            connect_checks_left: AtomicIsize::new(isize::MAX),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    pub fn fail_launches(&self) {
        self.fail_launches.store(true, Ordering::SeqCst);
    }

    /// Report the connect permission as granted for the next `checks`
    /// queries only, simulating a mid-operation revocation.
    pub fn revoke_connect_after(&self, checks: isize) {
        self.connect_checks_left.store(checks, Ordering::SeqCst);
    }

    pub fn permission_dialogs(&self) -> usize {
        self.permission_dialogs.load(Ordering::SeqCst)
    }

    pub fn enable_flows(&self) -> usize {
        self.enable_flows.load(Ordering::SeqCst)
    }

    fn launch(&self, counter: &AtomicUsize) -> Result<(), PlatformError> {
        if self.fail_launches.load(Ordering::SeqCst) {
            return Err(PlatformError("no activity attached".to_string()));
        }
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl BluetoothPlatform for TestBluetooth {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn has_scan_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn has_connect_permission(&self) -> bool {
        if self.connect_checks_left.fetch_sub(1, Ordering::SeqCst) <= 0 {
            return false;
        }
        self.granted.load(Ordering::SeqCst)
    }

    fn request_permissions(&self) -> Result<(), PlatformError> {
        self.launch(&self.permission_dialogs)
    }

    fn request_enable(&self) -> Result<(), PlatformError> {
        self.launch(&self.enable_flows)
    }
}

pub struct TestLocation {
    granted: AtomicBool,
    gps: AtomicBool,
    network: AtomicBool,
    gps_queries_fail: AtomicBool,
    permission_dialogs: AtomicUsize,
}

impl TestLocation {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            gps: AtomicBool::new(true),
            network: AtomicBool::new(false),
            gps_queries_fail: AtomicBool::new(false),
            permission_dialogs: AtomicUsize::new(0),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    pub fn set_providers(&self, gps: bool, network: bool) {
        self.gps.store(gps, Ordering::SeqCst);
        self.network.store(network, Ordering::SeqCst);
    }

    pub fn fail_gps_queries(&self) {
        self.gps_queries_fail.store(true, Ordering::SeqCst);
    }

    pub fn permission_dialogs(&self) -> usize {
        self.permission_dialogs.load(Ordering::SeqCst)
    }
}

impl LocationPlatform for TestLocation {
    fn has_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_permission(&self) -> Result<(), PlatformError> {
        self.permission_dialogs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn provider_enabled(&self, provider: LocationProvider) -> Result<bool, PlatformError> {
        match provider {
            LocationProvider::Gps => {
                if self.gps_queries_fail.load(Ordering::SeqCst) {
                    return Err(PlatformError("gps provider unavailable".to_string()));
                }
                Ok(self.gps.load(Ordering::SeqCst))
            }
            LocationProvider::Network => Ok(self.network.load(Ordering::SeqCst)),
        }
    }

    fn request_enable(&self) -> Result<(), PlatformError> {
        Ok(())
    }
}

/// SDK double that replays scripted event sequences. Each script is
/// consumed by the next call; the channel closes once the events are
/// drained.
pub struct ScriptedSdk {
    scan_script: Mutex<Vec<ScanEvent<String>>>,
    connect_script: Mutex<Vec<ConnectionEvent<ScriptedSession>>>,
}

impl ScriptedSdk {
    pub fn new() -> Self {
        Self {
            scan_script: Mutex::new(Vec::new()),
            connect_script: Mutex::new(Vec::new()),
        }
    }

    pub fn script_scan(&self, events: Vec<ScanEvent<String>>) {
        *self.scan_script.lock().unwrap() = events;
    }

    pub fn script_connect(&self, events: Vec<ConnectionEvent<ScriptedSession>>) {
        *self.connect_script.lock().unwrap() = events;
    }
}

fn replay<T: Send + 'static>(events: Vec<T>) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(events.len().max(1));
    for event in events {
        let _ = tx.try_send(event);
    }
    // Dropping the sender closes the channel after the buffered events.
    rx
}

impl EspSdk for ScriptedSdk {
    type Peripheral = String;
    type Session = ScriptedSession;

    fn search_devices(&self) -> mpsc::Receiver<ScanEvent<String>> {
        replay(std::mem::take(&mut *self.scan_script.lock().unwrap()))
    }

    fn connect(
        &self,
        _peripheral: &String,
        _service_uuid: &str,
    ) -> mpsc::Receiver<ConnectionEvent<ScriptedSession>> {
        replay(std::mem::take(&mut *self.connect_script.lock().unwrap()))
    }
}

#[derive(Clone)]
pub struct ScriptedSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    proof: Mutex<String>,
    wifi_script: Mutex<Option<Result<Vec<WifiNetwork>, SdkError>>>,
    provision_script: Mutex<Vec<ProvisionEvent>>,
    disconnects: AtomicUsize,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                proof: Mutex::new(String::new()),
                wifi_script: Mutex::new(None),
                provision_script: Mutex::new(Vec::new()),
                disconnects: AtomicUsize::new(0),
            }),
        }
    }

    pub fn script_wifi(&self, result: Result<Vec<WifiNetwork>, SdkError>) {
        *self.inner.wifi_script.lock().unwrap() = Some(result);
    }

    pub fn script_provision(&self, events: Vec<ProvisionEvent>) {
        *self.inner.provision_script.lock().unwrap() = events;
    }

    pub fn proof(&self) -> String {
        self.inner.proof.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }
}

impl EspSession for ScriptedSession {
    fn set_proof_of_possession(&self, proof: &str) {
        *self.inner.proof.lock().unwrap() = proof.to_string();
    }

    fn scan_wifi_networks(&self) -> oneshot::Receiver<Result<Vec<WifiNetwork>, SdkError>> {
        let (tx, rx) = oneshot::channel();
        if let Some(result) = self.inner.wifi_script.lock().unwrap().take() {
            let _ = tx.send(result);
        }
        rx
    }

    fn provision(&self, _ssid: &str, _password: &str) -> mpsc::Receiver<ProvisionEvent> {
        replay(std::mem::take(&mut *self.inner.provision_script.lock().unwrap()))
    }

    fn disconnect(&self) -> oneshot::Receiver<()> {
        self.inner.disconnects.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        rx
    }
}
