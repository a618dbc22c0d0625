//! Bluetooth adapter state and permission bridge.

use std::sync::Arc;

use esprov_proto::{ErrorCode, Fault};

use crate::platform::BluetoothPlatform;
use crate::reply::ReplySlot;

const WAITING_FOR_SERVICE: &str = "Waiting for Bluetooth service response.";

pub struct BluetoothAdapterBridge<P: BluetoothPlatform> {
    platform: Arc<P>,
    pending: ReplySlot,
}

impl<P: BluetoothPlatform> BluetoothAdapterBridge<P> {
    pub fn new(platform: Arc<P>) -> Self {
        Self { platform, pending: ReplySlot::new() }
    }

    pub fn is_service_enabled(&self) -> bool {
        self.pending.supersede();
        self.platform.is_enabled()
    }

    pub fn has_permissions(&self) -> bool {
        self.pending.supersede();
        self.platform.has_scan_permission() && self.platform.has_connect_permission()
    }

    /// Launch the OS enable-Bluetooth flow and wait for its outcome,
    /// delivered through [`on_enable_result`](Self::on_enable_result).
    /// Refused outright when the connect permission is missing, since the
    /// enable flow itself needs it.
    pub async fn request_enable_service(&self) -> Result<bool, Fault> {
        self.pending.supersede();
        if !self.platform.has_connect_permission() {
            return Err(Fault::new(
                ErrorCode::Generic,
                "Enable Bluetooth permission to allow Bluetooth service.",
            ));
        }
        let rx = self.pending.begin(Fault::new(ErrorCode::Generic, WAITING_FOR_SERVICE));
        if let Err(e) = self.platform.request_enable() {
            log::warn!("failed to launch Bluetooth enable flow: {e}");
            self.pending.resolve(Err(Fault::new(ErrorCode::Generic, e.to_string())));
        }
        rx.await
            .unwrap_or_else(|_| Err(Fault::new(ErrorCode::Generic, WAITING_FOR_SERVICE)))
    }

    /// Launch the OS permission dialog and wait for the grant/deny outcome,
    /// delivered through [`on_permission_result`](Self::on_permission_result).
    /// Replies `true` immediately, without prompting, when already granted.
    pub async fn request_permission(&self) -> Result<bool, Fault> {
        self.pending.supersede();
        if self.platform.has_scan_permission() && self.platform.has_connect_permission() {
            return Ok(true);
        }
        let rx = self.pending.begin(Fault::new(ErrorCode::Generic, WAITING_FOR_SERVICE));
        if let Err(e) = self.platform.request_permissions() {
            log::warn!("failed to launch Bluetooth permission dialog: {e}");
            self.pending.resolve(Err(Fault::new(ErrorCode::Generic, e.to_string())));
        }
        rx.await
            .unwrap_or_else(|_| Err(Fault::new(ErrorCode::Generic, WAITING_FOR_SERVICE)))
    }

    /// OS enable-flow callback. The activity result carries no payload, so
    /// the reply is the radio state re-read from the platform.
    pub fn on_enable_result(&self) -> bool {
        self.pending.resolve(Ok(self.platform.is_enabled()))
    }

    /// OS permission-dialog callback. A cancelled dialog is reported by the
    /// embedder as `granted = false`.
    pub fn on_permission_result(&self, granted: bool) -> bool {
        self.pending.resolve(Ok(granted))
    }
}
