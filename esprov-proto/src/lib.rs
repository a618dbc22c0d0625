//! esprov method-channel contract.
//!
//! Every feature of the plugin is exposed as a named channel carrying
//! request/response pairs: a method name plus a JSON argument map goes in,
//! exactly one reply comes back, either a success value or a [`Fault`]
//! (error code, human-readable message, optional detail). This crate owns
//! that contract; the bridges implementing it live in `esprov-bridge`.

// Channel names, one per bridge.
pub const BLUETOOTH_CHANNEL: &str = "esp_wifi_provisioning/bluetooth_adapter";
pub const LOCATION_CHANNEL: &str = "esp_wifi_provisioning/location_adapter";
pub const ESP_CHANNEL: &str = "esp_wifi_provisioning/esp";

// Re-export commonly used types
pub use serde_json::{Value as JsonValue, json};

/// A single method call addressed to one of the bridges.
///
/// `id` pairs the eventual reply with this call; the embedder picks it and
/// must not reuse it while the call is outstanding.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct Request {
    pub id: u64,
    pub channel: String,
    pub method: String,
    #[serde(default)]
    pub args: JsonValue,
}

impl Request {
    pub fn new(id: u64, channel: &str, method: &str) -> Self {
        Self {
            id,
            channel: channel.to_string(),
            method: method.to_string(),
            args: JsonValue::Null,
        }
    }

    pub fn with_args(id: u64, channel: &str, method: &str, args: JsonValue) -> Self {
        Self { args, ..Self::new(id, channel, method) }
    }
}

/// The single reply to a [`Request`].
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct Response {
    pub id: u64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Fault>,
}

impl Response {
    pub fn ok(id: u64, data: JsonValue) -> Self {
        Self { id, ok: true, data: Some(data), error: None }
    }

    pub fn err(id: u64, fault: Fault) -> Self {
        Self { id, ok: false, data: None, error: Some(fault) }
    }
}

/// Error codes carried on the wire.
///
/// `Generic` is the anonymous code the permission/service bridges reply
/// with (serialized as an empty string); the rest match the provisioning
/// channel's documented failure taxonomy.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    #[serde(rename = "")]
    Generic,
    BluetoothError,
    LocationError,
    ScanError,
    ConnectionError,
    WifiScanError,
    WifiConnectionError,
    DisconnectError,
    NotImplemented,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Generic => "",
            ErrorCode::BluetoothError => "BLUETOOTH_ERROR",
            ErrorCode::LocationError => "LOCATION_ERROR",
            ErrorCode::ScanError => "SCAN_ERROR",
            ErrorCode::ConnectionError => "CONNECTION_ERROR",
            ErrorCode::WifiScanError => "WIFI_SCAN_ERROR",
            ErrorCode::WifiConnectionError => "WIFI_CONNECTION_ERROR",
            ErrorCode::DisconnectError => "DISCONNECT_ERROR",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reply: code, guidance-oriented message, optional detail.
#[derive(thiserror::Error, serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct Fault {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Fault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: Some(details.into()) }
    }
}

/// A device seen during a BLE scan, identified by its advertised service
/// UUID.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BleDevice {
    pub name: String,
    pub service_uuid: String,
}

/// A Wi-Fi network visible to a connected device.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    pub name: String,
    pub rssi: i32,
    /// One of the [`security`] codes.
    pub security: u8,
}

/// Wi-Fi security modes as enumerated by the device firmware.
pub mod security {
    pub const OPEN: u8 = 0;
    pub const WEP: u8 = 1;
    pub const WPA_PSK: u8 = 2;
    pub const WPA2_PSK: u8 = 3;
    pub const WPA_WPA2_PSK: u8 = 4;
    pub const WPA2_ENTERPRISE: u8 = 5;
}
