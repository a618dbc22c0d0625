//! Maps the wire contract (channel + method + args) onto the bridges.

use std::sync::Arc;

use esprov_proto::{
    BLUETOOTH_CHANNEL, ESP_CHANNEL, ErrorCode, Fault, JsonValue, LOCATION_CHANNEL, Request,
    Response, json,
};

use crate::bluetooth::BluetoothAdapterBridge;
use crate::esp::ProvisioningBridge;
use crate::location::LocationAdapterBridge;
use crate::platform::{BluetoothPlatform, LocationPlatform};
use crate::sdk::EspSdk;

/// The three bridges behind their channels. The bridges are public so the
/// embedder can feed OS callbacks into their `on_*` methods.
pub struct Dispatcher<S: EspSdk, B: BluetoothPlatform, L: LocationPlatform> {
    pub bluetooth: BluetoothAdapterBridge<B>,
    pub location: LocationAdapterBridge<L>,
    pub provisioning: ProvisioningBridge<S, B, L>,
}

impl<S, B, L> Dispatcher<S, B, L>
where
    S: EspSdk,
    B: BluetoothPlatform,
    L: LocationPlatform,
{
    pub fn new(sdk: Arc<S>, bluetooth: Arc<B>, location: Arc<L>) -> Self {
        Self {
            bluetooth: BluetoothAdapterBridge::new(Arc::clone(&bluetooth)),
            location: LocationAdapterBridge::new(Arc::clone(&location)),
            provisioning: ProvisioningBridge::new(sdk, bluetooth, location),
        }
    }

    /// Answer a single request. Every call gets exactly one response; all
    /// failures come back as faults, never as panics or dropped replies.
    pub async fn handle(&self, request: Request) -> Response {
        log::debug!("dispatch {}#{} (id={})", request.channel, request.method, request.id);
        let result = match request.channel.as_str() {
            BLUETOOTH_CHANNEL => self.handle_bluetooth(&request).await,
            LOCATION_CHANNEL => self.handle_location(&request).await,
            ESP_CHANNEL => self.handle_esp(&request).await,
            other => Err(Fault::new(
                ErrorCode::NotImplemented,
                format!("unknown channel: {other}"),
            )),
        };
        match result {
            Ok(data) => Response::ok(request.id, data),
            Err(fault) => Response::err(request.id, fault),
        }
    }

    async fn handle_bluetooth(&self, request: &Request) -> Result<JsonValue, Fault> {
        match request.method.as_str() {
            "isBluetoothServiceEnabled" => Ok(json!(self.bluetooth.is_service_enabled())),
            "requestEnableBluetoothService" => {
                Ok(json!(self.bluetooth.request_enable_service().await?))
            }
            "hasBluetoothPermissions" => Ok(json!(self.bluetooth.has_permissions())),
            "requestBluetoothPermission" => Ok(json!(self.bluetooth.request_permission().await?)),
            other => Err(not_implemented(other)),
        }
    }

    async fn handle_location(&self, request: &Request) -> Result<JsonValue, Fault> {
        match request.method.as_str() {
            "isLocationServiceEnabled" => Ok(json!(self.location.is_service_enabled())),
            "requestEnableLocationService" => {
                Ok(json!(self.location.request_enable_service().await?))
            }
            "hasLocationPermissions" => Ok(json!(self.location.has_permissions())),
            "requestLocationPermission" => Ok(json!(self.location.request_permission().await?)),
            other => Err(not_implemented(other)),
        }
    }

    async fn handle_esp(&self, request: &Request) -> Result<JsonValue, Fault> {
        match request.method.as_str() {
            "searchBleEspDevices" => Ok(json!(self.provisioning.search_devices().await?)),
            "connectBLEDevice" => {
                let service_uuid = str_arg(request, "service_uuid").ok_or_else(|| {
                    Fault::new(ErrorCode::ConnectionError, "Device ID is required.")
                })?;
                Ok(json!(self.provisioning.connect(service_uuid).await?))
            }
            "getConnectedBLEDevice" => Ok(json!(self.provisioning.connected_device())),
            "scanWifiNetworks" => {
                let proof = str_arg(request, "provision_proof").ok_or_else(|| {
                    Fault::new(ErrorCode::ConnectionError, "Proof of provision is required.")
                })?;
                Ok(json!(self.provisioning.scan_wifi_networks(proof).await?))
            }
            "provisionWifiNetwork" => {
                let ssid = str_arg(request, "ssid").ok_or_else(|| {
                    Fault::new(ErrorCode::WifiConnectionError, "Network SSID is required.")
                })?;
                let password = str_arg(request, "password").ok_or_else(|| {
                    Fault::new(ErrorCode::WifiConnectionError, "Network password is required.")
                })?;
                Ok(json!(self.provisioning.provision(ssid, password).await?))
            }
            "disconnectBLEDevice" => Ok(json!(self.provisioning.disconnect().await?)),
            other => Err(not_implemented(other)),
        }
    }
}

fn str_arg<'a>(request: &'a Request, key: &str) -> Option<&'a str> {
    request.args.get(key).and_then(|v| v.as_str())
}

fn not_implemented(method: &str) -> Fault {
    Fault::new(ErrorCode::NotImplemented, format!("unknown method: {method}"))
}
