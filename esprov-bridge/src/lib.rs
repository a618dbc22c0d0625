//! Bridges exposing Bluetooth adapter state, location adapter state and ESP
//! BLE Wi-Fi provisioning to an application shell.
//!
//! Each bridge is a stateless-per-call facade over a platform capability:
//! the OS adapters and the vendor provisioning SDK sit behind the traits in
//! [`platform`] and [`sdk`], and every method call is answered exactly once
//! with a success value or an [`esprov_proto::Fault`]. The [`Dispatcher`]
//! maps the wire contract (channel + method name + JSON args) onto the
//! bridges.
//!
//! Asynchronous OS outcomes (permission dialogs, enable flows) come back
//! through the bridges' `on_*` methods, called by whoever receives the OS
//! callback. At most one such reply is outstanding per bridge: a new call
//! supersedes and fails the previous pending one.

mod bluetooth;
mod dispatch;
mod esp;
mod location;
mod reply;

pub mod platform;
pub mod sdk;
pub mod sim;

#[cfg(test)]
pub(crate) mod testutil;

pub use bluetooth::BluetoothAdapterBridge;
pub use dispatch::Dispatcher;
pub use esp::ProvisioningBridge;
pub use location::LocationAdapterBridge;
pub use reply::ReplySlot;

pub use esprov_proto::{BleDevice, ErrorCode, Fault, JsonValue, Request, Response, WifiNetwork, json};
