//! Location service state and permission bridge.
//!
//! BLE scanning is gated on location being enabled on some platforms even
//! though location itself is never read, so this bridge exists alongside
//! the Bluetooth one with the same request/reply shape.

use std::sync::Arc;

use esprov_proto::{ErrorCode, Fault};

use crate::platform::{LocationPlatform, LocationProvider};
use crate::reply::ReplySlot;

const WAITING_FOR_SERVICE: &str = "Waiting for location service to be enabled.";
const WAITING_FOR_PERMISSION: &str = "Waiting for location service response.";

pub struct LocationAdapterBridge<P: LocationPlatform> {
    platform: Arc<P>,
    pending: ReplySlot,
}

impl<P: LocationPlatform> LocationAdapterBridge<P> {
    pub fn new(platform: Arc<P>) -> Self {
        Self { platform, pending: ReplySlot::new() }
    }

    /// True when either the GPS or the network provider is enabled. A
    /// provider query that fails counts as "not enabled".
    pub fn is_service_enabled(&self) -> bool {
        self.pending.supersede();
        self.provider_enabled(LocationProvider::Gps)
            || self.provider_enabled(LocationProvider::Network)
    }

    pub fn has_permissions(&self) -> bool {
        self.pending.supersede();
        self.platform.has_permission()
    }

    /// Launch the OS enable-location flow and wait for its outcome,
    /// delivered through [`on_enable_result`](Self::on_enable_result).
    pub async fn request_enable_service(&self) -> Result<bool, Fault> {
        self.pending.supersede();
        let rx = self.pending.begin(Fault::new(ErrorCode::Generic, WAITING_FOR_SERVICE));
        if let Err(e) = self.platform.request_enable() {
            log::warn!("failed to launch location enable flow: {e}");
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
        if self.platform.has_permission() {
            return Ok(true);
        }
        let rx = self.pending.begin(Fault::new(ErrorCode::Generic, WAITING_FOR_PERMISSION));
        if let Err(e) = self.platform.request_permission() {
            log::warn!("failed to launch location permission dialog: {e}");
            self.pending.resolve(Err(Fault::new(ErrorCode::Generic, e.to_string())));
        }
        rx.await
            .unwrap_or_else(|_| Err(Fault::new(ErrorCode::Generic, WAITING_FOR_PERMISSION)))
    }

    /// OS enable-flow callback. A cancelled flow re-checks the providers:
    /// the user may have toggled location by hand before backing out.
    pub fn on_enable_result(&self, accepted: bool) -> bool {
        let enabled = accepted
            || self.provider_enabled(LocationProvider::Gps)
            || self.provider_enabled(LocationProvider::Network);
        self.pending.resolve(Ok(enabled))
    }

    /// OS permission-dialog callback. A cancelled dialog is reported by the
    /// embedder as `granted = false`.
    pub fn on_permission_result(&self, granted: bool) -> bool {
        self.pending.resolve(Ok(granted))
    }

    fn provider_enabled(&self, provider: LocationProvider) -> bool {
        match self.platform.provider_enabled(provider) {
            Ok(enabled) => enabled,
            Err(e) => {
                log::warn!("{provider:?} provider check failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use esprov_proto::ErrorCode;

    use super::{LocationAdapterBridge, WAITING_FOR_PERMISSION};
    use crate::testutil::TestLocation;

    fn bridge(platform: &Arc<TestLocation>) -> Arc<LocationAdapterBridge<TestLocation>> {
        Arc::new(LocationAdapterBridge::new(Arc::clone(platform)))
    }

    #[tokio::test]
    async fn enabled_when_either_provider_is_on() {
        let platform = Arc::new(TestLocation::new(true));
        let bridge = bridge(&platform);

        platform.set_providers(false, false);
        assert!(!bridge.is_service_enabled());

        platform.set_providers(true, false);
        assert!(bridge.is_service_enabled());

        platform.set_providers(false, true);
        assert!(bridge.is_service_enabled());
    }

    #[tokio::test]
    async fn failing_provider_counts_as_disabled() {
        let platform = Arc::new(TestLocation::new(true));
        platform.set_providers(true, false);
        platform.fail_gps_queries();
        let bridge = bridge(&platform);
        assert!(!bridge.is_service_enabled());
    }

    #[tokio::test]
    async fn request_permission_short_circuits_when_granted() {
        let platform = Arc::new(TestLocation::new(true));
        let bridge = bridge(&platform);
        assert_eq!(bridge.request_permission().await, Ok(true));
        assert_eq!(platform.permission_dialogs(), 0);
    }

    #[tokio::test]
    async fn permission_outcome_comes_from_the_dialog() {
        let platform = Arc::new(TestLocation::new(false));
        let bridge = bridge(&platform);

        let pending = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.request_permission().await }
        });
        tokio::task::yield_now().await;

        assert_eq!(platform.permission_dialogs(), 1);
        assert!(bridge.on_permission_result(true));
        assert_eq!(pending.await.unwrap(), Ok(true));
    }

    #[tokio::test]
    async fn cancelled_enable_flow_rechecks_the_providers() {
        let platform = Arc::new(TestLocation::new(true));
        platform.set_providers(false, false);
        let bridge = bridge(&platform);

        let pending = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.request_enable_service().await }
        });
        tokio::task::yield_now().await;

        // User backed out of the dialog but had already enabled GPS by hand.
        platform.set_providers(true, false);
        assert!(bridge.on_enable_result(false));
        assert_eq!(pending.await.unwrap(), Ok(true));
    }

    #[tokio::test]
    async fn second_call_supersedes_the_first() {
        let platform = Arc::new(TestLocation::new(false));
        let bridge = bridge(&platform);

        let first = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.request_permission().await }
        });
        tokio::task::yield_now().await;

        let second = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.request_permission().await }
        });
        tokio::task::yield_now().await;

        let fault = first.await.unwrap().unwrap_err();
        assert_eq!(fault.code, ErrorCode::Generic);
        assert_eq!(fault.message, WAITING_FOR_PERMISSION);

        bridge.on_permission_result(true);
        assert_eq!(second.await.unwrap(), Ok(true));
    }
}
