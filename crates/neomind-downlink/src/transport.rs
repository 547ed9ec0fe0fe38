//! Seams to the protocol stack.
//!
//! The codec, retransmission and the live observation registry belong to
//! the transport; this crate only talks to them through these traits.

use std::time::Duration;

use async_trait::async_trait;

use crate::client::Registration;
use crate::error::TransportResult;
use crate::observation::Observation;
use crate::path::LwM2mPath;
use crate::request::{DownlinkRequest, DownlinkResponse};

/// Sends requests to registered devices.
#[async_trait]
pub trait DownlinkTransport: Send + Sync {
    /// Submit `request` and wait for the device's answer.
    ///
    /// Implementations resolve exactly once: with the response, or with an
    /// error once `timeout` elapses or the exchange fails.
    async fn send(
        &self,
        registration: &Registration,
        request: DownlinkRequest,
        timeout: Duration,
    ) -> TransportResult<DownlinkResponse>;
}

/// Live observation state kept by the transport.
///
/// The transport holds at most one composite observation per distinct path
/// set: an accepted `ObserveCompositeRequest` over an already observed set
/// replaces the existing entry. The handler does not de-duplicate.
#[async_trait]
pub trait ObservationService: Send + Sync {
    async fn observations(&self, registration: &Registration) -> Vec<Observation>;

    /// Cancel single observations of exactly `path`. Returns how many were removed.
    async fn cancel_observations(&self, registration: &Registration, path: &LwM2mPath) -> usize;

    async fn cancel_all_observations(&self, registration: &Registration) -> usize;

    /// Cancel the composite observation over exactly `paths`.
    async fn cancel_composite_observations(
        &self,
        registration: &Registration,
        paths: &[LwM2mPath],
    ) -> usize;
}
