//! Observation listing and cancellation.
//!
//! State lives in the transport's registry and is re-read on every call.
//! Cancelling a path removes every single observation at or below it; a
//! request to cancel a path nested under a broader observation is refused
//! with a conflict instead of silently doing nothing.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::LwM2mClient;
use crate::error::{DownlinkError, DownlinkResult};
use crate::path::LwM2mPath;
use crate::transport::ObservationService;

/// An active observation on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Observation {
    Single(LwM2mPath),
    Composite(Vec<LwM2mPath>),
}

impl Observation {
    /// True for a composite observation over the same set of paths.
    pub fn is_composite_over(&self, paths: &[LwM2mPath]) -> bool {
        match self {
            Self::Composite(observed) => {
                let observed: BTreeSet<_> = observed.iter().collect();
                let requested: BTreeSet<_> = paths.iter().collect();
                observed == requested
            }
            Self::Single(_) => false,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(path) => write!(f, "SingleObservation:{}", path),
            Self::Composite(paths) => {
                let sorted: BTreeSet<String> = paths.iter().map(ToString::to_string).collect();
                let joined: Vec<String> = sorted.into_iter().collect();
                write!(f, "CompositeObservation: [{}]", joined.join(", "))
            }
        }
    }
}

/// Cancellation algorithms over the transport's observation registry.
#[derive(Clone)]
pub struct ObservationRegistry {
    service: Arc<dyn ObservationService>,
}

impl ObservationRegistry {
    pub fn new(service: Arc<dyn ObservationService>) -> Self {
        Self { service }
    }

    /// Descriptors of every active observation, ordered.
    pub async fn list_all(&self, client: &LwM2mClient) -> BTreeSet<String> {
        self.service
            .observations(client.registration())
            .await
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Cancel every single observation at or below `target`.
    pub async fn cancel(&self, client: &LwM2mClient, target: &LwM2mPath) -> DownlinkResult<usize> {
        let observations = self.service.observations(client.registration()).await;
        let paths = matching_paths(client, &observations, std::slice::from_ref(target))?;
        Ok(self.cancel_paths(client, paths).await)
    }

    /// Cancel the composite observation over exactly `paths`, or else each
    /// path as with [`cancel`](Self::cancel).
    pub async fn cancel_composite(
        &self,
        client: &LwM2mClient,
        paths: &[LwM2mPath],
    ) -> DownlinkResult<usize> {
        let registration = client.registration();
        let observations = self.service.observations(registration).await;
        if observations.iter().any(|o| o.is_composite_over(paths)) {
            return Ok(self
                .service
                .cancel_composite_observations(registration, paths)
                .await);
        }
        let matched = matching_paths(client, &observations, paths)?;
        Ok(self.cancel_paths(client, matched).await)
    }

    pub async fn cancel_all(&self, client: &LwM2mClient) -> usize {
        self.service
            .cancel_all_observations(client.registration())
            .await
    }

    async fn cancel_paths(&self, client: &LwM2mClient, paths: HashSet<LwM2mPath>) -> usize {
        let mut cancelled = 0;
        for path in paths {
            cancelled += self
                .service
                .cancel_observations(client.registration(), &path)
                .await;
        }
        cancelled
    }
}

/// Observed single paths to cancel for `targets`.
///
/// Fails before anything is cancelled when a target lies strictly below an
/// observed path.
fn matching_paths(
    client: &LwM2mClient,
    observations: &[Observation],
    targets: &[LwM2mPath],
) -> DownlinkResult<HashSet<LwM2mPath>> {
    let mut matched = HashSet::new();
    for observation in observations {
        let Observation::Single(observed) = observation else {
            continue;
        };
        for target in targets {
            if observed.starts_with(target) {
                matched.insert(*observed);
            } else if target.starts_with(observed) {
                return Err(DownlinkError::Conflict {
                    endpoint: client.endpoint().to_string(),
                    observed: observed.to_string(),
                    requested: target.to_string(),
                });
            }
        }
    }
    Ok(matched)
}
