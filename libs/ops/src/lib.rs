//! Convergence operations against a cloud under test.
//!
//! Everything here is a thin predicate over the service clients plus one
//! call into the wait primitive: boot a server and wait for ACTIVE, detach
//! and delete a volume tree in stages, move a router to another L3 agent
//! and wait for the new hosting to show up in a fresh listing.
//!
//! The [`Cloud`] context owns the initialized clients and is passed
//! explicitly to whatever needs them; there is no process-wide client
//! state. Mutating calls (delete, reschedule, migrate) are issued once,
//! before the wait begins — predicates only read.

use std::time::Duration;

use stratus_openstack::auth::{ServiceType, Session};
use stratus_openstack::compute::ComputeApi;
use stratus_openstack::image::ImageApi;
use stratus_openstack::network::NetworkApi;
use stratus_openstack::volume::BlockStorageApi;
use stratus_openstack::{ApiError, Config, RestClient};

mod agents;
mod cleanup;
mod error;
mod floating;
mod migration;
mod provision;
mod servers;
mod volumes;

pub use cleanup::CleanupReport;
pub use error::OpsError;
pub use migration::{hypervisor_capacity, MigrationGoal};
pub use servers::{BootOptions, SSH_PORT};
pub use volumes::VOLUME_STAGE_TIMEOUT;

/// Default budget for a server to reach ACTIVE or become reachable.
pub const BOOT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default budget for servers to disappear after deletion.
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Default budget for agent liveness transitions and rescheduling.
pub const AGENT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default budget for live-migration convergence.
pub const MIGRATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Context object holding the initialized service clients.
#[derive(Debug, Clone)]
pub struct Cloud {
    pub compute: ComputeApi,
    pub network: NetworkApi,
    pub volumes: BlockStorageApi,
    pub images: ImageApi,
}

impl Cloud {
    /// Authenticate and wire up clients from the service catalog.
    pub async fn connect(config: &Config) -> Result<Self, OpsError> {
        let session = Session::login(config).await?;
        Ok(Self::from_session(&session)?)
    }

    /// Build clients from an already-established session.
    pub fn from_session(session: &Session) -> Result<Self, ApiError> {
        let token = session.token();
        Self::from_endpoints(
            session.endpoint(ServiceType::Compute)?,
            session.endpoint(ServiceType::Network)?,
            session.endpoint(ServiceType::Volume)?,
            session.endpoint(ServiceType::Image)?,
            token,
        )
    }

    /// Build clients from pre-resolved endpoints, bypassing the catalog.
    pub fn from_endpoints(
        compute_url: &str,
        network_url: &str,
        volume_url: &str,
        image_url: &str,
        token: &str,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            compute: ComputeApi::new(RestClient::new(compute_url, token)?),
            network: NetworkApi::new(RestClient::new(network_url, token)?),
            volumes: BlockStorageApi::new(RestClient::new(volume_url, token)?),
            images: ImageApi::new(RestClient::new(image_url, token)?),
        })
    }
}
