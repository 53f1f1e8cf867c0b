//! Floating IP association and release.

use std::time::Duration;

use stratus_openstack::compute::Server;
use stratus_openstack::network::{FloatingIp, PortFilter, ResourceStatus};
use stratus_wait::{wait_true, WaitSpec};
use tracing::{info, warn};

use crate::error::OpsError;
use crate::Cloud;

const PORT_ACTIVE_TIMEOUT: Duration = Duration::from_secs(60);
const FIP_DOWN_TIMEOUT: Duration = Duration::from_secs(60);

impl Cloud {
    /// Allocate a floating IP on the external network, bind it to the
    /// server's port, and wait for the port to go ACTIVE.
    pub async fn assign_floating_ip(&self, server: &Server) -> Result<FloatingIp, OpsError> {
        let external = self.network.external_networks().await?;
        let network = external.first().ok_or_else(|| {
            OpsError::Environment("no active external network to allocate from".to_string())
        })?;

        let ports = self
            .network
            .list_ports(&PortFilter::device_id(server.id.clone()))
            .await?;
        let port = ports.first().ok_or_else(|| {
            OpsError::Environment(format!("server {} has no ports", server.id))
        })?;

        let fip = self
            .network
            .create_floating_ip(&network.id, Some(&port.id))
            .await?;
        info!(
            address = %fip.floating_ip_address,
            server = %server.id,
            "assigned floating IP"
        );

        let spec = WaitSpec::new("floating IP port to become active", PORT_ACTIVE_TIMEOUT);
        wait_true(&spec, || async {
            let current = self.network.get_port(&port.id).await?;
            Ok::<_, OpsError>(current.status == Some(ResourceStatus::Active))
        })
        .await?;

        Ok(self.network.get_floating_ip(&fip.id).await?)
    }

    /// Clear the association and wait for the floating IP to go DOWN. An
    /// already-deleted floating IP is not an error.
    pub async fn disassociate_floating_ip(&self, fip: &FloatingIp) -> Result<(), OpsError> {
        match self.network.disassociate_floating_ip(&fip.id).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                warn!(id = %fip.id, "floating IP already gone, nothing to disassociate");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        let spec = WaitSpec::new("floating IP to go DOWN", FIP_DOWN_TIMEOUT);
        Ok(wait_true(&spec, || async {
            let current = self.network.get_floating_ip(&fip.id).await?;
            Ok::<_, OpsError>(current.status == Some(ResourceStatus::Down))
        })
        .await?)
    }
}
