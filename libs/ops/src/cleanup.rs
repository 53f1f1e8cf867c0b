//! Best-effort teardown of leaked test resources.
//!
//! Deletion order matters: router interfaces and ports before subnets,
//! subnets before routers, routers before networks. Every delete is
//! tolerant — a resource that refuses to go (still referenced, already
//! gone, owned by the infrastructure) is logged and skipped, never fatal.

use stratus_openstack::network::PortFilter;
use stratus_openstack::ApiError;
use tracing::info;

use crate::error::OpsError;
use crate::Cloud;

const ROUTER_INTERFACE_OWNER: &str = "network:router_interface";

/// What a cleanup sweep managed to delete.
#[derive(Debug, Default, Clone)]
pub struct CleanupReport {
    pub keypairs: u32,
    pub floating_ips: u32,
    pub servers: u32,
    pub security_groups: u32,
    pub router_interfaces: u32,
    pub subnets: u32,
    pub routers: u32,
    pub networks: u32,
}

impl CleanupReport {
    /// Total resources deleted.
    pub fn total(&self) -> u32 {
        self.keypairs
            + self.floating_ips
            + self.servers
            + self.security_groups
            + self.router_interfaces
            + self.subnets
            + self.routers
            + self.networks
    }
}

fn note(counter: &mut u32, kind: &str, id: &str, result: Result<(), ApiError>) {
    match result {
        Ok(()) => *counter += 1,
        Err(err) => info!(kind, id, error = %err, "resource not deletable, skipping"),
    }
}

impl Cloud {
    /// Sweep the tenant clean, leaving networks named in `keep_networks`
    /// (and everything the platform itself owns that refuses deletion).
    pub async fn cleanup(&self, keep_networks: &[String]) -> Result<CleanupReport, OpsError> {
        let mut report = CleanupReport::default();

        let networks = self.network.list_networks().await?;
        let targeted: Vec<_> = networks
            .into_iter()
            .filter(|n| !keep_networks.contains(&n.name))
            .collect();
        let targeted_ids: Vec<&str> = targeted.iter().map(|n| n.id.as_str()).collect();

        for keypair in self.compute.list_keypairs().await? {
            let result = self.compute.delete_keypair(&keypair.name).await;
            note(&mut report.keypairs, "keypair", &keypair.name, result);
        }

        for fip in self.network.list_floating_ips().await? {
            let result = self.network.delete_floating_ip(&fip.id).await;
            note(&mut report.floating_ips, "floating_ip", &fip.id, result);
        }

        for server in self.compute.list_servers().await? {
            let result = self.compute.delete_server(&server.id).await;
            note(&mut report.servers, "server", &server.id, result);
        }

        for group in self.network.list_security_groups().await? {
            if group.name == "default" {
                continue;
            }
            let result = self.network.delete_security_group(&group.id).await;
            note(&mut report.security_groups, "security_group", &group.id, result);
        }

        let interface_ports = self
            .network
            .list_ports(&PortFilter::device_owner(ROUTER_INTERFACE_OWNER))
            .await?;
        for port in interface_ports {
            if !targeted_ids.contains(&port.network_id.as_str()) {
                continue;
            }
            let result = self
                .network
                .remove_router_interface_by_port(&port.device_id, &port.id)
                .await;
            note(&mut report.router_interfaces, "router_interface", &port.id, result);
        }

        for subnet in self.network.list_subnets(None).await? {
            if !targeted_ids.contains(&subnet.network_id.as_str()) {
                continue;
            }
            let result = self.network.delete_subnet(&subnet.id).await;
            note(&mut report.subnets, "subnet", &subnet.id, result);
        }

        for router in self.network.list_routers().await? {
            let result = self.network.delete_router(&router.id).await;
            note(&mut report.routers, "router", &router.id, result);
        }

        for network in &targeted {
            let result = self.network.delete_network(&network.id).await;
            note(&mut report.networks, "network", &network.id, result);
        }

        info!(total = report.total(), "cleanup sweep finished");
        Ok(report)
    }
}
