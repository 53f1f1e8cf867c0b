//! Provisioning conveniences for test setup.

use rand::Rng;
use stratus_openstack::network::{CreateSecurityGroupRule, CreateSubnet, Network, SecurityGroup};
use tracing::info;

use crate::error::OpsError;
use crate::servers::SSH_PORT;
use crate::Cloud;

impl Cloud {
    /// Create a security group that lets SSH and ping through, under a
    /// unique throwaway name.
    pub async fn create_ssh_security_group(&self) -> Result<SecurityGroup, OpsError> {
        let name = format!("test-sg-{:08x}", rand::rng().random::<u32>());
        let group = self
            .network
            .create_security_group(&name, "ssh and ping for test instances")
            .await?;

        self.network
            .create_security_group_rule(&CreateSecurityGroupRule::ingress_tcp(
                group.id.clone(),
                SSH_PORT,
            ))
            .await?;
        self.network
            .create_security_group_rule(&CreateSecurityGroupRule::ingress_icmp(group.id.clone()))
            .await?;

        info!(name = %group.name, "created security group");
        Ok(group)
    }

    /// Create a network with one subnet and plug it into `router_id`.
    /// Names and the subnet CIDR are derived from how many networks the
    /// tenant already has.
    pub async fn add_network(&self, router_id: &str) -> Result<Network, OpsError> {
        let index = self.network.list_networks().await?.len() + 1;

        let network = self
            .network
            .create_network(&format!("net{index:02}"))
            .await?;
        info!(name = %network.name, id = %network.id, "created network");

        let subnet = self
            .network
            .create_subnet(&CreateSubnet::new(
                network.id.clone(),
                format!("net{index:02}__subnet"),
                format!("192.168.{index}.0/24"),
            ))
            .await?;
        info!(name = %subnet.name, id = %subnet.id, "created subnet");

        self.network
            .add_router_interface(router_id, &subnet.id)
            .await?;
        Ok(network)
    }
}
