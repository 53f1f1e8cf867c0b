//! Network (Neutron) client: networks, routers, floating IPs, agents.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::rest::RestClient;

/// Binary names of the agents the harness drives.
pub const DHCP_AGENT_BINARY: &str = "neutron-dhcp-agent";
pub const L3_AGENT_BINARY: &str = "neutron-l3-agent";

/// Network service client.
#[derive(Debug, Clone)]
pub struct NetworkApi {
    rest: RestClient,
}

impl NetworkApi {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub async fn list_networks(&self) -> Result<Vec<Network>, ApiError> {
        let resp: NetworksResponse = self.rest.get("/v2.0/networks").await?;
        Ok(resp.networks)
    }

    /// ACTIVE networks flagged as external (floating IP pools).
    pub async fn external_networks(&self) -> Result<Vec<Network>, ApiError> {
        let resp: NetworksResponse = self
            .rest
            .get("/v2.0/networks?router:external=true&status=ACTIVE")
            .await?;
        Ok(resp.networks)
    }

    pub async fn create_network(&self, name: &str) -> Result<Network, ApiError> {
        let body = json!({ "network": { "name": name, "admin_state_up": true } });
        let resp: NetworkResponse = self.rest.post("/v2.0/networks", &body).await?;
        Ok(resp.network)
    }

    pub async fn delete_network(&self, id: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/v2.0/networks/{id}")).await
    }

    pub async fn list_subnets(&self, network_id: Option<&str>) -> Result<Vec<Subnet>, ApiError> {
        let path = match network_id {
            Some(id) => format!("/v2.0/subnets?network_id={id}"),
            None => "/v2.0/subnets".to_string(),
        };
        let resp: SubnetsResponse = self.rest.get(&path).await?;
        Ok(resp.subnets)
    }

    pub async fn create_subnet(&self, request: &CreateSubnet) -> Result<Subnet, ApiError> {
        let resp: SubnetResponse = self
            .rest
            .post("/v2.0/subnets", &json!({ "subnet": request }))
            .await?;
        Ok(resp.subnet)
    }

    pub async fn delete_subnet(&self, id: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/v2.0/subnets/{id}")).await
    }

    pub async fn list_ports(&self, filter: &PortFilter) -> Result<Vec<Port>, ApiError> {
        let query = filter.query_string();
        let path = if query.is_empty() {
            "/v2.0/ports".to_string()
        } else {
            format!("/v2.0/ports?{query}")
        };
        let resp: PortsResponse = self.rest.get(&path).await?;
        Ok(resp.ports)
    }

    pub async fn get_port(&self, id: &str) -> Result<Port, ApiError> {
        let resp: PortResponse = self.rest.get(&format!("/v2.0/ports/{id}")).await?;
        Ok(resp.port)
    }

    pub async fn delete_port(&self, id: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/v2.0/ports/{id}")).await
    }

    pub async fn list_routers(&self) -> Result<Vec<Router>, ApiError> {
        let resp: RoutersResponse = self.rest.get("/v2.0/routers").await?;
        Ok(resp.routers)
    }

    pub async fn create_router(&self, name: &str, distributed: bool) -> Result<Router, ApiError> {
        let body = json!({ "router": { "name": name, "distributed": distributed } });
        let resp: RouterResponse = self.rest.post("/v2.0/routers", &body).await?;
        Ok(resp.router)
    }

    pub async fn delete_router(&self, id: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/v2.0/routers/{id}")).await
    }

    /// Attach a subnet to a router as an internal interface.
    pub async fn add_router_interface(
        &self,
        router_id: &str,
        subnet_id: &str,
    ) -> Result<(), ApiError> {
        let body = json!({ "subnet_id": subnet_id });
        self.rest
            .put::<serde_json::Value, _>(
                &format!("/v2.0/routers/{router_id}/add_router_interface"),
                &body,
            )
            .await
            .map(|_| ())
    }

    pub async fn remove_router_interface(
        &self,
        router_id: &str,
        subnet_id: &str,
    ) -> Result<(), ApiError> {
        let body = json!({ "subnet_id": subnet_id });
        self.rest
            .put::<serde_json::Value, _>(
                &format!("/v2.0/routers/{router_id}/remove_router_interface"),
                &body,
            )
            .await
            .map(|_| ())
    }

    pub async fn remove_router_interface_by_port(
        &self,
        router_id: &str,
        port_id: &str,
    ) -> Result<(), ApiError> {
        let body = json!({ "port_id": port_id });
        self.rest
            .put::<serde_json::Value, _>(
                &format!("/v2.0/routers/{router_id}/remove_router_interface"),
                &body,
            )
            .await
            .map(|_| ())
    }

    /// Set the router's external gateway.
    pub async fn set_router_gateway(
        &self,
        router_id: &str,
        network_id: &str,
    ) -> Result<(), ApiError> {
        let body = json!({
            "router": { "external_gateway_info": { "network_id": network_id } }
        });
        self.rest
            .put::<serde_json::Value, _>(&format!("/v2.0/routers/{router_id}"), &body)
            .await
            .map(|_| ())
    }

    pub async fn get_floating_ip(&self, id: &str) -> Result<FloatingIp, ApiError> {
        let resp: FloatingIpResponse = self.rest.get(&format!("/v2.0/floatingips/{id}")).await?;
        Ok(resp.floatingip)
    }

    pub async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, ApiError> {
        let resp: FloatingIpsResponse = self.rest.get("/v2.0/floatingips").await?;
        Ok(resp.floatingips)
    }

    /// Allocate a floating IP from `network_id`, optionally bound to a port.
    pub async fn create_floating_ip(
        &self,
        network_id: &str,
        port_id: Option<&str>,
    ) -> Result<FloatingIp, ApiError> {
        let body = json!({
            "floatingip": {
                "floating_network_id": network_id,
                "port_id": port_id,
            }
        });
        let resp: FloatingIpResponse = self.rest.post("/v2.0/floatingips", &body).await?;
        Ok(resp.floatingip)
    }

    /// Clear the port association; the floating IP transitions to DOWN.
    pub async fn disassociate_floating_ip(&self, id: &str) -> Result<FloatingIp, ApiError> {
        let body = json!({ "floatingip": { "port_id": null } });
        let resp: FloatingIpResponse = self
            .rest
            .put(&format!("/v2.0/floatingips/{id}"), &body)
            .await?;
        Ok(resp.floatingip)
    }

    pub async fn delete_floating_ip(&self, id: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/v2.0/floatingips/{id}")).await
    }

    /// List agents, optionally filtered by binary name.
    pub async fn list_agents(&self, binary: Option<&str>) -> Result<Vec<Agent>, ApiError> {
        let path = match binary {
            Some(b) => format!("/v2.0/agents?binary={b}"),
            None => "/v2.0/agents".to_string(),
        };
        let resp: AgentsResponse = self.rest.get(&path).await?;
        Ok(resp.agents)
    }

    /// DHCP agents currently hosting a network.
    ///
    /// Returns 404 while the network is still being provisioned; callers
    /// polling this tolerate that explicitly.
    pub async fn dhcp_agents_hosting_network(&self, net_id: &str) -> Result<Vec<Agent>, ApiError> {
        let resp: AgentsResponse = self
            .rest
            .get(&format!("/v2.0/networks/{net_id}/dhcp-agents"))
            .await?;
        Ok(resp.agents)
    }

    pub async fn networks_on_dhcp_agent(&self, agent_id: &str) -> Result<Vec<Network>, ApiError> {
        let resp: NetworksResponse = self
            .rest
            .get(&format!("/v2.0/agents/{agent_id}/dhcp-networks"))
            .await?;
        Ok(resp.networks)
    }

    pub async fn add_network_to_dhcp_agent(
        &self,
        agent_id: &str,
        network_id: &str,
    ) -> Result<(), ApiError> {
        let body = json!({ "network_id": network_id });
        self.rest
            .post_no_content(&format!("/v2.0/agents/{agent_id}/dhcp-networks"), &body)
            .await
    }

    pub async fn remove_network_from_dhcp_agent(
        &self,
        agent_id: &str,
        network_id: &str,
    ) -> Result<(), ApiError> {
        self.rest
            .delete(&format!("/v2.0/agents/{agent_id}/dhcp-networks/{network_id}"))
            .await
    }

    /// L3 agents currently hosting a router.
    pub async fn l3_agents_hosting_router(&self, router_id: &str) -> Result<Vec<Agent>, ApiError> {
        let resp: AgentsResponse = self
            .rest
            .get(&format!("/v2.0/routers/{router_id}/l3-agents"))
            .await?;
        Ok(resp.agents)
    }

    pub async fn add_router_to_l3_agent(
        &self,
        agent_id: &str,
        router_id: &str,
    ) -> Result<(), ApiError> {
        let body = json!({ "router_id": router_id });
        self.rest
            .post_no_content(&format!("/v2.0/agents/{agent_id}/l3-routers"), &body)
            .await
    }

    pub async fn remove_router_from_l3_agent(
        &self,
        agent_id: &str,
        router_id: &str,
    ) -> Result<(), ApiError> {
        self.rest
            .delete(&format!("/v2.0/agents/{agent_id}/l3-routers/{router_id}"))
            .await
    }

    pub async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>, ApiError> {
        let resp: SecurityGroupsResponse = self.rest.get("/v2.0/security-groups").await?;
        Ok(resp.security_groups)
    }

    pub async fn create_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<SecurityGroup, ApiError> {
        let body = json!({
            "security_group": { "name": name, "description": description }
        });
        let resp: SecurityGroupResponse = self.rest.post("/v2.0/security-groups", &body).await?;
        Ok(resp.security_group)
    }

    pub async fn delete_security_group(&self, id: &str) -> Result<(), ApiError> {
        self.rest
            .delete(&format!("/v2.0/security-groups/{id}"))
            .await
    }

    /// Add an ingress rule to a security group.
    pub async fn create_security_group_rule(
        &self,
        rule: &CreateSecurityGroupRule,
    ) -> Result<(), ApiError> {
        self.rest
            .post_no_content(
                "/v2.0/security-group-rules",
                &json!({ "security_group_rule": rule }),
            )
            .await
    }
}

/// Port/network/floating-IP operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Active,
    Down,
    Build,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<ResourceStatus>,
    #[serde(rename = "router:external", default)]
    pub external: bool,
    #[serde(default)]
    pub subnets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub network_id: String,
    #[serde(default)]
    pub name: String,
    pub cidr: String,
}

/// Subnet creation request. IPv4 with a default DNS pair unless overridden.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSubnet {
    pub network_id: String,
    pub name: String,
    pub cidr: String,
    pub ip_version: u8,
    pub dns_nameservers: Vec<String>,
}

impl CreateSubnet {
    pub fn new(
        network_id: impl Into<String>,
        name: impl Into<String>,
        cidr: impl Into<String>,
    ) -> Self {
        Self {
            network_id: network_id.into(),
            name: name.into(),
            cidr: cidr.into(),
            ip_version: 4,
            dns_nameservers: vec!["8.8.8.8".to_string(), "8.8.4.4".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Port {
    pub id: String,
    pub network_id: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_owner: String,
    #[serde(default)]
    pub status: Option<ResourceStatus>,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixedIp {
    pub subnet_id: String,
    pub ip_address: String,
}

/// Query filter for port listings.
#[derive(Debug, Clone, Default)]
pub struct PortFilter {
    pub device_id: Option<String>,
    pub device_owner: Option<String>,
    pub network_id: Option<String>,
    pub mac_address: Option<String>,
}

impl PortFilter {
    pub fn device_id(id: impl Into<String>) -> Self {
        Self {
            device_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn device_owner(owner: impl Into<String>) -> Self {
        Self {
            device_owner: Some(owner.into()),
            ..Default::default()
        }
    }

    pub fn mac_address(mac: impl Into<String>) -> Self {
        Self {
            mac_address: Some(mac.into()),
            ..Default::default()
        }
    }

    fn query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(v) = &self.device_id {
            parts.push(format!("device_id={v}"));
        }
        if let Some(v) = &self.device_owner {
            parts.push(format!("device_owner={v}"));
        }
        if let Some(v) = &self.network_id {
            parts.push(format!("network_id={v}"));
        }
        if let Some(v) = &self.mac_address {
            parts.push(format!("mac_address={v}"));
        }
        parts.join("&")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Router {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    #[serde(default)]
    pub floating_ip_address: String,
    #[serde(default)]
    pub floating_network_id: String,
    #[serde(default)]
    pub status: Option<ResourceStatus>,
    #[serde(default)]
    pub port_id: Option<String>,
}

/// A network service agent (DHCP, L3, OVS, metadata).
#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub agent_type: String,
    #[serde(default)]
    pub binary: String,
    pub host: String,
    pub alive: bool,
    #[serde(default)]
    pub admin_state_up: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSecurityGroupRule {
    pub security_group_id: String,
    pub direction: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<u16>,
    pub remote_ip_prefix: String,
}

impl CreateSecurityGroupRule {
    /// Ingress TCP rule open to the world on one port.
    pub fn ingress_tcp(security_group_id: impl Into<String>, port: u16) -> Self {
        Self {
            security_group_id: security_group_id.into(),
            direction: "ingress".to_string(),
            protocol: "tcp".to_string(),
            port_range_min: Some(port),
            port_range_max: Some(port),
            remote_ip_prefix: "0.0.0.0/0".to_string(),
        }
    }

    /// Ingress ICMP rule open to the world.
    pub fn ingress_icmp(security_group_id: impl Into<String>) -> Self {
        Self {
            security_group_id: security_group_id.into(),
            direction: "ingress".to_string(),
            protocol: "icmp".to_string(),
            port_range_min: None,
            port_range_max: None,
            remote_ip_prefix: "0.0.0.0/0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NetworksResponse {
    networks: Vec<Network>,
}

#[derive(Debug, Deserialize)]
struct NetworkResponse {
    network: Network,
}

#[derive(Debug, Deserialize)]
struct SubnetsResponse {
    subnets: Vec<Subnet>,
}

#[derive(Debug, Deserialize)]
struct SubnetResponse {
    subnet: Subnet,
}

#[derive(Debug, Deserialize)]
struct PortsResponse {
    ports: Vec<Port>,
}

#[derive(Debug, Deserialize)]
struct PortResponse {
    port: Port,
}

#[derive(Debug, Deserialize)]
struct RoutersResponse {
    routers: Vec<Router>,
}

#[derive(Debug, Deserialize)]
struct RouterResponse {
    router: Router,
}

#[derive(Debug, Deserialize)]
struct FloatingIpsResponse {
    floatingips: Vec<FloatingIp>,
}

#[derive(Debug, Deserialize)]
struct FloatingIpResponse {
    floatingip: FloatingIp,
}

#[derive(Debug, Deserialize)]
struct AgentsResponse {
    agents: Vec<Agent>,
}

#[derive(Debug, Deserialize)]
struct SecurityGroupsResponse {
    security_groups: Vec<SecurityGroup>,
}

#[derive(Debug, Deserialize)]
struct SecurityGroupResponse {
    security_group: SecurityGroup,
}
