//! Compute (Nova) client: servers, hypervisors, flavors, keypairs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::rest::RestClient;

/// Compute service client.
#[derive(Debug, Clone)]
pub struct ComputeApi {
    rest: RestClient,
}

impl ComputeApi {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// List all servers with full detail.
    pub async fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
        let resp: ServersResponse = self.rest.get("/servers/detail").await?;
        Ok(resp.servers)
    }

    /// Fetch a single server by id.
    pub async fn get_server(&self, id: &str) -> Result<Server, ApiError> {
        let resp: ServerResponse = self.rest.get(&format!("/servers/{id}")).await?;
        Ok(resp.server)
    }

    /// Boot a new server. Returns the (still building) server record.
    pub async fn create_server(&self, request: &CreateServer) -> Result<Server, ApiError> {
        let resp: ServerResponse = self
            .rest
            .post("/servers", &json!({ "server": request }))
            .await?;
        Ok(resp.server)
    }

    pub async fn delete_server(&self, id: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/servers/{id}")).await
    }

    /// Trigger a live migration. `host` pins the target hypervisor;
    /// `None` lets the scheduler pick one.
    pub async fn live_migrate(
        &self,
        id: &str,
        host: Option<&str>,
        block_migration: bool,
    ) -> Result<(), ApiError> {
        let body = json!({
            "os-migrateLive": {
                "host": host,
                "block_migration": block_migration,
                "disk_over_commit": false,
            }
        });
        self.rest
            .post_no_content(&format!("/servers/{id}/action"), &body)
            .await
    }

    pub async fn hard_reboot(&self, id: &str) -> Result<(), ApiError> {
        let body = json!({ "reboot": { "type": "HARD" } });
        self.rest
            .post_no_content(&format!("/servers/{id}/action"), &body)
            .await
    }

    pub async fn start_server(&self, id: &str) -> Result<(), ApiError> {
        self.rest
            .post_no_content(&format!("/servers/{id}/action"), &json!({ "os-start": null }))
            .await
    }

    pub async fn stop_server(&self, id: &str) -> Result<(), ApiError> {
        self.rest
            .post_no_content(&format!("/servers/{id}/action"), &json!({ "os-stop": null }))
            .await
    }

    /// Rebuild a server against a new image.
    pub async fn rebuild_server(&self, id: &str, image_id: &str) -> Result<Server, ApiError> {
        let body = json!({ "rebuild": { "imageRef": image_id } });
        let resp: ServerResponse = self
            .rest
            .post(&format!("/servers/{id}/action"), &body)
            .await?;
        Ok(resp.server)
    }

    /// Fetch the full console log of a server.
    pub async fn console_output(&self, id: &str) -> Result<String, ApiError> {
        let body = json!({ "os-getConsoleOutput": { "length": null } });
        let resp: ConsoleOutputResponse = self
            .rest
            .post(&format!("/servers/{id}/action"), &body)
            .await?;
        Ok(resp.output)
    }

    pub async fn list_hypervisors(&self) -> Result<Vec<Hypervisor>, ApiError> {
        let resp: HypervisorsResponse = self.rest.get("/os-hypervisors/detail").await?;
        Ok(resp.hypervisors)
    }

    pub async fn get_hypervisor(&self, id: i64) -> Result<Hypervisor, ApiError> {
        let resp: HypervisorResponse = self.rest.get(&format!("/os-hypervisors/{id}")).await?;
        Ok(resp.hypervisor)
    }

    /// Per-zone, per-host service state, including heartbeat timestamps.
    pub async fn availability_zone_detail(&self) -> Result<Vec<AvailabilityZone>, ApiError> {
        let resp: AvailabilityZoneResponse = self.rest.get("/os-availability-zone/detail").await?;
        Ok(resp.availability_zone_info)
    }

    pub async fn list_flavors(&self) -> Result<Vec<Flavor>, ApiError> {
        let resp: FlavorsResponse = self.rest.get("/flavors/detail").await?;
        Ok(resp.flavors)
    }

    pub async fn create_keypair(&self, name: &str) -> Result<Keypair, ApiError> {
        let resp: KeypairResponse = self
            .rest
            .post("/os-keypairs", &json!({ "keypair": { "name": name } }))
            .await?;
        Ok(resp.keypair)
    }

    pub async fn list_keypairs(&self) -> Result<Vec<Keypair>, ApiError> {
        let resp: KeypairsResponse = self.rest.get("/os-keypairs").await?;
        Ok(resp.keypairs.into_iter().map(|item| item.keypair).collect())
    }

    pub async fn delete_keypair(&self, name: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/os-keypairs/{name}")).await
    }

    /// List volumes attached to a server.
    pub async fn list_volume_attachments(
        &self,
        server_id: &str,
    ) -> Result<Vec<VolumeAttachment>, ApiError> {
        let resp: VolumeAttachmentsResponse = self
            .rest
            .get(&format!("/servers/{server_id}/os-volume_attachments"))
            .await?;
        Ok(resp.volume_attachments)
    }

    pub async fn attach_volume(&self, server_id: &str, volume_id: &str) -> Result<(), ApiError> {
        let body = json!({ "volumeAttachment": { "volumeId": volume_id } });
        self.rest
            .post_no_content(&format!("/servers/{server_id}/os-volume_attachments"), &body)
            .await
    }

    /// Detach a volume from a server. The volume transitions through
    /// `detaching` back to `available` asynchronously.
    pub async fn detach_volume(&self, server_id: &str, volume_id: &str) -> Result<(), ApiError> {
        self.rest
            .delete(&format!(
                "/servers/{server_id}/os-volume_attachments/{volume_id}"
            ))
            .await
    }
}

/// Server lifecycle status as reported by the compute service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    Active,
    Build,
    Error,
    Rebuild,
    HardReboot,
    Reboot,
    Migrating,
    Resize,
    Shutoff,
    Paused,
    Suspended,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerStatus::Active => "ACTIVE",
            ServerStatus::Build => "BUILD",
            ServerStatus::Error => "ERROR",
            ServerStatus::Rebuild => "REBUILD",
            ServerStatus::HardReboot => "HARD_REBOOT",
            ServerStatus::Reboot => "REBOOT",
            ServerStatus::Migrating => "MIGRATING",
            ServerStatus::Resize => "RESIZE",
            ServerStatus::Shutoff => "SHUTOFF",
            ServerStatus::Paused => "PAUSED",
            ServerStatus::Suspended => "SUSPENDED",
            ServerStatus::Deleted => "DELETED",
            ServerStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// A compute instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub status: ServerStatus,

    /// Fault detail, present when `status` is ERROR.
    #[serde(default)]
    pub fault: Option<ServerFault>,

    /// Addresses per attached network.
    #[serde(default)]
    pub addresses: HashMap<String, Vec<ServerAddress>>,

    /// Host currently running the instance (admin-only attribute).
    #[serde(rename = "OS-EXT-SRV-ATTR:host", default)]
    pub host: Option<String>,

    #[serde(rename = "OS-EXT-SRV-ATTR:hypervisor_hostname", default)]
    pub hypervisor_hostname: Option<String>,

    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl Server {
    /// First address of the given kind, if any.
    pub fn address_of_type(&self, kind: AddressType) -> Option<&str> {
        self.addresses
            .values()
            .flatten()
            .find(|a| a.address_type == Some(kind))
            .map(|a| a.addr.as_str())
    }

    /// The address to reach the instance on: floating if present, fixed
    /// otherwise.
    pub fn accessible_address(&self) -> Option<&str> {
        self.address_of_type(AddressType::Floating)
            .or_else(|| self.address_of_type(AddressType::Fixed))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerFault {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    Fixed,
    Floating,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerAddress {
    pub addr: String,
    #[serde(rename = "OS-EXT-IPS:type", default)]
    pub address_type: Option<AddressType>,
}

/// Boot request for a new server.
#[derive(Debug, Clone, Serialize)]
pub struct CreateServer {
    pub name: String,
    #[serde(rename = "imageRef")]
    pub image_ref: String,
    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<SecurityGroupRef>,
}

impl CreateServer {
    pub fn new(
        name: impl Into<String>,
        image_ref: impl Into<String>,
        flavor_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image_ref: image_ref.into(),
            flavor_ref: flavor_ref.into(),
            key_name: None,
            availability_zone: None,
            networks: Vec::new(),
            security_groups: Vec::new(),
        }
    }

    pub fn on_network(mut self, network_id: impl Into<String>) -> Self {
        self.networks.push(NetworkRef {
            uuid: network_id.into(),
        });
        self
    }

    pub fn with_security_group(mut self, name: impl Into<String>) -> Self {
        self.security_groups.push(SecurityGroupRef { name: name.into() });
        self
    }

    pub fn with_key(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Pin the boot to `zone:host`.
    pub fn on_host(mut self, zone: &str, host: &str) -> Self {
        self.availability_zone = Some(format!("{zone}:{host}"));
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkRef {
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityGroupRef {
    pub name: String,
}

/// A hypervisor with its scheduling-relevant capacity counters.
#[derive(Debug, Clone, Deserialize)]
pub struct Hypervisor {
    pub id: i64,
    pub hypervisor_hostname: String,
    #[serde(default)]
    pub running_vms: i64,
    #[serde(default)]
    pub vcpus: i64,
    #[serde(default)]
    pub free_ram_mb: i64,
    /// Can go negative under disk overcommit.
    #[serde(default)]
    pub disk_available_least: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub vcpus: i64,
    /// Memory in MiB.
    pub ram: i64,
    /// Root disk in GiB; zero means "fits anywhere".
    pub disk: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityZone {
    #[serde(rename = "zoneName")]
    pub zone_name: String,
    /// host name -> service name -> state. Absent for the internal zone
    /// listing without detail.
    #[serde(default)]
    pub hosts: Option<HashMap<String, HashMap<String, HostServiceState>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostServiceState {
    pub available: bool,
    pub active: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Keypair {
    pub name: String,
    #[serde(default)]
    pub public_key: Option<String>,
    /// Only present in the create response.
    #[serde(default)]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeAttachment {
    pub id: String,
    #[serde(rename = "volumeId")]
    pub volume_id: String,
    #[serde(rename = "serverId")]
    pub server_id: String,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServersResponse {
    servers: Vec<Server>,
}

#[derive(Debug, Deserialize)]
struct ServerResponse {
    server: Server,
}

#[derive(Debug, Deserialize)]
struct ConsoleOutputResponse {
    output: String,
}

#[derive(Debug, Deserialize)]
struct HypervisorsResponse {
    hypervisors: Vec<Hypervisor>,
}

#[derive(Debug, Deserialize)]
struct HypervisorResponse {
    hypervisor: Hypervisor,
}

#[derive(Debug, Deserialize)]
struct AvailabilityZoneResponse {
    #[serde(rename = "availabilityZoneInfo")]
    availability_zone_info: Vec<AvailabilityZone>,
}

#[derive(Debug, Deserialize)]
struct FlavorsResponse {
    flavors: Vec<Flavor>,
}

#[derive(Debug, Deserialize)]
struct KeypairResponse {
    keypair: Keypair,
}

#[derive(Debug, Deserialize)]
struct KeypairsResponse {
    keypairs: Vec<KeypairItem>,
}

#[derive(Debug, Deserialize)]
struct KeypairItem {
    keypair: Keypair,
}

#[derive(Debug, Deserialize)]
struct VolumeAttachmentsResponse {
    #[serde(rename = "volumeAttachments")]
    volume_attachments: Vec<VolumeAttachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_deserialization() {
        let json = r#"{
            "server": {
                "id": "9aef0d8e-8bc6-4b9c-a3f5-4b6b0a5f6c31",
                "name": "server01",
                "status": "ACTIVE",
                "addresses": {
                    "net01": [
                        {"addr": "192.168.1.5", "OS-EXT-IPS:type": "fixed",
                         "OS-EXT-IPS-MAC:mac_addr": "fa:16:3e:aa:bb:cc"},
                        {"addr": "10.20.30.40", "OS-EXT-IPS:type": "floating"}
                    ]
                },
                "OS-EXT-SRV-ATTR:host": "node-2.domain.tld",
                "OS-EXT-SRV-ATTR:hypervisor_hostname": "node-2.domain.tld",
                "updated": "2026-08-07T09:30:00Z",
                "flavor": {"id": "2"}
            }
        }"#;

        let resp: ServerResponse = serde_json::from_str(json).unwrap();
        let server = resp.server;
        assert_eq!(server.status, ServerStatus::Active);
        assert_eq!(server.host.as_deref(), Some("node-2.domain.tld"));
        assert_eq!(server.address_of_type(AddressType::Fixed), Some("192.168.1.5"));
        assert_eq!(server.accessible_address(), Some("10.20.30.40"));
    }

    #[test]
    fn test_unknown_status_does_not_fail_decoding() {
        let json = r#"{"id": "x", "name": "s", "status": "SHELVED_OFFLOADED"}"#;
        let server: Server = serde_json::from_str(json).unwrap();
        assert_eq!(server.status, ServerStatus::Unknown);
    }

    #[test]
    fn test_server_fault_present_on_error() {
        let json = r#"{
            "id": "x", "name": "s", "status": "ERROR",
            "fault": {"code": 500, "message": "No valid host was found",
                      "details": "traceback..."}
        }"#;
        let server: Server = serde_json::from_str(json).unwrap();
        assert_eq!(server.status, ServerStatus::Error);
        assert_eq!(server.fault.unwrap().message, "No valid host was found");
    }

    #[test]
    fn test_create_server_request_shape() {
        let request = CreateServer::new("server01", "img-1", "2")
            .on_network("net-1")
            .with_security_group("test-sg")
            .on_host("nova", "node-1");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["imageRef"], "img-1");
        assert_eq!(json["flavorRef"], "2");
        assert_eq!(json["availability_zone"], "nova:node-1");
        assert_eq!(json["networks"][0]["uuid"], "net-1");
        assert_eq!(json["security_groups"][0]["name"], "test-sg");
        assert!(json.get("key_name").is_none());
    }

    #[test]
    fn test_availability_zone_detail_deserialization() {
        let json = r#"{
            "availabilityZoneInfo": [{
                "zoneName": "nova",
                "hosts": {
                    "node-1": {
                        "nova-compute": {
                            "available": true,
                            "active": true,
                            "updated_at": "2026-08-07T09:31:00.000000Z"
                        }
                    }
                }
            }]
        }"#;

        let resp: AvailabilityZoneResponse = serde_json::from_str(json).unwrap();
        let zone = &resp.availability_zone_info[0];
        let state = &zone.hosts.as_ref().unwrap()["node-1"]["nova-compute"];
        assert!(state.available && state.active);
        assert!(state.updated_at.is_some());
    }
}
