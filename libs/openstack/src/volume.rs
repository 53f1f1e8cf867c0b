//! Block storage (Cinder) client: volumes and snapshots.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::rest::RestClient;

/// Block storage service client.
#[derive(Debug, Clone)]
pub struct BlockStorageApi {
    rest: RestClient,
}

impl BlockStorageApi {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub async fn list_volumes(&self) -> Result<Vec<Volume>, ApiError> {
        let resp: VolumesResponse = self.rest.get("/volumes/detail").await?;
        Ok(resp.volumes)
    }

    pub async fn get_volume(&self, id: &str) -> Result<Volume, ApiError> {
        let resp: VolumeResponse = self.rest.get(&format!("/volumes/{id}")).await?;
        Ok(resp.volume)
    }

    /// Create a blank volume of `size_gb`.
    pub async fn create_volume(&self, size_gb: i64, name: Option<&str>) -> Result<Volume, ApiError> {
        let body = json!({ "volume": { "size": size_gb, "name": name } });
        let resp: VolumeResponse = self.rest.post("/volumes", &body).await?;
        Ok(resp.volume)
    }

    pub async fn delete_volume(&self, id: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/volumes/{id}")).await
    }

    /// List snapshots, optionally restricted to one source volume.
    pub async fn list_snapshots(&self, volume_id: Option<&str>) -> Result<Vec<Snapshot>, ApiError> {
        let path = match volume_id {
            Some(id) => format!("/snapshots/detail?volume_id={id}"),
            None => "/snapshots/detail".to_string(),
        };
        let resp: SnapshotsResponse = self.rest.get(&path).await?;
        Ok(resp.snapshots)
    }

    pub async fn create_snapshot(
        &self,
        volume_id: &str,
        name: Option<&str>,
    ) -> Result<Snapshot, ApiError> {
        let body = json!({
            "snapshot": { "volume_id": volume_id, "name": name, "force": false }
        });
        let resp: SnapshotResponse = self.rest.post("/snapshots", &body).await?;
        Ok(resp.snapshot)
    }

    pub async fn delete_snapshot(&self, id: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/snapshots/{id}")).await
    }
}

/// Volume lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeStatus {
    Available,
    #[serde(rename = "in-use")]
    InUse,
    Creating,
    Deleting,
    Attaching,
    Detaching,
    Error,
    ErrorDeleting,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VolumeStatus::Available => "available",
            VolumeStatus::InUse => "in-use",
            VolumeStatus::Creating => "creating",
            VolumeStatus::Deleting => "deleting",
            VolumeStatus::Attaching => "attaching",
            VolumeStatus::Detaching => "detaching",
            VolumeStatus::Error => "error",
            VolumeStatus::ErrorDeleting => "error_deleting",
            VolumeStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default, alias = "display_name")]
    pub name: Option<String>,
    pub status: VolumeStatus,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub attachments: Vec<VolumeAttachmentInfo>,
}

impl Volume {
    /// Display label for log and error messages.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Attachment record embedded in a volume.
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeAttachmentInfo {
    pub server_id: String,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub volume_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    volumes: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct VolumeResponse {
    volume: Volume,
}

#[derive(Debug, Deserialize)]
struct SnapshotsResponse {
    snapshots: Vec<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    snapshot: Snapshot,
}
