//! Multi-stage volume teardown.
//!
//! A volume cannot be deleted while it has attachments or snapshots, so
//! the teardown runs in stages: detach and remove snapshots, wait for the
//! snapshots to be gone, wait for the volume to report `available`, issue
//! the delete, then wait until listings no longer contain it. A failure at
//! any stage aborts before the next one.

use std::collections::HashSet;
use std::time::Duration;

use stratus_openstack::volume::{Volume, VolumeStatus};
use stratus_wait::{wait_true, WaitSpec};
use tracing::info;

use crate::error::OpsError;
use crate::Cloud;

/// Default budget for each teardown stage.
pub const VOLUME_STAGE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const STAGE_SLEEP: Duration = Duration::from_secs(10);

/// Spacing between delete requests; hammering the API makes the backend's
/// own deletion slower.
const DELETE_SPACING: Duration = Duration::from_secs(2);

impl Cloud {
    /// Tear down a single volume and everything hanging off it.
    pub async fn delete_volume(
        &self,
        volume: &Volume,
        stage_timeout: Duration,
    ) -> Result<(), OpsError> {
        self.delete_volumes(std::slice::from_ref(volume), stage_timeout)
            .await
    }

    /// Tear down volumes with their attachments and snapshots.
    /// `stage_timeout` bounds each stage separately.
    pub async fn delete_volumes(
        &self,
        volumes: &[Volume],
        stage_timeout: Duration,
    ) -> Result<(), OpsError> {
        let names = labels(volumes);

        for volume in volumes {
            let fresh = self.volumes.get_volume(&volume.id).await?;
            for attachment in &fresh.attachments {
                info!(volume = %fresh.label(), server = %attachment.server_id, "detaching volume");
                self.compute
                    .detach_volume(&attachment.server_id, &fresh.id)
                    .await?;
            }
            for snapshot in self.volumes.list_snapshots(Some(&fresh.id)).await? {
                self.volumes.delete_snapshot(&snapshot.id).await?;
            }
        }

        let spec = WaitSpec::new(
            format!("snapshots of volumes [{names}] to be deleted"),
            stage_timeout,
        )
        .with_sleep(STAGE_SLEEP);
        wait_true(&spec, || self.snapshots_gone(volumes)).await?;

        let spec = WaitSpec::new(
            format!("volumes [{names}] to become available"),
            stage_timeout,
        )
        .with_sleep(STAGE_SLEEP);
        wait_true(&spec, || self.volumes_available(volumes)).await?;

        for volume in volumes {
            info!(volume = %volume.label(), "deleting volume");
            self.volumes.delete_volume(&volume.id).await?;
            tokio::time::sleep(DELETE_SPACING).await;
        }

        self.wait_volumes_deleted(volumes, stage_timeout).await
    }

    async fn snapshots_gone(&self, volumes: &[Volume]) -> Result<bool, OpsError> {
        for volume in volumes {
            let snapshots = self.volumes.list_snapshots(Some(&volume.id)).await?;
            if !snapshots.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn volumes_available(&self, volumes: &[Volume]) -> Result<bool, OpsError> {
        for volume in volumes {
            let current = self.volumes.get_volume(&volume.id).await?;
            if current.status != VolumeStatus::Available {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Wait until none of the volumes show up in a listing anymore.
    pub async fn wait_volumes_deleted(
        &self,
        volumes: &[Volume],
        timeout: Duration,
    ) -> Result<(), OpsError> {
        let names = labels(volumes);
        let ids: HashSet<&str> = volumes.iter().map(|v| v.id.as_str()).collect();

        let spec = WaitSpec::new(format!("volumes [{names}] to be deleted"), timeout)
            .with_sleep(STAGE_SLEEP);
        Ok(wait_true(&spec, || async {
            let listed = self.volumes.list_volumes().await?;
            Ok::<_, OpsError>(!listed.iter().any(|v| ids.contains(v.id.as_str())))
        })
        .await?)
    }
}

fn labels(volumes: &[Volume]) -> String {
    volumes
        .iter()
        .map(Volume::label)
        .collect::<Vec<_>>()
        .join(", ")
}
