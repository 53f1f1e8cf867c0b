//! Live migration and hypervisor convergence.

use std::time::Duration;

use futures_util::future::join_all;
use stratus_openstack::compute::{Flavor, Hypervisor, Server};
use stratus_wait::{wait_true, WaitSpec};
use tracing::info;

use crate::error::OpsError;
use crate::servers::server_ready;
use crate::Cloud;

const HYPERVISOR_SLEEP: Duration = Duration::from_secs(5);
const HEARTBEAT_SLEEP: Duration = Duration::from_secs(10);

/// Where a set of instances is expected to end up.
#[derive(Debug, Clone, Copy)]
pub enum MigrationGoal<'a> {
    /// Every instance has left this host.
    OffHost(&'a str),
    /// Every instance runs on this host.
    OntoHost(&'a str),
}

/// How many instances of `flavor` still fit on `hypervisor`.
pub fn hypervisor_capacity(hypervisor: &Hypervisor, flavor: &Flavor) -> i64 {
    if hypervisor.vcpus < flavor.vcpus || flavor.ram <= 0 {
        return 0;
    }
    let by_ram = hypervisor.free_ram_mb / flavor.ram;
    let capacity = if flavor.disk > 0 {
        (hypervisor.disk_available_least / flavor.disk).min(by_ram)
    } else {
        by_ram
    };
    capacity.max(0)
}

impl Cloud {
    /// True when every instance is ACTIVE and placed per `goal`. An
    /// instance in ERROR fails the probe immediately.
    pub async fn servers_migrated(
        &self,
        servers: &[Server],
        goal: MigrationGoal<'_>,
    ) -> Result<bool, OpsError> {
        for server in servers {
            let current = self.compute.get_server(&server.id).await?;
            if !server_ready(&current)? {
                return Ok(false);
            }
            let Some(host) = current.host.as_deref() else {
                return Ok(false);
            };
            let placed = match goal {
                MigrationGoal::OffHost(h) => host != h,
                MigrationGoal::OntoHost(h) => host == h,
            };
            if !placed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn wait_servers_migrated(
        &self,
        servers: &[Server],
        goal: MigrationGoal<'_>,
        timeout: Duration,
    ) -> Result<(), OpsError> {
        let label = match goal {
            MigrationGoal::OffHost(h) => format!("instances to migrate off {h}"),
            MigrationGoal::OntoHost(h) => format!("instances to migrate onto {h}"),
        };
        let spec = WaitSpec::new(label, timeout);
        Ok(wait_true(&spec, || self.servers_migrated(servers, goal)).await?)
    }

    /// Live-migrate instances one by one (scheduler picks the target),
    /// then wait until they have all left `source` and the hypervisor's
    /// counters catch up.
    pub async fn migrate_successive(
        &self,
        servers: &[Server],
        source: &Hypervisor,
        block_migration: bool,
        timeout: Duration,
    ) -> Result<(), OpsError> {
        info!(
            count = servers.len(),
            source = %source.hypervisor_hostname,
            "triggering successive live migrations"
        );
        for server in servers {
            self.compute
                .live_migrate(&server.id, None, block_migration)
                .await?;
        }

        self.wait_servers_migrated(
            servers,
            MigrationGoal::OffHost(&source.hypervisor_hostname),
            timeout,
        )
        .await?;
        self.wait_hypervisor_free(source, Duration::from_secs(2 * 60))
            .await
    }

    /// Fan out migration triggers, one task per instance, then fall back
    /// to a single wait for convergence onto `target`. Only the triggering
    /// calls run in parallel; a migration that has been issued continues
    /// regardless of what happens to the wait.
    pub async fn migrate_concurrent(
        &self,
        servers: &[Server],
        target: &Hypervisor,
        block_migration: bool,
        timeout: Duration,
    ) -> Result<(), OpsError> {
        info!(
            count = servers.len(),
            target = %target.hypervisor_hostname,
            "triggering concurrent live migrations"
        );
        let triggers: Vec<_> = servers
            .iter()
            .map(|server| {
                let compute = self.compute.clone();
                let id = server.id.clone();
                let host = target.hypervisor_hostname.clone();
                tokio::spawn(
                    async move { compute.live_migrate(&id, Some(&host), block_migration).await },
                )
            })
            .collect();

        for handle in join_all(triggers).await {
            handle
                .map_err(|e| OpsError::Internal(format!("migration trigger task failed: {e}")))??;
        }

        self.wait_servers_migrated(
            servers,
            MigrationGoal::OntoHost(&target.hypervisor_hostname),
            timeout,
        )
        .await
    }

    /// True when the hypervisor reports zero running instances.
    pub async fn hypervisor_free(&self, hypervisor_id: i64) -> Result<bool, OpsError> {
        let current = self.compute.get_hypervisor(hypervisor_id).await?;
        Ok(current.running_vms == 0)
    }

    /// Hypervisor stats refresh quickly, so this polls on a short
    /// interval.
    pub async fn wait_hypervisor_free(
        &self,
        hypervisor: &Hypervisor,
        timeout: Duration,
    ) -> Result<(), OpsError> {
        let spec = WaitSpec::new(
            format!("hypervisor {} to be free", hypervisor.hypervisor_hostname),
            timeout,
        )
        .with_sleep(HYPERVISOR_SLEEP);
        Ok(wait_true(&spec, || self.hypervisor_free(hypervisor.id)).await?)
    }

    /// Wait until every compute host has heartbeated past the point where
    /// this call started, then report whether all active services are
    /// available.
    pub async fn wait_nova_ready(&self, timeout: Duration) -> Result<bool, OpsError> {
        let states = self.compute_host_states().await?;
        let Some(watermark) = states.iter().filter_map(|s| s.updated_at).max() else {
            return Err(OpsError::Environment(
                "no compute host heartbeats reported".to_string(),
            ));
        };

        let spec =
            WaitSpec::new("compute host heartbeats to advance", timeout).with_sleep(HEARTBEAT_SLEEP);
        wait_true(&spec, || async {
            let states = self.compute_host_states().await?;
            Ok::<_, OpsError>(
                !states.is_empty()
                    && states
                        .iter()
                        .all(|s| s.updated_at.is_some_and(|t| t > watermark)),
            )
        })
        .await?;

        let states = self.compute_host_states().await?;
        Ok(states.iter().filter(|s| s.active).all(|s| s.available))
    }

    async fn compute_host_states(
        &self,
    ) -> Result<Vec<stratus_openstack::compute::HostServiceState>, OpsError> {
        let zones = self.compute.availability_zone_detail().await?;
        Ok(zones
            .into_iter()
            .filter_map(|zone| zone.hosts)
            .flat_map(|hosts| hosts.into_values())
            .flat_map(|services| services.into_values())
            .collect())
    }
}
