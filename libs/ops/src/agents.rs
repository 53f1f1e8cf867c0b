//! Network agent liveness and rescheduling.

use std::time::Duration;

use stratus_openstack::network::{Agent, DHCP_AGENT_BINARY, L3_AGENT_BINARY};
use stratus_wait::{wait_true, wait_until_tolerating, WaitSpec};
use tracing::info;

use crate::error::OpsError;
use crate::Cloud;

impl Cloud {
    /// True when every agent in `agent_ids` shows up in a fresh listing
    /// with the wanted liveness flag.
    pub async fn agents_liveness_is(
        &self,
        agent_ids: &[String],
        alive: bool,
    ) -> Result<bool, OpsError> {
        let agents = self.network.list_agents(None).await?;
        Ok(agent_ids
            .iter()
            .all(|id| agents.iter().any(|a| &a.id == id && a.alive == alive)))
    }

    pub async fn wait_agents_alive(
        &self,
        agent_ids: &[String],
        timeout: Duration,
    ) -> Result<(), OpsError> {
        let spec = WaitSpec::new("agents to come back alive", timeout);
        Ok(wait_true(&spec, || self.agents_liveness_is(agent_ids, true)).await?)
    }

    pub async fn wait_agents_down(
        &self,
        agent_ids: &[String],
        timeout: Duration,
    ) -> Result<(), OpsError> {
        let spec = WaitSpec::new("agents to go down", timeout);
        Ok(wait_true(&spec, || self.agents_liveness_is(agent_ids, false)).await?)
    }

    /// Hosts of the alive DHCP agents serving a network.
    pub async fn alive_dhcp_hosts(&self, network_id: &str) -> Result<Vec<String>, OpsError> {
        let agents = self.network.dhcp_agents_hosting_network(network_id).await?;
        Ok(agents
            .into_iter()
            .filter(|a| a.alive)
            .map(|a| a.host)
            .collect())
    }

    /// Wait until the network has at least one alive DHCP agent and return
    /// the hosts. A NotFound from the listing means the network is still
    /// being provisioned and is tolerated.
    pub async fn wait_alive_dhcp_hosts(
        &self,
        network_id: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, OpsError> {
        let spec = WaitSpec::new("an alive DHCP agent for the network", timeout)
            .with_sleep(Duration::from_secs(10));
        let hosts = wait_until_tolerating(
            &spec,
            |err: &OpsError| err.is_not_found(),
            || async {
                let hosts = self.alive_dhcp_hosts(network_id).await?;
                Ok((!hosts.is_empty()).then_some(hosts))
            },
        )
        .await?;
        Ok(hosts)
    }

    /// Move a router to another L3 agent and wait until a fresh listing
    /// shows the new agent hosting it. `target_host` pins the destination;
    /// `None` picks any other agent. No rollback on timeout.
    pub async fn reschedule_router(
        &self,
        router_id: &str,
        target_host: Option<&str>,
        timeout: Duration,
    ) -> Result<Agent, OpsError> {
        let hosting = self.network.l3_agents_hosting_router(router_id).await?;
        if hosting.len() != 1 {
            return Err(OpsError::Environment(format!(
                "cannot determine the L3 agent hosting router {router_id} ({} candidates)",
                hosting.len()
            )));
        }
        let current = &hosting[0];

        let all = self.network.list_agents(Some(L3_AGENT_BINARY)).await?;
        let target = pick_target(all, &current.id, target_host).ok_or_else(|| {
            OpsError::Environment(format!(
                "no candidate L3 agent to move router {router_id} to"
            ))
        })?;

        info!(
            router_id,
            from = %current.host,
            to = %target.host,
            "rescheduling router"
        );
        self.network
            .remove_router_from_l3_agent(&current.id, router_id)
            .await?;
        self.network
            .add_router_to_l3_agent(&target.id, router_id)
            .await?;

        let spec = WaitSpec::new("router to be hosted by the new agent", timeout);
        wait_true(&spec, || async {
            let hosting = self.network.l3_agents_hosting_router(router_id).await?;
            Ok::<_, OpsError>(hosting.iter().any(|a| a.id == target.id))
        })
        .await?;

        Ok(target)
    }

    /// Move a network to another DHCP agent and wait until a fresh listing
    /// shows the new agent hosting it.
    pub async fn reschedule_network_dhcp(
        &self,
        network_id: &str,
        target_host: Option<&str>,
        timeout: Duration,
    ) -> Result<Agent, OpsError> {
        let hosting = self.network.dhcp_agents_hosting_network(network_id).await?;
        let current = hosting.first().ok_or_else(|| {
            OpsError::Environment(format!(
                "no DHCP agent currently hosts network {network_id}"
            ))
        })?;

        let all = self.network.list_agents(Some(DHCP_AGENT_BINARY)).await?;
        let target = pick_target(all, &current.id, target_host).ok_or_else(|| {
            OpsError::Environment(format!(
                "no candidate DHCP agent to move network {network_id} to"
            ))
        })?;

        info!(
            network_id,
            from = %current.host,
            to = %target.host,
            "rescheduling network"
        );
        self.network
            .remove_network_from_dhcp_agent(&current.id, network_id)
            .await?;
        self.network
            .add_network_to_dhcp_agent(&target.id, network_id)
            .await?;

        let spec = WaitSpec::new("network to be hosted by the new DHCP agent", timeout);
        wait_true(&spec, || async {
            let hosting = self.network.dhcp_agents_hosting_network(network_id).await?;
            Ok::<_, OpsError>(hosting.iter().any(|a| a.id == target.id))
        })
        .await?;

        Ok(target)
    }
}

fn pick_target(agents: Vec<Agent>, current_id: &str, target_host: Option<&str>) -> Option<Agent> {
    match target_host {
        Some(host) => agents.into_iter().find(|a| a.host == host),
        None => agents.into_iter().find(|a| a.id != current_id),
    }
}
