//! Server lifecycle: boot, converge to ACTIVE, reachability, deletion.

use std::time::Duration;

use stratus_openstack::compute::{CreateServer, Server, ServerStatus};
use stratus_wait::{wait_true, wait_until, WaitSpec};
use tokio::net::TcpStream;
use tracing::info;

use crate::error::OpsError;
use crate::{Cloud, BOOT_TIMEOUT};

/// Port probed by the reachability wait.
pub const SSH_PORT: u16 = 22;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// What to wait for after issuing a boot request.
#[derive(Debug, Clone)]
pub struct BootOptions {
    pub wait_active: bool,
    pub wait_reachable: bool,
    pub timeout: Duration,
}

impl Default for BootOptions {
    fn default() -> Self {
        Self {
            wait_active: true,
            wait_reachable: true,
            timeout: BOOT_TIMEOUT,
        }
    }
}

impl BootOptions {
    /// Return from the boot call as soon as the API accepts it.
    pub fn no_wait() -> Self {
        Self {
            wait_active: false,
            wait_reachable: false,
            timeout: BOOT_TIMEOUT,
        }
    }
}

pub(crate) fn error_state(server: &Server) -> OpsError {
    let detail = server
        .fault
        .as_ref()
        .map(|f| f.message.clone())
        .unwrap_or_else(|| "no fault recorded".to_string());
    OpsError::ServerInError {
        id: server.id.clone(),
        name: server.name.clone(),
        detail,
    }
}

/// ACTIVE means ready; ERROR aborts the wait instead of letting it run
/// out, since an errored instance never converges.
pub(crate) fn server_ready(server: &Server) -> Result<bool, OpsError> {
    match server.status {
        ServerStatus::Error => Err(error_state(server)),
        status => Ok(status == ServerStatus::Active),
    }
}

async fn port_open(addr: &str, port: u16) -> bool {
    let connect = TcpStream::connect((addr, port));
    matches!(tokio::time::timeout(CONNECT_TIMEOUT, connect).await, Ok(Ok(_)))
}

impl Cloud {
    /// Boot a server and, by default, wait until it is ACTIVE and
    /// reachable. Returns the refreshed record.
    pub async fn create_server(
        &self,
        request: CreateServer,
        options: BootOptions,
    ) -> Result<Server, OpsError> {
        let server = self.compute.create_server(&request).await?;
        info!(id = %server.id, name = %request.name, "booting server");

        let booted = [server];
        if options.wait_active {
            self.wait_servers_active(&booted, options.timeout).await?;
        }
        if options.wait_reachable {
            self.wait_servers_reachable(&booted, options.timeout).await?;
        }
        let [server] = booted;
        Ok(self.compute.get_server(&server.id).await?)
    }

    /// Refreshed records if every server is ACTIVE, `None` while any is
    /// still converging. A server in ERROR fails the probe immediately.
    pub async fn servers_active(&self, servers: &[Server]) -> Result<Option<Vec<Server>>, OpsError> {
        let mut fresh = Vec::with_capacity(servers.len());
        for server in servers {
            let current = self.compute.get_server(&server.id).await?;
            if !server_ready(&current)? {
                return Ok(None);
            }
            fresh.push(current);
        }
        Ok(Some(fresh))
    }

    /// Wait until every server reports ACTIVE; returns the refreshed
    /// records.
    pub async fn wait_servers_active(
        &self,
        servers: &[Server],
        timeout: Duration,
    ) -> Result<Vec<Server>, OpsError> {
        let spec = WaitSpec::new("instances to reach ACTIVE status", timeout);
        Ok(wait_until(&spec, || self.servers_active(servers)).await?)
    }

    /// True when every server accepts a TCP connection on the SSH port.
    /// Connection failures are "not ready", not errors.
    pub async fn servers_reachable(&self, servers: &[Server]) -> Result<bool, OpsError> {
        for server in servers {
            let current = self.compute.get_server(&server.id).await?;
            if current.status == ServerStatus::Error {
                return Err(error_state(&current));
            }
            let Some(addr) = current.accessible_address() else {
                return Ok(false);
            };
            if !port_open(addr, SSH_PORT).await {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn wait_servers_reachable(
        &self,
        servers: &[Server],
        timeout: Duration,
    ) -> Result<(), OpsError> {
        let spec = WaitSpec::new("instances to accept connections on the SSH port", timeout);
        Ok(wait_true(&spec, || self.servers_reachable(servers)).await?)
    }

    async fn server_gone(&self, id: &str) -> Result<bool, OpsError> {
        match self.compute.get_server(id).await {
            Ok(current) if current.status == ServerStatus::Error => Err(error_state(&current)),
            Ok(_) => Ok(false),
            Err(err) if err.is_not_found() => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    /// True when every server lookup reports NotFound.
    pub async fn servers_deleted(&self, servers: &[Server]) -> Result<bool, OpsError> {
        for server in servers {
            if !self.server_gone(&server.id).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn wait_servers_deleted(
        &self,
        servers: &[Server],
        timeout: Duration,
    ) -> Result<(), OpsError> {
        let spec = WaitSpec::new("instances to be deleted", timeout);
        Ok(wait_true(&spec, || self.servers_deleted(servers)).await?)
    }

    /// Issue deletes for all servers (a 404 means someone beat us to it),
    /// then wait until every lookup reports NotFound.
    pub async fn delete_servers(
        &self,
        servers: &[Server],
        timeout: Duration,
    ) -> Result<(), OpsError> {
        for server in servers {
            match self.compute.delete_server(&server.id).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.wait_servers_deleted(servers, timeout).await
    }

    /// True when `marker` appears in every server's console log.
    pub async fn console_contains(
        &self,
        servers: &[Server],
        marker: &str,
    ) -> Result<bool, OpsError> {
        for server in servers {
            let output = self.compute.console_output(&server.id).await?;
            if !output.contains(marker) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Wait until a boot-completion marker shows up in every console log.
    pub async fn wait_console_marker(
        &self,
        servers: &[Server],
        marker: &str,
        timeout: Duration,
    ) -> Result<(), OpsError> {
        let spec = WaitSpec::new("marker to appear in all console logs", timeout);
        Ok(wait_true(&spec, || self.console_contains(servers, marker)).await?)
    }

    /// Trigger a rebuild and wait for the REBUILD status to show up.
    pub async fn rebuild_server(&self, server: &Server, image_id: &str) -> Result<Server, OpsError> {
        let rebuilt = self.compute.rebuild_server(&server.id, image_id).await?;

        let spec = WaitSpec::new("instance rebuild to start", Duration::from_secs(60));
        wait_true(&spec, || async {
            let current = self.compute.get_server(&server.id).await?;
            Ok::<_, OpsError>(current.status == ServerStatus::Rebuild)
        })
        .await?;

        Ok(rebuilt)
    }
}
