//! CLI commands.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tabled::{Table, Tabled};

use stratus_openstack::Config;
use stratus_ops::Cloud;

#[derive(Debug, Parser)]
#[command(name = "stratus", about = "Cloud test harness tooling", version)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe compute service readiness (host heartbeats and availability).
    Check {
        /// Budget for the heartbeat wait, in seconds.
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },

    /// List servers with status, host, and addresses.
    Servers,

    /// Delete leaked test resources (best effort).
    Cleanup {
        /// Network names to leave in place. Repeatable.
        #[arg(long = "keep-network")]
        keep_networks: Vec<String>,
    },
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let config = Config::from_env();
        let cloud = Cloud::connect(&config)
            .await
            .with_context(|| format!("connecting to {}", config.auth_url))?;

        match &self.command {
            Command::Check { timeout } => check(&cloud, Duration::from_secs(*timeout)).await,
            Command::Servers => servers(&cloud).await,
            Command::Cleanup { keep_networks } => cleanup(&cloud, keep_networks).await,
        }
    }
}

async fn check(cloud: &Cloud, timeout: Duration) -> Result<()> {
    let ready = cloud.wait_nova_ready(timeout).await?;
    if ready {
        println!("{}", "compute service is ready".green());
        Ok(())
    } else {
        anyhow::bail!("compute hosts heartbeat but some services are unavailable");
    }
}

#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "ADDRESS")]
    address: String,
}

async fn servers(cloud: &Cloud) -> Result<()> {
    let servers = cloud.compute.list_servers().await?;
    if servers.is_empty() {
        println!("{}", "No servers found.".dimmed());
        return Ok(());
    }

    let rows: Vec<ServerRow> = servers
        .iter()
        .map(|s| ServerRow {
            id: s.id.clone(),
            name: s.name.clone(),
            status: s.status.to_string(),
            host: s.host.clone().unwrap_or_default(),
            address: s.accessible_address().unwrap_or_default().to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

async fn cleanup(cloud: &Cloud, keep_networks: &[String]) -> Result<()> {
    let report = cloud.cleanup(keep_networks).await?;
    println!(
        "deleted {} resources ({} servers, {} floating IPs, {} networks)",
        report.total(),
        report.servers,
        report.floating_ips,
        report.networks
    );
    Ok(())
}
