//! End-to-end convergence scenarios against a scripted mock cloud.
//!
//! Each test stands up a wiremock server playing all four services
//! (distinct path prefixes keep them apart) and drives the full stack:
//! clients, convergence helpers, and the wait primitive underneath.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p stratus-e2e --test scenarios
//! ```

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stratus_openstack::compute::{CreateServer, Hypervisor, Server};
use stratus_ops::{BootOptions, Cloud, MigrationGoal};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stratus_wait=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn cloud_against(mock: &MockServer) -> Cloud {
    let uri = mock.uri();
    Cloud::from_endpoints(&uri, &uri, &uri, &uri, "tok-e2e").unwrap()
}

fn server_body(id: &str, name: &str, status: &str, host: &str) -> serde_json::Value {
    json!({
        "server": {
            "id": id,
            "name": name,
            "status": status,
            "OS-EXT-SRV-ATTR:host": host,
            "addresses": {
                "net01": [
                    {"addr": "192.168.1.5", "OS-EXT-IPS:type": "fixed"}
                ]
            }
        }
    })
}

/// Boot flow: create, converge to ACTIVE, attach a floating IP, tear down.
#[tokio::test]
async fn boot_assign_floating_ip_and_delete() {
    init_tracing();
    let mock = MockServer::start().await;

    // ===========================================================================
    // Step 1: Boot accepted; instance builds for two polls, then ACTIVE
    // ===========================================================================
    Mock::given(method("POST"))
        .and(path("/servers"))
        .respond_with(
            ResponseTemplate::new(202)
                .set_body_json(server_body("s-1", "e2e-server", "BUILD", "node-1")),
        )
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/servers/s-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(server_body("s-1", "e2e-server", "BUILD", "node-1")),
        )
        .up_to_n_times(2)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/servers/s-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(server_body("s-1", "e2e-server", "ACTIVE", "node-1")),
        )
        .up_to_n_times(2)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/servers/s-1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "itemNotFound": {"message": "Instance could not be found", "code": 404}
        })))
        .mount(&mock)
        .await;

    // ===========================================================================
    // Step 2: Floating IP allocation and port convergence
    // ===========================================================================
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .and(query_param("router:external", "true"))
        .and(query_param("status", "ACTIVE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "networks": [{"id": "net-ext", "name": "ext-net", "status": "ACTIVE",
                          "router:external": true}]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/ports"))
        .and(query_param("device_id", "s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ports": [{"id": "p-1", "network_id": "net-int", "device_id": "s-1",
                       "status": "DOWN", "mac_address": "fa:16:3e:aa:bb:cc",
                       "fixed_ips": [{"subnet_id": "sub-1", "ip_address": "192.168.1.5"}]}]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2.0/floatingips"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "floatingip": {"id": "f-1", "floating_ip_address": "10.20.30.40",
                           "floating_network_id": "net-ext", "status": "DOWN",
                           "port_id": "p-1"}
        })))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/ports/p-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "port": {"id": "p-1", "network_id": "net-int", "status": "ACTIVE",
                     "mac_address": "fa:16:3e:aa:bb:cc"}
        })))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/floatingips/f-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floatingip": {"id": "f-1", "floating_ip_address": "10.20.30.40",
                           "floating_network_id": "net-ext", "status": "ACTIVE",
                           "port_id": "p-1"}
        })))
        .mount(&mock)
        .await;

    // ===========================================================================
    // Step 3: Teardown
    // ===========================================================================
    Mock::given(method("DELETE"))
        .and(path("/servers/s-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    let cloud = cloud_against(&mock);

    let request = CreateServer::new("e2e-server", "img-1", "2").on_network("net-int");
    let server = cloud
        .create_server(
            request,
            BootOptions {
                wait_active: true,
                wait_reachable: false,
                timeout: Duration::from_secs(30),
            },
        )
        .await
        .unwrap();
    assert_eq!(server.id, "s-1");
    assert_eq!(server.status.to_string(), "ACTIVE");

    let fip = cloud.assign_floating_ip(&server).await.unwrap();
    assert_eq!(fip.floating_ip_address, "10.20.30.40");

    cloud
        .delete_servers(std::slice::from_ref(&server), Duration::from_secs(30))
        .await
        .unwrap();
}

/// Concurrent live migration: triggers fan out in parallel, convergence is
/// observed by a single wait.
#[tokio::test]
async fn concurrent_migration_converges_onto_target() {
    init_tracing();
    let mock = MockServer::start().await;

    let migrate_body = json!({
        "os-migrateLive": {
            "host": "node-2",
            "block_migration": true,
            "disk_over_commit": false,
        }
    });
    for id in ["s-10", "s-20"] {
        Mock::given(method("POST"))
            .and(path(format!("/servers/{id}/action")))
            .and(body_json(&migrate_body))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock)
            .await;
    }

    // s-10 is still on the source for one poll; s-20 lands immediately.
    Mock::given(method("GET"))
        .and(path("/servers/s-10"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(server_body("s-10", "server10", "MIGRATING", "node-1")),
        )
        .up_to_n_times(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/servers/s-10"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(server_body("s-10", "server10", "ACTIVE", "node-2")),
        )
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/servers/s-20"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(server_body("s-20", "server20", "ACTIVE", "node-2")),
        )
        .mount(&mock)
        .await;

    let cloud = cloud_against(&mock);

    let servers: Vec<Server> = ["s-10", "s-20"]
        .iter()
        .map(|id| {
            serde_json::from_value(json!({ "id": id, "name": id, "status": "ACTIVE" })).unwrap()
        })
        .collect();
    let target: Hypervisor = serde_json::from_value(json!({
        "id": 2,
        "hypervisor_hostname": "node-2",
        "running_vms": 0,
        "vcpus": 16,
        "free_ram_mb": 65536,
        "disk_available_least": 500,
    }))
    .unwrap();

    cloud
        .migrate_concurrent(&servers, &target, true, Duration::from_secs(30))
        .await
        .unwrap();

    // Convergence is also directly observable through the probe.
    assert!(cloud
        .servers_migrated(&servers, MigrationGoal::OntoHost("node-2"))
        .await
        .unwrap());
    assert!(cloud
        .servers_migrated(&servers, MigrationGoal::OffHost("node-1"))
        .await
        .unwrap());
}

/// Best-effort cleanup: deletable resources go, refusals are skipped, the
/// kept network survives.
#[tokio::test]
async fn cleanup_sweep_is_best_effort() {
    init_tracing();
    let mock = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "networks": [
                {"id": "net-keep", "name": "ext-net", "router:external": true},
                {"id": "net-test", "name": "net01"}
            ]
        })))
        .mount(&mock)
        .await;

    Mock::given(method("GET"))
        .and(path("/os-keypairs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keypairs": [{"keypair": {"name": "kp1", "public_key": "ssh-rsa AAAA"}}]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/os-keypairs/kp1"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2.0/floatingips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floatingips": [{"id": "f-1", "floating_ip_address": "10.20.30.40",
                             "floating_network_id": "net-keep", "status": "DOWN"}]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2.0/floatingips/f-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    Mock::given(method("GET"))
        .and(path("/servers/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "servers": [{"id": "s-1", "name": "leftover", "status": "ACTIVE"}]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/servers/s-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    // The in-use group refuses deletion and is skipped; "default" is never
    // touched.
    Mock::given(method("GET"))
        .and(path("/v2.0/security-groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "security_groups": [
                {"id": "sg-default", "name": "default", "description": "Default security group"},
                {"id": "sg-test", "name": "test-sg-1234", "description": ""}
            ]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2.0/security-groups/sg-test"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "NeutronError": {"message": "Security group in use", "type": "SecurityGroupInUse"}
        })))
        .expect(1)
        .mount(&mock)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2.0/ports"))
        .and(query_param("device_owner", "network:router_interface"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ports": [{"id": "p-9", "network_id": "net-test", "device_id": "r-1",
                       "device_owner": "network:router_interface",
                       "fixed_ips": [{"subnet_id": "sub-9", "ip_address": "192.168.1.1"}]}]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v2.0/routers/r-1/remove_router_interface"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2.0/subnets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subnets": [
                {"id": "sub-9", "network_id": "net-test", "name": "net01__subnet",
                 "cidr": "192.168.1.0/24"},
                {"id": "sub-keep", "network_id": "net-keep", "name": "ext__subnet",
                 "cidr": "10.20.0.0/24"}
            ]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2.0/subnets/sub-9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2.0/routers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "routers": [{"id": "r-1", "name": "router01"}]
        })))
        .mount(&mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2.0/routers/r-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/v2.0/networks/net-test"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;

    let cloud = cloud_against(&mock);
    let report = cloud.cleanup(&["ext-net".to_string()]).await.unwrap();

    assert_eq!(report.keypairs, 1);
    assert_eq!(report.floating_ips, 1);
    assert_eq!(report.servers, 1);
    assert_eq!(report.security_groups, 0);
    assert_eq!(report.router_interfaces, 1);
    assert_eq!(report.subnets, 1);
    assert_eq!(report.routers, 1);
    assert_eq!(report.networks, 1);
    assert_eq!(report.total(), 7);
}
