//! Agent liveness waits and router/network rescheduling.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stratus_ops::Cloud;

fn cloud_against(mock: &MockServer) -> Cloud {
    let uri = mock.uri();
    Cloud::from_endpoints(&uri, &uri, &uri, &uri, "tok-test").unwrap()
}

fn l3_agent(id: &str, host: &str) -> serde_json::Value {
    json!({
        "id": id,
        "agent_type": "L3 agent",
        "binary": "neutron-l3-agent",
        "host": host,
        "alive": true,
        "admin_state_up": true
    })
}

#[tokio::test]
async fn reschedule_router_moves_to_another_agent_and_waits() {
    let mock = MockServer::start().await;

    // Hosting listing: agent-a before the move, agent-b after.
    Mock::given(method("GET"))
        .and(path("/v2.0/routers/r-1/l3-agents"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "agents": [l3_agent("agent-a", "node-1")] })),
        )
        .up_to_n_times(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/routers/r-1/l3-agents"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "agents": [l3_agent("agent-b", "node-2")] })),
        )
        .mount(&mock)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2.0/agents"))
        .and(query_param("binary", "neutron-l3-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "agents": [l3_agent("agent-a", "node-1"), l3_agent("agent-b", "node-2")]
        })))
        .mount(&mock)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/v2.0/agents/agent-a/l3-routers/r-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2.0/agents/agent-b/l3-routers"))
        .and(body_json(json!({ "router_id": "r-1" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock)
        .await;

    let cloud = cloud_against(&mock);
    let target = cloud
        .reschedule_router("r-1", None, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(target.id, "agent-b");
    assert_eq!(target.host, "node-2");
}

#[tokio::test]
async fn wait_agents_down_polls_fresh_listings() {
    let mock = MockServer::start().await;

    let listing = |alive: bool| {
        json!({
            "agents": [{
                "id": "agent-a",
                "agent_type": "DHCP agent",
                "binary": "neutron-dhcp-agent",
                "host": "node-1",
                "alive": alive,
                "admin_state_up": true
            }]
        })
    };

    Mock::given(method("GET"))
        .and(path("/v2.0/agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(true)))
        .up_to_n_times(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(false)))
        .mount(&mock)
        .await;

    let cloud = cloud_against(&mock);
    cloud
        .wait_agents_down(&["agent-a".to_string()], Duration::from_secs(10))
        .await
        .unwrap();
}

#[tokio::test]
async fn dhcp_host_wait_tolerates_missing_network() {
    let mock = MockServer::start().await;

    // The listing 404s while the network is provisioning, then reports an
    // alive agent.
    Mock::given(method("GET"))
        .and(path("/v2.0/networks/n-1/dhcp-agents"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "NeutronError": {"message": "Network n-1 could not be found", "type": "NetworkNotFound"}
        })))
        .up_to_n_times(1)
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks/n-1/dhcp-agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "agents": [{
                "id": "agent-d",
                "agent_type": "DHCP agent",
                "binary": "neutron-dhcp-agent",
                "host": "node-3",
                "alive": true,
                "admin_state_up": true
            }]
        })))
        .mount(&mock)
        .await;

    let cloud = cloud_against(&mock);
    let hosts = cloud
        .wait_alive_dhcp_hosts("n-1", Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(hosts, vec!["node-3".to_string()]);
}
