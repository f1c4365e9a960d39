//! REST client behaviour against a mocked gateway

use serde_json::json;
use wiremock::matchers::{bearer_token, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mdbform_provider_greenplum::api::{CreateClusterRequest, UpdateClusterRequest};
use mdbform_provider_greenplum::client::ApiError;
use mdbform_provider_greenplum::{ClusterApi, ProviderConfig, RestClusterApi};

fn client(server: &MockServer) -> RestClusterApi {
    let config = ProviderConfig::new("test-token")
        .with_endpoint(server.uri())
        .with_operation_endpoint(server.uri());
    RestClusterApi::new(&config).expect("client")
}

#[tokio::test]
async fn get_cluster_decodes_gateway_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/managed-greenplum/v1/clusters/c9q1"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c9q1",
            "name": "analytics",
            "masterHostCount": "2",
            "segmentHostCount": "4",
            "status": "RUNNING",
            "config": {"version": "6.25", "zoneId": "ru-central1-a"}
        })))
        .mount(&server)
        .await;

    let cluster = client(&server).get_cluster("c9q1").await.unwrap().unwrap();
    assert_eq!(cluster.name, "analytics");
    assert_eq!(cluster.segment_host_count, 4);
    assert_eq!(cluster.config.unwrap().zone_id, "ru-central1-a");
}

#[tokio::test]
async fn get_missing_cluster_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/managed-greenplum/v1/clusters/c9qgone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 5,
            "message": "Cluster c9qgone not found"
        })))
        .mount(&server)
        .await;

    assert!(client(&server).get_cluster("c9qgone").await.unwrap().is_none());
}

#[tokio::test]
async fn host_listing_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/managed-greenplum/v1/clusters/c9q1/segment-hosts"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hosts": [{"name": "rc1a-seg2.mdb.yandexcloud.net", "type": "SEGMENT"}]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/managed-greenplum/v1/clusters/c9q1/segment-hosts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hosts": [{"name": "rc1a-seg1.mdb.yandexcloud.net", "type": "SEGMENT"}],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let hosts = client(&server).list_segment_hosts("c9q1").await.unwrap();
    let names: Vec<&str> = hosts.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["rc1a-seg1.mdb.yandexcloud.net", "rc1a-seg2.mdb.yandexcloud.net"]
    );
}

#[tokio::test]
async fn create_posts_camel_case_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/managed-greenplum/v1/clusters"))
        .and(bearer_token("test-token"))
        .and(body_partial_json(json!({
            "folderId": "b1gfolder",
            "name": "analytics",
            "masterHostCount": "2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "op1",
            "done": false,
            "metadata": {"clusterId": "c9q1"}
        })))
        .mount(&server)
        .await;

    let request = CreateClusterRequest {
        folder_id: "b1gfolder".to_string(),
        name: "analytics".to_string(),
        master_host_count: 2,
        ..Default::default()
    };
    let op = client(&server).create_cluster(&request).await.unwrap();
    assert_eq!(op.cluster_id(), Some("c9q1"));
    assert!(!op.done);
}

#[tokio::test]
async fn update_patches_with_joined_mask() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/managed-greenplum/v1/clusters/c9q1"))
        .and(body_partial_json(json!({
            "updateMask": "description,name",
            "name": "renamed"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "op2", "done": true})))
        .mount(&server)
        .await;

    let request = UpdateClusterRequest {
        cluster_id: "c9q1".to_string(),
        update_mask: vec!["description".to_string(), "name".to_string()],
        name: "renamed".to_string(),
        ..Default::default()
    };
    let op = client(&server).update_cluster(&request).await.unwrap();
    assert!(op.done);
}

#[tokio::test]
async fn error_status_carries_gateway_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/managed-greenplum/v1/clusters/c9q1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": 7,
            "message": "Permission denied"
        })))
        .mount(&server)
        .await;

    let err = client(&server).delete_cluster("c9q1").await.unwrap_err();
    match err {
        ApiError::Status {
            method,
            status,
            message,
            ..
        } => {
            assert_eq!(method, "DELETE");
            assert_eq!(status, 403);
            assert_eq!(message, "Permission denied");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn operations_are_read_from_operation_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/operations/op1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "op1",
            "done": true,
            "error": {"code": 9, "message": "Cluster is not running"}
        })))
        .mount(&server)
        .await;

    let op = client(&server).get_operation("op1").await.unwrap();
    assert_eq!(op.error.unwrap().to_string(), "Cluster is not running (code 9)");
}
