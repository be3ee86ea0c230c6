//! Integration tests for the HTTP connector using wiremock
//!
//! These tests verify the requests the connector sends to a collector API
//! and how it handles various response codes.

use cloudsweep::{
    AttributeHandle, ConnectorError, HttpConnector, KeepSet, ResourceHandle, Scope,
    StorageConnector, StoredRecord, Urn,
};
use futures::TryStreamExt;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VPC_PATH: &str = "/resources/urn%3Aaws%3A111111111111%3Aus-east-1%3Aec2%3Avpc%3Avpc-1";

fn vpc() -> Urn {
    Urn::new("111111111111", "us-east-1", "ec2", "vpc", "vpc-1")
}

fn record(id: &str) -> serde_json::Value {
    json!({
        "kind": "resource",
        "urn": format!("urn:aws:111111111111:us-east-1:ec2:vpc:{}", id),
        "properties": {"VpcId": id},
        "discovered_at": "2024-05-01T12:00:00Z"
    })
}

/// Write requests
mod write_tests {
    use super::*;

    /// Resources are PUT under their encoded urn
    #[tokio::test]
    async fn test_write_resource_puts_record() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(VPC_PATH))
            .and(body_partial_json(json!({
                "urn": "urn:aws:111111111111:us-east-1:ec2:vpc:vpc-1",
                "properties": {"CidrBlock": "10.0.0.0/16"}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let connector = HttpConnector::new(&server.uri()).unwrap();
        let handle = ResourceHandle::new("ec2", "vpc", "vpc-1")
            .with_properties(json!({"CidrBlock": "10.0.0.0/16"}));

        connector.write_resource(&vpc(), &handle).await.unwrap();
    }

    /// Secondary attributes are PUT under their parent's urn
    #[tokio::test]
    async fn test_write_secondary_attribute_nests_under_parent() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(format!("{}/attributes/vpc_enable_dns_support", VPC_PATH)))
            .and(body_partial_json(json!({
                "attribute_type": "vpc_enable_dns_support",
                "properties": {"EnableDnsSupport": true}
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let connector = HttpConnector::new(&server.uri()).unwrap();
        let attribute = AttributeHandle::new("vpc_enable_dns_support", json!({"EnableDnsSupport": true}));

        connector
            .write_secondary_attribute(&vpc(), &attribute, "vpc_enable_dns_support")
            .await
            .unwrap();
    }

    /// Server errors surface as the status code
    #[tokio::test]
    async fn test_500_returns_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(VPC_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let connector = HttpConnector::new(&server.uri()).unwrap();
        let result = connector
            .write_resource(&vpc(), &ResourceHandle::new("ec2", "vpc", "vpc-1"))
            .await;

        assert!(matches!(result, Err(ConnectorError::Status(500))));
    }
}

/// Reconcile requests
mod reconcile_tests {
    use super::*;

    /// Only urns inside the scope are sent, sorted
    #[tokio::test]
    async fn test_reconcile_posts_scope_and_keep_set() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/scopes/reconcile"))
            .and(body_json(json!({
                "service": "ec2",
                "resource_type": "vpc",
                "region": "us-east-1",
                "account_id": "111111111111",
                "urns_to_keep": [
                    "urn:aws:111111111111:us-east-1:ec2:vpc:vpc-1",
                    "urn:aws:111111111111:us-east-1:ec2:vpc:vpc-2"
                ]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let keep: KeepSet = [
            Urn::new("111111111111", "us-east-1", "ec2", "vpc", "vpc-2"),
            vpc(),
            Urn::new("111111111111", "eu-west-2", "ec2", "vpc", "vpc-eu"),
        ]
        .into_iter()
        .collect();

        let connector = HttpConnector::new(&server.uri()).unwrap();
        connector
            .delete_resources_not_in(&Scope::new("ec2", "vpc", "us-east-1"), "111111111111", &keep)
            .await
            .unwrap();
    }

    /// An empty keep-set is sent as an empty list
    #[tokio::test]
    async fn test_reconcile_with_empty_keep_set() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/scopes/reconcile"))
            .and(body_partial_json(json!({"urns_to_keep": []})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let connector = HttpConnector::new(&server.uri()).unwrap();
        connector
            .delete_resources_not_in(&Scope::new("ec2", "vpc", "us-east-1"), "111111111111", &KeepSet::new())
            .await
            .unwrap();
    }
}

/// Read and delete requests
mod read_tests {
    use super::*;

    /// A missing resource reads as None
    #[tokio::test]
    async fn test_404_reads_as_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(VPC_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let connector = HttpConnector::new(&server.uri()).unwrap();
        assert!(connector.read_resource(&vpc()).await.unwrap().is_none());
    }

    /// An existing resource is parsed back into a record
    #[tokio::test]
    async fn test_read_resource_parses_record() {
        let server = MockServer::start().await;

        let mut body = record("vpc-1");
        body.as_object_mut().unwrap().remove("kind");
        Mock::given(method("GET"))
            .and(path(VPC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let connector = HttpConnector::new(&server.uri()).unwrap();
        let found = connector.read_resource(&vpc()).await.unwrap().unwrap();
        assert_eq!(found.urn, vpc());
        assert_eq!(found.properties["VpcId"], "vpc-1");
    }

    /// Deleting an already deleted resource is not an error
    #[tokio::test]
    async fn test_delete_missing_resource_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(VPC_PATH))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let connector = HttpConnector::new(&server.uri()).unwrap();
        connector.delete_resource(&vpc()).await.unwrap();
    }

    /// read_all follows page tokens until the last page
    #[tokio::test]
    async fn test_read_all_follows_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/records"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [record("vpc-3")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        // First page; the token-specific mock above is checked first
        Mock::given(method("GET"))
            .and(path("/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [record("vpc-1"), record("vpc-2")],
                "nextPageToken": "page-2"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let connector = HttpConnector::new(&server.uri()).unwrap();
        let records: Vec<StoredRecord> = connector.read_all().try_collect().await.unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.urn().resource_id()).collect();
        assert_eq!(ids, vec!["vpc-1", "vpc-2", "vpc-3"]);
    }

    /// A failing page ends the stream with an error
    #[tokio::test]
    async fn test_read_all_propagates_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/records"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let connector = HttpConnector::new(&server.uri()).unwrap();
        let result: Result<Vec<StoredRecord>, ConnectorError> = connector.read_all().try_collect().await;
        assert!(matches!(result, Err(ConnectorError::Status(503))));
    }
}
