//! Test fixtures

use super::mock_service::MockODataService;
use odata_batch::{BatchClient, BatchConfig, BatchResponseItem, BatchResponseItems};
use serde_json::json;
use std::sync::Arc;

pub const SERVICE_ROOT: &str = "http://localhost:9080/StaticService/V40/Static.svc";

/// Service seeded with two customers and one order
pub fn customer_service() -> MockODataService {
    MockODataService::new()
        .with_entity(
            "Customers(1)",
            json!({ "CustomerID": 1, "Name": "Maria Anders" }),
        )
        .with_entity(
            "Customers(2)",
            json!({ "CustomerID": 2, "Name": "Ana Trujillo" }),
        )
        .with_entity("Orders(7)", json!({ "OrderID": 7, "Quantity": 1 }))
}

pub fn client_for(service: Arc<MockODataService>, config: BatchConfig) -> BatchClient {
    BatchClient::with_transport(config, service)
}

/// Drain a response cursor
pub async fn collect_items(items: &mut BatchResponseItems) -> Vec<BatchResponseItem> {
    let mut collected = Vec::new();
    while let Some(item) = items.next().await.expect("response item") {
        collected.push(item);
    }
    collected
}
