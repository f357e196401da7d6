//! GraphQL-over-HTTP client for the CRM API.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tracing::debug;

use crmjobs_core::{ItemId, Money, OrderId};
use crmjobs_sales::{Customer, OrderReminder};

use super::{BulkReplenishment, CrmRemote, RemoteError, ReplenishedItem};

const HELLO_QUERY: &str = "query { hello }";

const UPDATE_LOW_STOCK_MUTATION: &str = r#"
mutation {
    updateLowStockProducts {
        products {
            id
            name
            stock
        }
        message
        count
    }
}
"#;

const RECENT_ORDERS_QUERY: &str = r#"
query GetRecentOrders($startDate: DateTime!) {
    allOrders(orderDate_Gte: $startDate) {
        edges {
            node {
                id
                orderDate
                customer {
                    email
                    name
                }
                totalAmount
            }
        }
    }
}
"#;

/// Longest response body kept in a [`RemoteError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Blocking GraphQL client with a per-request timeout.
///
/// Must not be used from inside an async runtime; the task runners call it
/// from their own threads.
#[derive(Debug, Clone)]
pub struct GraphQlCrmClient {
    endpoint: String,
    http: reqwest::blocking::Client,
}

impl GraphQlCrmClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn execute<T: DeserializeOwned>(&self, query: &str, variables: JsonValue) -> Result<T, RemoteError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        let body = resp.text().map_err(map_reqwest_error)?;
        debug!(endpoint = %self.endpoint, status = status.as_u16(), "graphql response received");

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let envelope: GraphQlResponse<T> =
            serde_json::from_str(&body).map_err(|e| RemoteError::malformed(e.to_string()))?;

        if !envelope.errors.is_empty() {
            let messages: Vec<_> = envelope.errors.into_iter().map(|e| e.message).collect();
            return Err(RemoteError::Api(messages.join("; ")));
        }

        envelope
            .data
            .ok_or_else(|| RemoteError::malformed("response has no data"))
    }
}

impl CrmRemote for GraphQlCrmClient {
    fn probe(&self) -> Result<String, RemoteError> {
        let data: HelloData = self.execute(HELLO_QUERY, json!({}))?;
        Ok(data.hello)
    }

    fn bulk_replenish_low_stock(&self) -> Result<BulkReplenishment, RemoteError> {
        let data: UpdateLowStockData = self.execute(UPDATE_LOW_STOCK_MUTATION, json!({}))?;
        let payload = data.update_low_stock_products;

        let items = payload
            .products
            .into_iter()
            .map(|p| {
                let item_id = ItemId::new(p.id).map_err(|e| RemoteError::malformed(e.to_string()))?;
                let stock = u32::try_from(p.stock).map_err(|_| {
                    RemoteError::malformed(format!("stock out of range for item {item_id}: {}", p.stock))
                })?;
                Ok(ReplenishedItem {
                    item_id,
                    name: p.name,
                    stock,
                })
            })
            .collect::<Result<Vec<_>, RemoteError>>()?;

        let count = usize::try_from(payload.count)
            .map_err(|_| RemoteError::malformed(format!("negative count: {}", payload.count)))?;

        BulkReplenishment::new(items, payload.message, count)
    }

    fn orders_since(&self, since: DateTime<Utc>) -> Result<Vec<OrderReminder>, RemoteError> {
        let data: AllOrdersData =
            self.execute(RECENT_ORDERS_QUERY, json!({ "startDate": since.to_rfc3339() }))?;

        data.all_orders
            .edges
            .into_iter()
            .map(|edge| {
                let node = edge.node;
                Ok(OrderReminder {
                    order_id: OrderId::new(node.id).map_err(|e| RemoteError::malformed(e.to_string()))?,
                    customer: Customer {
                        name: node.customer.name,
                        email: node.customer.email,
                    },
                    order_date: node.order_date.with_timezone(&Utc),
                    total_amount: node.total_amount.to_money()?,
                })
            })
            .collect()
    }
}

fn map_reqwest_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else if e.is_decode() {
        RemoteError::malformed(e.to_string())
    } else {
        RemoteError::Transport(e.to_string())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct HelloData {
    hello: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateLowStockData {
    update_low_stock_products: UpdateLowStockPayload,
}

#[derive(Debug, Deserialize)]
struct UpdateLowStockPayload {
    products: Vec<ProductNode>,
    message: String,
    count: i64,
}

#[derive(Debug, Deserialize)]
struct ProductNode {
    id: String,
    name: String,
    stock: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllOrdersData {
    all_orders: OrderConnection,
}

#[derive(Debug, Deserialize)]
struct OrderConnection {
    edges: Vec<OrderEdge>,
}

#[derive(Debug, Deserialize)]
struct OrderEdge {
    node: OrderNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderNode {
    id: String,
    order_date: DateTime<FixedOffset>,
    customer: CustomerNode,
    total_amount: AmountValue,
}

#[derive(Debug, Deserialize)]
struct CustomerNode {
    email: String,
    name: String,
}

/// GraphQL decimals arrive either as strings or as JSON numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AmountValue {
    Text(String),
    Number(serde_json::Number),
}

impl AmountValue {
    fn to_money(&self) -> Result<Money, RemoteError> {
        let raw = match self {
            AmountValue::Text(s) => s.clone(),
            AmountValue::Number(n) => n.to_string(),
        };
        Money::parse_decimal(&raw).map_err(|e| RemoteError::malformed(e.to_string()))
    }
}
