//! Asset Service client: asset dump, tag lookup, users and fee balances.

use async_trait::async_trait;
use fleetsync_core::errors::UpstreamSystem;
use fleetsync_core::upstream::{
    decimal_from_json, AssetServiceProvider, FeeBalance, PageStream, RawRecord,
};
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::{Result, UpstreamError};
use crate::http::{bearer_headers, HttpTransport, RetryPolicy};
use crate::paging::offset_pages;

/// The service rejects pages larger than this.
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_PRODUCT_ID: &str = "88df910c-91aa-e711-80c2-0004ffa00050";

/// Fee routes differ between deployments; probed in this order.
const FEE_PATHS: [&str; 3] = ["users/{id}/fees", "fees/user/{id}", "fees?userId={id}"];

#[derive(Debug, Clone)]
pub struct AssetServiceConfig {
    /// Base URL including the `/api/v1.0` prefix.
    pub base_url: String,
    pub token: String,
    pub site_id: String,
    pub product_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeeEndpoint {
    Unknown,
    Found(usize),
    Missing,
}

pub struct AssetServiceClient {
    http: HttpTransport,
    base_url: String,
    headers: HeaderMap,
    fee_endpoint: Mutex<FeeEndpoint>,
}

impl AssetServiceClient {
    pub fn new(config: AssetServiceConfig, policy: RetryPolicy) -> Result<Self> {
        let mut headers = bearer_headers(&config.token)?;
        let product_id = if config.product_id.trim().is_empty() {
            DEFAULT_PRODUCT_ID
        } else {
            config.product_id.trim()
        };
        for (name, value) in [
            ("siteid", config.site_id.trim()),
            ("productid", product_id),
            ("client", "ApiClient"),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|_| UpstreamError::invalid_request(format!("Invalid {} header value", name)))?;
            headers.insert(name, value);
        }
        if config.base_url.trim().is_empty() {
            return Err(UpstreamError::invalid_request("Asset Service base URL is empty"));
        }

        Ok(Self {
            http: HttpTransport::new(policy)?,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            headers,
            fee_endpoint: Mutex::new(FeeEndpoint::Unknown),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn asset_page(&self, query: &str, skip: usize, size: usize) -> Result<Vec<RawRecord>> {
        let url = self.url(&format!("assets?$s={}&$sk={}", size.min(MAX_PAGE_SIZE), skip));
        let body = json!({
            "OnlyShowDeleted": false,
            "Filters": [],
            "SearchText": query,
        });
        let response = self.http.post_json(&url, &self.headers, &body).await?;
        let items = items_of(response);
        debug!("[AssetService] asset page skip={} -> {} records", skip, items.len());
        Ok(items)
    }

    async fn fetch_fee_path(&self, index: usize, user_id: &str) -> Result<Option<Value>> {
        let path = FEE_PATHS[index].replace("{id}", &urlencoding::encode(user_id));
        self.http.get_json(&self.url(&path), &self.headers).await
    }

    async fn user_fees(&self, user_id: &str) -> Result<FeeBalance> {
        let mut endpoint = self.fee_endpoint.lock().await;
        let current = *endpoint;
        match current {
            FeeEndpoint::Missing => return Ok(FeeBalance::default()),
            FeeEndpoint::Found(index) => {
                drop(endpoint);
                let body = self.fetch_fee_path(index, user_id).await?;
                return Ok(parse_fee_balance(body.unwrap_or(Value::Null)));
            }
            FeeEndpoint::Unknown => {}
        }

        // Discovery runs under the lock so concurrent lookups wait for its answer.
        for index in 0..FEE_PATHS.len() {
            if let Some(body) = self.fetch_fee_path(index, user_id).await? {
                info!("[AssetService] using fee endpoint '{}'", FEE_PATHS[index]);
                *endpoint = FeeEndpoint::Found(index);
                return Ok(parse_fee_balance(body));
            }
        }
        info!("[AssetService] no fee endpoint available, fee lookups disabled");
        *endpoint = FeeEndpoint::Missing;
        Ok(FeeBalance::default())
    }
}

/// Pulls `Items` out of a search response; a bare array is accepted too.
fn items_of(response: Option<Value>) -> Vec<RawRecord> {
    match response {
        Some(Value::Object(mut map)) => match map.remove("Items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Reads `TotalBalance`, else sums the per-fee balances.
pub fn parse_fee_balance(body: Value) -> FeeBalance {
    let total = body.get("TotalBalance").and_then(decimal_from_json);
    let fees = match body {
        Value::Object(mut map) => match map.remove("Items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    };
    let total_balance = total.or_else(|| {
        if fees.is_empty() {
            return None;
        }
        Some(
            fees.iter()
                .filter_map(|fee| {
                    fee.get("Balance")
                        .or_else(|| fee.get("Amount"))
                        .and_then(decimal_from_json)
                })
                .sum::<Decimal>(),
        )
    });

    FeeBalance {
        total_balance,
        fees,
        endpoint_found: true,
    }
}

#[async_trait]
impl AssetServiceProvider for AssetServiceClient {
    fn search_assets(&self, query: String, limit: usize) -> PageStream<'_> {
        offset_pages(
            UpstreamSystem::AssetService,
            limit,
            MAX_PAGE_SIZE,
            move |skip, size| {
                let query = query.clone();
                async move { self.asset_page(&query, skip, size).await }
            },
        )
    }

    async fn get_asset_by_tag(&self, asset_tag: &str) -> fleetsync_core::Result<Option<RawRecord>> {
        let url = self.url(&format!("assets/assettag/{}", urlencoding::encode(asset_tag.trim())));
        let response = self
            .http
            .get_json(&url, &self.headers)
            .await
            .map_err(|err| err.into_core(UpstreamSystem::AssetService))?;
        let Some(body) = response else {
            return Ok(None);
        };
        let count = body.get("ItemCount").and_then(Value::as_i64).unwrap_or(0);
        if count <= 0 {
            return Ok(None);
        }
        Ok(items_of(Some(body)).into_iter().next())
    }

    async fn get_users(&self, page: usize, page_size: usize) -> fleetsync_core::Result<Vec<RawRecord>> {
        let size = page_size.clamp(1, MAX_PAGE_SIZE);
        let url = self.url(&format!("users?$s={}&$sk={}", size, page * size));
        let body = json!({ "OnlyShowDeleted": false, "Filters": [] });
        self.http
            .post_json(&url, &self.headers, &body)
            .await
            .map(items_of)
            .map_err(|err| err.into_core(UpstreamSystem::AssetService))
    }

    async fn get_user_fees(&self, user_id: &str) -> fleetsync_core::Result<FeeBalance> {
        self.user_fees(user_id)
            .await
            .map_err(|err| err.into_core(UpstreamSystem::AssetService))
    }
}
