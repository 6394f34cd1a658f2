//! Directory client: managed devices, users and battery telemetry.

use async_trait::async_trait;
use fleetsync_core::errors::UpstreamSystem;
use fleetsync_core::upstream::{
    DirectoryProvider, PageStream, RawRecord, TelemetryProvider,
};
use log::debug;
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::Result;
use crate::http::{bearer_headers, HttpTransport, RetryPolicy};
use crate::paging::{token_pages, TokenPage};

const DEVICE_PAGE_SIZE: usize = 100;
const USER_PAGE_SIZE: usize = 500;
const TELEMETRY_PAGE_SIZE: usize = 100;
const TELEMETRY_READ_MASK: &str = "name,deviceId,serialNumber,batteryInfo,batteryStatusReport";

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Host of the admin directory API, without the `/admin/directory/v1` path.
    pub base_url: String,
    pub telemetry_url: String,
    pub customer_id: String,
    pub access_token: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://admin.googleapis.com".to_string(),
            telemetry_url: "https://chromemanagement.googleapis.com".to_string(),
            customer_id: "my_customer".to_string(),
            access_token: String::new(),
        }
    }
}

pub struct DirectoryClient {
    http: HttpTransport,
    config: DirectoryConfig,
    headers: HeaderMap,
}

impl DirectoryClient {
    pub fn new(config: DirectoryConfig, policy: RetryPolicy) -> Result<Self> {
        let headers = bearer_headers(&config.access_token)?;
        Ok(Self {
            http: HttpTransport::new(policy)?,
            config,
            headers,
        })
    }

    fn directory_url(&self, path: &str) -> String {
        format!(
            "{}/admin/directory/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    async fn fetch_token_page(&self, url: String, items_key: &'static str) -> Result<TokenPage> {
        let body = self.http.get_json(&url, &self.headers).await?;
        Ok(token_page_from(body.unwrap_or(Value::Null), items_key))
    }

    async fn device_page(&self, query: Option<String>, token: Option<String>, size: usize) -> Result<TokenPage> {
        let mut url = format!(
            "{}?projection=FULL&maxResults={}",
            self.directory_url(&format!(
                "customer/{}/devices/chromeos",
                urlencoding::encode(&self.config.customer_id)
            )),
            size
        );
        if let Some(query) = query.as_deref().filter(|q| !q.trim().is_empty()) {
            url.push_str(&format!("&query={}", urlencoding::encode(query)));
        }
        if let Some(token) = token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }
        let page = self.fetch_token_page(url, "chromeosdevices").await?;
        debug!("[Directory] device page with {} records", page.records.len());
        Ok(page)
    }

    async fn user_page(&self, token: Option<String>, size: usize) -> Result<TokenPage> {
        let mut url = format!(
            "{}?customer={}&projection=full&maxResults={}",
            self.directory_url("users"),
            urlencoding::encode(&self.config.customer_id),
            size
        );
        if let Some(token) = token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }
        self.fetch_token_page(url, "users").await
    }

    async fn telemetry_page(&self, token: Option<String>, size: usize) -> Result<TokenPage> {
        let mut url = format!(
            "{}/v1/customers/{}/telemetry/devices?pageSize={}&readMask={}",
            self.config.telemetry_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.customer_id),
            size,
            urlencoding::encode(TELEMETRY_READ_MASK)
        );
        if let Some(token) = token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }
        self.fetch_token_page(url, "devices").await
    }
}

fn token_page_from(body: Value, items_key: &str) -> TokenPage {
    let next_page_token = body
        .get("nextPageToken")
        .and_then(Value::as_str)
        .map(str::to_string);
    let records = match body {
        Value::Object(mut map) => match map.remove(items_key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    TokenPage {
        records,
        next_page_token,
    }
}

#[async_trait]
impl DirectoryProvider for DirectoryClient {
    fn list_devices(&self, query: Option<String>, max_results: usize) -> PageStream<'_> {
        token_pages(
            UpstreamSystem::Directory,
            max_results,
            DEVICE_PAGE_SIZE,
            move |token, size| {
                let query = query.clone();
                async move { self.device_page(query, token, size).await }
            },
        )
    }

    fn list_users(&self, max_results: usize) -> PageStream<'_> {
        token_pages(
            UpstreamSystem::Directory,
            max_results,
            USER_PAGE_SIZE,
            move |token, size| async move { self.user_page(token, size).await },
        )
    }

    async fn get_user(&self, email: &str) -> fleetsync_core::Result<Option<RawRecord>> {
        let url = self.directory_url(&format!(
            "users/{}?projection=full",
            urlencoding::encode(email.trim())
        ));
        self.http
            .get_json(&url, &self.headers)
            .await
            .map_err(|err| err.into_core(UpstreamSystem::Directory))
    }
}

impl TelemetryProvider for DirectoryClient {
    fn list_battery_telemetry(&self) -> PageStream<'_> {
        token_pages(
            UpstreamSystem::Directory,
            usize::MAX,
            TELEMETRY_PAGE_SIZE,
            move |token, size| async move { self.telemetry_page(token, size).await },
        )
    }
}
