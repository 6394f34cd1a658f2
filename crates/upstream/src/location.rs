//! Location Service client: where a wireless client was last seen.

use std::cmp::Ordering;

use async_trait::async_trait;
use fleetsync_core::errors::UpstreamSystem;
use fleetsync_core::upstream::{value_as_string, LocationProvider, RawRecord};
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

use crate::error::{Result, UpstreamError};
use crate::http::{HttpTransport, RetryPolicy};

const API_KEY_HEADER: &str = "x-cisco-meraki-api-key";
const NOT_ON_WIRELESS: &str = "Not on Wireless";
const UNKNOWN_NETWORK: &str = "Unknown Network";

#[derive(Debug, Clone)]
pub struct LocationConfig {
    pub base_url: String,
    pub api_key: String,
    pub org_id: String,
}

pub struct LocationClient {
    http: HttpTransport,
    base_url: String,
    org_id: String,
    headers: HeaderMap,
}

impl LocationClient {
    pub fn new(config: LocationConfig, policy: RetryPolicy) -> Result<Self> {
        if config.api_key.trim().is_empty() || config.org_id.trim().is_empty() {
            return Err(UpstreamError::auth("Location Service API key and org id are required"));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        let key = HeaderValue::from_str(config.api_key.trim())
            .map_err(|_| UpstreamError::auth("Invalid Location Service API key format"))?;
        headers.insert(API_KEY_HEADER, key);

        Ok(Self {
            http: HttpTransport::new(policy)?,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            org_id: config.org_id.trim().to_string(),
            headers,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Secondary lookups only enrich the answer; their failures read as "nothing found".
    async fn optional_get(&self, url: &str) -> Option<Value> {
        match self.http.get_json(url, &self.headers).await {
            Ok(body) => body,
            Err(err) => {
                debug!("[Location] optional lookup {} failed: {}", url, err);
                None
            }
        }
    }

    async fn current_client(&self, network_id: &str, mac: &str) -> Option<Value> {
        let url = self.url(&format!(
            "networks/{}/clients?mac={}",
            urlencoding::encode(network_id),
            urlencoding::encode(mac)
        ));
        match self.optional_get(&url).await? {
            Value::Array(clients) => clients.into_iter().next(),
            _ => None,
        }
    }

    async fn client_detail(&self, network_id: &str, mac: &str) -> Option<Value> {
        let url = self.url(&format!(
            "networks/{}/clients/{}",
            urlencoding::encode(network_id),
            mac.replace(':', "")
        ));
        self.optional_get(&url).await.filter(Value::is_object)
    }

    async fn device_name(&self, network_id: &str, device_mac: &str) -> String {
        let url = self.url(&format!("networks/{}/devices", urlencoding::encode(network_id)));
        let devices = match self.optional_get(&url).await {
            Some(Value::Array(devices)) => devices,
            _ => Vec::new(),
        };
        devices
            .iter()
            .find(|device| {
                device
                    .get("mac")
                    .and_then(Value::as_str)
                    .is_some_and(|mac| mac.eq_ignore_ascii_case(device_mac))
            })
            .and_then(|device| {
                device
                    .get("name")
                    .and_then(value_as_string)
                    .or_else(|| device.get("model").and_then(value_as_string))
            })
            .unwrap_or_else(|| format!("AP ({})", last_chars(device_mac, 8)))
    }

    /// Name of the access point behind `device_mac`, if it is one.
    async fn access_point_name(&self, network_id: &str, device_mac: &str) -> Option<String> {
        let name = self.device_name(network_id, device_mac).await;
        is_access_point_name(&name).then_some(name)
    }
}

fn last_chars(value: &str, count: usize) -> &str {
    let start = value
        .char_indices()
        .rev()
        .nth(count.saturating_sub(1))
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    &value[start..]
}

/// Switch ports show up as connection points too; only wireless gear counts.
pub fn is_access_point_name(name: &str) -> bool {
    name.to_ascii_lowercase().contains("wireless") || name.contains("AP") || name.contains("-AP-")
}

fn compare_last_seen(a: &Value, b: &Value) -> Ordering {
    let as_number = |value: &Value| match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => value_as_string(a)
            .unwrap_or_default()
            .cmp(&value_as_string(b).unwrap_or_default()),
    }
}

fn text_field(record: &Value, key: &str) -> Option<String> {
    record.get(key).and_then(value_as_string)
}

#[async_trait]
impl LocationProvider for LocationClient {
    async fn get_device_by_mac(&self, mac_address: &str) -> fleetsync_core::Result<Option<RawRecord>> {
        let url = self.url(&format!(
            "organizations/{}/clients/search?mac={}",
            urlencoding::encode(&self.org_id),
            urlencoding::encode(mac_address)
        ));
        let response = self
            .http
            .get_json(&url, &self.headers)
            .await
            .map_err(|err| err.into_core(UpstreamSystem::LocationService))?;

        let mut records = match response.as_ref().and_then(|body| body.get("records")) {
            Some(Value::Array(records)) if !records.is_empty() => records.clone(),
            _ => {
                debug!("[Location] no sightings for {}", mac_address);
                return Ok(None);
            }
        };
        records.sort_by(|a, b| {
            compare_last_seen(
                b.get("lastSeen").unwrap_or(&Value::Null),
                a.get("lastSeen").unwrap_or(&Value::Null),
            )
        });
        let search_record = records.swap_remove(0);
        let network = search_record.get("network").cloned().unwrap_or(Value::Null);
        let network_id = text_field(&network, "id");

        let client = match network_id.as_deref() {
            Some(network_id) => self.current_client(network_id, mac_address).await,
            None => None,
        }
        .unwrap_or_else(|| search_record.clone());

        let mut ap_mac = None;
        let mut ap_name = None;
        if let Some(network_id) = network_id.as_deref() {
            if let Some(detail) = self.client_detail(network_id, mac_address).await {
                ap_mac = text_field(&detail, "apMac").or_else(|| text_field(&detail, "recentDeviceMac"));
                if let Some(mac) = ap_mac.as_deref() {
                    ap_name = self.access_point_name(network_id, mac).await;
                }
            }
            if ap_name.is_none() {
                ap_mac = text_field(&client, "recentDeviceMac");
                if let Some(mac) = ap_mac.as_deref() {
                    ap_name = self.access_point_name(network_id, mac).await;
                }
            }
        }

        let network_name = client
            .get("network")
            .and_then(|network| text_field(network, "name"))
            .or_else(|| text_field(&network, "name"))
            .unwrap_or_else(|| UNKNOWN_NETWORK.to_string());

        info!(
            "[Location] {} last seen on {}",
            mac_address,
            ap_name.as_deref().unwrap_or("no access point")
        );
        Ok(Some(json!({
            "lastSeen": client.get("lastSeen").cloned().unwrap_or(Value::Null),
            "apName": ap_name.unwrap_or_else(|| NOT_ON_WIRELESS.to_string()),
            "apMac": ap_mac,
            "networkName": network_name,
            "ssid": client.get("ssid").cloned().unwrap_or(Value::Null),
            "ipAddress": client.get("ip").cloned().unwrap_or(Value::Null),
            "vlan": client.get("vlan").cloned().unwrap_or(Value::Null),
        })))
    }
}
