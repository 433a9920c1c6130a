use std::collections::BTreeMap;

use masking::Secret;

/// Flat field mapping as it travels on the wire. Ordered so canonicalization
/// is insertion-order independent.
pub type Envelope = BTreeMap<String, String>;

#[derive(Clone, Debug)]
pub struct AppIdentity {
    pub app_id: String,
}

#[derive(Clone, Debug)]
pub struct MerchantIdentity {
    pub mch_id: String,
    pub api_key: Secret<String>,
}

#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub device_info: String,
}

/// Base64-encoded PEM pair issued by the merchant portal, required for the
/// refund family of calls.
#[derive(Clone, Debug)]
pub struct ClientCertificate {
    pub certificate: Secret<String>,
    pub private_key: Secret<String>,
}

fn default_base_url() -> String {
    "https://api.mch.weixin.qq.com/".to_string()
}

/// Gateway endpoints, constructed at startup and passed explicitly.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Endpoints {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Endpoints {
    pub fn unified_order(&self) -> String {
        format!("{}pay/unifiedorder", self.base_url)
    }

    pub fn order_query(&self) -> String {
        format!("{}pay/orderquery", self.base_url)
    }

    pub fn close_order(&self) -> String {
        format!("{}pay/closeorder", self.base_url)
    }

    pub fn refund(&self) -> String {
        format!("{}secapi/pay/refund", self.base_url)
    }

    pub fn refund_query(&self) -> String {
        format!("{}pay/refundquery", self.base_url)
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct Proxy {
    #[serde(default)]
    pub http_url: Option<String>,
    #[serde(default)]
    pub https_url: Option<String>,
    #[serde(default)]
    pub idle_pool_connection_timeout: Option<u64>,
    #[serde(default)]
    pub bypass_proxy_urls: Vec<String>,
}

/// Successful terminal state of a call: the extracted business fields when a
/// result schema was supplied, plus the raw envelope either way.
#[derive(Clone, Debug, PartialEq)]
pub struct PayOutcome {
    pub result: Option<Envelope>,
    pub envelope: Envelope,
}
