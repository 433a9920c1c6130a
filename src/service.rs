use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use error_stack::{report, ResultExt};
use masking::{ExposeInterface, Secret};
use once_cell::sync::OnceCell;
use reqwest::Client;
use tracing::field::Empty;

use crate::consts::BASE64_ENGINE;
use crate::errors::{ApiClientError, CustomResult};
use crate::request::{Method, Request};
use crate::types::Proxy;

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status_code: u16,
    pub response: Bytes,
}

/// Boundary to the authenticated channel. The adapter owns no retry policy
/// and no response interpretation; timeouts surface as transport errors.
#[async_trait]
pub trait PayTransport: Send + Sync {
    async fn send(
        &self,
        request: Request,
    ) -> CustomResult<Result<TransportResponse, TransportResponse>, ApiClientError>;
}

pub struct ReqwestTransport {
    proxy: Proxy,
}

impl ReqwestTransport {
    pub fn new(proxy: Proxy) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl PayTransport for ReqwestTransport {
    #[tracing::instrument(
        name = "call_gateway",
        skip_all,
        fields(
            request.url = %request.url,
            request.method = %request.method,
            response.status_code = Empty,
            latency = Empty,
        )
    )]
    async fn send(
        &self,
        request: Request,
    ) -> CustomResult<Result<TransportResponse, TransportResponse>, ApiClientError> {
        let start = tokio::time::Instant::now();
        let url =
            reqwest::Url::parse(&request.url).change_context(ApiClientError::UrlEncodingFailed)?;
        let should_bypass_proxy = self.proxy.bypass_proxy_urls.contains(&url.to_string());
        let client = create_client(
            &self.proxy,
            should_bypass_proxy,
            request.certificate.clone(),
            request.certificate_key.clone(),
        )?;

        let mut request_builder = match request.method {
            Method::Get => client.get(url),
            Method::Post => client.post(url),
        };
        for (name, value) in &request.headers {
            request_builder = request_builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            let content_type = body.content_type();
            let rendered = body
                .render()
                .change_context(ApiClientError::UrlEncodingFailed)?;
            request_builder = request_builder
                .body(rendered)
                .header("Content-Type", content_type);
        }

        let response = request_builder.send().await.map_err(|error| {
            let api_error = if error.is_timeout() {
                ApiClientError::RequestTimeoutReceived
            } else {
                ApiClientError::RequestNotSent(error.to_string())
            };
            tracing::error!(?api_error, "unable to send request to the gateway");
            report!(api_error)
        })?;

        tracing::Span::current().record("response.status_code", u64::from(response.status().as_u16()));
        tracing::Span::current().record("latency", start.elapsed().as_millis() as u64);
        handle_response(response).await
    }
}

static NON_PROXIED_CLIENT: OnceCell<Client> = OnceCell::new();
static PROXIED_CLIENT: OnceCell<Client> = OnceCell::new();

pub fn create_client(
    proxy_config: &Proxy,
    should_bypass_proxy: bool,
    client_certificate: Option<Secret<String>>,
    client_certificate_key: Option<Secret<String>>,
) -> CustomResult<Client, ApiClientError> {
    match (client_certificate, client_certificate_key) {
        (Some(encoded_certificate), Some(encoded_certificate_key)) => {
            let client_builder = get_client_builder(proxy_config, should_bypass_proxy)?;
            let identity = create_identity_from_certificate_and_key(
                encoded_certificate,
                encoded_certificate_key,
            )?;
            client_builder
                .identity(identity)
                .use_rustls_tls()
                .build()
                .change_context(ApiClientError::ClientConstructionFailed)
        }
        _ => get_base_client(proxy_config, should_bypass_proxy),
    }
}

fn get_base_client(
    proxy_config: &Proxy,
    should_bypass_proxy: bool,
) -> CustomResult<Client, ApiClientError> {
    Ok(if should_bypass_proxy
        || (proxy_config.http_url.is_none() && proxy_config.https_url.is_none())
    {
        &NON_PROXIED_CLIENT
    } else {
        &PROXIED_CLIENT
    }
    .get_or_try_init(|| {
        get_client_builder(proxy_config, should_bypass_proxy)?
            .build()
            .change_context(ApiClientError::ClientConstructionFailed)
    })?
    .clone())
}

fn get_client_builder(
    proxy_config: &Proxy,
    should_bypass_proxy: bool,
) -> CustomResult<reqwest::ClientBuilder, ApiClientError> {
    let mut client_builder = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_idle_timeout(Duration::from_secs(
            proxy_config
                .idle_pool_connection_timeout
                .unwrap_or_default(),
        ));

    if should_bypass_proxy {
        return Ok(client_builder);
    }

    if let Some(url) = proxy_config.https_url.as_ref() {
        client_builder = client_builder.proxy(
            reqwest::Proxy::https(url)
                .change_context(ApiClientError::InvalidProxyConfiguration)?,
        );
    }

    if let Some(url) = proxy_config.http_url.as_ref() {
        client_builder = client_builder.proxy(
            reqwest::Proxy::http(url)
                .change_context(ApiClientError::InvalidProxyConfiguration)?,
        );
    }

    Ok(client_builder)
}

pub fn create_identity_from_certificate_and_key(
    encoded_certificate: Secret<String>,
    encoded_certificate_key: Secret<String>,
) -> CustomResult<reqwest::Identity, ApiClientError> {
    let decoded_certificate = BASE64_ENGINE
        .decode(encoded_certificate.expose())
        .change_context(ApiClientError::CertificateDecodeFailed)?;

    let decoded_certificate_key = BASE64_ENGINE
        .decode(encoded_certificate_key.expose())
        .change_context(ApiClientError::CertificateDecodeFailed)?;

    let certificate = String::from_utf8(decoded_certificate)
        .change_context(ApiClientError::CertificateDecodeFailed)?;
    let certificate_key = String::from_utf8(decoded_certificate_key)
        .change_context(ApiClientError::CertificateDecodeFailed)?;

    let key_chain = format!("{certificate_key}{certificate}");
    reqwest::Identity::from_pem(key_chain.as_bytes())
        .change_context(ApiClientError::CertificateDecodeFailed)
}

async fn handle_response(
    response: reqwest::Response,
) -> CustomResult<Result<TransportResponse, TransportResponse>, ApiClientError> {
    let status_code = response.status().as_u16();
    match status_code {
        200..=202 | 204 | 302 => {
            let response = response
                .bytes()
                .await
                .change_context(ApiClientError::ResponseDecodingFailed)?;
            Ok(Ok(TransportResponse {
                status_code,
                response,
            }))
        }
        400..=599 => {
            let response = response
                .bytes()
                .await
                .change_context(ApiClientError::ResponseDecodingFailed)?;
            Ok(Err(TransportResponse {
                status_code,
                response,
            }))
        }
        _ => Err(report!(ApiClientError::UnexpectedServerResponse)),
    }
}
