pub type CustomResult<T, E> = error_stack::Result<T, E>;

/// Terminal outcomes for a single gateway call. None of these are retried by
/// this layer.
#[derive(Debug, thiserror::Error)]
pub enum PayError {
    #[error("request data failed send validation")]
    SendValidation,
    #[error("could not reach the payment gateway")]
    Transport,
    #[error("gateway reported failure: {message}")]
    ReturnCodeFailure { message: String },
    #[error("response header fields failed validation")]
    HeaderValidation,
    #[error("appid in response does not belong to the calling app")]
    AppIdMismatch,
    #[error("mch_id in response does not belong to the calling merchant")]
    MerchantIdMismatch,
    #[error("business payload failed result validation")]
    ResultValidation,
    #[error("envelope signature did not verify")]
    SignatureMismatch,
    #[error("failed to encode request body")]
    RequestEncodingFailed,
    #[error("failed to decode gateway response")]
    ResponseDecodingFailed,
}

/// Failures internal to the HTTP client. Converted to [`PayError::Transport`]
/// at the pipeline boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("url encoding failed")]
    UrlEncodingFailed,
    #[error("failed to construct the http client")]
    ClientConstructionFailed,
    #[error("failed to decode certificate material")]
    CertificateDecodeFailed,
    #[error("invalid proxy configuration")]
    InvalidProxyConfiguration,
    #[error("request was not sent: {0}")]
    RequestNotSent(String),
    #[error("request timed out")]
    RequestTimeoutReceived,
    #[error("failed to read response body")]
    ResponseDecodingFailed,
    #[error("unexpected response from server")]
    UnexpectedServerResponse,
}
