//! Server-to-server integration with the Weixin Pay v2 gateway: signed XML
//! envelopes out, validated two-level success/failure envelopes back in,
//! plus asynchronous payment-notification handling.

pub mod api;
pub mod consts;
pub mod errors;
pub mod notify;
pub mod request;
pub mod response;
pub mod schema;
pub mod service;
pub mod sign;
pub mod types;
pub mod xml;

pub use api::WeixinPay;
pub use errors::{CustomResult, PayError};
pub use service::{PayTransport, ReqwestTransport, TransportResponse};
pub use types::{
    AppIdentity, ClientCertificate, DeviceInfo, Endpoints, Envelope, MerchantIdentity, PayOutcome,
    Proxy,
};
