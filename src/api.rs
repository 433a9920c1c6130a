use error_stack::{report, ResultExt};
use once_cell::sync::Lazy;

use crate::errors::{CustomResult, PayError};
use crate::request::{self, Method, Request, RequestContent};
use crate::response;
use crate::schema::{FieldKind, FieldRule, FieldSchema};
use crate::service::PayTransport;
use crate::types::{
    AppIdentity, ClientCertificate, DeviceInfo, Endpoints, Envelope, MerchantIdentity, PayOutcome,
};
use crate::xml;

static UNIFIED_ORDER_SEND: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::new()
        .field("body", FieldRule::required(FieldKind::Text))
        .field("out_trade_no", FieldRule::required(FieldKind::Text))
        .field("total_fee", FieldRule::required(FieldKind::Numeric))
        .field("spbill_create_ip", FieldRule::required(FieldKind::Text))
        .field("notify_url", FieldRule::required(FieldKind::Text))
        .field("trade_type", FieldRule::required(FieldKind::Text))
        .field("detail", FieldRule::optional(FieldKind::Text))
        .field("attach", FieldRule::optional(FieldKind::Text))
        .field("fee_type", FieldRule::optional(FieldKind::Text))
        .field("time_start", FieldRule::optional(FieldKind::Numeric))
        .field("time_expire", FieldRule::optional(FieldKind::Numeric))
        .field("goods_tag", FieldRule::optional(FieldKind::Text))
        .field("product_id", FieldRule::optional(FieldKind::Text))
        .field("limit_pay", FieldRule::optional(FieldKind::Text))
        .field("openid", FieldRule::optional(FieldKind::Text))
});

static UNIFIED_ORDER_RESULT: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::new()
        .field("prepay_id", FieldRule::required(FieldKind::Text))
        .field("trade_type", FieldRule::required(FieldKind::Text))
        .field("code_url", FieldRule::optional(FieldKind::Text))
});

static ORDER_QUERY_SEND: Lazy<FieldSchema> =
    Lazy::new(|| FieldSchema::new().any_of(&["transaction_id", "out_trade_no"]));

static CLOSE_ORDER_SEND: Lazy<FieldSchema> =
    Lazy::new(|| FieldSchema::new().field("out_trade_no", FieldRule::required(FieldKind::Text)));

static REFUND_SEND: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::new()
        .any_of(&["transaction_id", "out_trade_no"])
        .field("out_refund_no", FieldRule::required(FieldKind::Text))
        .field("total_fee", FieldRule::required(FieldKind::Numeric))
        .field("refund_fee", FieldRule::required(FieldKind::Numeric))
        .field("op_user_id", FieldRule::required(FieldKind::Text))
        .field("refund_fee_type", FieldRule::optional(FieldKind::Text))
});

static REFUND_RESULT: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::new()
        .field("refund_id", FieldRule::required(FieldKind::Text))
        .field("out_refund_no", FieldRule::required(FieldKind::Text))
        .field("refund_fee", FieldRule::optional(FieldKind::Numeric))
});

static REFUND_QUERY_SEND: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::new().any_of(&[
        "refund_id",
        "out_refund_no",
        "transaction_id",
        "out_trade_no",
    ])
});

/// Thin per-operation wrappers over the shared prepare/send/handle pipeline.
pub struct WeixinPay<T> {
    transport: T,
    endpoints: Endpoints,
}

impl<T: PayTransport> WeixinPay<T> {
    pub fn new(transport: T, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub async fn unified_order(
        &self,
        app: &AppIdentity,
        merchant: &MerchantIdentity,
        device: Option<&DeviceInfo>,
        data: &Envelope,
    ) -> CustomResult<PayOutcome, PayError> {
        self.execute(
            self.endpoints.unified_order(),
            data,
            &UNIFIED_ORDER_SEND,
            Some(&UNIFIED_ORDER_RESULT),
            app,
            merchant,
            device,
            None,
        )
        .await
    }

    pub async fn order_query(
        &self,
        app: &AppIdentity,
        merchant: &MerchantIdentity,
        data: &Envelope,
    ) -> CustomResult<PayOutcome, PayError> {
        self.execute(
            self.endpoints.order_query(),
            data,
            &ORDER_QUERY_SEND,
            None,
            app,
            merchant,
            None,
            None,
        )
        .await
    }

    pub async fn close_order(
        &self,
        app: &AppIdentity,
        merchant: &MerchantIdentity,
        data: &Envelope,
    ) -> CustomResult<PayOutcome, PayError> {
        self.execute(
            self.endpoints.close_order(),
            data,
            &CLOSE_ORDER_SEND,
            None,
            app,
            merchant,
            None,
            None,
        )
        .await
    }

    /// Refunds ride the mutually authenticated endpoint; the merchant client
    /// certificate is checked before anything goes on the wire.
    pub async fn refund(
        &self,
        app: &AppIdentity,
        merchant: &MerchantIdentity,
        data: &Envelope,
        certificate: Option<&ClientCertificate>,
    ) -> CustomResult<PayOutcome, PayError> {
        let Some(certificate) = certificate else {
            return Err(report!(PayError::SendValidation)
                .attach_printable("refund requires the merchant client certificate"));
        };
        self.execute(
            self.endpoints.refund(),
            data,
            &REFUND_SEND,
            Some(&REFUND_RESULT),
            app,
            merchant,
            None,
            Some(certificate),
        )
        .await
    }

    pub async fn refund_query(
        &self,
        app: &AppIdentity,
        merchant: &MerchantIdentity,
        data: &Envelope,
    ) -> CustomResult<PayOutcome, PayError> {
        self.execute(
            self.endpoints.refund_query(),
            data,
            &REFUND_QUERY_SEND,
            None,
            app,
            merchant,
            None,
            None,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(name = "execute_pay_call", skip_all, fields(request.url = %url))]
    async fn execute(
        &self,
        url: String,
        data: &Envelope,
        send_schema: &FieldSchema,
        result_schema: Option<&FieldSchema>,
        app: &AppIdentity,
        merchant: &MerchantIdentity,
        device: Option<&DeviceInfo>,
        certificate: Option<&ClientCertificate>,
    ) -> CustomResult<PayOutcome, PayError> {
        let envelope = request::prepare(data, send_schema, app, merchant, device)?;

        let mut logged = envelope.clone();
        logged.insert("sign".to_string(), "*** redacted ***".to_string());
        tracing::debug!(request = %serde_json::json!(logged), "prepared gateway envelope");

        let mut outbound = Request::new(Method::Post, &url);
        outbound.body = Some(RequestContent::Xml(envelope));
        if let Some(certificate) = certificate {
            outbound.certificate = Some(certificate.certificate.clone());
            outbound.certificate_key = Some(certificate.private_key.clone());
        }

        let delivery = self
            .transport
            .send(outbound)
            .await
            .change_context(PayError::Transport)?;
        let body = match delivery {
            Ok(body) => body,
            Err(body) => {
                return Err(report!(PayError::Transport).attach_printable(format!(
                    "gateway answered with http status {}",
                    body.status_code
                )));
            }
        };

        let inbound = xml::decode(&body.response)?;
        tracing::debug!(fields = inbound.len(), "decoded gateway envelope");
        response::handle(app, merchant, &inbound, result_schema)
    }
}
