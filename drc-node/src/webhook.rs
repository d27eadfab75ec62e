//! Consumer callbacks delivered over HTTP.
//!
//! A contract configured with a webhook has its callbacks POSTed as JSON:
//!
//! ```json
//! { "caller": "0x…", "target": "0x…", "selector": "0xdeadbeef",
//!   "payload": "0x…", "gasLimit": 500000 }
//! ```
//!
//! The endpoint answers `{ "success": bool, "gasUsed": number }`. A non-2xx
//! status counts as a revert using the whole gas budget; an unreachable or
//! unparsable endpoint is a host failure.
//!
//! Callbacks run on the blocking threads the route handlers dispatch
//! coordinator operations to, so delivery blocks on the runtime handle.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, Selector};
use drc::host::{CallReceipt, CallRequest, HostError};
use drc::memory::CallbackHandler;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// JSON body POSTed to a callback webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCall {
    /// The coordinator.
    pub caller: Address,
    /// Callback contract.
    pub target: Address,
    /// Callback selector.
    pub selector: Selector,
    /// Fulfillment data.
    pub payload: Bytes,
    /// Gas budget of the call.
    pub gas_limit: u64,
}

/// JSON answer of a callback webhook.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookReceipt {
    /// `false` if the callback reverted.
    pub success: bool,
    /// Gas the callback consumed.
    pub gas_used: u64,
}

/// Delivers callbacks to webhooks.
#[derive(Debug, Clone)]
pub struct WebhookCaller {
    client: reqwest::Client,
    runtime: Handle,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl WebhookCaller {
    /// Creates a caller bound to `runtime`; in-flight calls fail once
    /// `shutdown` is cancelled.
    #[must_use]
    pub fn new(runtime: Handle, timeout: Duration, shutdown: CancellationToken) -> Self {
        Self {
            client: reqwest::Client::new(),
            runtime,
            timeout,
            shutdown,
        }
    }

    /// Callback handler forwarding every call to `url`.
    #[must_use]
    pub fn handler(&self, url: Url) -> CallbackHandler {
        let caller = self.clone();
        Arc::new(move |request: &CallRequest| caller.call(&url, request))
    }

    /// POSTs `request` to `url` and waits for the receipt.
    ///
    /// Must not be called from inside an async task.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Call`] if the endpoint cannot be reached, times
    /// out, answers garbage or the node is shutting down.
    pub fn call(&self, url: &Url, request: &CallRequest) -> Result<CallReceipt, HostError> {
        let failed = |reason: String| HostError::Call {
            target: request.target,
            reason,
        };
        let body = WebhookCall {
            caller: request.caller,
            target: request.target,
            selector: request.selector,
            payload: request.payload.clone(),
            gas_limit: request.gas_limit,
        };
        let delivery = async {
            let response = self
                .client
                .post(url.clone())
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await
                .map_err(|e| failed(e.to_string()))?;
            if !response.status().is_success() {
                tracing::warn!(%url, status = %response.status(), "Callback webhook rejected call");
                return Ok(CallReceipt {
                    success: false,
                    gas_used: request.gas_limit,
                });
            }
            let receipt: WebhookReceipt = response
                .json()
                .await
                .map_err(|e| failed(format!("invalid receipt: {e}")))?;
            Ok::<_, HostError>(CallReceipt {
                success: receipt.success,
                gas_used: receipt.gas_used,
            })
        };

        self.runtime.block_on(async {
            tokio::select! {
                result = delivery => result,
                () = self.shutdown.cancelled() => Err(failed("node is shutting down".to_owned())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(target: Address) -> CallRequest {
        CallRequest {
            caller: Address::repeat_byte(0xc0),
            target,
            selector: Selector::new([0xde, 0xad, 0xbe, 0xef]),
            payload: Bytes::from_static(b"\x01\x02"),
            gas_limit: 400_000,
        }
    }

    async fn deliver(
        caller: WebhookCaller,
        url: Url,
        request: CallRequest,
    ) -> Result<CallReceipt, HostError> {
        tokio::task::spawn_blocking(move || caller.call(&url, &request))
            .await
            .unwrap()
    }

    fn caller() -> WebhookCaller {
        WebhookCaller::new(
            Handle::current(),
            Duration::from_secs(5),
            CancellationToken::new(),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_receipt_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/callback"))
            .and(body_partial_json(serde_json::json!({
                "selector": "0xdeadbeef",
                "payload": "0x0102",
                "gasLimit": 400_000,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "gasUsed": 90_000,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/callback", server.uri())).unwrap();
        let receipt = deliver(caller(), url, request(Address::repeat_byte(0xb1)))
            .await
            .unwrap();
        assert_eq!(
            receipt,
            CallReceipt {
                success: true,
                gas_used: 90_000
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_error_status_is_a_revert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let receipt = deliver(caller(), url, request(Address::repeat_byte(0xb1)))
            .await
            .unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.gas_used, 400_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_garbage_receipt_is_a_host_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let target = Address::repeat_byte(0xb1);
        let url = Url::parse(&server.uri()).unwrap();
        let err = deliver(caller(), url, request(target)).await.unwrap_err();
        assert!(matches!(err, HostError::Call { target: t, .. } if t == target));
    }
}
