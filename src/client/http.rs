//! Bundled read-only venue client. Covers the full info surface over plain
//! HTTPS; signed exchange writes live in external transports and are
//! injected behind the [`VenueClient`] trait.

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::types::*;
use super::{ClientError, ClientResult, VenueClient};

const MAINNET_INFO_URL: &str = "https://api.hyperliquid.xyz/info";
const TESTNET_INFO_URL: &str = "https://api.hyperliquid-testnet.xyz/info";

const REQUEST_TIMEOUT_MS: u64 = 10_000;

pub struct HttpVenueClient {
    client: reqwest::Client,
    endpoint: &'static str,
}

impl HttpVenueClient {
    pub fn mainnet() -> Self {
        Self::new(false)
    }

    pub fn testnet() -> Self {
        Self::new(true)
    }

    pub fn new(testnet: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(REQUEST_TIMEOUT_MS))
            .user_agent(concat!("hyperprime/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client construction is infallible with static options");

        Self {
            client,
            endpoint: if testnet {
                TESTNET_INFO_URL
            } else {
                MAINNET_INFO_URL
            },
        }
    }

    async fn request<T: DeserializeOwned>(&self, body: serde_json::Value) -> ClientResult<T> {
        let resp = self
            .client
            .post(self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(REQUEST_TIMEOUT_MS)
                } else {
                    ClientError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn unsigned(op: &str) -> ClientError {
        ClientError::Unsupported(format!(
            "{op} requires a signing transport; the bundled client is read-only"
        ))
    }
}

#[async_trait]
impl VenueClient for HttpVenueClient {
    async fn meta(&self) -> ClientResult<PerpMeta> {
        self.request(json!({ "type": "meta" })).await
    }

    async fn meta_and_asset_ctxs(
        &self,
        dex: Option<&str>,
    ) -> ClientResult<(PerpMeta, Vec<AssetContext>)> {
        let body = match dex {
            Some(dex) => json!({ "type": "metaAndAssetCtxs", "dex": dex }),
            None => json!({ "type": "metaAndAssetCtxs" }),
        };
        self.request(body).await
    }

    async fn perp_dexs(&self) -> ClientResult<Vec<Option<PerpDex>>> {
        self.request(json!({ "type": "perpDexs" })).await
    }

    async fn spot_meta(&self) -> ClientResult<SpotMeta> {
        self.request(json!({ "type": "spotMeta" })).await
    }

    async fn l2_book(&self, coin: &str) -> ClientResult<L2Book> {
        self.request(json!({ "type": "l2Book", "coin": coin })).await
    }

    async fn clearinghouse_state(&self, user: Address) -> ClientResult<ClearinghouseState> {
        self.request(json!({ "type": "clearinghouseState", "user": user }))
            .await
    }

    async fn spot_clearinghouse_state(&self, user: Address) -> ClientResult<SpotBalances> {
        self.request(json!({ "type": "spotClearinghouseState", "user": user }))
            .await
    }

    async fn open_orders(&self, user: Address) -> ClientResult<Vec<OpenOrder>> {
        self.request(json!({ "type": "openOrders", "user": user }))
            .await
    }

    async fn user_fills(&self, user: Address) -> ClientResult<Vec<UserFill>> {
        self.request(json!({ "type": "userFills", "user": user }))
            .await
    }

    async fn funding_history(
        &self,
        coin: &str,
        start_ms: u64,
        end_ms: Option<u64>,
    ) -> ClientResult<Vec<FundingEntry>> {
        let mut body = json!({
            "type": "fundingHistory",
            "coin": coin,
            "startTime": start_ms,
        });
        if let Some(end) = end_ms {
            body["endTime"] = json!(end);
        }
        self.request(body).await
    }

    async fn max_builder_fee(&self, user: Address, builder: Address) -> ClientResult<u64> {
        self.request(json!({
            "type": "maxBuilderFee",
            "user": user,
            "builder": builder,
        }))
        .await
    }

    async fn place_order(
        &self,
        _order: &OrderRequest,
        _builder: Option<&BuilderInfo>,
    ) -> ClientResult<ExchangeResponseStatus> {
        Err(Self::unsigned("place_order"))
    }

    async fn batch_orders(
        &self,
        _orders: &[OrderRequest],
        _builder: Option<&BuilderInfo>,
    ) -> ClientResult<ExchangeResponseStatus> {
        Err(Self::unsigned("batch_orders"))
    }

    async fn cancel_order(&self, _cancel: &CancelRequest) -> ClientResult<ExchangeResponseStatus> {
        Err(Self::unsigned("cancel_order"))
    }

    async fn approve_builder_fee(
        &self,
        _builder: Address,
        _max_fee_rate: &str,
    ) -> ClientResult<ExchangeResponseStatus> {
        Err(Self::unsigned("approve_builder_fee"))
    }

    async fn usd_class_transfer(
        &self,
        _amount: f64,
        _to_perp: bool,
    ) -> ClientResult<ExchangeResponseStatus> {
        Err(Self::unsigned("usd_class_transfer"))
    }

    async fn set_dex_abstraction(&self, _enabled: bool) -> ClientResult<ExchangeResponseStatus> {
        Err(Self::unsigned("set_dex_abstraction"))
    }

    async fn set_leverage(
        &self,
        _coin: &str,
        _leverage: u32,
        _is_cross: bool,
    ) -> ClientResult<ExchangeResponseStatus> {
        Err(Self::unsigned("set_leverage"))
    }
}
