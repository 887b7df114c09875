//! Oracle client: typed subscription to Pyth price accounts
//!
//! A [`PriceFeed`] delivers one [`PriceUpdate`] per observed price account
//! change into a registered channel. The sink must be registered before
//! `start`; `stop` drops the subscription and any notifications still in
//! flight on the websocket. Every update carries the generation of the
//! subscription that produced it, so a consumer can tell late notifications
//! from a stopped subscription apart from current ones.

use crate::catalog;
use crate::error::{IndexerError, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use pyth_sdk_solana::state::{
    load_mapping_account, load_price_account, load_product_account, MappingAccount, PriceStatus,
    ProductAccount, SolanaPriceAccount,
};
use solana_account_decoder::UiAccountEncoding;
use solana_client::{nonblocking::pubsub_client::PubsubClient, rpc_config::RpcAccountInfoConfig};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Channel end a feed publishes into
pub type UpdateSink = mpsc::UnboundedSender<PriceUpdate>;

/// Product descriptor delivered alongside each sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub product_account: Pubkey,
    pub symbol: Option<String>,
}

/// One price observation for one oracle account
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSample {
    pub account_id: Pubkey,
    /// None when the oracle has no valid current price
    pub price: Option<f64>,
    pub confidence: Option<f64>,
    pub received_at: DateTime<Utc>,
}

impl PriceSample {
    pub fn priced(account_id: Pubkey, price: f64, confidence: f64) -> Self {
        Self {
            account_id,
            price: Some(price),
            confidence: Some(confidence),
            received_at: Utc::now(),
        }
    }

    pub fn unavailable(account_id: Pubkey) -> Self {
        Self {
            account_id,
            price: None,
            confidence: None,
            received_at: Utc::now(),
        }
    }

    /// Both price and confidence are present
    pub fn is_valid(&self) -> bool {
        self.price.is_some() && self.confidence.is_some()
    }
}

/// Notification payload: (product, sample)
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub product: ProductInfo,
    pub sample: PriceSample,
    /// Subscription generation that delivered this update
    pub generation: u64,
}

impl PriceUpdate {
    pub fn new(product: ProductInfo, sample: PriceSample) -> Self {
        Self {
            product,
            sample,
            generation: 0,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

/// Oracle client interface consumed by the sampling aggregator
pub trait PriceFeed: Send {
    /// Register the channel updates are delivered to
    fn register(&mut self, sink: UpdateSink);

    /// Begin delivering updates stamped with `generation`. No-op if
    /// already running.
    fn start(&mut self, generation: u64) -> Result<()>;

    /// Stop delivering updates
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Convert an aggregate Pyth price into a sample.
///
/// Price and confidence are scaled by `10^expo`. Anything but a trading
/// status yields an unavailable sample.
pub fn sample_from_aggregate(
    account_id: Pubkey,
    price: i64,
    conf: u64,
    expo: i32,
    trading: bool,
) -> PriceSample {
    if !trading {
        return PriceSample::unavailable(account_id);
    }

    let scale = 10f64.powi(expo);
    PriceSample::priced(account_id, price as f64 * scale, conf as f64 * scale)
}

/// Parse a raw Pyth price account into an update
pub fn parse_price_account(account_id: Pubkey, data: &[u8]) -> Result<PriceUpdate> {
    let account: &SolanaPriceAccount = load_price_account(data).map_err(|e| {
        IndexerError::Feed(format!("{} is not a price account: {:?}", account_id, e))
    })?;

    let agg = &account.agg;
    let sample = sample_from_aggregate(
        account_id,
        agg.price,
        agg.conf,
        account.expo,
        matches!(agg.status, PriceStatus::Trading),
    );

    let product = ProductInfo {
        product_account: Pubkey::new_from_array(account.prod.to_bytes()),
        symbol: catalog::symbol_for(&account_id).map(str::to_string),
    };

    Ok(PriceUpdate::new(product, sample))
}

/// Product header: magic, version, type, size, price account
const PRODUCT_HEADER_SIZE: usize = 48;

/// One page of a Pyth mapping account linked list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingPage {
    pub products: Vec<Pubkey>,
    pub next: Option<Pubkey>,
}

/// A product listed by a mapping account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductListing {
    pub product: ProductInfo,
    pub price_account: Pubkey,
    pub attributes: Vec<(String, String)>,
}

impl ProductListing {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a raw Pyth mapping account
pub fn parse_mapping_account(account_id: Pubkey, data: &[u8]) -> Result<MappingPage> {
    let mapping: &MappingAccount = load_mapping_account(data).map_err(|e| {
        IndexerError::Feed(format!("{} is not a mapping account: {:?}", account_id, e))
    })?;

    let count = (mapping.num as usize).min(mapping.products.len());
    let products = mapping.products[..count]
        .iter()
        .map(|key| Pubkey::new_from_array(key.to_bytes()))
        .collect();

    let next = Pubkey::new_from_array(mapping.next.to_bytes());
    Ok(MappingPage {
        products,
        next: (next != Pubkey::default()).then_some(next),
    })
}

/// Parse a raw Pyth product account. The symbol comes from the `symbol`
/// attribute.
pub fn parse_product_account(product_account: Pubkey, data: &[u8]) -> Result<ProductListing> {
    let product: &ProductAccount = load_product_account(data).map_err(|e| {
        IndexerError::Feed(format!("{} is not a product account: {:?}", product_account, e))
    })?;

    let used = product.size as usize;
    if used < PRODUCT_HEADER_SIZE || used > std::mem::size_of::<ProductAccount>() {
        return Err(IndexerError::Feed(format!(
            "product account {} reports size {}",
            product_account, used
        )));
    }

    let attributes: Vec<(String, String)> = product
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let symbol = attributes
        .iter()
        .find(|(k, _)| k == "symbol")
        .map(|(_, v)| v.clone());

    Ok(ProductListing {
        product: ProductInfo {
            product_account,
            symbol,
        },
        price_account: Pubkey::new_from_array(product.px_acc.to_bytes()),
        attributes,
    })
}

/// Websocket-backed Pyth price feed
pub struct PythFeed {
    ws_url: String,
    watched: Vec<Pubkey>,
    sink: Option<UpdateSink>,
    task: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
    generation: u64,
}

impl PythFeed {
    pub fn new(ws_url: impl Into<String>, watched: Vec<Pubkey>) -> Self {
        Self {
            ws_url: ws_url.into(),
            watched,
            sink: None,
            task: None,
            generation: 0,
        }
    }

    /// Generation of the most recently started subscription
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl PriceFeed for PythFeed {
    fn register(&mut self, sink: UpdateSink) {
        self.sink = Some(sink);
    }

    fn start(&mut self, generation: u64) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let sink = self
            .sink
            .clone()
            .ok_or_else(|| IndexerError::Feed("no update handler registered".to_string()))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_subscription(
            self.ws_url.clone(),
            self.watched.clone(),
            sink,
            generation,
            shutdown_rx,
        ));

        log::debug!(
            "Price feed generation {} started for {} accounts",
            generation,
            self.watched.len()
        );
        self.generation = generation;
        self.task = Some((shutdown_tx, handle));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some((shutdown, _handle)) = self.task.take() {
            // Receiver gone means the task already exited
            let _ = shutdown.send(());
            log::debug!("Price feed stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }
}

impl Drop for PythFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_subscription(
    ws_url: String,
    watched: Vec<Pubkey>,
    sink: UpdateSink,
    generation: u64,
    mut shutdown: oneshot::Receiver<()>,
) {
    let pubsub = match PubsubClient::new(&ws_url).await {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to connect to {}: {}", ws_url, e);
            return;
        }
    };

    let config = RpcAccountInfoConfig {
        encoding: Some(UiAccountEncoding::Base64),
        commitment: Some(CommitmentConfig::confirmed()),
        ..RpcAccountInfoConfig::default()
    };

    let mut streams = Vec::with_capacity(watched.len());
    let mut unsubscribes = Vec::with_capacity(watched.len());
    for key in watched {
        match pubsub.account_subscribe(&key, Some(config.clone())).await {
            Ok((stream, unsubscribe)) => {
                streams.push(stream.map(move |response| (key, response)));
                unsubscribes.push(unsubscribe);
            }
            Err(e) => log::warn!("Failed to subscribe to {}: {}", key, e),
        }
    }

    let mut merged = futures::stream::select_all(streams);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            next = merged.next() => {
                let Some((key, response)) = next else {
                    log::warn!("Price subscriptions closed by the cluster");
                    break;
                };
                let Some(data) = response.value.data.decode() else {
                    log::debug!("Undecodable account data for {}", key);
                    continue;
                };
                match parse_price_account(key, &data) {
                    Ok(update) => {
                        if sink.send(update.with_generation(generation)).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::debug!("{}", e),
                }
            }
        }
    }

    drop(merged);
    for unsubscribe in unsubscribes {
        unsubscribe().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0xa1b2c3d4;
    const VERSION: u32 = 2;
    const MAPPING_TYPE: u32 = 1;
    const PRODUCT_TYPE: u32 = 2;

    fn header(data: &mut [u8], atype: u32, size: u32) {
        data[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        data[4..8].copy_from_slice(&VERSION.to_le_bytes());
        data[8..12].copy_from_slice(&atype.to_le_bytes());
        data[12..16].copy_from_slice(&size.to_le_bytes());
    }

    fn mapping_data(products: &[Pubkey], next: Pubkey) -> Vec<u8> {
        let mut data = vec![0u8; std::mem::size_of::<MappingAccount>()];
        header(&mut data, MAPPING_TYPE, 56 + 32 * products.len() as u32);
        data[16..20].copy_from_slice(&(products.len() as u32).to_le_bytes());
        data[24..56].copy_from_slice(next.as_ref());
        for (i, key) in products.iter().enumerate() {
            let at = 56 + 32 * i;
            data[at..at + 32].copy_from_slice(key.as_ref());
        }
        data
    }

    fn product_data(price_account: Pubkey, attributes: &[(&str, &str)]) -> Vec<u8> {
        let mut attr = Vec::new();
        for (k, v) in attributes {
            attr.push(k.len() as u8);
            attr.extend_from_slice(k.as_bytes());
            attr.push(v.len() as u8);
            attr.extend_from_slice(v.as_bytes());
        }

        let mut data = vec![0u8; std::mem::size_of::<ProductAccount>()];
        header(&mut data, PRODUCT_TYPE, (PRODUCT_HEADER_SIZE + attr.len()) as u32);
        data[16..48].copy_from_slice(price_account.as_ref());
        data[48..48 + attr.len()].copy_from_slice(&attr);
        data
    }

    #[test]
    fn test_parse_mapping_lists_products() {
        let products = [Pubkey::new_unique(), Pubkey::new_unique()];
        let data = mapping_data(&products, Pubkey::default());

        let page = parse_mapping_account(Pubkey::new_unique(), &data).unwrap();
        assert_eq!(page.products, products.to_vec());
        assert_eq!(page.next, None);
    }

    #[test]
    fn test_parse_mapping_follows_next() {
        let next = Pubkey::new_unique();
        let data = mapping_data(&[Pubkey::new_unique()], next);

        let page = parse_mapping_account(Pubkey::new_unique(), &data).unwrap();
        assert_eq!(page.next, Some(next));
    }

    #[test]
    fn test_parse_product_symbol_from_attributes() {
        let product_account = Pubkey::new_unique();
        let price_account = Pubkey::new_unique();
        let data = product_data(
            price_account,
            &[("asset_type", "Crypto"), ("symbol", "Crypto.SOL/USD")],
        );

        let listing = parse_product_account(product_account, &data).unwrap();
        assert_eq!(listing.product.product_account, product_account);
        assert_eq!(listing.product.symbol.as_deref(), Some("Crypto.SOL/USD"));
        assert_eq!(listing.price_account, price_account);
        assert_eq!(listing.attribute("asset_type"), Some("Crypto"));
        assert_eq!(listing.attributes.len(), 2);
    }

    #[test]
    fn test_account_type_checked() {
        let product = product_data(Pubkey::new_unique(), &[("symbol", "Crypto.BTC/USD")]);
        let mapping = mapping_data(&[Pubkey::new_unique()], Pubkey::default());

        assert!(matches!(
            parse_mapping_account(Pubkey::new_unique(), &product),
            Err(IndexerError::Feed(_))
        ));
        assert!(matches!(
            parse_product_account(Pubkey::new_unique(), &mapping[..std::mem::size_of::<ProductAccount>()]),
            Err(IndexerError::Feed(_))
        ));
        assert!(parse_price_account(Pubkey::new_unique(), &product).is_err());
    }

    #[test]
    fn test_update_generation_stamp() {
        let update = PriceUpdate::new(
            ProductInfo {
                product_account: Pubkey::default(),
                symbol: None,
            },
            PriceSample::unavailable(Pubkey::new_unique()),
        );
        assert_eq!(update.generation, 0);
        assert_eq!(update.with_generation(7).generation, 7);
    }

    #[test]
    fn test_sample_scaled_by_exponent() {
        let id = Pubkey::new_unique();
        let sample = sample_from_aggregate(id, 4_250_000_000, 1_500_000, -8, true);

        assert_eq!(sample.account_id, id);
        assert!((sample.price.unwrap() - 42.5).abs() < 1e-9);
        assert!((sample.confidence.unwrap() - 0.015).abs() < 1e-12);
        assert!(sample.is_valid());
    }

    #[test]
    fn test_non_trading_sample_is_unavailable() {
        let sample = sample_from_aggregate(Pubkey::new_unique(), 100, 1, 0, false);
        assert_eq!(sample.price, None);
        assert_eq!(sample.confidence, None);
        assert!(!sample.is_valid());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_price_account(Pubkey::new_unique(), &[0u8; 16]).unwrap_err();
        assert!(matches!(err, IndexerError::Feed(_)));
    }

    #[tokio::test]
    async fn test_start_requires_registered_sink() {
        let mut feed = PythFeed::new("ws://127.0.0.1:1", vec![]);
        assert!(feed.start(1).is_err());
        assert!(!feed.is_running());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut feed = PythFeed::new("ws://127.0.0.1:1", vec![]);
        feed.stop();
        assert!(!feed.is_running());
    }
}
