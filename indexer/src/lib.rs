//! Pyth Index Monitor
//!
//! Off-chain client for the Pyth indexing program. Stores named baskets of
//! Pyth price accounts on-chain and tracks the rolling average price of a
//! basket by sampling the oracle at a fixed cadence.

pub mod aggregator;
pub mod catalog;
pub mod chart;
pub mod config;
pub mod error;
pub mod oracle;
pub mod reader;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod tx_builder;
pub mod wallet;

pub use aggregator::{AggregatorConfig, SamplingAggregator};
pub use chart::{ChartPoint, ChartSeries};
pub use config::Config;
pub use error::{IndexerError, Result};
pub use oracle::{PriceFeed, PriceSample, PriceUpdate, ProductInfo, ProductListing, PythFeed};
pub use reader::OracleReader;
pub use registry::IndexRegistry;
pub use scheduler::Scheduler;
pub use session::MonitorSession;
pub use storage::Basket;
