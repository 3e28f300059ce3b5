//! Upstream API clients built on the resilient executor

pub mod dodois;
pub mod trendyol;
pub mod yemeksepeti;

pub use dodois::DodoIsClient;
pub use trendyol::{TrendyolClient, TrendyolCredentials};
pub use yemeksepeti::{OrderIds, OrderStatus, YemeksepetiClient};
