use std::path::PathBuf;
use std::time::Duration;

use crate::delay::DelayPolicy;

pub const DEALS_API_URL: &str = "https://www.newegg.com/store/api/PageDeals";
pub const DEALS_PAGE_URL: &str = "https://www.newegg.com/Newegg-Deals/EventSaleStore/ID-9447";
pub const CAMPAIGN_PARAMS: &str = r#"{"name":"Newegg-Deals","id":"9447"}"#;
pub const ORIGIN_HOST: &str = "www.newegg.com";

pub const OUTPUT_PREFIX: &str = "newegg_products";
pub const DATABASE_FILE: &str = "newegg_products.db";

pub const MAX_PAGES: u32 = 50;
pub const MIN_PRODUCTS: usize = 500;
pub const MAX_RETRIES: u32 = 3;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const LISTING_LIMIT: usize = 3;

/// Everything a single bounded scrape run needs.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub endpoint: String,
    pub campaign_params: String,
    pub origin_host: String,
    pub max_pages: u32,
    pub min_products: usize,
    pub max_retries: u32,
    pub timeout: Duration,
    pub delay: DelayPolicy,
    pub output_prefix: String,
    pub output_dirs: Vec<PathBuf>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEALS_API_URL.to_string(),
            campaign_params: CAMPAIGN_PARAMS.to_string(),
            origin_host: ORIGIN_HOST.to_string(),
            max_pages: MAX_PAGES,
            min_products: MIN_PRODUCTS,
            max_retries: MAX_RETRIES,
            timeout: REQUEST_TIMEOUT,
            delay: DelayPolicy::default(),
            output_prefix: OUTPUT_PREFIX.to_string(),
            output_dirs: vec![PathBuf::from(".")],
        }
    }
}

impl ScrapeConfig {
    /// Query parameters for one page, in the order the endpoint expects them.
    pub fn page_params(&self, index: u32) -> Vec<(&'static str, String)> {
        vec![
            ("originParams", self.campaign_params.clone()),
            ("originQuery", "{}".to_string()),
            ("from", self.origin_host.clone()),
            ("index", index.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_run_limits() {
        let config = ScrapeConfig::default();
        assert_eq!(config.max_pages, 50);
        assert_eq!(config.min_products, 500);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_page_params() {
        let config = ScrapeConfig::default();
        let params = config.page_params(7);
        let keys: Vec<_> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["originParams", "originQuery", "from", "index"]);
        assert_eq!(params[0].1, r#"{"name":"Newegg-Deals","id":"9447"}"#);
        assert_eq!(params[1].1, "{}");
        assert_eq!(params[2].1, "www.newegg.com");
        assert_eq!(params[3].1, "7");
    }
}
