//! The paging loop over the deals API.

use std::fmt;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::ScrapeConfig;
use crate::extractor::extract_product;
use crate::fetcher::{PageFetcher, Transport};
use crate::models::ProductRecord;

/// Why the paging loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxPages,
    MinProducts,
    FetchFailed,
    MalformedResponse,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::MaxPages => "page limit reached",
            StopReason::MinProducts => "product target reached",
            StopReason::FetchFailed => "page fetch failed",
            StopReason::MalformedResponse => "invalid response format",
        };
        f.write_str(text)
    }
}

#[derive(Debug)]
pub struct ScrapeOutcome {
    pub records: Vec<ProductRecord>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

/// Page through the deals API until a limit, a failed fetch, or a malformed page.
pub fn run<T: Transport>(fetcher: &PageFetcher<T>, config: &ScrapeConfig) -> ScrapeOutcome {
    let mut records = Vec::new();
    let mut pages_fetched = 0;

    let stop = 'paging: {
        for page in 1..=config.max_pages {
            info!("Requesting page {}...", page);

            let body = match fetcher.fetch(&config.endpoint, &config.page_params(page)) {
                Ok(body) => body,
                Err(e) => {
                    error!("Stopping at page {}: {}", page, e);
                    break 'paging StopReason::FetchFailed;
                }
            };
            pages_fetched += 1;

            let items = match serde_json::from_str::<Value>(&body) {
                Ok(Value::Array(items)) => items,
                Ok(_) => {
                    error!("Invalid response format");
                    break 'paging StopReason::MalformedResponse;
                }
                Err(e) => {
                    error!("Error processing data: {}", e);
                    break 'paging StopReason::MalformedResponse;
                }
            };

            for item in &items {
                if !item.is_object() {
                    warn!("Skipping non-object item on page {}", page);
                    continue;
                }
                let number = records.len() as u32 + 1;
                records.push(extract_product(number, item));
            }
            info!("Total products scraped so far: {}", records.len());

            if records.len() >= config.min_products {
                info!("Reached {} products. Stopping.", config.min_products);
                break 'paging StopReason::MinProducts;
            }
        }
        StopReason::MaxPages
    };

    ScrapeOutcome { records, pages_fetched, stop }
}
