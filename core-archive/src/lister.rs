//! Source Lister
//!
//! Tries each listing strategy in order until one produces a catalog, then
//! returns it newest first. Listing never fails hard: when no strategy can
//! answer, the pass sees an empty catalog and the cause is logged.

use bridge_traits::media::{CatalogItem, CatalogSource, ListingOutcome};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct SourceLister {
    channel: String,
    sources: Vec<Arc<dyn CatalogSource>>,
}

impl SourceLister {
    /// `sources` are tried in order; put the preferred strategy first.
    pub fn new(channel: impl Into<String>, sources: Vec<Arc<dyn CatalogSource>>) -> Self {
        Self {
            channel: channel.into(),
            sources,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Up to `max_results` items, newest first, unknown publish dates last.
    #[instrument(skip(self), fields(channel = %self.channel))]
    pub async fn list_recent(&self, max_results: usize) -> Vec<CatalogItem> {
        if max_results == 0 {
            return Vec::new();
        }

        for source in &self.sources {
            match source.list_channel(&self.channel, max_results).await {
                ListingOutcome::Listed(items) => {
                    let listed = order_catalog(items, max_results);
                    info!(
                        source = source.name(),
                        count = listed.len(),
                        "Listed channel catalog"
                    );
                    return listed;
                }
                ListingOutcome::Unavailable(reason) => {
                    warn!(
                        source = source.name(),
                        %reason,
                        "Listing strategy unavailable, trying next"
                    );
                }
                ListingOutcome::Fatal(reason) => {
                    error!(source = source.name(), %reason, "Listing failed");
                    return Vec::new();
                }
            }
        }

        error!(
            strategies = self.sources.len(),
            "No listing strategy could serve the channel"
        );
        Vec::new()
    }
}

/// Sorts newest first with unknown dates last, drops repeated ids (first
/// occurrence wins), and truncates.
fn order_catalog(mut items: Vec<CatalogItem>, max_results: usize) -> Vec<CatalogItem> {
    items.sort_by_cached_key(|item| Reverse(item.published()));

    let mut seen = HashSet::new();
    items.retain(|item| {
        let fresh = seen.insert(item.id.clone());
        if !fresh {
            debug!(item_id = %item.id, "Dropping repeated catalog entry");
        }
        fresh
    });

    items.truncate(max_results);
    items
}
