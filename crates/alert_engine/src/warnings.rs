//! Cached access to the latest warning states.

use std::sync::Arc;

use common::{Clock, Result, WarningMap};
use region_cache::RegionCache;

use crate::ports::WarningPort;

pub struct WarningLoader {
    port: Arc<dyn WarningPort>,
    cache: RegionCache<Arc<WarningMap>>,
    ttl_minutes: i64,
}

impl WarningLoader {
    pub fn new(port: Arc<dyn WarningPort>, clock: Arc<dyn Clock>, ttl_minutes: i64) -> Self {
        Self {
            port,
            cache: RegionCache::new("warnings", clock),
            ttl_minutes,
        }
    }

    /// Latest state per kind; an empty map when the region has no warnings.
    pub async fn load_latest(&self, region_id: &str) -> Result<Arc<WarningMap>> {
        let now = self.cache.now();
        let port = Arc::clone(&self.port);
        let entry = self
            .cache
            .get_or_compute_ttl_based(region_id, now, self.ttl_minutes, || async move {
                Ok(Arc::new(port.fetch(region_id).await?))
            })
            .await?;
        Ok(entry.value)
    }
}
