//! Groups a session's stored results by API module.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::store::ResultStore;
use crate::types::ResultRecord;

/// Store-internal id field some archives still carry.
const INTERNAL_ID_FIELD: &str = "_id";

/// API name → results, each bucket in store order.
pub type ApiResults = BTreeMap<String, Vec<ResultRecord>>;

pub struct ResultAggregator {
    store: Arc<dyn ResultStore>,
}

impl ResultAggregator {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    /// Fetches every stored result for `token`, grouped by API.
    pub fn aggregate(&self, token: &str) -> Result<ApiResults> {
        let mut per_api = ApiResults::new();
        for stored in self.store.get_results(token)? {
            let mut record = stored.record;
            record.extra.remove(INTERNAL_ID_FIELD);
            per_api
                .entry(record.api().to_string())
                .or_default()
                .push(record);
        }
        Ok(per_api)
    }

    /// Results of a single API; empty when none are stored.
    pub fn aggregate_api(&self, token: &str, api: &str) -> Result<Vec<ResultRecord>> {
        Ok(self.aggregate(token)?.remove(api).unwrap_or_default())
    }
}
