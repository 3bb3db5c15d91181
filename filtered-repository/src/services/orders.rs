//! Orders, listed by the day they were placed

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::repository::{
    FilteredRepository, FilteredRepositoryBuilder, Filters, OrderDirection, Page, PageRequest,
    Sort,
};
use crate::store::Store;
use crate::value::Record;

const TABLE: &str = "orders";
const CREATED_AT: &str = "created_at";

/// Which orders a listing covers, by UTC calendar day of `created_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderScope {
    Today,
    Yesterday,
    #[default]
    All,
}

impl OrderScope {
    /// Half-open `[start, end)` window relative to `now`; `None` for [`OrderScope::All`]
    pub fn bounds(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let day = Duration::days(1);
        match self {
            Self::Today => Some((midnight, midnight + day)),
            Self::Yesterday => Some((midnight - day, midnight)),
            Self::All => None,
        }
    }

    fn filters(&self, now: DateTime<Utc>) -> Filters {
        match self.bounds(now) {
            Some((start, end)) => Filters::new().gte(CREATED_AT, start).lt(CREATED_AT, end),
            None => Filters::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderService {
    orders: FilteredRepository,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, config: &RepositoryConfig) -> Result<Self> {
        let orders = FilteredRepositoryBuilder::from_config(store, TABLE, config).build()?;
        Ok(Self { orders })
    }

    pub fn repository(&self) -> &FilteredRepository {
        &self.orders
    }

    /// Insert an order, stamping `created_at` when the caller left it out
    pub async fn save_one(&self, mut order: Record) -> Result<Option<i64>> {
        if !order.contains(CREATED_AT) {
            order.insert(CREATED_AT, Utc::now());
        }
        Ok(self.orders.save_entity(order).await?)
    }

    /// Newest orders first within `scope`
    pub async fn find_page_list(
        &self,
        request: &PageRequest,
        scope: OrderScope,
    ) -> Result<Page<Record>> {
        self.find_page_list_at(request, scope, Utc::now()).await
    }

    /// [`find_page_list`](Self::find_page_list) with days measured from `now`
    pub async fn find_page_list_at(
        &self,
        request: &PageRequest,
        scope: OrderScope,
        now: DateTime<Utc>,
    ) -> Result<Page<Record>> {
        let filters = scope.filters(now);
        let sort = Sort::by(CREATED_AT, OrderDirection::Descending)
            .then_desc(self.orders.primary_key());

        tracing::debug!(?scope, "listing orders");
        Ok(self.orders.find_page(request, Some(&filters), Some(&sort)).await?)
    }

    pub async fn delete_one(&self, id: i64) -> Result<u64> {
        Ok(self.orders.delete_entity_by_id(id).await?)
    }

    pub async fn delete_batch(&self, ids: &[i64]) -> Result<u64> {
        Ok(self.orders.delete_entities_by_ids(ids).await?)
    }
}
