//! Login audit trail

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decode_page;
use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::repository::{
    FilteredRepository, FilteredRepositoryBuilder, Filters, OrderDirection, Page, PageRequest,
    Sort,
};
use crate::store::Store;
use crate::value::Record;

const TABLE: &str = "logs";

/// One recorded account action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginLog {
    pub eid: i64,
    pub user_id: i64,
    pub username: String,
    pub action: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LogService {
    logs: FilteredRepository,
}

impl LogService {
    pub fn new(store: Arc<dyn Store>, config: &RepositoryConfig) -> Result<Self> {
        let logs = FilteredRepositoryBuilder::from_config(store, TABLE, config).build()?;
        Ok(Self { logs })
    }

    pub fn repository(&self) -> &FilteredRepository {
        &self.logs
    }

    /// Record an action taken by `user_id`, stamped with the current time
    pub async fn save_login_log(
        &self,
        user_id: i64,
        username: &str,
        action: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<Option<i64>> {
        self.save_login_log_at(user_id, username, action, ip, user_agent, Utc::now())
            .await
    }

    /// [`save_login_log`](Self::save_login_log) with an explicit timestamp
    pub async fn save_login_log_at(
        &self,
        user_id: i64,
        username: &str,
        action: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let record = Record::new()
            .with("user_id", user_id)
            .with("username", username)
            .with("action", action)
            .with("ip", ip)
            .with("user_agent", user_agent)
            .with("created_at", at);
        Ok(self.logs.save_entity(record).await?)
    }

    /// Most recent entries first, optionally for one username
    pub async fn find_page_list(
        &self,
        request: &PageRequest,
        username: Option<&str>,
    ) -> Result<Page<LoginLog>> {
        let filters = match username.filter(|u| !u.is_empty()) {
            Some(username) => Filters::new().eq("username", username),
            None => Filters::new(),
        };
        let sort = Sort::by("created_at", OrderDirection::Descending)
            .then_desc(self.logs.primary_key());

        let page = self.logs.find_page(request, Some(&filters), Some(&sort)).await?;
        decode_page(page)
    }
}
