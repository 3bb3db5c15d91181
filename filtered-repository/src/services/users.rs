//! User accounts
//!
//! Passwords are stored as Argon2id hashes and never leave this module: the
//! public repository strips the column from every row it returns. Login reads
//! through a second, unshaped repository over the same table.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{decode_page, PasswordHasher};
use crate::config::RepositoryConfig;
use crate::error::{Error, Result};
use crate::repository::{
    FilteredRepository, FilteredRepositoryBuilder, Filters, HideColumns, OrderDirection, Page,
    PageRequest, Sort,
};
use crate::store::Store;
use crate::value::Record;

const TABLE: &str = "users";
const PASSWORD: &str = "password";

/// A user as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub eid: i64,
    pub username: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct UserService {
    users: FilteredRepository,
    credentials: FilteredRepository,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, config: &RepositoryConfig) -> Result<Self> {
        let users = FilteredRepositoryBuilder::from_config(store.clone(), TABLE, config)
            .transform(HideColumns::new([PASSWORD]))
            .build()?;
        let credentials = FilteredRepositoryBuilder::from_config(store, TABLE, config).build()?;

        Ok(Self {
            users,
            credentials,
            hasher: PasswordHasher::default(),
        })
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Repository over `users` with passwords hidden
    pub fn repository(&self) -> &FilteredRepository {
        &self.users
    }

    /// Create an account, returning its id
    pub async fn save_one(&self, username: &str, password: &str) -> Result<Option<i64>> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(Error::Auth("username and password are required".to_string()));
        }

        let record = Record::new()
            .with("username", username)
            .with(PASSWORD, self.hasher.hash(password)?);
        let id = self.users.save_entity(record).await?;

        tracing::info!(username, ?id, "user created");
        Ok(id)
    }

    /// The live account matching both credentials, if any
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<User>> {
        let filters = Filters::new().eq("username", username);
        let Some(mut row) = self
            .credentials
            .find_list_by_filter(&filters, None)
            .await?
            .into_iter()
            .next()
        else {
            tracing::debug!(username, "login for unknown user");
            return Ok(None);
        };

        let hash = row
            .remove(PASSWORD)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        if hash.is_empty() || !self.hasher.verify(password, &hash)? {
            tracing::debug!(username, "login rejected");
            return Ok(None);
        }

        Ok(Some(row.into_entity()?))
    }

    /// Newest accounts first, optionally narrowed to usernames containing `username`
    pub async fn find_page_list(
        &self,
        request: &PageRequest,
        username: Option<&str>,
    ) -> Result<Page<User>> {
        let filters = match username.filter(|u| !u.is_empty()) {
            Some(username) => Filters::new().like("username", format!("%{}%", username)),
            None => Filters::new(),
        };
        let sort = Sort::by(self.users.primary_key(), OrderDirection::Descending);

        let page = self.users.find_page(request, Some(&filters), Some(&sort)).await?;
        decode_page(page)
    }

    /// Change the username and/or password of an account
    pub async fn update_one(
        &self,
        id: i64,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<u64> {
        let mut update = Record::new();
        if let Some(username) = username {
            update.insert("username", username);
        }
        if let Some(password) = password {
            update.insert(PASSWORD, self.hasher.hash(password)?);
        }
        Ok(self.users.update_entity_by_id(id, update).await?)
    }

    pub async fn delete_one(&self, id: i64) -> Result<u64> {
        Ok(self.users.delete_entity_by_id(id).await?)
    }

    pub async fn delete_batch(&self, ids: &[i64]) -> Result<u64> {
        Ok(self.users.delete_entities_by_ids(ids).await?)
    }
}
