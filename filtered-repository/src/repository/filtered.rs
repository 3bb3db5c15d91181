//! The filtered repository façade
//!
//! [`FilteredRepository`] binds a store to one table and turns filter sets,
//! sorts and page requests into statements. Every read excludes soft-deleted
//! rows; deletes only flip the deleted flag.
//!
//! Each operation validates its arguments before touching the store. A
//! rejected call returns [`RepositoryError::Validation`] and issues nothing.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use filtered_repository::repository::{FilteredRepository, Filters};
//! use filtered_repository::store::MemoryStore;
//! use filtered_repository::value::Record;
//!
//! # tokio::runtime::Builder::new_current_thread()
//! #     .build()
//! #     .unwrap()
//! #     .block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! store.create_table("users", "eid").await;
//!
//! let users = FilteredRepository::builder(store, "users").build().unwrap();
//! let id = users
//!     .save_entity(Record::new().with("username", "admin"))
//!     .await
//!     .unwrap()
//!     .unwrap();
//!
//! users.delete_entity_by_id(id).await.unwrap();
//! assert!(users.find_one_by_id(id).await.unwrap().is_empty());
//! assert_eq!(users.get_total_count(None).await.unwrap(), 0);
//! # });
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::{
    Filters, Page, PageRequest, Pagination, PassThrough, RepositoryOperation, RepositoryResult,
    RowTransform, Sort,
};
use crate::config::RepositoryConfig;
use crate::error::{Error, Result};
use crate::query::{sql, NoopQueryHook, Query, QueryHook, TracingQueryHook};
use crate::store::Store;
use crate::validation::{is_identifier, Validator};
use crate::value::{Record, Value};

/// Builder for [`FilteredRepository`]
pub struct FilteredRepositoryBuilder {
    store: Arc<dyn Store>,
    table: String,
    primary_key: String,
    deleted_column: String,
    default_page_size: u64,
    max_page_size: u64,
    transform: Arc<dyn RowTransform>,
    hook: Arc<dyn QueryHook>,
}

impl FilteredRepositoryBuilder {
    /// Start from the stock defaults: `eid` key, `deleted` flag, statement tracing on
    pub fn new(store: Arc<dyn Store>, table: impl Into<String>) -> Self {
        Self::from_config(store, table, &RepositoryConfig::default())
    }

    /// Start from configured column names and limits
    pub fn from_config(
        store: Arc<dyn Store>,
        table: impl Into<String>,
        config: &RepositoryConfig,
    ) -> Self {
        let hook: Arc<dyn QueryHook> = if config.log_statements {
            Arc::new(TracingQueryHook)
        } else {
            Arc::new(NoopQueryHook)
        };
        Self {
            store,
            table: table.into(),
            primary_key: config.primary_key.clone(),
            deleted_column: config.deleted_column.clone(),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            transform: Arc::new(PassThrough),
            hook,
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn deleted_column(mut self, column: impl Into<String>) -> Self {
        self.deleted_column = column.into();
        self
    }

    /// Size used by [`FilteredRepository::find_page`] when the request has none
    pub fn default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size;
        self
    }

    /// Upper bound applied by [`FilteredRepository::find_page`]
    pub fn max_page_size(mut self, size: u64) -> Self {
        self.max_page_size = size;
        self
    }

    /// Shape every row returned by a read
    pub fn transform(mut self, transform: impl RowTransform + 'static) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    /// Observe every statement before it is dispatched
    pub fn hook(mut self, hook: impl QueryHook + 'static) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    /// Check the table and column names and build the repository
    pub fn build(self) -> Result<FilteredRepository> {
        for name in [&self.table, &self.primary_key, &self.deleted_column] {
            if !is_identifier(name) {
                return Err(Error::Identifier(name.clone()));
            }
        }
        Ok(FilteredRepository {
            store: self.store,
            table: self.table,
            primary_key: self.primary_key,
            deleted_column: self.deleted_column,
            default_page_size: self.default_page_size.max(1),
            max_page_size: self.max_page_size.max(1),
            transform: self.transform,
            hook: self.hook,
        })
    }
}

/// Soft-delete aware data access for one table
///
/// Cheap to clone; clones share the store, transform and hook.
#[derive(Clone)]
pub struct FilteredRepository {
    store: Arc<dyn Store>,
    table: String,
    primary_key: String,
    deleted_column: String,
    default_page_size: u64,
    max_page_size: u64,
    transform: Arc<dyn RowTransform>,
    hook: Arc<dyn QueryHook>,
}

impl fmt::Debug for FilteredRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredRepository")
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("deleted_column", &self.deleted_column)
            .field("default_page_size", &self.default_page_size)
            .field("max_page_size", &self.max_page_size)
            .finish_non_exhaustive()
    }
}

impl FilteredRepository {
    pub fn builder(store: Arc<dyn Store>, table: impl Into<String>) -> FilteredRepositoryBuilder {
        FilteredRepositoryBuilder::new(store, table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn deleted_column(&self) -> &str {
        &self.deleted_column
    }

    // ------------------------------------------------------------------
    // Statement plumbing
    // ------------------------------------------------------------------

    /// Apply the deleted-row exclusion ahead of any caller predicate
    fn live(&self, query: Query) -> Query {
        query.where_eq(self.deleted_column.clone(), false)
    }

    fn select(&self) -> Query {
        self.live(Query::select(self.table.clone()))
    }

    fn observe(&self, query: &Query) {
        self.hook
            .on_query(&self.table, &sql::render(query, self.store.dialect()));
    }

    async fn fetch(&self, query: Query) -> RepositoryResult<Vec<Record>> {
        self.observe(&query);
        let rows = self.store.fetch_rows(&query).await?;
        Ok(self.transform.transform_list(rows))
    }

    async fn count(&self, query: Query) -> RepositoryResult<u64> {
        self.observe(&query);
        Ok(self.store.fetch_count(&query).await?)
    }

    async fn insert(&self, rows: Vec<Record>) -> RepositoryResult<Option<i64>> {
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if !row.contains(&self.deleted_column) {
                    row.insert(self.deleted_column.clone(), false);
                }
                row
            })
            .collect();
        let query = Query::insert(self.table.clone(), rows).returning(self.primary_key.clone());
        self.observe(&query);
        Ok(self.store.insert(&query).await?)
    }

    async fn update(&self, query: Query) -> RepositoryResult<u64> {
        self.observe(&query);
        Ok(self.store.execute(&query).await?)
    }

    fn id_values(ids: &[i64]) -> Vec<Value> {
        ids.iter().copied().map(Value::from).collect()
    }

    fn soft_delete(&self) -> Record {
        Record::new().with(self.deleted_column.clone(), true)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Every live row
    pub async fn find_all(&self, sort: Option<&Sort>) -> RepositoryResult<Vec<Record>> {
        Validator::new(RepositoryOperation::FindAll)
            .sort("sort", sort)
            .validate()?;

        tracing::debug!(table = %self.table, "find_all");
        self.fetch(self.select().sort(sort)).await
    }

    /// One page of live rows matching `filters`
    ///
    /// Counts first, then fetches `page_size` rows starting at
    /// `(page_number - 1) * page_size`. The two statements are independent, so a
    /// concurrent writer may land between them. When nothing matches the fetch
    /// is skipped and an empty page is returned.
    pub async fn find_page_by_filter(
        &self,
        page_number: u64,
        page_size: u64,
        filters: Option<&Filters>,
        sort: Option<&Sort>,
    ) -> RepositoryResult<Page<Record>> {
        let validator = Validator::new(RepositoryOperation::FindPageByFilter)
            .page("page_number", page_number)
            .page("page_size", page_size);
        let validator = match filters {
            Some(filters) => validator.filters("filters", filters),
            None => validator,
        };
        validator.sort("sort", sort).validate()?;

        tracing::debug!(
            table = %self.table,
            page_number,
            page_size,
            "find_page_by_filter"
        );

        let count = self.filtered(self.live(Query::count(self.table.clone())), filters);
        let total = self.count(count).await?;
        if total == 0 {
            return Ok(Page::empty(page_number, page_size));
        }

        let window = Pagination::page(page_number, page_size);
        let query = self
            .filtered(self.select(), filters)
            .sort(sort)
            .offset(window.offset)
            .limit(window.limit);
        let items = self.fetch(query).await?;

        Ok(Page::new(total, items, page_number, page_size))
    }

    /// [`find_page_by_filter`](Self::find_page_by_filter) driven by a caller's
    /// page request
    ///
    /// A request without a size gets the configured default; any size is
    /// capped at the configured maximum.
    pub async fn find_page(
        &self,
        request: &PageRequest,
        filters: Option<&Filters>,
        sort: Option<&Sort>,
    ) -> RepositoryResult<Page<Record>> {
        let page_size = request.size_or(self.default_page_size, self.max_page_size);
        self.find_page_by_filter(request.page_number, page_size, filters, sort)
            .await
    }

    fn filtered(&self, query: Query, filters: Option<&Filters>) -> Query {
        match filters {
            Some(filters) => query.filters(filters),
            None => query,
        }
    }

    /// Live rows matching every predicate of `filters`
    pub async fn find_list_by_filter(
        &self,
        filters: &Filters,
        sort: Option<&Sort>,
    ) -> RepositoryResult<Vec<Record>> {
        Validator::new(RepositoryOperation::FindListByFilter)
            .filters("filters", filters)
            .sort("sort", sort)
            .validate()?;

        tracing::debug!(table = %self.table, predicates = filters.len(), "find_list_by_filter");
        self.fetch(self.select().filters(filters).sort(sort)).await
    }

    /// The live row with primary key `id`, or an empty record
    pub async fn find_one_by_id(&self, id: i64) -> RepositoryResult<Record> {
        Validator::new(RepositoryOperation::FindOneById)
            .num("id", id)
            .validate()?;

        tracing::debug!(table = %self.table, id, "find_one_by_id");
        let query = self.select().where_eq(self.primary_key.clone(), id);
        self.observe(&query);
        let row = self.store.fetch_rows(&query).await?.into_iter().next();

        Ok(row
            .map(|row| self.transform.transform_one(row))
            .unwrap_or_default())
    }

    /// Live rows whose primary key is in `ids`
    pub async fn find_list_by_ids(
        &self,
        ids: &[i64],
        sort: Option<&Sort>,
    ) -> RepositoryResult<Vec<Record>> {
        Validator::new(RepositoryOperation::FindListByIds)
            .ids("ids", ids)
            .sort("sort", sort)
            .validate()?;

        tracing::debug!(table = %self.table, count = ids.len(), "find_list_by_ids");
        let query = self
            .select()
            .where_in(self.primary_key.clone(), Self::id_values(ids))
            .sort(sort);
        self.fetch(query).await
    }

    /// Live rows whose `field` is one of `values`
    pub async fn find_list_by_where_in(
        &self,
        field: &str,
        values: &[Value],
        sort: Option<&Sort>,
    ) -> RepositoryResult<Vec<Record>> {
        Validator::new(RepositoryOperation::FindListByWhereIn)
            .str("field", field)
            .arr("values", values)
            .sort("sort", sort)
            .validate()?;

        tracing::debug!(table = %self.table, field, count = values.len(), "find_list_by_where_in");
        let query = self.select().where_in(field, values.to_vec()).sort(sort);
        self.fetch(query).await
    }

    /// Number of live rows matching `filters`
    pub async fn get_total_count(&self, filters: Option<&Filters>) -> RepositoryResult<u64> {
        let validator = Validator::new(RepositoryOperation::GetTotalCount);
        let validator = match filters {
            Some(filters) => validator.filters("filters", filters),
            None => validator,
        };
        validator.validate()?;

        let query = self.filtered(self.live(Query::count(self.table.clone())), filters);
        self.count(query).await
    }

    /// [`find_one_by_id`](Self::find_one_by_id) decoded into `T`; `None` when absent
    pub async fn find_one_by_id_as<T: DeserializeOwned>(&self, id: i64) -> Result<Option<T>> {
        let row = self.find_one_by_id(id).await?;
        if row.is_empty() {
            return Ok(None);
        }
        Ok(Some(row.into_entity()?))
    }

    /// [`find_list_by_filter`](Self::find_list_by_filter) decoded into `T`
    pub async fn find_list_by_filter_as<T: DeserializeOwned>(
        &self,
        filters: &Filters,
        sort: Option<&Sort>,
    ) -> Result<Vec<T>> {
        self.find_list_by_filter(filters, sort)
            .await?
            .into_iter()
            .map(|row| row.into_entity().map_err(Error::from))
            .collect()
    }

    // ------------------------------------------------------------------
    // Inserts
    // ------------------------------------------------------------------

    /// Insert one row, returning its generated key when the store reports one
    ///
    /// The deleted flag defaults to `false` when `entity` does not set it.
    pub async fn save_entity(&self, entity: Record) -> RepositoryResult<Option<i64>> {
        Validator::new(RepositoryOperation::SaveEntity)
            .obj("entity", &entity)
            .validate()?;

        tracing::debug!(table = %self.table, "save_entity");
        self.insert(vec![entity]).await
    }

    /// Insert several rows in one statement, returning the first generated key
    pub async fn save_entities(&self, entities: Vec<Record>) -> RepositoryResult<Option<i64>> {
        Validator::new(RepositoryOperation::SaveEntities)
            .records("entities", &entities)
            .validate()?;

        tracing::debug!(table = %self.table, count = entities.len(), "save_entities");
        self.insert(entities).await
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Apply `update` to every row matching `filters`
    ///
    /// `filters` must hold at least one predicate; an empty set is a validation
    /// error rather than a whole-table write.
    pub async fn update_entities(
        &self,
        filters: &Filters,
        update: Record,
    ) -> RepositoryResult<u64> {
        Validator::new(RepositoryOperation::UpdateEntities)
            .non_empty_filters("filters", filters)
            .obj("update", &update)
            .validate()?;

        tracing::debug!(table = %self.table, predicates = filters.len(), "update_entities");
        self.update(Query::update(self.table.clone(), update).filters(filters))
            .await
    }

    /// Apply `update` to every row whose `field` is one of `values`
    pub async fn update_entities_by_where_in(
        &self,
        field: &str,
        values: &[Value],
        update: Record,
    ) -> RepositoryResult<u64> {
        Validator::new(RepositoryOperation::UpdateEntitiesByWhereIn)
            .str("field", field)
            .arr("values", values)
            .obj("update", &update)
            .validate()?;

        tracing::debug!(
            table = %self.table,
            field,
            count = values.len(),
            "update_entities_by_where_in"
        );
        self.update(Query::update(self.table.clone(), update).where_in(field, values.to_vec()))
            .await
    }

    /// Apply `update` to the row with primary key `id`; `0` when it does not exist
    pub async fn update_entity_by_id(&self, id: i64, update: Record) -> RepositoryResult<u64> {
        Validator::new(RepositoryOperation::UpdateEntityById)
            .num("id", id)
            .obj("update", &update)
            .validate()?;

        tracing::debug!(table = %self.table, id, "update_entity_by_id");
        self.update(
            Query::update(self.table.clone(), update).where_eq(self.primary_key.clone(), id),
        )
        .await
    }

    /// Apply `update` to every row whose primary key is in `ids`
    pub async fn update_entities_by_ids(
        &self,
        ids: &[i64],
        update: Record,
    ) -> RepositoryResult<u64> {
        Validator::new(RepositoryOperation::UpdateEntitiesByIds)
            .ids("ids", ids)
            .obj("update", &update)
            .validate()?;

        tracing::debug!(table = %self.table, count = ids.len(), "update_entities_by_ids");
        let query = Query::update(self.table.clone(), update)
            .where_in(self.primary_key.clone(), Self::id_values(ids));
        self.update(query).await
    }

    // ------------------------------------------------------------------
    // Soft deletes
    // ------------------------------------------------------------------

    /// Flag the row with primary key `id` as deleted
    pub async fn delete_entity_by_id(&self, id: i64) -> RepositoryResult<u64> {
        Validator::new(RepositoryOperation::DeleteEntityById)
            .num("id", id)
            .validate()?;

        tracing::debug!(table = %self.table, id, "delete_entity_by_id");
        self.update_entity_by_id(id, self.soft_delete()).await
    }

    /// Flag every row matching `filters` as deleted
    ///
    /// `filters` must hold at least one predicate; an empty set is a validation
    /// error rather than a whole-table delete.
    pub async fn delete_entities(&self, filters: &Filters) -> RepositoryResult<u64> {
        Validator::new(RepositoryOperation::DeleteEntities)
            .non_empty_filters("filters", filters)
            .validate()?;

        tracing::debug!(table = %self.table, predicates = filters.len(), "delete_entities");
        self.update_entities(filters, self.soft_delete()).await
    }

    /// Flag every row whose `field` is one of `values` as deleted
    pub async fn delete_entities_by_where_in(
        &self,
        field: &str,
        values: &[Value],
    ) -> RepositoryResult<u64> {
        Validator::new(RepositoryOperation::DeleteEntitiesByWhereIn)
            .str("field", field)
            .arr("values", values)
            .validate()?;

        tracing::debug!(
            table = %self.table,
            field,
            count = values.len(),
            "delete_entities_by_where_in"
        );
        self.update_entities_by_where_in(field, values, self.soft_delete())
            .await
    }

    /// Flag every row whose primary key is in `ids` as deleted
    pub async fn delete_entities_by_ids(&self, ids: &[i64]) -> RepositoryResult<u64> {
        Validator::new(RepositoryOperation::DeleteEntitiesByIds)
            .ids("ids", ids)
            .validate()?;

        tracing::debug!(table = %self.table, count = ids.len(), "delete_entities_by_ids");
        self.update_entities_by_ids(ids, self.soft_delete()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreErrorKind};
    use crate::query::{Dialect, RenderedSql};
    use crate::repository::{OrderDirection, RepositoryError};
    use crate::store::{MemoryStore, StoreResult};
    use crate::validation::ParamKind;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Counts calls before delegating to an in-memory store
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn tick(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Store for CountingStore {
        fn dialect(&self) -> Dialect {
            self.inner.dialect()
        }

        async fn fetch_rows(&self, query: &Query) -> StoreResult<Vec<Record>> {
            self.tick();
            self.inner.fetch_rows(query).await
        }

        async fn fetch_count(&self, query: &Query) -> StoreResult<u64> {
            self.tick();
            self.inner.fetch_count(query).await
        }

        async fn insert(&self, query: &Query) -> StoreResult<Option<i64>> {
            self.tick();
            self.inner.insert(query).await
        }

        async fn execute(&self, query: &Query) -> StoreResult<u64> {
            self.tick();
            self.inner.execute(query).await
        }
    }

    async fn counting_repo() -> (Arc<CountingStore>, FilteredRepository) {
        let store = Arc::new(CountingStore::default());
        store.inner.create_table("users", "eid").await;
        let repo = FilteredRepository::builder(store.clone(), "users")
            .hook(NoopQueryHook)
            .build()
            .unwrap();
        (store, repo)
    }

    async fn repo_with(names: &[&str]) -> (Arc<MemoryStore>, FilteredRepository) {
        let store = Arc::new(MemoryStore::new());
        store.create_table("users", "eid").await;
        let repo = FilteredRepository::builder(store.clone(), "users")
            .build()
            .unwrap();
        if !names.is_empty() {
            let rows = names
                .iter()
                .map(|n| Record::new().with("name", *n))
                .collect();
            repo.save_entities(rows).await.unwrap();
        }
        (store, repo)
    }

    fn names(rows: &[Record]) -> Vec<String> {
        rows.iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    #[test]
    fn test_build_rejects_bad_identifiers() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let err = FilteredRepository::builder(store.clone(), "users; drop")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Identifier(ref name) if name == "users; drop"));

        assert!(FilteredRepository::builder(store, "users")
            .deleted_column("is deleted")
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn test_save_then_find_one() {
        let (_, repo) = repo_with(&[]).await;
        let id = repo
            .save_entity(Record::new().with("name", "x"))
            .await
            .unwrap()
            .unwrap();

        let row = repo.find_one_by_id(id).await.unwrap();
        assert_eq!(row.get_i64("eid"), Some(id));
        assert_eq!(row.get("name"), Some(&Value::from("x")));
        assert_eq!(row.get("deleted"), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn test_save_entities_returns_first_key() {
        let (_, repo) = repo_with(&[]).await;
        fn batch(names: &[&str]) -> Vec<Record> {
            names.iter().map(|n| Record::new().with("name", *n)).collect()
        }

        assert_eq!(repo.save_entities(batch(&["a", "b", "c"])).await.unwrap(), Some(1));
        assert_eq!(repo.save_entities(batch(&["d", "e"])).await.unwrap(), Some(4));
        assert_eq!(names(&repo.find_list_by_ids(&[4, 5], None).await.unwrap()), vec!["d", "e"]);
    }

    #[tokio::test]
    async fn test_find_one_missing_is_empty_record() {
        let (_, repo) = repo_with(&["a"]).await;
        assert!(repo.find_one_by_id(999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_by_id_reports_affected_rows() {
        let (_, repo) = repo_with(&["a", "b"]).await;
        let changed = repo
            .update_entity_by_id(1, Record::new().with("name", "y"))
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(
            repo.find_one_by_id(1).await.unwrap().get("name"),
            Some(&Value::from("y"))
        );

        let missing = repo
            .update_entity_by_id(42, Record::new().with("name", "y"))
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_rows_from_every_read() {
        let (store, repo) = repo_with(&["a", "b", "c"]).await;
        assert_eq!(repo.delete_entity_by_id(2).await.unwrap(), 1);

        assert_eq!(names(&repo.find_all(None).await.unwrap()), vec!["a", "c"]);
        assert_eq!(
            names(&repo.find_list_by_filter(&Filters::new(), None).await.unwrap()),
            vec!["a", "c"]
        );
        assert_eq!(
            names(&repo.find_list_by_ids(&[1, 2, 3], None).await.unwrap()),
            vec!["a", "c"]
        );
        assert_eq!(
            names(
                &repo
                    .find_list_by_where_in("name", &["a".into(), "b".into()], None)
                    .await
                    .unwrap()
            ),
            vec!["a"]
        );
        let page = repo.find_page_by_filter(1, 10, None, None).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(names(&page.items), vec!["a", "c"]);
        assert!(repo.find_one_by_id(2).await.unwrap().is_empty());
        assert_eq!(repo.get_total_count(None).await.unwrap(), 2);

        // The row is still stored, only flagged
        assert_eq!(store.dump("users").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_bulk_soft_deletes() {
        let (_, repo) = repo_with(&["a", "b", "c", "d"]).await;

        assert_eq!(repo.delete_entities_by_ids(&[1, 2]).await.unwrap(), 2);
        assert_eq!(
            repo.delete_entities(&Filters::new().eq("name", "c"))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            repo.delete_entities_by_where_in("name", &["d".into(), "zz".into()])
                .await
                .unwrap(),
            1
        );
        assert!(repo.find_all(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_reach_soft_deleted_rows() {
        let (_, repo) = repo_with(&["a"]).await;
        repo.delete_entity_by_id(1).await.unwrap();
        let restored = repo
            .update_entity_by_id(1, Record::new().with("deleted", false))
            .await
            .unwrap();
        assert_eq!(restored, 1);
        assert_eq!(repo.find_all(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_variants() {
        let (_, repo) = repo_with(&["a", "b", "c"]).await;

        let n = repo
            .update_entities(&Filters::new().ne("name", "a"), Record::new().with("role", "staff"))
            .await
            .unwrap();
        assert_eq!(n, 2);

        let n = repo
            .update_entities_by_ids(&[1, 3], Record::new().with("active", true))
            .await
            .unwrap();
        assert_eq!(n, 2);

        let n = repo
            .update_entities_by_where_in(
                "role",
                &["staff".into()],
                Record::new().with("level", 2_i64),
            )
            .await
            .unwrap();
        assert_eq!(n, 2);

        let staff = repo
            .find_list_by_filter(&Filters::new().eq("level", 2_i64).eq("active", true), None)
            .await
            .unwrap();
        assert_eq!(names(&staff), vec!["c"]);
    }

    #[tokio::test]
    async fn test_find_list_by_where_in_and_sort() {
        let (_, repo) = repo_with(&["b", "a", "c"]).await;
        let sort = Sort::by("name", OrderDirection::Descending);
        let rows = repo
            .find_list_by_where_in("name", &["a".into(), "c".into()], Some(&sort))
            .await
            .unwrap();
        assert_eq!(names(&rows), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_page_slices_and_metadata() {
        let (_, repo) = repo_with(&["a", "b", "c", "d", "e"]).await;
        let sort = Sort::by("eid", OrderDirection::Ascending);

        let page = repo.find_page_by_filter(2, 2, None, Some(&sort)).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.page_number, 2);
        assert_eq!(names(&page.items), vec!["c", "d"]);
        assert!(page.has_next());

        let past_end = repo.find_page_by_filter(9, 2, None, Some(&sort)).await.unwrap();
        assert_eq!(past_end.total, 5);
        assert!(past_end.items.is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_skips_fetch() {
        let (store, repo) = counting_repo().await;
        let page = repo
            .find_page_by_filter(1, 20, Some(&Filters::new().eq("name", "nobody")), None)
            .await
            .unwrap();
        assert_eq!(page, Page::empty(1, 20));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_find_page_clamps_page_size() {
        let store = Arc::new(MemoryStore::new());
        store.create_table("users", "eid").await;
        let repo = FilteredRepository::builder(store, "users")
            .max_page_size(2)
            .build()
            .unwrap();
        repo.save_entities(vec![
            Record::new().with("name", "a"),
            Record::new().with("name", "b"),
            Record::new().with("name", "c"),
        ])
        .await
        .unwrap();

        let page = repo.find_page(&PageRequest::new(1, 50), None, None).await.unwrap();
        assert_eq!(page.page_size, 2);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_find_page_uses_configured_default_size() {
        let store = Arc::new(MemoryStore::new());
        store.create_table("users", "eid").await;
        let config = RepositoryConfig {
            default_page_size: 3,
            ..RepositoryConfig::default()
        };
        let repo = FilteredRepositoryBuilder::from_config(store, "users", &config)
            .build()
            .unwrap();
        let rows = (0..5).map(|i| Record::new().with("n", i as i64)).collect();
        repo.save_entities(rows).await.unwrap();

        let first = repo.find_page(&PageRequest::default(), None, None).await.unwrap();
        assert_eq!(first.page_size, 3);
        assert_eq!(first.items.len(), 3);

        let second = repo.find_page(&PageRequest::page(2), None, None).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(!second.has_next());

        let explicit = repo.find_page(&PageRequest::new(1, 4), None, None).await.unwrap();
        assert_eq!(explicit.items.len(), 4);
    }

    #[tokio::test]
    async fn test_validation_failures_issue_no_query() {
        let (store, repo) = counting_repo().await;

        let err = repo
            .update_entity_by_id(0, Record::new().with("name", "y"))
            .await
            .unwrap_err();
        let validation = err.as_validation().unwrap();
        assert_eq!(validation.parameter, "id");
        assert_eq!(validation.operation, RepositoryOperation::UpdateEntityById);

        assert!(repo.find_one_by_id(-3).await.unwrap_err().is_validation());
        assert!(repo.find_list_by_ids(&[], None).await.unwrap_err().is_validation());
        assert!(repo
            .find_list_by_where_in("name", &[], None)
            .await
            .unwrap_err()
            .is_validation());
        assert!(repo
            .find_list_by_where_in("1=1 or name", &["a".into()], None)
            .await
            .unwrap_err()
            .is_validation());
        assert!(repo.save_entity(Record::new()).await.unwrap_err().is_validation());
        assert!(repo.save_entities(vec![]).await.unwrap_err().is_validation());
        assert!(repo
            .update_entities(&Filters::new(), Record::new().with("a", 1_i64))
            .await
            .unwrap_err()
            .is_validation());
        assert!(repo
            .update_entities_by_ids(&[1], Record::new())
            .await
            .unwrap_err()
            .is_validation());
        assert!(repo.delete_entities(&Filters::new()).await.unwrap_err().is_validation());
        assert!(repo.delete_entities_by_ids(&[]).await.unwrap_err().is_validation());
        assert!(repo.delete_entity_by_id(0).await.unwrap_err().is_validation());

        let err = repo.find_page_by_filter(0, 10, None, None).await.unwrap_err();
        assert_eq!(err.as_validation().unwrap().parameter, "page_number");
        let err = repo.find_page_by_filter(1, 0, None, None).await.unwrap_err();
        assert_eq!(err.as_validation().unwrap().expected, ParamKind::Number);

        let bad_sort = Sort::by("eid desc", OrderDirection::Descending);
        assert!(repo.find_all(Some(&bad_sort)).await.unwrap_err().is_validation());
        let bad_filter = Filters::new().eq("name or 1", 1_i64);
        assert!(repo.get_total_count(Some(&bad_filter)).await.unwrap_err().is_validation());

        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_reports_its_own_operation() {
        let (_, repo) = counting_repo().await;
        let err = repo.delete_entities_by_where_in("", &["a".into()]).await.unwrap_err();
        assert_eq!(
            err.as_validation().unwrap().operation,
            RepositoryOperation::DeleteEntitiesByWhereIn
        );
    }

    #[tokio::test]
    async fn test_store_errors_propagate_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let repo = FilteredRepository::builder(store, "missing").build().unwrap();

        let err = repo.find_all(None).await.unwrap_err();
        match err {
            RepositoryError::Store(e) => assert_eq!(e.kind, StoreErrorKind::QueryFailed),
            other => panic!("expected store error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_key_surfaces_constraint_violation() {
        let (_, repo) = repo_with(&["a"]).await;
        let err = repo
            .save_entity(Record::new().with("eid", 1_i64).with("name", "dup"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Store(StoreError {
                kind: StoreErrorKind::ConstraintViolation,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_transform_applies_to_reads() {
        let store = Arc::new(MemoryStore::new());
        store.create_table("users", "eid").await;
        let repo = FilteredRepository::builder(store, "users")
            .transform(|mut row: Record| {
                row.remove("password");
                row.with("masked", true)
            })
            .build()
            .unwrap();
        repo.save_entity(Record::new().with("name", "a").with("password", "secret"))
            .await
            .unwrap();

        let one = repo.find_one_by_id(1).await.unwrap();
        assert!(!one.contains("password"));
        assert_eq!(one.get("masked"), Some(&Value::Bool(true)));

        let all = repo.find_all(None).await.unwrap();
        assert!(all.iter().all(|r| !r.contains("password")));
    }

    #[tokio::test]
    async fn test_hook_sees_statements_in_issue_order() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let store = Arc::new(MemoryStore::new());
        store.create_table("users", "eid").await;
        let repo = FilteredRepository::builder(store, "users")
            .hook(move |_: &str, sql: &RenderedSql| {
                sink.lock().unwrap().push(sql.sql.clone());
            })
            .build()
            .unwrap();

        repo.save_entity(Record::new().with("name", "a")).await.unwrap();
        repo.find_page_by_filter(1, 5, Some(&Filters::new().like("name", "a%")), None)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            [
                r#"INSERT INTO "users" ("deleted", "name") VALUES ($1, $2) RETURNING "eid""#,
                r#"SELECT COUNT(*) AS total FROM "users" WHERE "deleted" = $1 AND "name" LIKE $2"#,
                r#"SELECT * FROM "users" WHERE "deleted" = $1 AND "name" LIKE $2 LIMIT 5 OFFSET 0"#,
            ]
        );
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        eid: i64,
        name: String,
    }

    #[tokio::test]
    async fn test_typed_reads() {
        let (_, repo) = repo_with(&["a", "b"]).await;
        let user: Option<User> = repo.find_one_by_id_as(2).await.unwrap();
        assert_eq!(
            user,
            Some(User {
                eid: 2,
                name: "b".to_string()
            })
        );
        assert!(repo.find_one_by_id_as::<User>(7).await.unwrap().is_none());

        let users: Vec<User> = repo
            .find_list_by_filter_as(&Filters::new().eq("name", "a"), None)
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #[test]
        fn prop_filter_order_does_not_change_results(
            ages in proptest::collection::vec(0_i64..60, 1..25),
            deleted in proptest::collection::vec(any::<bool>(), 25),
            min in 0_i64..60,
            max in 0_i64..60,
        ) {
            let rows: Vec<Record> = block_on(async {
                let (_, repo) = repo_with(&[]).await;
                let entities = ages
                    .iter()
                    .zip(&deleted)
                    .map(|(age, del)| Record::new().with("age", *age).with("deleted", *del))
                    .collect();
                repo.save_entities(entities).await.unwrap();

                let forward = Filters::new().gte("age", min).lte("age", max);
                let backward = Filters::new().lte("age", max).gte("age", min);
                let sort = Sort::by("eid", OrderDirection::Ascending);
                let a = repo.find_list_by_filter(&forward, Some(&sort)).await.unwrap();
                let b = repo.find_list_by_filter(&backward, Some(&sort)).await.unwrap();
                assert_eq!(a, b);
                a
            });

            for row in &rows {
                let age = row.get_i64("age").unwrap();
                prop_assert!(age >= min && age <= max);
                prop_assert_eq!(row.get("deleted"), Some(&Value::Bool(false)));
            }
        }

        #[test]
        fn prop_pages_cover_total(count in 0_usize..30, page_size in 1_u64..8) {
            let (total, seen, sizes_ok) = block_on(async {
                let (_, repo) = repo_with(&[]).await;
                if count > 0 {
                    let entities = (0..count)
                        .map(|i| Record::new().with("n", i as i64))
                        .collect();
                    repo.save_entities(entities).await.unwrap();
                }
                let total = repo.get_total_count(None).await.unwrap();
                let pages = total.div_ceil(page_size).max(1);

                let mut seen = 0_u64;
                let mut sizes_ok = true;
                for pn in 1..=pages {
                    let page = repo.find_page_by_filter(pn, page_size, None, None).await.unwrap();
                    let len = page.items.len() as u64;
                    sizes_ok &= len <= page_size && page.total >= len;
                    seen += page.items.len() as u64;
                }
                (total, seen, sizes_ok)
            });

            prop_assert!(sizes_ok);
            prop_assert_eq!(total, count as u64);
            prop_assert_eq!(seen, total);
        }
    }
}
