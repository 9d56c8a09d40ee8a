//! Profile lookups against the `users` table.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{RelationalStore, RowQuery, select_single};
use crate::auth::ProfileSource;
use crate::error::ClientError;
use crate::models::Profile;

const USERS_TABLE: &str = "users";

#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn RelationalStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProfileSource for ProfileRepository {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, ClientError> {
        let query = RowQuery::from(USERS_TABLE).eq("id", user_id);
        select_single(self.store.as_ref(), &query).await
    }
}
