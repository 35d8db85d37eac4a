//! Recording doubles of the external service clients.
//!
//! Each mock stores the requests it receives so tests can assert on exactly
//! what would have gone over the wire, and answers from canned data.

use dbm_clients::dbconfig::{ConfItems, QueryConfItemRequest, UpsertConfItemRequest};
use dbm_clients::drs::{RpcResult, SqlserverRpcRequest};
use dbm_clients::priv_manager::{
    AccountRules, ComponentPasswords, ComponentUser, ListAccountRulesRequest, ModifyPasswordRequest,
};
use dbm_clients::{ApiError, ApiFuture, DbConfigApi, DrsApi, PrivManagerApi};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// [`DbConfigApi`] double answering queries with a fixed content map.
#[derive(Clone, Debug, Default)]
pub struct MockDbConfigApi {
    content: Arc<Mutex<Map<String, Value>>>,
    queries: Arc<Mutex<Vec<QueryConfItemRequest>>>,
    upserts: Arc<Mutex<Vec<UpsertConfItemRequest>>>,
}

impl MockDbConfigApi {
    /// Mock whose queries return `content`.
    #[must_use]
    pub fn with_content(content: Map<String, Value>) -> Self {
        let mock = Self::default();
        *mock.content.lock().unwrap_or_else(PoisonError::into_inner) = content;
        mock
    }

    /// Recorded `query_conf_item` calls.
    #[must_use]
    pub fn queries(&self) -> Vec<QueryConfItemRequest> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recorded `upsert_conf_item` calls.
    #[must_use]
    pub fn upserts(&self) -> Vec<UpsertConfItemRequest> {
        self.upserts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DbConfigApi for MockDbConfigApi {
    fn query_conf_item(&self, request: QueryConfItemRequest) -> ApiFuture<'_, ConfItems> {
        Box::pin(async move {
            self.queries.lock().unwrap_or_else(PoisonError::into_inner).push(request);
            Ok(ConfItems {
                content: self.content.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            })
        })
    }

    fn upsert_conf_item(&self, request: UpsertConfItemRequest) -> ApiFuture<'_, Value> {
        Box::pin(async move {
            self.upserts.lock().unwrap_or_else(PoisonError::into_inner).push(request);
            Ok(Value::Null)
        })
    }
}

/// [`PrivManagerApi`] double with an in-memory password table.
#[derive(Clone, Debug, Default)]
pub struct MockPrivManagerApi {
    passwords: Arc<Mutex<HashMap<ComponentUser, String>>>,
    accounts: Arc<Mutex<Vec<AccountRules>>>,
    modified: Arc<Mutex<Vec<ModifyPasswordRequest>>>,
    fail_with: Arc<Mutex<Option<ApiError>>>,
}

impl MockPrivManagerApi {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a component password.
    #[must_use]
    pub fn with_password(self, username: &str, component: &str, password: &str) -> Self {
        self.passwords
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ComponentUser::new(username, component), password.to_string());
        self
    }

    /// Seed an account with its rules.
    #[must_use]
    pub fn with_account(self, account: AccountRules) -> Self {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner).push(account);
        self
    }

    /// Make every subsequent call fail with `error`.
    pub fn fail_with(&self, error: ApiError) {
        *self.fail_with.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Recorded `modify_password` calls.
    #[must_use]
    pub fn modified(&self) -> Vec<ModifyPasswordRequest> {
        self.modified.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn check(&self) -> Result<(), ApiError> {
        match self.fail_with.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lookup(&self, users: &[ComponentUser]) -> ComponentPasswords {
        let table = self.passwords.lock().unwrap_or_else(PoisonError::into_inner);
        let mut found = ComponentPasswords::new();
        for user in users {
            if let Some(password) = table.get(user) {
                found
                    .entry(user.username.clone())
                    .or_default()
                    .insert(user.component.clone(), password.clone());
            }
        }
        found
    }
}

impl PrivManagerApi for MockPrivManagerApi {
    fn modify_password(&self, request: ModifyPasswordRequest) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.modified.lock().unwrap_or_else(PoisonError::into_inner).push(request);
            Ok(())
        })
    }

    fn get_component_password(&self, username: String, component: String) -> ApiFuture<'_, String> {
        Box::pin(async move {
            self.check()?;
            let user = ComponentUser::new(username, component);
            self.passwords
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&user)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("password of {}/{}", user.username, user.component)))
        })
    }

    fn batch_query_components_password(
        &self,
        users: Vec<ComponentUser>,
    ) -> ApiFuture<'_, ComponentPasswords> {
        Box::pin(async move {
            self.check()?;
            Ok(self.lookup(&users))
        })
    }

    fn list_account_rules(&self, request: ListAccountRulesRequest) -> ApiFuture<'_, Vec<AccountRules>> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .accounts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|a| request.user.is_empty() || request.user.contains(&a.account.user))
                .cloned()
                .collect())
        })
    }
}

/// [`DrsApi`] double replaying queued responses in order.
///
/// When the queue is empty every target answers with empty, successful
/// statement results.
#[derive(Clone, Debug, Default)]
pub struct MockDrsApi {
    responses: Arc<Mutex<VecDeque<Result<Vec<RpcResult>, ApiError>>>>,
    requests: Arc<Mutex<Vec<SqlserverRpcRequest>>>,
}

impl MockDrsApi {
    /// Create a mock with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response.
    #[must_use]
    pub fn respond(self, response: Result<Vec<RpcResult>, ApiError>) -> Self {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner).push_back(response);
        self
    }

    /// Recorded calls.
    #[must_use]
    pub fn requests(&self) -> Vec<SqlserverRpcRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DrsApi for MockDrsApi {
    fn sqlserver_rpc(&self, request: SqlserverRpcRequest) -> ApiFuture<'_, Vec<RpcResult>> {
        Box::pin(async move {
            let queued = self.responses.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
            let default = request
                .addresses
                .iter()
                .map(|address| RpcResult {
                    address: address.clone(),
                    ..RpcResult::default()
                })
                .collect();
            self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request);
            queued.unwrap_or(Ok(default))
        })
    }
}
