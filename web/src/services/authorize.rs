//! SQLServer account authorization pre-check.
//!
//! A request names one or more accounts, the databases they should reach,
//! the client IPs and the target cluster domains. The pre-check verifies
//! every part against the privilege manager and the cluster metadata and
//! reports all failures at once.

use crate::error::AppError;
use crate::state::AppState;
use dbm_clients::priv_manager::{AccountRules, ListAccountRulesRequest};
use dbm_core::ClusterType;
use dbm_core::filter::split_list;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

const ACCOUNT_TYPE: &str = "sqlserver";

/// Authorization request of the SQLServer permission pages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqlserverAuthorizeMeta {
    /// Account names, comma separated.
    pub user: String,
    /// Databases to grant.
    #[serde(default)]
    pub access_dbs: Vec<String>,
    /// Client addresses.
    #[serde(default)]
    pub source_ips: Vec<String>,
    /// Target cluster domains.
    #[serde(default)]
    pub target_instances: Vec<String>,
    /// `sqlserver_single` or `sqlserver_ha`.
    pub cluster_type: ClusterType,
}

/// Authorization data of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizeData {
    /// Account name.
    pub user: String,
    /// Databases to grant.
    pub access_dbs: Vec<String>,
    /// Client addresses.
    pub source_ips: Vec<String>,
    /// Target cluster domains.
    pub target_instances: Vec<String>,
    /// Cluster type of the targets.
    pub cluster_type: ClusterType,
    /// Business.
    pub bk_biz_id: i64,
}

/// Result of [`SqlserverAuthorizeHandler::multi_user_pre_check_rules`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreCheckResult {
    /// Whether every check passed.
    pub pre_check: bool,
    /// Failures, one per line; empty when the check passed.
    pub message: String,
    /// Id of this authorization attempt.
    pub authorize_uid: String,
    /// Per-account authorization data.
    pub authorize_data: Vec<AuthorizeData>,
}

/// Whether the rule pattern `pattern` covers `dbname`; `%` matches any run
/// of characters.
#[must_use]
pub fn db_pattern_matches(pattern: &str, dbname: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return pattern == dbname;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !dbname.starts_with(first) || dbname.len() < first.len() + last.len() || !dbname.ends_with(last) {
        return false;
    }
    let mut rest = &dbname[first.len()..dbname.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    true
}

/// Authorization checks for one business, on behalf of one operator.
pub struct SqlserverAuthorizeHandler {
    state: AppState,
    bk_biz_id: i64,
    operator: String,
}

impl SqlserverAuthorizeHandler {
    /// Handler for `bk_biz_id`.
    #[must_use]
    pub fn new(state: AppState, bk_biz_id: i64, operator: impl Into<String>) -> Self {
        Self {
            state,
            bk_biz_id,
            operator: operator.into(),
        }
    }

    fn check_source_ips(meta: &SqlserverAuthorizeMeta, failures: &mut Vec<String>) {
        if meta.source_ips.is_empty() {
            failures.push("source_ips must not be empty".to_string());
        }
        let invalid: Vec<&str> = meta
            .source_ips
            .iter()
            .map(String::as_str)
            .filter(|ip| ip.parse::<IpAddr>().is_err())
            .collect();
        if !invalid.is_empty() {
            failures.push(format!("invalid source ips: {}", invalid.join(", ")));
        }
    }

    async fn check_targets(&self, meta: &SqlserverAuthorizeMeta, failures: &mut Vec<String>) -> Result<(), AppError> {
        if meta.target_instances.is_empty() {
            failures.push("target_instances must not be empty".to_string());
        }
        for domain in &meta.target_instances {
            let cluster = self
                .state
                .meta
                .find_cluster_by_domain(self.bk_biz_id, domain.clone())
                .await?;
            match cluster {
                None => failures.push(format!(
                    "cluster {domain} does not exist in business {}",
                    self.bk_biz_id
                )),
                Some(cluster) if cluster.cluster_type != meta.cluster_type => failures.push(format!(
                    "cluster {domain} is {}, not {}",
                    cluster.cluster_type, meta.cluster_type
                )),
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn check_account(
        &self,
        user: &str,
        access_dbs: &[String],
        accounts: &[AccountRules],
        failures: &mut Vec<String>,
    ) {
        let Some(account) = accounts.iter().find(|a| a.account.user == user) else {
            failures.push(format!(
                "account {user} does not exist in business {}",
                self.bk_biz_id
            ));
            return;
        };

        let uncovered: Vec<&str> = access_dbs
            .iter()
            .map(String::as_str)
            .filter(|db| !account.rules.iter().any(|rule| db_pattern_matches(&rule.dbname, db)))
            .collect();
        if !uncovered.is_empty() {
            failures.push(format!(
                "account {user} has no rule for databases: {}",
                uncovered.join(", ")
            ));
        }
    }

    /// Check every account of `meta` and collect the authorization data.
    ///
    /// Failed checks are reported in the result, not as errors.
    ///
    /// # Errors
    ///
    /// - [`AppError::validation`] for an empty account list, an empty
    ///   database list or a non-SQLServer cluster type
    /// - an upstream or store error when a lookup fails
    pub async fn multi_user_pre_check_rules(&self, meta: SqlserverAuthorizeMeta) -> Result<PreCheckResult, AppError> {
        if !meta.cluster_type.is_sqlserver() {
            return Err(AppError::validation(format!(
                "cluster_type {} is not a SQLServer type",
                meta.cluster_type
            )));
        }
        let users = split_list(&meta.user);
        if users.is_empty() {
            return Err(AppError::validation("user must not be empty"));
        }
        if meta.access_dbs.is_empty() {
            return Err(AppError::validation("access_dbs must not be empty"));
        }

        let accounts = self
            .state
            .priv_manager
            .list_account_rules(ListAccountRulesRequest {
                bk_biz_id: self.bk_biz_id,
                account_type: ACCOUNT_TYPE.to_string(),
                user: users.clone(),
            })
            .await?;

        let mut failures = Vec::new();
        for user in &users {
            self.check_account(user, &meta.access_dbs, &accounts, &mut failures);
        }
        Self::check_source_ips(&meta, &mut failures);
        self.check_targets(&meta, &mut failures).await?;

        let authorize_data = users
            .into_iter()
            .map(|user| AuthorizeData {
                user,
                access_dbs: meta.access_dbs.clone(),
                source_ips: meta.source_ips.clone(),
                target_instances: meta.target_instances.clone(),
                cluster_type: meta.cluster_type,
                bk_biz_id: self.bk_biz_id,
            })
            .collect();

        let pre_check = failures.is_empty();
        tracing::info!(
            bk_biz_id = self.bk_biz_id,
            operator = %self.operator,
            pre_check,
            failures = failures.len(),
            "Authorize rules pre-checked"
        );
        Ok(PreCheckResult {
            pre_check,
            message: failures.join("\n"),
            authorize_uid: Uuid::new_v4().simple().to_string(),
            authorize_data,
        })
    }
}
