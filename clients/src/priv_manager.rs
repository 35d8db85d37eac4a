//! Privilege manager: component passwords and account rules.
//!
//! Passwords travel base64 encoded in both directions; the client encodes on
//! write and decodes on read so callers only see plain text.

use crate::ApiFuture;
use crate::error::{ApiError, ApiResult};
use crate::http::{BkApiClient, ClientConfig};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Instance a password is bound to. Component-wide passwords use `0.0.0.0:0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordInstance {
    /// Address (IP or domain).
    pub ip: String,
    /// Port, 0 for any.
    pub port: i32,
    /// Cloud region.
    pub bk_cloud_id: i64,
}

impl PasswordInstance {
    /// The wildcard instance used for component-wide passwords.
    #[must_use]
    pub fn any() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 0,
            bk_cloud_id: 0,
        }
    }
}

/// `modify_password` parameters; `password` is plain text here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyPasswordRequest {
    /// Instances the password applies to.
    pub instances: Vec<PasswordInstance>,
    /// Account name.
    pub username: String,
    /// Plain text password.
    pub password: String,
    /// Component (`mysql`, `proxy`, `kafka`, ...).
    pub component: String,
    /// Operator.
    pub operator: String,
}

#[derive(Serialize)]
struct ModifyPasswordBody<'a> {
    instances: &'a [PasswordInstance],
    username: &'a str,
    password: String,
    component: &'a str,
    operator: &'a str,
}

/// A `(username, component)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentUser {
    /// Account name.
    pub username: String,
    /// Component.
    pub component: String,
}

impl ComponentUser {
    /// Shorthand constructor.
    #[must_use]
    pub fn new(username: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            component: component.into(),
        }
    }
}

#[derive(Serialize)]
struct GetPasswordBody<'a> {
    instances: Vec<PasswordInstance>,
    users: &'a [ComponentUser],
}

#[derive(Deserialize)]
struct PasswordItems {
    #[serde(default)]
    items: Vec<PasswordItem>,
}

#[derive(Deserialize)]
struct PasswordItem {
    username: String,
    component: String,
    password: String,
}

/// Passwords keyed by username, then component.
pub type ComponentPasswords = HashMap<String, HashMap<String, String>>;

/// An account known to the privilege manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    /// Account id.
    #[serde(default)]
    pub account_id: i64,
    /// Account name.
    pub user: String,
}

/// One database pattern granted to an account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountRule {
    /// Rule id.
    #[serde(default)]
    pub rule_id: i64,
    /// Database pattern, `%` is a wildcard.
    pub dbname: String,
    /// Granted privileges.
    #[serde(default)]
    pub privilege: String,
}

/// An account with its rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountRules {
    /// The account.
    pub account: Account,
    /// Its rules.
    #[serde(default)]
    pub rules: Vec<AccountRule>,
}

/// `list_account_rules` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListAccountRulesRequest {
    /// Business.
    pub bk_biz_id: i64,
    /// Account type (`sqlserver`, `mysql`, ...).
    pub account_type: String,
    /// Accounts to look up; empty means all.
    pub user: Vec<String>,
}

#[derive(Deserialize)]
struct AccountRulesPage {
    #[serde(default)]
    results: Vec<AccountRules>,
}

/// Operations of the privilege manager.
pub trait PrivManagerApi: Send + Sync {
    /// Store `password` for `username` on every listed instance.
    fn modify_password(&self, request: ModifyPasswordRequest) -> ApiFuture<'_, ()>;

    /// Component-wide password of one account.
    fn get_component_password(&self, username: String, component: String) -> ApiFuture<'_, String>;

    /// Component-wide passwords of several accounts.
    fn batch_query_components_password(
        &self,
        users: Vec<ComponentUser>,
    ) -> ApiFuture<'_, ComponentPasswords>;

    /// Accounts of a business with their rules.
    fn list_account_rules(&self, request: ListAccountRulesRequest) -> ApiFuture<'_, Vec<AccountRules>>;
}

fn decode_password(raw: &str) -> ApiResult<String> {
    let bytes = BASE64
        .decode(raw)
        .map_err(|e| ApiError::InvalidPassword(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ApiError::InvalidPassword(e.to_string()))
}

/// HTTP implementation of [`PrivManagerApi`].
#[derive(Debug, Clone)]
pub struct PrivManagerClient {
    http: BkApiClient,
}

impl PrivManagerClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        Ok(Self {
            http: BkApiClient::new("priv_manager", config)?,
        })
    }

    async fn query_passwords(&self, users: &[ComponentUser]) -> ApiResult<ComponentPasswords> {
        let page: PasswordItems = self
            .http
            .post(
                "priv_manager/password/get_password",
                &GetPasswordBody {
                    instances: vec![PasswordInstance::any()],
                    users,
                },
            )
            .await?;

        let mut passwords = ComponentPasswords::new();
        for item in page.items {
            passwords
                .entry(item.username)
                .or_default()
                .insert(item.component, decode_password(&item.password)?);
        }
        Ok(passwords)
    }
}

impl PrivManagerApi for PrivManagerClient {
    fn modify_password(&self, request: ModifyPasswordRequest) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let body = ModifyPasswordBody {
                instances: &request.instances,
                username: &request.username,
                password: BASE64.encode(request.password.as_bytes()),
                component: &request.component,
                operator: &request.operator,
            };
            let _: serde_json::Value = self
                .http
                .post("priv_manager/password/modify_password", &body)
                .await?;
            tracing::info!(
                username = %request.username,
                component = %request.component,
                instances = request.instances.len(),
                "Password stored"
            );
            Ok(())
        })
    }

    fn get_component_password(&self, username: String, component: String) -> ApiFuture<'_, String> {
        Box::pin(async move {
            let user = ComponentUser::new(username, component);
            let mut passwords = self.query_passwords(std::slice::from_ref(&user)).await?;
            passwords
                .get_mut(&user.username)
                .and_then(|by_component| by_component.remove(&user.component))
                .ok_or_else(|| {
                    ApiError::NotFound(format!("password of {}/{}", user.username, user.component))
                })
        })
    }

    fn batch_query_components_password(
        &self,
        users: Vec<ComponentUser>,
    ) -> ApiFuture<'_, ComponentPasswords> {
        Box::pin(async move { self.query_passwords(&users).await })
    }

    fn list_account_rules(&self, request: ListAccountRulesRequest) -> ApiFuture<'_, Vec<AccountRules>> {
        Box::pin(async move {
            let page: AccountRulesPage = self
                .http
                .post("priv_manager/account/list_account_rules", &request)
                .await?;
            Ok(page.results)
        })
    }
}
