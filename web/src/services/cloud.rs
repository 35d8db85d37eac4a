//! Cloud region extensions and their nginx publishing.

use crate::crypto::ExtensionAccount;
use crate::error::AppError;
use crate::nginx::{self, NginxConfFile};
use crate::state::AppState;
use dbm_clients::priv_manager::ComponentUser;
use dbm_core::models::NewDBExtension;
use dbm_core::{ExtensionServiceStatus, ExtensionType};
use serde_json::{Map, Value, json};

/// Input of [`CloudService::insert`].
#[derive(Debug, Clone, PartialEq)]
pub struct InsertExtension {
    /// Cloud region.
    pub bk_cloud_id: i64,
    /// Service being deployed.
    pub extension: ExtensionType,
    /// Service specific details, extended with generated credentials.
    pub details: Map<String, Value>,
}

/// Registration of cloud services and nginx configuration rendering.
#[derive(Clone)]
pub struct CloudService {
    state: AppState,
}

impl CloudService {
    /// Service over the application state.
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    fn account(&self) -> Result<ExtensionAccount, AppError> {
        ExtensionAccount::generate(&self.state.cipher)
            .map_err(|e| AppError::internal("Failed to generate account").with_source(e.into()))
    }

    /// Register an extension of a cloud region and return the credentials
    /// the deployment needs.
    ///
    /// # Errors
    ///
    /// - [`AppError::validation`] when a nginx extension has no `details.ip`
    /// - an upstream error when the password service fails
    /// - a store error when persisting fails
    pub async fn insert(&self, operator: &str, request: InsertExtension) -> Result<Value, AppError> {
        let InsertExtension {
            bk_cloud_id,
            extension,
            mut details,
        } = request;

        let output = match extension {
            ExtensionType::Nginx => {
                let ip = details
                    .get("ip")
                    .and_then(Value::as_str)
                    .filter(|ip| !ip.is_empty())
                    .ok_or_else(|| AppError::validation("details.ip is required for NGINX"))?
                    .to_string();
                self.state
                    .proxy
                    .create_cloud_proxy(bk_cloud_id, ip.clone(), ip)
                    .await?;
                json!({})
            }
            ExtensionType::Drs => {
                let drs = self.account()?;
                let webconsole = self.account()?;
                details.insert("user".into(), json!(drs.encrypt_user));
                details.insert("pwd".into(), json!(drs.encrypt_password));
                details.insert("webconsole_user".into(), json!(webconsole.encrypt_user));
                details.insert("webconsole_pwd".into(), json!(webconsole.encrypt_password));

                let proxy_password = self
                    .state
                    .priv_manager
                    .get_component_password("proxy".to_string(), "proxy".to_string())
                    .await?;
                json!({
                    "drs_account": drs,
                    "webconsole_account": webconsole,
                    "proxy_password": proxy_password,
                })
            }
            ExtensionType::Dbha => {
                let dbha = self.account()?;
                details.insert("user".into(), json!(dbha.encrypt_user));
                details.insert("pwd".into(), json!(dbha.encrypt_password));

                let passwords = self
                    .state
                    .priv_manager
                    .batch_query_components_password(vec![
                        ComponentUser::new("proxy", "proxy"),
                        ComponentUser::new("os_mysql", "mysql"),
                    ])
                    .await?;
                let lookup = |user: &str, component: &str| {
                    passwords
                        .get(user)
                        .and_then(|by_component| by_component.get(component))
                        .cloned()
                        .unwrap_or_default()
                };
                json!({
                    "dbha_account": dbha,
                    "proxy_password": lookup("proxy", "proxy"),
                    "mysql_os_password": lookup("os_mysql", "mysql"),
                })
            }
            ExtensionType::RedisDts => json!({}),
        };

        let saved = self
            .state
            .proxy
            .insert_extension(NewDBExtension {
                bk_cloud_id,
                extension,
                status: ExtensionServiceStatus::Running,
                details: Value::Object(details),
                creator: operator.to_string(),
            })
            .await?;

        metrics::counter!("proxy.extension.inserted", "extension" => extension.as_str()).increment(1);
        tracing::info!(
            bk_cloud_id,
            %extension,
            id = saved.id,
            operator,
            "Cloud extension registered"
        );
        Ok(output)
    }

    /// Render the nginx sub-configurations of a cloud and record the access
    /// URL of services that do not have one yet.
    ///
    /// # Errors
    ///
    /// - [`AppError::not_found`] when a URL has to be recorded but the cloud
    ///   has no nginx proxy
    /// - a store error when a query or update fails
    /// - [`AppError::internal`] if a template fails to render
    pub async fn pull_nginx_conf(&self, bk_cloud_id: i64) -> Result<Vec<NginxConfFile>, AppError> {
        let extensions = self.state.proxy.list_cluster_extensions(bk_cloud_id).await?;
        let mut proxy = None;
        let mut files = Vec::new();

        for extension in extensions {
            let Some(template) = nginx::conf_template(&extension.db_type) else {
                tracing::debug!(db_type = %extension.db_type, "No nginx template, skipping");
                continue;
            };

            if extension.access_url.is_none() {
                if proxy.is_none() {
                    proxy = self.state.proxy.last_cloud_proxy(bk_cloud_id).await?;
                }
                let Some(nginx_proxy) = &proxy else {
                    return Err(AppError::not_found("Nginx proxy of cloud", bk_cloud_id));
                };
                let address = format!("{}:{}", nginx_proxy.external_address, self.state.nginx_proxy_port);
                self.state
                    .proxy
                    .save_access_url(extension.id, nginx::access_url(&extension, &address))
                    .await?;
            }

            let file = nginx::render_nginx_tpl(template, &extension, false).map_err(|e| {
                AppError::internal("Failed to render nginx configuration").with_source(e.into())
            })?;
            files.push(file);
        }

        metrics::counter!("proxy.nginx_conf.rendered").increment(files.len() as u64);
        tracing::info!(bk_cloud_id, files = files.len(), "Nginx configuration rendered");
        Ok(files)
    }
}
