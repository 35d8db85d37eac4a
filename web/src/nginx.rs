//! Nginx sub-configuration templates for published cluster services.
//!
//! Each big data cluster type that exposes a web service gets one
//! `location` block per [`ClusterExtension`], served under
//! `/{bk_biz_id}/{db_type}/{cluster_name}/{service_type}/` on the cloud's
//! nginx proxy. Templates are rendered with `tera` in one pass, so values
//! containing template syntax are written verbatim.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dbm_core::ClusterType;
use dbm_core::models::ClusterExtension;
use serde::Serialize;
use tera::{Context, Tera};

const ES_CONF_TPL: &str = r"location {{location}} {
    proxy_pass http://{{ip}}:{{port}}/;
    proxy_set_header Host $host;
    proxy_set_header X-Real-IP $remote_addr;
    proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    proxy_http_version 1.1;
    proxy_read_timeout 300s;
}
";

const HDFS_CONF_TPL: &str = r"location {{location}} {
    proxy_pass http://{{ip}}:{{port}}/;
    proxy_set_header Host $host;
    proxy_set_header X-Real-IP $remote_addr;
    proxy_redirect / {{location}};
    sub_filter_types text/html application/javascript;
    sub_filter '/static/' '{{location}}static/';
    sub_filter '/webhdfs/' '{{location}}webhdfs/';
    sub_filter_once off;
}
";

const PULSAR_CONF_TPL: &str = r#"location {{location}} {
    proxy_pass http://{{ip}}:{{port}}/;
    proxy_set_header Host $host;
    proxy_set_header X-Real-IP $remote_addr;
    proxy_http_version 1.1;
    proxy_set_header Upgrade $http_upgrade;
    proxy_set_header Connection "upgrade";
    proxy_redirect / {{location}};
}
"#;

const INFLUXDB_CONF_TPL: &str = r"location {{location}} {
    proxy_pass http://{{ip}}:{{port}}/;
    proxy_set_header Host $host;
    proxy_set_header X-Real-IP $remote_addr;
    proxy_redirect / {{location}};
    sub_filter_types text/html application/javascript;
    sub_filter '/assets/' '{{location}}assets/';
    sub_filter_once off;
}
";

/// Template for `db_type`, if it publishes a web service through nginx.
#[must_use]
pub fn conf_template(db_type: &str) -> Option<&'static str> {
    match db_type.parse::<ClusterType>().ok()? {
        ClusterType::Es => Some(ES_CONF_TPL),
        ClusterType::Hdfs => Some(HDFS_CONF_TPL),
        ClusterType::Pulsar => Some(PULSAR_CONF_TPL),
        ClusterType::Influxdb => Some(INFLUXDB_CONF_TPL),
        _ => None,
    }
}

/// A rendered sub-configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NginxConfFile {
    /// `{bk_biz_id}_{db_type}_{cluster_name}_{service_type}.conf`
    pub file_name: String,
    /// File content, base64 encoded when requested.
    pub content: String,
}

/// URL path the extension is served under.
#[must_use]
pub fn location(extension: &ClusterExtension) -> String {
    format!(
        "/{}/{}/{}/{}/",
        extension.bk_biz_id, extension.db_type, extension.cluster_name, extension.service_type
    )
}

/// Public URL of the extension behind the nginx at `nginx_address`.
#[must_use]
pub fn access_url(extension: &ClusterExtension, nginx_address: &str) -> String {
    format!("http://{nginx_address}{}", location(extension))
}

/// Render `template` for `extension`.
///
/// # Errors
///
/// Returns a [`tera::Error`] if `template` does not parse.
pub fn render_nginx_tpl(
    template: &str,
    extension: &ClusterExtension,
    encode: bool,
) -> Result<NginxConfFile, tera::Error> {
    let mut context = Context::new();
    context.insert("location", &location(extension));
    context.insert("ip", &extension.ip);
    context.insert("port", &extension.port);
    let content = Tera::one_off(template, &context, false)?;

    Ok(NginxConfFile {
        file_name: format!(
            "{}_{}_{}_{}.conf",
            extension.bk_biz_id, extension.db_type, extension.cluster_name, extension.service_type
        ),
        content: if encode { BASE64.encode(content) } else { content },
    })
}
