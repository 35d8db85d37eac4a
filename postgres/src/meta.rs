//! [`MetaStore`] over the read models owned by the ticket and metadata services.

use crate::{PgStore, db_err, rows};
use dbm_core::models::{AppCache, Cluster, StorageInstance, Ticket};
use dbm_core::{MetaStore, StoreError, StoreFuture};

const CLUSTER_COLUMNS: &str =
    "id, bk_biz_id, bk_cloud_id, name, immute_domain, cluster_type, phase, major_version";

impl MetaStore for PgStore {
    fn list_tickets(&self, ids: Vec<i64>) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move {
            let records = sqlx::query(
                "SELECT id, ticket_type, creator, bk_biz_id, status, details \
                 FROM tickets WHERE id = ANY($1) ORDER BY id",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            records.iter().map(rows::ticket).collect()
        })
    }

    fn list_apps(&self, bk_biz_ids: Vec<i64>) -> StoreFuture<'_, Vec<AppCache>> {
        Box::pin(async move {
            let records = sqlx::query(
                "SELECT bk_biz_id, bk_biz_name, db_app_abbr FROM app_cache \
                 WHERE bk_biz_id = ANY($1) ORDER BY bk_biz_id",
            )
            .bind(&bk_biz_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(records.iter().map(rows::app_cache).collect())
        })
    }

    fn get_cluster(&self, id: i64) -> StoreFuture<'_, Cluster> {
        Box::pin(async move {
            let sql = format!("SELECT {CLUSTER_COLUMNS} FROM clusters WHERE id = $1");
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?
                .ok_or_else(|| StoreError::not_found("cluster", id))?;
            rows::cluster(&row)
        })
    }

    fn list_clusters(&self, ids: Vec<i64>) -> StoreFuture<'_, Vec<Cluster>> {
        Box::pin(async move {
            let sql = format!("SELECT {CLUSTER_COLUMNS} FROM clusters WHERE id = ANY($1) ORDER BY id");
            let records = sqlx::query(&sql)
                .bind(&ids)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
            records.iter().map(rows::cluster).collect()
        })
    }

    fn storage_instances(&self, cluster_id: i64) -> StoreFuture<'_, Vec<StorageInstance>> {
        Box::pin(async move {
            let records = sqlx::query(
                "SELECT id, cluster_id, bk_host_id, ip, port, instance_role \
                 FROM storage_instances WHERE cluster_id = $1 ORDER BY id",
            )
            .bind(cluster_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(records.iter().map(rows::storage_instance).collect())
        })
    }

    fn find_cluster_by_domain(
        &self,
        bk_biz_id: i64,
        domain: String,
    ) -> StoreFuture<'_, Option<Cluster>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {CLUSTER_COLUMNS} FROM clusters WHERE bk_biz_id = $1 AND immute_domain = $2"
            );
            let row = sqlx::query(&sql)
                .bind(bk_biz_id)
                .bind(&domain)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            row.as_ref().map(rows::cluster).transpose()
        })
    }
}
