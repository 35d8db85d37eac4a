//! [`ProxyStore`] over `db_extensions`, `cloud_proxies` and `cluster_extensions`.

use crate::{PgStore, db_err, rows};
use dbm_core::models::{ClusterExtension, DBCloudProxy, DBExtension, NewDBExtension};
use dbm_core::{ProxyStore, StoreError, StoreFuture};

impl ProxyStore for PgStore {
    fn insert_extension(&self, extension: NewDBExtension) -> StoreFuture<'_, DBExtension> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                INSERT INTO db_extensions (bk_cloud_id, extension, status, details, creator)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, bk_cloud_id, extension, status, details, creator, create_at
                ",
            )
            .bind(extension.bk_cloud_id)
            .bind(extension.extension.as_str())
            .bind(extension.status.as_str())
            .bind(&extension.details)
            .bind(&extension.creator)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

            let saved = rows::extension(&row)?;
            tracing::debug!(id = saved.id, bk_cloud_id = saved.bk_cloud_id, "Extension row inserted");
            Ok(saved)
        })
    }

    fn create_cloud_proxy(
        &self,
        bk_cloud_id: i64,
        internal_address: String,
        external_address: String,
    ) -> StoreFuture<'_, DBCloudProxy> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                INSERT INTO cloud_proxies (bk_cloud_id, internal_address, external_address)
                VALUES ($1, $2, $3)
                RETURNING id, bk_cloud_id, internal_address, external_address
                ",
            )
            .bind(bk_cloud_id)
            .bind(&internal_address)
            .bind(&external_address)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(rows::cloud_proxy(&row))
        })
    }

    fn last_cloud_proxy(&self, bk_cloud_id: i64) -> StoreFuture<'_, Option<DBCloudProxy>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, bk_cloud_id, internal_address, external_address FROM cloud_proxies \
                 WHERE bk_cloud_id = $1 ORDER BY id DESC LIMIT 1",
            )
            .bind(bk_cloud_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(row.as_ref().map(rows::cloud_proxy))
        })
    }

    fn list_cluster_extensions(
        &self,
        bk_cloud_id: i64,
    ) -> StoreFuture<'_, Vec<ClusterExtension>> {
        Box::pin(async move {
            let records = sqlx::query(
                "SELECT id, bk_biz_id, bk_cloud_id, cluster_id, cluster_name, db_type, \
                 service_type, ip, port, access_url FROM cluster_extensions \
                 WHERE bk_cloud_id = $1 ORDER BY id",
            )
            .bind(bk_cloud_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(records.iter().map(rows::cluster_extension).collect())
        })
    }

    fn save_access_url(&self, id: i64, access_url: String) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query("UPDATE cluster_extensions SET access_url = $1 WHERE id = $2")
                .bind(&access_url)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("cluster extension", id));
            }
            Ok(())
        })
    }
}
