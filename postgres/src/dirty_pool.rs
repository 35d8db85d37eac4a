//! [`DirtyPoolStore`] over `dirty_machines` and `machine_events`.

use crate::{PgStore, db_err, rows};
use dbm_core::filter::{DirtyMachineFilter, MachineEventFilter, MachinePoolFilter};
use dbm_core::models::{DirtyMachine, MachineEvent, NewMachineEvent};
use dbm_core::store::DirtyMachineRow;
use dbm_core::{DirtyPoolStore, Page, Paged, PoolType, StoreError, StoreFuture};
use sqlx::{Postgres, QueryBuilder};

const DIRTY_JOIN: &str = " FROM dirty_machines m LEFT JOIN tickets t ON t.id = m.ticket_id WHERE TRUE";

fn push_dirty_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &DirtyMachineFilter) {
    if let Some(ips) = &filter.ip_list {
        qb.push(" AND m.ip = ANY(").push_bind(ips.clone()).push(")");
    }
    if let Some(ticket_id) = filter.ticket_id {
        qb.push(" AND m.ticket_id = ").push_bind(ticket_id);
    }
    if let Some(task_id) = &filter.task_id {
        qb.push(" AND m.task_id = ").push_bind(task_id.clone());
    }
    if let Some(ticket_type) = filter.ticket_type {
        qb.push(" AND t.ticket_type = ").push_bind(ticket_type.as_str());
    }
    if let Some(operator) = &filter.operator {
        qb.push(" AND t.creator = ").push_bind(operator.clone());
    }
}

fn push_pool_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &MachinePoolFilter) {
    if let Some(pool) = filter.pool {
        qb.push(" AND m.pool = ").push_bind(pool.as_str());
    }
    if let Some(ips) = &filter.ips {
        qb.push(" AND m.ip = ANY(").push_bind(ips.clone()).push(")");
    }
    if let Some(biz) = filter.bk_biz_id {
        qb.push(" AND m.bk_biz_id = ").push_bind(biz);
    }
    if let Some(city) = &filter.city {
        qb.push(" AND m.city = ").push_bind(city.clone());
    }
    if let Some(zone) = &filter.sub_zone {
        qb.push(" AND m.sub_zone = ").push_bind(zone.clone());
    }
    if let Some(class) = &filter.device_class {
        qb.push(" AND m.device_class = ").push_bind(class.clone());
    }
    if let Some(os) = &filter.os_name {
        qb.push(" AND strpos(m.os_name, ").push_bind(os.clone()).push(") > 0");
    }
}

fn push_event_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &MachineEventFilter) {
    if let Some(ips) = &filter.ips {
        qb.push(" AND ip = ANY(").push_bind(ips.clone()).push(")");
    }
    if let Some(biz) = filter.bk_biz_id {
        qb.push(" AND bk_biz_id = ").push_bind(biz);
    }
    if let Some(event) = filter.event {
        qb.push(" AND event = ").push_bind(event.as_str());
    }
    if let Some(operator) = &filter.operator {
        qb.push(" AND creator = ").push_bind(operator.clone());
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Page) {
    qb.push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);
}

impl DirtyPoolStore for PgStore {
    fn query_dirty_machines(
        &self,
        filter: DirtyMachineFilter,
        page: Page,
    ) -> StoreFuture<'_, Paged<DirtyMachineRow>> {
        Box::pin(async move {
            let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
            count_qb.push(DIRTY_JOIN);
            push_dirty_filter(&mut count_qb, &filter);
            let (count,): (i64,) = count_qb
                .build_query_as()
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

            let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
            qb.push(rows::DIRTY_MACHINE_COLUMNS);
            qb.push(
                ", t.id AS t_id, t.ticket_type AS t_ticket_type, t.creator AS t_creator, \
                 t.bk_biz_id AS t_bk_biz_id, t.status AS t_status, t.details AS t_details",
            );
            qb.push(DIRTY_JOIN);
            push_dirty_filter(&mut qb, &filter);
            qb.push(" ORDER BY m.ticket_id DESC NULLS LAST, m.bk_host_id");
            push_page(&mut qb, page);

            let records = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
            let results = records
                .iter()
                .map(|row| {
                    Ok(DirtyMachineRow {
                        machine: rows::dirty_machine(row)?,
                        ticket: rows::joined_ticket(row)?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Paged { count, results })
        })
    }

    fn query_machine_pool(
        &self,
        filter: MachinePoolFilter,
        page: Page,
    ) -> StoreFuture<'_, Paged<DirtyMachine>> {
        Box::pin(async move {
            let mut count_qb =
                QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM dirty_machines m WHERE TRUE");
            push_pool_filter(&mut count_qb, &filter);
            let (count,): (i64,) = count_qb
                .build_query_as()
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

            let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
            qb.push(rows::DIRTY_MACHINE_COLUMNS);
            qb.push(" FROM dirty_machines m WHERE TRUE");
            push_pool_filter(&mut qb, &filter);
            qb.push(" ORDER BY m.bk_host_id");
            push_page(&mut qb, page);

            let records = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
            let results = records
                .iter()
                .map(rows::dirty_machine)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Paged { count, results })
        })
    }

    fn list_dirty_machines(&self, bk_host_ids: Vec<i64>) -> StoreFuture<'_, Vec<DirtyMachine>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {} FROM dirty_machines m WHERE m.bk_host_id = ANY($1) ORDER BY m.bk_host_id",
                rows::DIRTY_MACHINE_COLUMNS
            );
            let records = sqlx::query(&sql)
                .bind(&bk_host_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
            records.iter().map(rows::dirty_machine).collect()
        })
    }

    fn delete_dirty_machines(&self, bk_host_ids: Vec<i64>) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM dirty_machines WHERE bk_host_id = ANY($1)")
                .bind(&bk_host_ids)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

            Ok(result.rows_affected())
        })
    }

    fn transfer_hosts(
        &self,
        bk_host_ids: Vec<i64>,
        source: PoolType,
        target: Option<PoolType>,
        events: Vec<NewMachineEvent>,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let moved = match target {
                Some(pool) => sqlx::query(
                    "UPDATE dirty_machines SET pool = $1, update_at = now() \
                     WHERE bk_host_id = ANY($2) AND pool = $3",
                )
                .bind(pool.as_str())
                .bind(&bk_host_ids)
                .bind(source.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?,
                None => sqlx::query("DELETE FROM dirty_machines WHERE bk_host_id = ANY($1) AND pool = $2")
                    .bind(&bk_host_ids)
                    .bind(source.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?,
            }
            .rows_affected();

            if moved != bk_host_ids.len() as u64 {
                tx.rollback().await.map_err(db_err)?;
                return Err(StoreError::Conflict(format!(
                    "{} of {} hosts are no longer in the {source} pool",
                    bk_host_ids.len() as u64 - moved,
                    bk_host_ids.len()
                )));
            }

            for event in &events {
                sqlx::query(
                    r"
                    INSERT INTO machine_events (
                        bk_biz_id, bk_host_id, ip, event, to_pool, ticket_id, remark, creator, create_at
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    ",
                )
                .bind(event.bk_biz_id)
                .bind(event.bk_host_id)
                .bind(&event.ip)
                .bind(event.event.as_str())
                .bind(event.to.as_ref().map(PoolType::as_str))
                .bind(event.ticket_id)
                .bind(&event.remark)
                .bind(&event.creator)
                .bind(event.create_at)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }

            tx.commit().await.map_err(db_err)?;
            tracing::debug!(hosts = bk_host_ids.len(), events = events.len(), "Transfer committed");
            Ok(())
        })
    }

    fn list_machine_events(
        &self,
        filter: MachineEventFilter,
        page: Page,
    ) -> StoreFuture<'_, Paged<MachineEvent>> {
        Box::pin(async move {
            let mut count_qb =
                QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM machine_events WHERE TRUE");
            push_event_filter(&mut count_qb, &filter);
            let (count,): (i64,) = count_qb
                .build_query_as()
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

            let mut qb = QueryBuilder::<Postgres>::new(
                "SELECT id, bk_biz_id, bk_host_id, ip, event, to_pool, ticket_id, remark, creator, \
                 create_at FROM machine_events WHERE TRUE",
            );
            push_event_filter(&mut qb, &filter);
            qb.push(" ORDER BY id DESC");
            push_page(&mut qb, page);

            let records = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
            let results = records
                .iter()
                .map(rows::machine_event)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Paged { count, results })
        })
    }
}
