// ==========================================
// 烘焙生产库存系统 - 生产单仓储
// ==========================================
// 表: production_run
// 红线: 状态迁移合法性由 engine::production 判定，仓储只负责读写
// ==========================================

use crate::domain::production::{ProductionRun, ProductionRunView};
use crate::domain::types::ProductionStatus;
use crate::repository::db_utils::{
    invalid_enum_value, millis_column, millis_column_opt, to_millis, to_millis_opt,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const RUN_COLUMNS: &str = "r.run_id, r.bom_id, r.status, r.target_quantity, r.produced_quantity, \
                           r.rejected_quantity, r.notes, r.start_date, r.completed_date, r.archived_at";

pub struct ProductionRunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionRunRepository {
    /// 创建新的生产单仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入生产单
    pub fn insert_tx(conn: &Connection, run: &ProductionRun) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO production_run (
                   run_id, bom_id, status, target_quantity, produced_quantity,
                   rejected_quantity, notes, start_date, completed_date, archived_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                run.run_id,
                run.bom_id,
                run.status.as_db_str(),
                run.target_quantity,
                run.produced_quantity,
                run.rejected_quantity,
                run.notes,
                to_millis(&run.start_date),
                to_millis_opt(&run.completed_date),
                to_millis_opt(&run.archived_at),
            ],
        )?;
        Ok(())
    }

    /// 完工回写（状态 / 产量 / 不良 / 备注 / 完工时间）
    ///
    /// 仅在状态仍为 planned 时更新，返回受影响行数
    pub fn mark_completed_tx(
        conn: &Connection,
        run_id: &str,
        produced_quantity: f64,
        rejected_quantity: f64,
        notes: Option<&str>,
        completed_date: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let rows = conn.execute(
            r#"UPDATE production_run
               SET status = 'completed',
                   produced_quantity = ?1,
                   rejected_quantity = ?2,
                   notes = COALESCE(?3, notes),
                   completed_date = ?4
               WHERE run_id = ?5 AND status = 'planned'"#,
            params![
                produced_quantity,
                rejected_quantity,
                notes,
                to_millis(&completed_date),
                run_id
            ],
        )?;
        Ok(rows)
    }

    /// 更新状态（仅当当前状态为 `from` 时）
    pub fn update_status_tx(
        conn: &Connection,
        run_id: &str,
        from: ProductionStatus,
        to: ProductionStatus,
    ) -> RepositoryResult<usize> {
        let rows = conn.execute(
            "UPDATE production_run SET status = ?1 WHERE run_id = ?2 AND status = ?3",
            params![to.as_db_str(), run_id, from.as_db_str()],
        )?;
        Ok(rows)
    }

    /// 归档完工时间早于截止时间的已完成生产单
    ///
    /// # 返回
    /// - 本次新归档的数量（已归档的不重复计数）
    pub fn archive_completed_before(
        &self,
        cutoff: DateTime<Utc>,
        archived_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE production_run
               SET archived_at = ?1
               WHERE status = 'completed'
                 AND archived_at IS NULL
                 AND completed_date IS NOT NULL
                 AND completed_date < ?2"#,
            params![to_millis(&archived_at), to_millis(&cutoff)],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, run_id: &str) -> RepositoryResult<Option<ProductionRun>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, run_id)
    }

    pub fn find_by_id_tx(conn: &Connection, run_id: &str) -> RepositoryResult<Option<ProductionRun>> {
        let sql = format!("SELECT {} FROM production_run r WHERE r.run_id = ?1", RUN_COLUMNS);
        let run = conn
            .query_row(&sql, params![run_id], Self::map_run)
            .optional()?;
        Ok(run)
    }

    /// 查询生产单列表（附配方/成品名称，按开工时间倒序）
    pub fn list_views(&self, include_archived: bool) -> RepositoryResult<Vec<ProductionRunView>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {}, bo.name, p.name
               FROM production_run r
               LEFT JOIN bom bo ON bo.bom_id = r.bom_id
               LEFT JOIN finished_product p ON p.product_id = bo.product_id
               WHERE (?1 = 1 OR r.archived_at IS NULL)
               ORDER BY r.start_date DESC, r.run_id ASC"#,
            RUN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let views = stmt
            .query_map(params![include_archived], |row| {
                let product_name: Option<String> = row.get(11)?;
                Ok(ProductionRunView {
                    run: Self::map_run(row)?,
                    bom_name: row.get(10)?,
                    product_name: product_name.unwrap_or_else(|| "Unknown".to_string()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }

    fn map_run(row: &Row<'_>) -> rusqlite::Result<ProductionRun> {
        let raw_status: String = row.get(2)?;
        let status =
            ProductionStatus::from_db_str(&raw_status).ok_or_else(|| invalid_enum_value(2, &raw_status))?;

        Ok(ProductionRun {
            run_id: row.get(0)?,
            bom_id: row.get(1)?,
            status,
            target_quantity: row.get(3)?,
            produced_quantity: row.get(4)?,
            rejected_quantity: row.get(5)?,
            notes: row.get(6)?,
            start_date: millis_column(row, 7)?,
            completed_date: millis_column_opt(row, 8)?,
            archived_at: millis_column_opt(row, 9)?,
        })
    }
}
