use super::core::TransactionLogRepository;
use crate::domain::ledger::{TransactionLog, TransactionLogView};
use crate::domain::types::TransactionType;
use crate::repository::db_utils::{invalid_enum_value, millis_column, millis_column_opt};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, Result as SqliteResult, Row, ToSql};

const LOG_COLUMNS: &str = "t.log_id, t.log_type, t.batch_id, t.batch_number, t.material_id, \
                           t.production_run_id, t.quantity, t.actor, t.notes, t.created_at, t.archived_at";

impl TransactionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询未归档流水（最新在前）
    pub fn list_active(&self) -> RepositoryResult<Vec<TransactionLogView>> {
        let conn = self.get_conn()?;
        Self::query_views(&conn, "t.archived_at IS NULL", params![])
    }

    /// 查询已归档流水
    pub fn list_archived(&self) -> RepositoryResult<Vec<TransactionLogView>> {
        let conn = self.get_conn()?;
        Self::query_views(&conn, "t.archived_at IS NOT NULL", params![])
    }

    /// 查询某原料的未归档流水
    pub fn find_by_material(&self, material_id: &str) -> RepositoryResult<Vec<TransactionLogView>> {
        let conn = self.get_conn()?;
        Self::query_views(
            &conn,
            "t.archived_at IS NULL AND t.material_id = ?",
            params![material_id],
        )
    }

    /// 查询某类型的未归档流水
    pub fn find_by_type(&self, log_type: TransactionType) -> RepositoryResult<Vec<TransactionLogView>> {
        let conn = self.get_conn()?;
        Self::query_views(
            &conn,
            "t.archived_at IS NULL AND t.log_type = ?",
            params![log_type.as_db_str()],
        )
    }

    /// 查询某生产单相关的全部流水（含已归档，按写入顺序）
    pub fn find_by_production_run(&self, run_id: &str) -> RepositoryResult<Vec<TransactionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM transaction_log t WHERE t.production_run_id = ? ORDER BY t.created_at ASC, t.rowid ASC",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![run_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 统计流水条数（含已归档）
    pub fn count_all(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM transaction_log", [], |row| row.get(0))?;
        Ok(count)
    }

    fn query_views(
        conn: &Connection,
        filter: &str,
        params: &[&dyn ToSql],
    ) -> RepositoryResult<Vec<TransactionLogView>> {
        let sql = format!(
            r#"
            SELECT {}, m.name
            FROM transaction_log t
            LEFT JOIN raw_material m ON m.material_id = t.material_id
            WHERE {}
            ORDER BY t.created_at DESC, t.rowid DESC
            "#,
            LOG_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let views = stmt
            .query_map(params, |row| {
                Ok(TransactionLogView {
                    log: Self::map_row(row)?,
                    material_name: row.get(11)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(views)
    }

    /// 行映射
    pub(super) fn map_row(row: &Row<'_>) -> SqliteResult<TransactionLog> {
        let raw_type: String = row.get(1)?;
        let log_type =
            TransactionType::from_db_str(&raw_type).ok_or_else(|| invalid_enum_value(1, &raw_type))?;

        Ok(TransactionLog {
            log_id: row.get(0)?,
            log_type,
            batch_id: row.get(2)?,
            batch_number: row.get(3)?,
            material_id: row.get(4)?,
            production_run_id: row.get(5)?,
            quantity: row.get(6)?,
            actor: row.get(7)?,
            notes: row.get(8)?,
            created_at: millis_column(row, 9)?,
            archived_at: millis_column_opt(row, 10)?,
        })
    }
}
