use crate::domain::ledger::TransactionLog;
use crate::repository::db_utils::{to_millis, to_millis_opt};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// TransactionLogRepository - 库存流水仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct TransactionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TransactionLogRepository {
    /// 创建新的流水仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 追加一条流水
    pub fn insert(&self, log: &TransactionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, log)?;
        Ok(log.log_id.clone())
    }

    /// 追加一条流水（调用方事务内）
    ///
    /// 与库存变更在同一事务中写入，事务回滚时流水一并回滚
    pub fn insert_tx(conn: &Connection, log: &TransactionLog) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO transaction_log (
                log_id, log_type, batch_id, batch_number, material_id,
                production_run_id, quantity, actor, notes, created_at, archived_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                log.log_id,
                log.log_type.as_db_str(),
                log.batch_id,
                log.batch_number,
                log.material_id,
                log.production_run_id,
                log.quantity,
                log.actor,
                log.notes,
                to_millis(&log.created_at),
                to_millis_opt(&log.archived_at),
            ],
        )?;
        Ok(())
    }

    /// 归档早于截止时间的流水
    ///
    /// # 返回
    /// - 本次新归档的条数
    pub fn archive_before(
        &self,
        cutoff: DateTime<Utc>,
        archived_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE transaction_log
            SET archived_at = ?
            WHERE archived_at IS NULL AND created_at < ?
            "#,
            params![to_millis(&archived_at), to_millis(&cutoff)],
        )?;
        Ok(rows)
    }
}
