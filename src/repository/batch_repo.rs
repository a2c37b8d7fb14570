// ==========================================
// 烘焙生产库存系统 - 原料批次仓储
// ==========================================
// 表: batch
// 红线: Repository 不含业务逻辑（QC 可用性判定在 engine::qc）
// 红线: 数量归零的批次由调用方删除，不写入 0 数量
// ==========================================

use crate::domain::stock::{Batch, BatchView};
use crate::domain::types::QcStatus;
use crate::repository::db_utils::{invalid_enum_value, millis_column, to_millis};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const BATCH_COLUMNS: &str = "b.batch_id, b.material_id, b.supplier_id, b.batch_number, b.quantity, \
                             b.expiry_date, b.received_date, b.qc_status";

// FEFO 排序键: 到期时间 → 入库时间 → 批次ID
const FEFO_ORDER: &str = "b.expiry_date ASC, b.received_date ASC, b.batch_id ASC";

// ==========================================
// BatchRepository - 原料批次仓储
// ==========================================
pub struct BatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchRepository {
    /// 创建新的批次仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作（事务内）
    // ==========================================

    /// 插入批次
    pub fn insert_tx(conn: &Connection, batch: &Batch) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO batch (
                   batch_id, material_id, supplier_id, batch_number, quantity,
                   expiry_date, received_date, qc_status
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                batch.batch_id,
                batch.material_id,
                batch.supplier_id,
                batch.batch_number,
                batch.quantity,
                to_millis(&batch.expiry_date),
                to_millis(&batch.received_date),
                batch.qc_status.as_db_str(),
            ],
        )?;
        Ok(())
    }

    /// 更新批次剩余数量
    pub fn update_quantity_tx(conn: &Connection, batch_id: &str, quantity: f64) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE batch SET quantity = ?1 WHERE batch_id = ?2",
            params![quantity, batch_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Batch", batch_id));
        }
        Ok(())
    }

    /// 删除批次
    pub fn delete_tx(conn: &Connection, batch_id: &str) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM batch WHERE batch_id = ?1", params![batch_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Batch", batch_id));
        }
        Ok(())
    }

    /// 覆盖写入 QC 状态
    pub fn update_qc_status_tx(conn: &Connection, batch_id: &str, status: QcStatus) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE batch SET qc_status = ?1 WHERE batch_id = ?2",
            params![status.as_db_str(), batch_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Batch", batch_id));
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询批次
    pub fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<Batch>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, batch_id)
    }

    /// 按ID查询批次（调用方连接/事务内）
    pub fn find_by_id_tx(conn: &Connection, batch_id: &str) -> RepositoryResult<Option<Batch>> {
        let sql = format!("SELECT {} FROM batch b WHERE b.batch_id = ?1", BATCH_COLUMNS);
        let batch = conn
            .query_row(&sql, params![batch_id], Self::map_batch)
            .optional()?;
        Ok(batch)
    }

    /// 查询某原料全部批次（FEFO 顺序，不区分 QC 状态）
    pub fn find_by_material(&self, material_id: &str) -> RepositoryResult<Vec<Batch>> {
        let conn = self.get_conn()?;
        Self::find_by_material_tx(&conn, material_id)
    }

    /// 查询某原料全部批次（调用方连接/事务内）
    pub fn find_by_material_tx(conn: &Connection, material_id: &str) -> RepositoryResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {} FROM batch b WHERE b.material_id = ?1 ORDER BY {}",
            BATCH_COLUMNS, FEFO_ORDER
        );
        let mut stmt = conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params![material_id], Self::map_batch)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    /// 查询到期时间早于 `now` 的批次（不区分 QC 状态）
    pub fn find_past_expiry_tx(conn: &Connection, now: DateTime<Utc>) -> RepositoryResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {} FROM batch b WHERE b.expiry_date < ?1 ORDER BY {}",
            BATCH_COLUMNS, FEFO_ORDER
        );
        let mut stmt = conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params![to_millis(&now)], Self::map_batch)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    // ==========================================
    // 视图查询
    // ==========================================

    /// 查询全部批次视图（附原料/供应商名称，按到期时间排序）
    pub fn list_views(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<BatchView>> {
        self.query_views("1 = 1", params![], now)
    }

    /// 查询某原料批次视图
    pub fn list_views_by_material(
        &self,
        material_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BatchView>> {
        self.query_views("b.material_id = ?1", params![material_id], now)
    }

    /// 查询指定 QC 状态的批次视图
    pub fn list_views_by_status(
        &self,
        status: QcStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BatchView>> {
        self.query_views("b.qc_status = ?1", params![status.as_db_str()], now)
    }

    /// 查询已过期批次视图（到期时间早于 now，或已标记 expired）
    pub fn list_expired_views(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<BatchView>> {
        self.query_views(
            "(b.expiry_date < ?1 OR b.qc_status = 'expired')",
            params![to_millis(&now)],
            now,
        )
    }

    fn query_views(
        &self,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BatchView>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {}, m.name, m.unit, s.name
               FROM batch b
               LEFT JOIN raw_material m ON m.material_id = b.material_id
               LEFT JOIN supplier s ON s.supplier_id = b.supplier_id
               WHERE {}
               ORDER BY {}"#,
            BATCH_COLUMNS, filter, FEFO_ORDER
        );
        let mut stmt = conn.prepare(&sql)?;
        let views = stmt
            .query_map(params, |row| {
                let batch = Self::map_batch(row)?;
                let is_expired = batch.is_past_expiry(now);
                Ok(BatchView {
                    batch,
                    material_name: row.get(8)?,
                    material_unit: row.get(9)?,
                    supplier_name: row.get(10)?,
                    is_expired,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }

    fn map_batch(row: &Row<'_>) -> rusqlite::Result<Batch> {
        let raw_status: Option<String> = row.get(7)?;
        let qc_status = QcStatus::from_db_value(raw_status.as_deref())
            .ok_or_else(|| invalid_enum_value(7, raw_status.as_deref().unwrap_or_default()))?;

        Ok(Batch {
            batch_id: row.get(0)?,
            material_id: row.get(1)?,
            supplier_id: row.get(2)?,
            batch_number: row.get(3)?,
            quantity: row.get(4)?,
            expiry_date: millis_column(row, 5)?,
            received_date: millis_column(row, 6)?,
            qc_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::domain::types::MILLIS_PER_DAY;

    fn setup() -> (Arc<Mutex<Connection>>, BatchRepository) {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO raw_material (material_id, name, sku, unit, min_stock)
            VALUES ('M1', 'Tepung', 'RM-001', 'kg', 10);
            INSERT INTO supplier (supplier_id, name, contact) VALUES ('S1', 'Bogasari', '');
            "#,
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), BatchRepository::new(conn))
    }

    fn day(n: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000 + n * MILLIS_PER_DAY).unwrap()
    }

    fn batch(id: &str, expiry_day: i64, received_day: i64, status: QcStatus) -> Batch {
        Batch {
            batch_id: id.to_string(),
            material_id: "M1".to_string(),
            supplier_id: Some("S1".to_string()),
            batch_number: format!("LOT-{}", id),
            quantity: 5.0,
            expiry_date: day(expiry_day),
            received_date: day(received_day),
            qc_status: status,
        }
    }

    #[test]
    fn test_find_by_material_uses_fefo_tie_break() {
        let (conn, repo) = setup();
        {
            let c = conn.lock().unwrap();
            BatchRepository::insert_tx(&c, &batch("B3", 5, 1, QcStatus::Release)).unwrap();
            BatchRepository::insert_tx(&c, &batch("B2", 3, 2, QcStatus::Release)).unwrap();
            BatchRepository::insert_tx(&c, &batch("B1", 3, 2, QcStatus::Hold)).unwrap();
            BatchRepository::insert_tx(&c, &batch("B0", 3, 1, QcStatus::Release)).unwrap();
        }

        let ids: Vec<_> = repo
            .find_by_material("M1")
            .unwrap()
            .into_iter()
            .map(|b| b.batch_id)
            .collect();
        assert_eq!(ids, vec!["B0", "B1", "B2", "B3"]);
    }

    #[test]
    fn test_views_carry_names_and_live_expiry() {
        let (conn, repo) = setup();
        {
            let c = conn.lock().unwrap();
            BatchRepository::insert_tx(&c, &batch("B1", 1, 0, QcStatus::Release)).unwrap();
            BatchRepository::insert_tx(&c, &batch("B2", 10, 0, QcStatus::Pending)).unwrap();
        }

        let views = repo.list_views(day(5)).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].material_name.as_deref(), Some("Tepung"));
        assert_eq!(views[0].supplier_name.as_deref(), Some("Bogasari"));
        assert!(views[0].is_expired);
        assert!(!views[1].is_expired);

        let expired = repo.list_expired_views(day(5)).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].batch.batch_id, "B1");

        let pending = repo.list_views_by_status(QcStatus::Pending, day(5)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].batch.batch_id, "B2");
    }

    #[test]
    fn test_update_and_delete_missing_batch_is_not_found() {
        let (conn, _repo) = setup();
        let c = conn.lock().unwrap();
        let err = BatchRepository::update_quantity_tx(&c, "nope", 1.0).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        let err = BatchRepository::delete_tx(&c, "nope").unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        let err = BatchRepository::update_qc_status_tx(&c, "nope", QcStatus::Release).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
