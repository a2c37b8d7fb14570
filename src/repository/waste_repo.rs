// ==========================================
// 烘焙生产库存系统 - 报废台账仓储
// ==========================================
// 表: waste_record
// 红线: 报废记录创建后不可变（无 update / delete）
// ==========================================

use crate::domain::ledger::{MaterialWasteTotal, WasteRecord, WasteRecordView, WasteSummary};
use crate::repository::db_utils::{millis_column, to_millis};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row, ToSql};
use std::sync::{Arc, Mutex};

const WASTE_COLUMNS: &str = "w.waste_id, w.original_batch_id, w.batch_number, w.material_id, w.quantity, \
                             w.expiry_date, w.disposed_by, w.disposed_at, w.notes";

pub struct WasteRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WasteRecordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入报废记录（调用方事务内）
    pub fn insert_tx(conn: &Connection, record: &WasteRecord) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO waste_record (
                   waste_id, original_batch_id, batch_number, material_id, quantity,
                   expiry_date, disposed_by, disposed_at, notes
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                record.waste_id,
                record.original_batch_id,
                record.batch_number,
                record.material_id,
                record.quantity,
                to_millis(&record.expiry_date),
                record.disposed_by,
                to_millis(&record.disposed_at),
                record.notes,
            ],
        )?;
        Ok(())
    }

    /// 查询全部报废记录（最新在前）
    pub fn list_all(&self) -> RepositoryResult<Vec<WasteRecordView>> {
        self.query_views("1 = 1", params![])
    }

    /// 查询某原料的报废记录
    pub fn find_by_material(&self, material_id: &str) -> RepositoryResult<Vec<WasteRecordView>> {
        self.query_views("w.material_id = ?1", params![material_id])
    }

    /// 报废汇总（总条数 + 按原料合计）
    pub fn summary(&self) -> RepositoryResult<WasteSummary> {
        let conn = self.get_conn()?;

        let total_records: i64 =
            conn.query_row("SELECT COUNT(*) FROM waste_record", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            r#"SELECT w.material_id, COALESCE(m.name, 'Unknown'), SUM(w.quantity), COUNT(*)
               FROM waste_record w
               LEFT JOIN raw_material m ON m.material_id = w.material_id
               GROUP BY w.material_id
               ORDER BY SUM(w.quantity) DESC, w.material_id ASC"#,
        )?;
        let by_material = stmt
            .query_map([], |row| {
                Ok(MaterialWasteTotal {
                    material_id: row.get(0)?,
                    name: row.get(1)?,
                    total_quantity: row.get(2)?,
                    count: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(WasteSummary {
            total_records,
            by_material,
        })
    }

    fn query_views(&self, filter: &str, params: &[&dyn ToSql]) -> RepositoryResult<Vec<WasteRecordView>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {}, m.name, m.unit
               FROM waste_record w
               LEFT JOIN raw_material m ON m.material_id = w.material_id
               WHERE {}
               ORDER BY w.disposed_at DESC, w.waste_id ASC"#,
            WASTE_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let views = stmt
            .query_map(params, |row| {
                Ok(WasteRecordView {
                    record: Self::map_row(row)?,
                    material_name: row.get(9)?,
                    material_unit: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<WasteRecord> {
        Ok(WasteRecord {
            waste_id: row.get(0)?,
            original_batch_id: row.get(1)?,
            batch_number: row.get(2)?,
            material_id: row.get(3)?,
            quantity: row.get(4)?,
            expiry_date: millis_column(row, 5)?,
            disposed_by: row.get(6)?,
            disposed_at: millis_column(row, 7)?,
            notes: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::{DateTime, Utc};

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn record(id: &str, material: &str, qty: f64, disposed_ms: i64) -> WasteRecord {
        WasteRecord {
            waste_id: id.to_string(),
            original_batch_id: format!("B-{}", id),
            batch_number: format!("LOT-{}", id),
            material_id: material.to_string(),
            quantity: qty,
            expiry_date: at(0),
            disposed_by: Some("supervisor".to_string()),
            disposed_at: at(disposed_ms),
            notes: None,
        }
    }

    #[test]
    fn test_waste_listing_and_summary() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO raw_material (material_id, name, sku, unit, min_stock) VALUES ('M1', 'Tepung', 'RM-1', 'kg', 0);
            INSERT INTO raw_material (material_id, name, sku, unit, min_stock) VALUES ('M2', 'Mentega', 'RM-2', 'kg', 0);
            "#,
        )
        .unwrap();
        for r in [
            record("W1", "M1", 2.0, 100),
            record("W2", "M1", 3.0, 300),
            record("W3", "M2", 1.5, 200),
        ] {
            WasteRecordRepository::insert_tx(&conn, &r).unwrap();
        }
        let repo = WasteRecordRepository::new(Arc::new(Mutex::new(conn)));

        let all = repo.list_all().unwrap();
        let ids: Vec<_> = all.iter().map(|v| v.record.waste_id.as_str()).collect();
        assert_eq!(ids, vec!["W2", "W3", "W1"]);
        assert_eq!(all[0].material_unit.as_deref(), Some("kg"));

        assert_eq!(repo.find_by_material("M2").unwrap().len(), 1);

        let summary = repo.summary().unwrap();
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.by_material[0].material_id, "M1");
        assert_eq!(summary.by_material[0].total_quantity, 5.0);
        assert_eq!(summary.by_material[0].count, 2);
        assert_eq!(summary.by_material[1].name, "Mentega");
    }
}
