// ==========================================
// 烘焙生产库存系统 - QC 状态机
// ==========================================
// 状态: pending → release | hold | reject
//       hold ↔ release（重新设置即可）
//       非终态 + 过期 → expired（实时计算，markAsExpired 落库）
// 红线: 只有 release 且未过期的批次可以参与 FEFO
// ==========================================

use crate::domain::stock::Batch;
use crate::domain::types::QcStatus;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::instrument;

// ==========================================
// QcRules - QC 判定规则（纯函数）
// ==========================================
pub struct QcRules;

impl QcRules {
    /// FEFO 可用性判定: 已放行且到期时间不早于 now
    pub fn is_eligible(batch: &Batch, now: DateTime<Utc>) -> bool {
        batch.qc_status == QcStatus::Release && batch.expiry_date >= now
    }

    /// 实时过期判定（与记录的状态无关）
    pub fn is_expired(batch: &Batch, now: DateTime<Utc>) -> bool {
        batch.is_past_expiry(now)
    }

    /// 过期扫描时是否需要落库为 expired
    pub fn should_auto_expire(batch: &Batch, now: DateTime<Utc>) -> bool {
        Self::is_expired(batch, now) && !batch.qc_status.is_terminal()
    }
}

// ==========================================
// QcStateMachine - QC 状态写入
// ==========================================
pub struct QcStateMachine {
    conn: Arc<Mutex<Connection>>,
}

impl QcStateMachine {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 设置批次 QC 状态
    ///
    /// 不校验迁移合法性，直接覆盖；覆盖终态时记录告警
    ///
    /// # 返回
    /// - 更新后的批次
    #[instrument(skip(self), fields(batch_id = %batch_id, status = %status))]
    pub fn set_status(&self, batch_id: &str, status: QcStatus) -> RepositoryResult<Batch> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut batch = BatchRepository::find_by_id_tx(&tx, batch_id)?
            .ok_or_else(|| RepositoryError::not_found("Batch", batch_id))?;

        if batch.qc_status.is_terminal() && batch.qc_status != status {
            tracing::warn!(
                batch_id,
                from = %batch.qc_status,
                to = %status,
                "覆盖终态 QC 状态"
            );
        }

        BatchRepository::update_qc_status_tx(&tx, batch_id, status)?;
        tx.commit()?;

        tracing::info!(batch_id, from = %batch.qc_status, to = %status, "QC 状态已更新");
        batch.qc_status = status;
        Ok(batch)
    }

    /// 标记批次为过期（幂等）
    pub fn mark_as_expired(&self, batch_id: &str) -> RepositoryResult<Batch> {
        self.set_status(batch_id, QcStatus::Expired)
    }

    /// 过期扫描: 把所有已过期且非终态的批次落库为 expired
    ///
    /// # 返回
    /// - 本次更新的批次数
    #[instrument(skip(self))]
    pub fn expire_overdue_batches(&self, now: DateTime<Utc>) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut updated = 0;
        for batch in BatchRepository::find_past_expiry_tx(&tx, now)? {
            if QcRules::should_auto_expire(&batch, now) {
                BatchRepository::update_qc_status_tx(&tx, &batch.batch_id, QcStatus::Expired)?;
                updated += 1;
            }
        }

        tx.commit()?;
        tracing::info!(updated, "过期扫描完成");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::domain::types::MILLIS_PER_DAY;

    fn day(n: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000 + n * MILLIS_PER_DAY).unwrap()
    }

    fn batch(id: &str, expiry_day: i64, status: QcStatus) -> Batch {
        Batch {
            batch_id: id.to_string(),
            material_id: "M1".to_string(),
            supplier_id: None,
            batch_number: id.to_string(),
            quantity: 1.0,
            expiry_date: day(expiry_day),
            received_date: day(0),
            qc_status: status,
        }
    }

    fn setup(batches: &[Batch]) -> QcStateMachine {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO raw_material (material_id, name, sku, unit, min_stock) VALUES ('M1', 'Ragi', 'RM-9', 'kg', 0)",
            [],
        )
        .unwrap();
        for b in batches {
            BatchRepository::insert_tx(&conn, b).unwrap();
        }
        QcStateMachine::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_eligibility_requires_release_and_unexpired() {
        let now = day(5);
        assert!(QcRules::is_eligible(&batch("a", 5, QcStatus::Release), now));
        assert!(QcRules::is_eligible(&batch("a", 9, QcStatus::Release), now));
        assert!(!QcRules::is_eligible(&batch("a", 4, QcStatus::Release), now));
        for status in [QcStatus::Pending, QcStatus::Hold, QcStatus::Reject, QcStatus::Expired] {
            assert!(!QcRules::is_eligible(&batch("a", 9, status), now));
        }
    }

    #[test]
    fn test_should_auto_expire_skips_terminal() {
        let now = day(5);
        assert!(QcRules::should_auto_expire(&batch("a", 1, QcStatus::Hold), now));
        assert!(QcRules::should_auto_expire(&batch("a", 1, QcStatus::Pending), now));
        assert!(!QcRules::should_auto_expire(&batch("a", 1, QcStatus::Reject), now));
        assert!(!QcRules::should_auto_expire(&batch("a", 9, QcStatus::Release), now));
    }

    #[test]
    fn test_set_status_overwrites_and_reports_missing() {
        let qc = setup(&[batch("B1", 9, QcStatus::Pending)]);

        assert_eq!(qc.set_status("B1", QcStatus::Hold).unwrap().qc_status, QcStatus::Hold);
        assert_eq!(qc.set_status("B1", QcStatus::Release).unwrap().qc_status, QcStatus::Release);
        assert_eq!(qc.mark_as_expired("B1").unwrap().qc_status, QcStatus::Expired);
        assert_eq!(qc.mark_as_expired("B1").unwrap().qc_status, QcStatus::Expired);

        let err = qc.set_status("missing", QcStatus::Release).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_expire_overdue_batches() {
        let qc = setup(&[
            batch("B1", 1, QcStatus::Release),
            batch("B2", 2, QcStatus::Reject),
            batch("B3", 9, QcStatus::Release),
            batch("B4", 3, QcStatus::Hold),
        ]);

        assert_eq!(qc.expire_overdue_batches(day(5)).unwrap(), 2);
        assert_eq!(qc.expire_overdue_batches(day(5)).unwrap(), 0);
    }
}
