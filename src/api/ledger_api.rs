// ==========================================
// 烘焙生产库存系统 - 流水与报废台账 API
// ==========================================
// 职责: 库存流水查询 / 流水归档 / 报废记录查询与汇总
// 红线: 流水只追加，归档只写 archived_at
// ==========================================

use chrono::Utc;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::require_days_in_range;
use crate::config::{ConfigManager, ProductionConfigReader};
use crate::domain::ledger::{TransactionLogView, WasteRecordView, WasteSummary};
use crate::domain::types::{cutoff_before, TransactionType};
use crate::repository::transaction_log_repo::TransactionLogRepository;
use crate::repository::waste_repo::WasteRecordRepository;

pub struct LedgerApi {
    transaction_log_repo: Arc<TransactionLogRepository>,
    waste_repo: Arc<WasteRecordRepository>,
    config: Arc<ConfigManager>,
}

impl LedgerApi {
    pub fn new(
        transaction_log_repo: Arc<TransactionLogRepository>,
        waste_repo: Arc<WasteRecordRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            transaction_log_repo,
            waste_repo,
            config,
        }
    }

    // ==========================================
    // 库存流水
    // ==========================================

    /// 未归档流水（最新在前）
    pub fn list_transactions(&self) -> ApiResult<Vec<TransactionLogView>> {
        Ok(self.transaction_log_repo.list_active()?)
    }

    pub fn list_transactions_by_material(&self, material_id: &str) -> ApiResult<Vec<TransactionLogView>> {
        Ok(self.transaction_log_repo.find_by_material(material_id)?)
    }

    pub fn list_transactions_by_type(&self, log_type: TransactionType) -> ApiResult<Vec<TransactionLogView>> {
        Ok(self.transaction_log_repo.find_by_type(log_type)?)
    }

    /// 归档早于指定天数的流水（None 使用配置 transaction_archive_days）
    pub fn archive_transactions(&self, older_than_days: Option<i64>) -> ApiResult<usize> {
        let days = match older_than_days {
            Some(d) => {
                require_days_in_range("older_than_days", d, 0)?;
                d
            }
            None => self.config.get_transaction_archive_days()?,
        };

        let now = Utc::now();
        let cutoff = cutoff_before(now, days).ok_or_else(|| {
            ApiError::InvalidInput(format!("older_than_days超出可表示的时间范围: {}", days))
        })?;
        let archived = self.transaction_log_repo.archive_before(cutoff, now)?;
        tracing::info!(archived, days, "库存流水归档");
        Ok(archived)
    }

    pub fn list_archived_transactions(&self) -> ApiResult<Vec<TransactionLogView>> {
        Ok(self.transaction_log_repo.list_archived()?)
    }

    // ==========================================
    // 报废台账
    // ==========================================

    pub fn list_waste(&self) -> ApiResult<Vec<WasteRecordView>> {
        Ok(self.waste_repo.list_all()?)
    }

    pub fn list_waste_by_material(&self, material_id: &str) -> ApiResult<Vec<WasteRecordView>> {
        Ok(self.waste_repo.find_by_material(material_id)?)
    }

    pub fn waste_summary(&self) -> ApiResult<WasteSummary> {
        Ok(self.waste_repo.summary()?)
    }
}
