// ==========================================
// 烘焙生产库存系统 - 生产单 API
// ==========================================
// 职责: 计划 / 物料需求预览 / 执行 / 取消 / 归档 / 列表
// ==========================================

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::validator::{
    normalize_optional, require_days_in_range, require_non_empty, require_non_negative, require_positive,
};
use crate::config::ConfigManager;
use crate::domain::production::{MaterialRequirement, ProductionExecution, ProductionRun, ProductionRunView};
use crate::engine::production::{ExecuteRequest, PlanRequest, ProductionOrchestrator};

// ==========================================
// ProductionApi - 生产单 API
// ==========================================
pub struct ProductionApi {
    orchestrator: Arc<ProductionOrchestrator<ConfigManager>>,
}

impl ProductionApi {
    pub fn new(orchestrator: Arc<ProductionOrchestrator<ConfigManager>>) -> Self {
        Self { orchestrator }
    }

    /// 创建生产计划（不检查库存）
    pub fn plan(
        &self,
        bom_id: &str,
        target_quantity: f64,
        start_date: DateTime<Utc>,
        notes: Option<&str>,
    ) -> ApiResult<ProductionRun> {
        require_non_empty("bom_id", bom_id)?;
        require_positive("target_quantity", target_quantity)?;

        let req = PlanRequest {
            bom_id: bom_id.to_string(),
            target_quantity,
            start_date,
            notes: normalize_optional(notes),
        };
        Ok(self.orchestrator.plan(&req)?)
    }

    /// 物料需求预览
    pub fn calculate_requirements(
        &self,
        bom_id: &str,
        target_quantity: f64,
    ) -> ApiResult<Vec<MaterialRequirement>> {
        require_positive("target_quantity", target_quantity)?;
        Ok(self
            .orchestrator
            .calculate_requirements(bom_id, target_quantity, Utc::now())?)
    }

    /// 执行生产单
    pub fn execute(
        &self,
        run_id: &str,
        produced_quantity: f64,
        rejected_quantity: f64,
        notes: Option<&str>,
        actor: Option<&str>,
    ) -> ApiResult<ProductionExecution> {
        require_non_negative("produced_quantity", produced_quantity)?;
        require_non_negative("rejected_quantity", rejected_quantity)?;

        let req = ExecuteRequest {
            produced_quantity,
            rejected_quantity,
            notes: normalize_optional(notes),
            actor: normalize_optional(actor),
        };
        Ok(self.orchestrator.execute(run_id, &req, Utc::now())?)
    }

    /// 取消生产单
    pub fn cancel(&self, run_id: &str) -> ApiResult<ProductionRun> {
        Ok(self.orchestrator.cancel(run_id)?)
    }

    /// 归档已完成生产单（None 使用配置天数）
    pub fn archive_completed(&self, older_than_days: Option<i64>) -> ApiResult<usize> {
        if let Some(days) = older_than_days {
            require_days_in_range("older_than_days", days, 0)?;
        }
        Ok(self.orchestrator.archive_completed(older_than_days, Utc::now())?)
    }

    /// 生产单列表
    pub fn list(&self, include_archived: bool) -> ApiResult<Vec<ProductionRunView>> {
        Ok(self.orchestrator.list(include_archived)?)
    }

    pub fn get(&self, run_id: &str) -> ApiResult<ProductionRun> {
        Ok(self.orchestrator.get(run_id)?)
    }
}
