// ==========================================
// 烘焙生产库存系统 - 原料库存 API
// ==========================================
// 职责: 入库 / QC 状态 / 过期报废 / FEFO 扣减 / 批次查询
// 说明: 权限判定在调用方完成，本层不接收角色信息
// ==========================================

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::validator::{normalize_optional, require_non_empty, require_positive};
use crate::domain::ledger::WasteRecord;
use crate::domain::production::LotAllocation;
use crate::domain::stock::{Batch, BatchView, MaterialStockSummary};
use crate::domain::types::QcStatus;
use crate::engine::inventory::{InventoryEngine, ReceiveStockRequest};
use crate::engine::qc::QcStateMachine;
use crate::repository::batch_repo::BatchRepository;

// ==========================================
// InventoryApi - 原料库存 API
// ==========================================
pub struct InventoryApi {
    batch_repo: Arc<BatchRepository>,
    inventory_engine: Arc<InventoryEngine>,
    qc_state_machine: Arc<QcStateMachine>,
}

impl InventoryApi {
    /// 创建新的InventoryApi实例
    pub fn new(
        batch_repo: Arc<BatchRepository>,
        inventory_engine: Arc<InventoryEngine>,
        qc_state_machine: Arc<QcStateMachine>,
    ) -> Self {
        Self {
            batch_repo,
            inventory_engine,
            qc_state_machine,
        }
    }

    // ==========================================
    // 写入接口
    // ==========================================

    /// 入库（新批次为 pending，需 QC 放行后才能使用）
    pub fn receive_stock(
        &self,
        material_id: &str,
        supplier_id: Option<&str>,
        batch_number: &str,
        quantity: f64,
        expiry_date: DateTime<Utc>,
        actor: Option<&str>,
    ) -> ApiResult<Batch> {
        require_non_empty("material_id", material_id)?;
        require_non_empty("batch_number", batch_number)?;
        require_positive("quantity", quantity)?;

        let req = ReceiveStockRequest {
            material_id: material_id.to_string(),
            supplier_id: normalize_optional(supplier_id),
            batch_number: batch_number.trim().to_string(),
            quantity,
            expiry_date,
            actor: normalize_optional(actor),
        };
        Ok(self.inventory_engine.receive_stock(&req, Utc::now())?)
    }

    /// 设置 QC 状态（覆盖写入）
    pub fn set_qc_status(&self, batch_id: &str, status: QcStatus) -> ApiResult<Batch> {
        Ok(self.qc_state_machine.set_status(batch_id, status)?)
    }

    /// 标记批次过期
    pub fn mark_as_expired(&self, batch_id: &str) -> ApiResult<Batch> {
        Ok(self.qc_state_machine.mark_as_expired(batch_id)?)
    }

    /// 过期扫描（手动触发）
    pub fn expire_overdue_batches(&self) -> ApiResult<usize> {
        Ok(self.qc_state_machine.expire_overdue_batches(Utc::now())?)
    }

    /// 批准过期报废
    pub fn approve_expired_disposal(
        &self,
        batch_id: &str,
        disposed_by: &str,
        notes: Option<&str>,
    ) -> ApiResult<WasteRecord> {
        require_non_empty("disposed_by", disposed_by)?;
        let notes = normalize_optional(notes);
        Ok(self.inventory_engine.approve_expired_disposal(
            batch_id,
            disposed_by.trim(),
            notes.as_deref(),
            Utc::now(),
        )?)
    }

    /// 原料 FEFO 扣减
    pub fn reserve_stock(
        &self,
        material_id: &str,
        quantity: f64,
        actor: Option<&str>,
        notes: Option<&str>,
    ) -> ApiResult<Vec<LotAllocation>> {
        require_positive("quantity", quantity)?;
        let actor = normalize_optional(actor);
        let notes = normalize_optional(notes);
        Ok(self.inventory_engine.reserve_stock(
            material_id,
            quantity,
            actor.as_deref(),
            notes.as_deref(),
            Utc::now(),
        )?)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 全部批次（附原料/供应商名称与实时过期标记）
    pub fn list_all(&self) -> ApiResult<Vec<BatchView>> {
        Ok(self.batch_repo.list_views(Utc::now())?)
    }

    /// 某原料的批次（按到期时间）
    pub fn list_by_material(&self, material_id: &str) -> ApiResult<Vec<BatchView>> {
        Ok(self.batch_repo.list_views_by_material(material_id, Utc::now())?)
    }

    /// 已过期批次（到期时间已过或已标记 expired）
    pub fn get_expired_batches(&self) -> ApiResult<Vec<BatchView>> {
        Ok(self.batch_repo.list_expired_views(Utc::now())?)
    }

    /// 待检批次
    pub fn list_pending_qc(&self) -> ApiResult<Vec<BatchView>> {
        Ok(self.batch_repo.list_views_by_status(QcStatus::Pending, Utc::now())?)
    }

    /// 原料库存汇总
    pub fn material_stock_summary(&self) -> ApiResult<Vec<MaterialStockSummary>> {
        Ok(self.inventory_engine.material_stock_summary(Utc::now())?)
    }
}
