// ==========================================
// 烘焙生产库存系统 - 库存引擎
// ==========================================
// 职责: 入库 / 原料预留扣减 / 成品扣减 / 过期报废 / 库存汇总
// 红线: 每个写操作是一个 SQLite 事务，库存变更与流水同进同退
// 红线: Engine 不拼 SQL，数据访问全部经由仓储
// ==========================================

use crate::domain::ledger::{TransactionLog, WasteRecord};
use crate::domain::production::LotAllocation;
use crate::domain::stock::{Batch, MaterialStockSummary};
use crate::domain::types::{QcStatus, TransactionType};
use crate::engine::fefo::{FefoAllocator, UsageContext};
use crate::engine::qc::QcRules;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::product_stock_repo::ProductStockRepository;
use crate::repository::transaction_log_repo::TransactionLogRepository;
use crate::repository::waste_repo::WasteRecordRepository;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::instrument;
use uuid::Uuid;

/// 入库请求
#[derive(Debug, Clone)]
pub struct ReceiveStockRequest {
    pub material_id: String,
    pub supplier_id: Option<String>,
    pub batch_number: String,
    pub quantity: f64,
    pub expiry_date: DateTime<Utc>,
    pub actor: Option<String>,
}

// ==========================================
// InventoryEngine - 库存引擎
// ==========================================
pub struct InventoryEngine {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryEngine {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 入库
    // ==========================================

    /// 入库: 新建 pending 批次并写 batch_received 流水
    ///
    /// 入库不做 QC 判定，批次需经 QC 放行后才可使用
    #[instrument(skip(self, req), fields(material_id = %req.material_id, quantity = req.quantity))]
    pub fn receive_stock(&self, req: &ReceiveStockRequest, now: DateTime<Utc>) -> RepositoryResult<Batch> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        if CatalogRepository::find_raw_material_tx(&tx, &req.material_id)?.is_none() {
            return Err(RepositoryError::not_found("RawMaterial", &req.material_id));
        }
        if let Some(supplier_id) = req.supplier_id.as_deref() {
            if CatalogRepository::find_supplier_tx(&tx, supplier_id)?.is_none() {
                return Err(RepositoryError::not_found("Supplier", supplier_id));
            }
        }

        let batch = Batch {
            batch_id: Uuid::new_v4().to_string(),
            material_id: req.material_id.clone(),
            supplier_id: req.supplier_id.clone(),
            batch_number: req.batch_number.clone(),
            quantity: req.quantity,
            expiry_date: req.expiry_date,
            received_date: now,
            qc_status: QcStatus::Pending,
        };
        BatchRepository::insert_tx(&tx, &batch)?;

        let log = TransactionLog::new(TransactionType::BatchReceived, req.quantity, now)
            .with_batch(&batch.batch_id, &batch.batch_number)
            .with_material(&batch.material_id)
            .with_actor(req.actor.as_deref());
        TransactionLogRepository::insert_tx(&tx, &log)?;

        tx.commit()?;
        tracing::info!(batch_id = %batch.batch_id, batch_number = %batch.batch_number, "批次入库");
        Ok(batch)
    }

    // ==========================================
    // 原料 FEFO 扣减
    // ==========================================

    /// 按 FEFO 从已放行、未过期的批次扣减原料
    ///
    /// # 返回
    /// - 按扣减顺序的批次分配列表
    /// - InsufficientStock: 可用量不足，不做任何写入
    #[instrument(skip(self, actor, notes))]
    pub fn reserve_stock(
        &self,
        material_id: &str,
        quantity: f64,
        actor: Option<&str>,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<LotAllocation>> {
        FefoAllocator::validate_quantity(quantity)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let material = CatalogRepository::find_raw_material_tx(&tx, material_id)?
            .ok_or_else(|| RepositoryError::not_found("RawMaterial", material_id))?;

        let eligible: Vec<Batch> = BatchRepository::find_by_material_tx(&tx, material_id)?
            .into_iter()
            .filter(|b| QcRules::is_eligible(b, now))
            .collect();

        let allocations = FefoAllocator::plan(&material.name, &eligible, quantity)?;
        let ctx = UsageContext {
            production_run_id: None,
            actor,
            notes,
        };
        FefoAllocator::apply_batch_allocations_tx(&tx, material_id, &eligible, &allocations, &ctx, now)?;

        tx.commit()?;
        tracing::info!(material_id, quantity, lots = allocations.len(), "原料 FEFO 扣减完成");
        Ok(allocations)
    }

    // ==========================================
    // 成品 FEFO 扣减
    // ==========================================

    /// 按 FEFO 扣减成品库存（成品不做 QC 判定）
    #[instrument(skip(self))]
    pub fn deduct_product_stock(&self, product_id: &str, quantity: f64) -> RepositoryResult<Vec<LotAllocation>> {
        FefoAllocator::validate_quantity(quantity)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let product = CatalogRepository::find_finished_product_tx(&tx, product_id)?
            .ok_or_else(|| RepositoryError::not_found("FinishedProduct", product_id))?;

        let lots = ProductStockRepository::find_by_product_tx(&tx, product_id)?;
        let allocations = FefoAllocator::plan(&product.name, &lots, quantity)?;
        FefoAllocator::apply_product_allocations_tx(&tx, &allocations)?;

        tx.commit()?;
        tracing::info!(product_id, quantity, lots = allocations.len(), "成品 FEFO 扣减完成");
        Ok(allocations)
    }

    // ==========================================
    // 过期报废
    // ==========================================

    /// 批准过期报废: 生成报废快照 + batch_expired_disposed 流水 + 删除批次
    ///
    /// 整批报废，不支持部分报废
    #[instrument(skip(self, notes))]
    pub fn approve_expired_disposal(
        &self,
        batch_id: &str,
        disposed_by: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<WasteRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let batch = BatchRepository::find_by_id_tx(&tx, batch_id)?
            .ok_or_else(|| RepositoryError::not_found("Batch", batch_id))?;

        let record = WasteRecord {
            waste_id: Uuid::new_v4().to_string(),
            original_batch_id: batch.batch_id.clone(),
            batch_number: batch.batch_number.clone(),
            material_id: batch.material_id.clone(),
            quantity: batch.quantity,
            expiry_date: batch.expiry_date,
            disposed_by: Some(disposed_by.to_string()),
            disposed_at: now,
            notes: notes.map(str::to_string),
        };
        WasteRecordRepository::insert_tx(&tx, &record)?;

        let log = TransactionLog::new(TransactionType::BatchExpiredDisposed, batch.quantity, now)
            .with_batch(&batch.batch_id, &batch.batch_number)
            .with_material(&batch.material_id)
            .with_actor(Some(disposed_by))
            .with_notes(notes);
        TransactionLogRepository::insert_tx(&tx, &log)?;

        BatchRepository::delete_tx(&tx, batch_id)?;

        tx.commit()?;
        tracing::info!(
            batch_id,
            quantity = batch.quantity,
            qc_status = %batch.qc_status,
            "过期批次已报废"
        );
        Ok(record)
    }

    // ==========================================
    // 库存汇总
    // ==========================================

    /// 原料库存汇总（总量 / 可用量 / 低库存标记）
    pub fn material_stock_summary(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<MaterialStockSummary>> {
        let conn = self.get_conn()?;

        let mut summaries = Vec::new();
        for material in CatalogRepository::list_raw_materials_tx(&conn)? {
            let batches = BatchRepository::find_by_material_tx(&conn, &material.material_id)?;
            let total_stock: f64 = batches.iter().map(|b| b.quantity).sum();
            let available_stock: f64 = batches
                .iter()
                .filter(|b| QcRules::is_eligible(b, now))
                .map(|b| b.quantity)
                .sum();

            summaries.push(MaterialStockSummary {
                is_low_stock: available_stock < material.min_stock,
                material_id: material.material_id,
                name: material.name,
                sku: material.sku,
                unit: material.unit,
                min_stock: material.min_stock,
                total_stock,
                available_stock,
            });
        }
        Ok(summaries)
    }
}
