// ==========================================
// 烘焙生产库存系统 - 生产单编排器
// ==========================================
// 状态机: planned → completed（execute）| cancelled（cancel），单向
// 归档标记 archived_at 与状态正交
// ==========================================
// execute 两阶段:
// 1. 校验: 汇总全部配料需求，逐一做 FEFO 预检，任一不足即失败（尚未写库）
// 2. 提交: 同一事务内扣减全部批次、生成成品批次、回写生产单、写流水
// 任一步骤失败时事务回滚，批次与生产单保持原状
// ==========================================

use crate::config::ProductionConfigReader;
use crate::domain::catalog::BomItem;
use crate::domain::ledger::TransactionLog;
use crate::domain::production::{
    IngredientConsumption, LotAllocation, MaterialRequirement, ProductionExecution, ProductionRun,
    ProductionRunView,
};
use crate::domain::stock::{Batch, ProductStock};
use crate::domain::types::{cutoff_before, expiry_after, ProductionStatus, TransactionType, QTY_EPSILON};
use crate::engine::fefo::{FefoAllocator, UsageContext};
use crate::engine::qc::QcRules;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::product_stock_repo::ProductStockRepository;
use crate::repository::production_repo::ProductionRunRepository;
use crate::repository::transaction_log_repo::TransactionLogRepository;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::instrument;
use uuid::Uuid;

/// 计划请求
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub bom_id: String,
    pub target_quantity: f64,
    pub start_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// 完工请求
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub produced_quantity: f64,
    pub rejected_quantity: f64,
    pub notes: Option<String>,
    pub actor: Option<String>,
}

/// 单个原料的已校验扣减方案
struct IngredientPlan {
    material_id: String,
    required_quantity: f64,
    eligible: Vec<Batch>,
    allocations: Vec<LotAllocation>,
}

// ==========================================
// ProductionOrchestrator - 生产单编排器
// ==========================================
pub struct ProductionOrchestrator<C>
where
    C: ProductionConfigReader,
{
    conn: Arc<Mutex<Connection>>,
    config: Arc<C>,
    run_repo: ProductionRunRepository,
}

impl<C> ProductionOrchestrator<C>
where
    C: ProductionConfigReader,
{
    /// 创建编排器
    ///
    /// # 参数
    /// - conn: 共享数据库连接
    /// - config: 配置读取器（默认保质期 / 归档天数）
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<C>) -> Self {
        Self {
            run_repo: ProductionRunRepository::new(conn.clone()),
            conn,
            config,
        }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // plan
    // ==========================================

    /// 创建计划状态的生产单（不检查库存）
    #[instrument(skip(self, req), fields(bom_id = %req.bom_id, target = req.target_quantity))]
    pub fn plan(&self, req: &PlanRequest) -> RepositoryResult<ProductionRun> {
        if !req.target_quantity.is_finite() || req.target_quantity <= 0.0 {
            return Err(RepositoryError::FieldValueError {
                field: "target_quantity".to_string(),
                message: format!("计划产量必须为正数: {}", req.target_quantity),
            });
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        if CatalogRepository::find_bom_tx(&tx, &req.bom_id)?.is_none() {
            return Err(RepositoryError::not_found("Bom", &req.bom_id));
        }

        let run = ProductionRun {
            run_id: Uuid::new_v4().to_string(),
            bom_id: req.bom_id.clone(),
            status: ProductionStatus::Planned,
            target_quantity: req.target_quantity,
            produced_quantity: None,
            rejected_quantity: None,
            notes: req.notes.clone(),
            start_date: req.start_date,
            completed_date: None,
            archived_at: None,
        };
        ProductionRunRepository::insert_tx(&tx, &run)?;
        tx.commit()?;

        tracing::info!(run_id = %run.run_id, "生产单已计划");
        Ok(run)
    }

    // ==========================================
    // calculate_requirements
    // ==========================================

    /// 物料需求预览（只读）
    ///
    /// current_stock 为全部批次合计（不区分 QC 状态），
    /// eligible_stock 为执行时实际可用的合计，两者同时给出
    pub fn calculate_requirements(
        &self,
        bom_id: &str,
        target_quantity: f64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<MaterialRequirement>> {
        let conn = self.get_conn()?;

        if CatalogRepository::find_bom_tx(&conn, bom_id)?.is_none() {
            return Err(RepositoryError::not_found("Bom", bom_id));
        }

        let mut requirements = Vec::new();
        // 与 execute 一致: 同一原料的多行配方先合并
        let items = CatalogRepository::find_bom_items_tx(&conn, bom_id)?;
        for (material_id, per_unit) in aggregate_bom_items(&items) {
            let material = CatalogRepository::find_raw_material_tx(&conn, &material_id)?
                .ok_or_else(|| RepositoryError::not_found("RawMaterial", &material_id))?;

            let batches = BatchRepository::find_by_material_tx(&conn, &material_id)?;
            let required_amount = per_unit * target_quantity;
            let current_stock: f64 = batches.iter().map(|b| b.quantity).sum();
            let eligible_stock: f64 = batches
                .iter()
                .filter(|b| QcRules::is_eligible(b, now))
                .map(|b| b.quantity)
                .sum();

            requirements.push(MaterialRequirement {
                material_id: material.material_id,
                material_name: material.name,
                material_unit: material.unit,
                required_amount,
                current_stock,
                is_shortage: current_stock < required_amount,
                shortage_amount: (required_amount - current_stock).max(0.0),
                eligible_stock,
                is_eligible_shortage: eligible_stock < required_amount,
            });
        }
        Ok(requirements)
    }

    // ==========================================
    // execute
    // ==========================================

    /// 执行生产单: 扣减原料、生成成品批次、完工回写
    ///
    /// # 错误
    /// - NotFound: 生产单 / 配方 / 成品不存在
    /// - InvalidStateTransition: 生产单不是 planned
    /// - InsufficientStock: 任一原料可用量不足（不做任何写入）
    #[instrument(skip(self, req), fields(run_id = %run_id, produced = req.produced_quantity))]
    pub fn execute(
        &self,
        run_id: &str,
        req: &ExecuteRequest,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ProductionExecution> {
        for (field, value) in [
            ("produced_quantity", req.produced_quantity),
            ("rejected_quantity", req.rejected_quantity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RepositoryError::FieldValueError {
                    field: field.to_string(),
                    message: format!("数量不能为负数: {}", value),
                });
            }
        }
        // 默认保质期在加锁前读取（配置读取器可能共用同一连接）
        let default_shelf_life = self.config.get_default_shelf_life_days()?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let run = ProductionRunRepository::find_by_id_tx(&tx, run_id)?
            .ok_or_else(|| RepositoryError::not_found("ProductionRun", run_id))?;
        if !run.is_planned() {
            return Err(RepositoryError::InvalidStateTransition {
                from: run.status.to_string(),
                to: ProductionStatus::Completed.to_string(),
            });
        }

        let bom = CatalogRepository::find_bom_tx(&tx, &run.bom_id)?
            .ok_or_else(|| RepositoryError::not_found("Bom", &run.bom_id))?;
        let product = CatalogRepository::find_finished_product_tx(&tx, &bom.product_id)?
            .ok_or_else(|| RepositoryError::not_found("FinishedProduct", &bom.product_id))?;
        let items = CatalogRepository::find_bom_items_tx(&tx, &bom.bom_id)?;

        let shelf_life_days = product.effective_shelf_life_days(default_shelf_life);
        let expiry_date = expiry_after(now, shelf_life_days).ok_or_else(|| RepositoryError::FieldValueError {
            field: "shelf_life_days".to_string(),
            message: format!("保质期超出可表示的时间范围: {}", shelf_life_days),
        })?;

        // ===== 阶段 1: 校验全部配料 =====
        let mut plans = Vec::new();
        for (material_id, per_unit) in aggregate_bom_items(&items) {
            let material = CatalogRepository::find_raw_material_tx(&tx, &material_id)?
                .ok_or_else(|| RepositoryError::not_found("RawMaterial", &material_id))?;

            let required_quantity = per_unit * run.target_quantity;
            let eligible: Vec<Batch> = BatchRepository::find_by_material_tx(&tx, &material_id)?
                .into_iter()
                .filter(|b| QcRules::is_eligible(b, now))
                .collect();

            let allocations = FefoAllocator::plan(&material.name, &eligible, required_quantity)
                .map_err(|e| {
                    tracing::warn!(material_id = %material_id, error = %e, "配料不足，生产单保持 planned");
                    e
                })?;

            plans.push(IngredientPlan {
                material_id,
                required_quantity,
                eligible,
                allocations,
            });
        }

        // ===== 阶段 2: 提交 =====
        let usage = UsageContext {
            production_run_id: Some(run_id),
            actor: req.actor.as_deref(),
            notes: None,
        };
        let mut consumptions = Vec::with_capacity(plans.len());
        for plan in plans {
            FefoAllocator::apply_batch_allocations_tx(
                &tx,
                &plan.material_id,
                &plan.eligible,
                &plan.allocations,
                &usage,
                now,
            )?;
            consumptions.push(IngredientConsumption {
                material_id: plan.material_id,
                required_quantity: plan.required_quantity,
                allocations: plan.allocations,
            });
        }

        // 全部不良（产量为 0）时不生成成品批次，库存中不保留 0 数量记录
        let stock_id = if req.produced_quantity > QTY_EPSILON {
            let stock = ProductStock {
                stock_id: Uuid::new_v4().to_string(),
                product_id: product.product_id.clone(),
                production_run_id: Some(run_id.to_string()),
                quantity: req.produced_quantity,
                expiry_date,
                produced_date: now,
            };
            ProductStockRepository::insert_tx(&tx, &stock)?;
            Some(stock.stock_id)
        } else {
            tracing::warn!(run_id, rejected = req.rejected_quantity, "实际产量为 0，不生成成品批次");
            None
        };

        let updated = ProductionRunRepository::mark_completed_tx(
            &tx,
            run_id,
            req.produced_quantity,
            req.rejected_quantity,
            req.notes.as_deref(),
            now,
        )?;
        if updated == 0 {
            return Err(RepositoryError::Conflict(format!("生产单 {} 状态已被修改", run_id)));
        }

        let log = TransactionLog::new(TransactionType::ProductionCompleted, req.produced_quantity, now)
            .with_production_run(run_id)
            .with_actor(req.actor.as_deref())
            .with_notes(req.notes.as_deref());
        TransactionLogRepository::insert_tx(&tx, &log)?;

        tx.commit()?;

        tracing::info!(
            run_id,
            product_id = %product.product_id,
            ingredients = consumptions.len(),
            shelf_life_days,
            "生产单已完工"
        );

        Ok(ProductionExecution {
            run_id: run_id.to_string(),
            product_id: product.product_id,
            expiry_date: stock_id.as_ref().map(|_| expiry_date),
            stock_id,
            produced_quantity: req.produced_quantity,
            consumptions,
        })
    }

    // ==========================================
    // cancel
    // ==========================================

    /// 取消生产单（仅 planned 可取消，不影响库存）
    #[instrument(skip(self))]
    pub fn cancel(&self, run_id: &str) -> RepositoryResult<ProductionRun> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut run = ProductionRunRepository::find_by_id_tx(&tx, run_id)?
            .ok_or_else(|| RepositoryError::not_found("ProductionRun", run_id))?;
        if !run.is_planned() {
            return Err(RepositoryError::InvalidStateTransition {
                from: run.status.to_string(),
                to: ProductionStatus::Cancelled.to_string(),
            });
        }

        ProductionRunRepository::update_status_tx(
            &tx,
            run_id,
            ProductionStatus::Planned,
            ProductionStatus::Cancelled,
        )?;
        tx.commit()?;

        tracing::info!(run_id, "生产单已取消");
        run.status = ProductionStatus::Cancelled;
        Ok(run)
    }

    // ==========================================
    // 归档 / 列表
    // ==========================================

    /// 归档完工超过指定天数的生产单
    ///
    /// # 参数
    /// - older_than_days: None 时读取配置 production_archive_days
    ///
    /// # 返回
    /// - 本次归档数量（幂等，已归档的不计）
    #[instrument(skip(self))]
    pub fn archive_completed(&self, older_than_days: Option<i64>, now: DateTime<Utc>) -> RepositoryResult<usize> {
        let days = match older_than_days {
            Some(d) if d < 0 => {
                return Err(RepositoryError::FieldValueError {
                    field: "older_than_days".to_string(),
                    message: format!("天数不能为负数: {}", d),
                })
            }
            Some(d) => d,
            None => self.config.get_production_archive_days()?,
        };

        let cutoff = cutoff_before(now, days).ok_or_else(|| RepositoryError::FieldValueError {
            field: "older_than_days".to_string(),
            message: format!("天数超出可表示的时间范围: {}", days),
        })?;
        let archived = self.run_repo.archive_completed_before(cutoff, now)?;
        tracing::info!(archived, days, "已完成生产单归档");
        Ok(archived)
    }

    /// 生产单列表（最新开工在前，默认不含已归档）
    pub fn list(&self, include_archived: bool) -> RepositoryResult<Vec<ProductionRunView>> {
        self.run_repo.list_views(include_archived)
    }

    /// 按ID查询生产单
    pub fn get(&self, run_id: &str) -> RepositoryResult<ProductionRun> {
        self.run_repo
            .find_by_id(run_id)?
            .ok_or_else(|| RepositoryError::not_found("ProductionRun", run_id))
    }
}

/// 按原料汇总配方用量（同一原料出现多行时合并，保持首次出现顺序）
fn aggregate_bom_items(items: &[BomItem]) -> Vec<(String, f64)> {
    let mut totals: Vec<(String, f64)> = Vec::new();
    for item in items {
        match totals.iter_mut().find(|(id, _)| *id == item.material_id) {
            Some((_, qty)) => *qty += item.quantity,
            None => totals.push((item.material_id.clone(), item.quantity)),
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(material: &str, qty: f64) -> BomItem {
        BomItem {
            bom_item_id: Uuid::new_v4().to_string(),
            bom_id: "BOM1".to_string(),
            material_id: material.to_string(),
            quantity: qty,
        }
    }

    #[test]
    fn test_aggregate_merges_duplicate_materials() {
        let totals = aggregate_bom_items(&[item("flour", 2.0), item("sugar", 0.5), item("flour", 1.0)]);
        assert_eq!(
            totals,
            vec![("flour".to_string(), 3.0), ("sugar".to_string(), 0.5)]
        );
    }
}
