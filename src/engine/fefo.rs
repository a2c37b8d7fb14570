// ==========================================
// 烘焙生产库存系统 - FEFO 分配器
// ==========================================
// FEFO: First-Expired-First-Out，先到期先出
// 排序: 到期时间 → 入库/生产时间 → 批次ID
// 红线: 可用量不足时在任何写入之前失败（全有或全无）
// 红线: 扣减到 0 的批次直接删除
// ==========================================
// 分两步:
// - plan: 纯函数，对内存中的批次列表排序/预检/分配
// - apply: 在调用方事务内落库，原料扣减同时写 batch_used 流水
// ==========================================

use crate::domain::ledger::TransactionLog;
use crate::domain::production::LotAllocation;
use crate::domain::stock::{Batch, ProductStock};
use crate::domain::types::{TransactionType, QTY_EPSILON};
use crate::repository::batch_repo::BatchRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::product_stock_repo::ProductStockRepository;
use crate::repository::transaction_log_repo::TransactionLogRepository;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::HashMap;

// ==========================================
// StockLot - 可参与 FEFO 的批次
// ==========================================
pub trait StockLot {
    fn lot_id(&self) -> &str;
    fn quantity(&self) -> f64;
    fn expiry_date(&self) -> DateTime<Utc>;
    /// 次级排序键（入库 / 生产时间）
    fn origin_date(&self) -> DateTime<Utc>;
}

impl StockLot for Batch {
    fn lot_id(&self) -> &str {
        &self.batch_id
    }
    fn quantity(&self) -> f64 {
        self.quantity
    }
    fn expiry_date(&self) -> DateTime<Utc> {
        self.expiry_date
    }
    fn origin_date(&self) -> DateTime<Utc> {
        self.received_date
    }
}

impl StockLot for ProductStock {
    fn lot_id(&self) -> &str {
        &self.stock_id
    }
    fn quantity(&self) -> f64 {
        self.quantity
    }
    fn expiry_date(&self) -> DateTime<Utc> {
        self.expiry_date
    }
    fn origin_date(&self) -> DateTime<Utc> {
        self.produced_date
    }
}

/// 原料扣减的流水上下文
#[derive(Debug, Clone, Default)]
pub struct UsageContext<'a> {
    pub production_run_id: Option<&'a str>,
    pub actor: Option<&'a str>,
    pub notes: Option<&'a str>,
}

// ==========================================
// FefoAllocator
// ==========================================
pub struct FefoAllocator;

impl FefoAllocator {
    /// FEFO 比较器
    pub fn compare<L: StockLot>(a: &L, b: &L) -> Ordering {
        a.expiry_date()
            .cmp(&b.expiry_date())
            .then_with(|| a.origin_date().cmp(&b.origin_date()))
            .then_with(|| a.lot_id().cmp(b.lot_id()))
    }

    /// 校验请求数量
    pub fn validate_quantity(requested: f64) -> RepositoryResult<()> {
        if !requested.is_finite() || requested <= 0.0 {
            return Err(RepositoryError::FieldValueError {
                field: "quantity".to_string(),
                message: format!("请求数量必须为正数: {}", requested),
            });
        }
        Ok(())
    }

    /// 计算分配方案（不写库）
    ///
    /// # 参数
    /// - item: 物料名称（用于库存不足错误信息）
    /// - lots: 已过滤为可用的批次
    /// - requested: 请求数量
    ///
    /// # 返回
    /// - 按 FEFO 顺序的 (批次, 扣减量, 剩余量) 列表，扣减量之和等于 requested
    /// - InsufficientStock: 可用合计小于请求数量（严格比较，不留容差）
    ///
    /// QTY_EPSILON 只用于清理扣减后的浮点残量，不放宽预检
    pub fn plan<L: StockLot>(item: &str, lots: &[L], requested: f64) -> RepositoryResult<Vec<LotAllocation>> {
        Self::validate_quantity(requested)?;

        let mut sorted: Vec<&L> = lots.iter().filter(|l| l.quantity() > QTY_EPSILON).collect();
        sorted.sort_by(|a, b| Self::compare(*a, *b));

        let available: f64 = sorted.iter().map(|l| l.quantity()).sum();
        if available < requested {
            return Err(RepositoryError::InsufficientStock {
                item: item.to_string(),
                available,
                required: requested,
            });
        }

        let mut still_needed = requested;
        let mut allocations = Vec::new();
        for lot in sorted {
            if still_needed <= QTY_EPSILON {
                break;
            }
            let take = lot.quantity().min(still_needed);
            let mut remaining = lot.quantity() - take;
            if remaining <= QTY_EPSILON {
                remaining = 0.0;
            }
            allocations.push(LotAllocation {
                lot_id: lot.lot_id().to_string(),
                quantity: take,
                remaining,
            });
            still_needed -= take;
        }

        Ok(allocations)
    }

    /// 落库原料批次分配方案，并为每个批次写一条 batch_used 流水
    ///
    /// `batches` 必须包含方案中引用的全部批次（用于回填批号）
    pub fn apply_batch_allocations_tx(
        conn: &Connection,
        material_id: &str,
        batches: &[Batch],
        allocations: &[LotAllocation],
        ctx: &UsageContext<'_>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let by_id: HashMap<&str, &Batch> = batches.iter().map(|b| (b.batch_id.as_str(), b)).collect();

        for allocation in allocations {
            let batch = by_id.get(allocation.lot_id.as_str()).ok_or_else(|| {
                RepositoryError::InternalError(format!("分配方案引用了未知批次: {}", allocation.lot_id))
            })?;

            if allocation.remaining <= QTY_EPSILON {
                BatchRepository::delete_tx(conn, &batch.batch_id)?;
            } else {
                BatchRepository::update_quantity_tx(conn, &batch.batch_id, allocation.remaining)?;
            }

            let mut log = TransactionLog::new(TransactionType::BatchUsed, allocation.quantity, now)
                .with_batch(&batch.batch_id, &batch.batch_number)
                .with_material(material_id)
                .with_actor(ctx.actor)
                .with_notes(ctx.notes);
            if let Some(run_id) = ctx.production_run_id {
                log = log.with_production_run(run_id);
            }
            TransactionLogRepository::insert_tx(conn, &log)?;

            tracing::debug!(
                batch_id = %batch.batch_id,
                taken = allocation.quantity,
                remaining = allocation.remaining,
                "原料批次扣减"
            );
        }
        Ok(())
    }

    /// 落库成品批次分配方案（成品出库不写流水）
    pub fn apply_product_allocations_tx(
        conn: &Connection,
        allocations: &[LotAllocation],
    ) -> RepositoryResult<()> {
        for allocation in allocations {
            if allocation.remaining <= QTY_EPSILON {
                ProductStockRepository::delete_tx(conn, &allocation.lot_id)?;
            } else {
                ProductStockRepository::update_quantity_tx(conn, &allocation.lot_id, allocation.remaining)?;
            }
        }
        Ok(())
    }
}
