// ==========================================
// 烘焙生产库存系统 - 生产单领域模型
// ==========================================
// 状态机: planned → completed | cancelled（单向）
// 归档标记 archived_at 与状态正交
// ==========================================

use crate::domain::types::ProductionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionRun - 生产单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRun {
    pub run_id: String,
    pub bom_id: String,
    pub status: ProductionStatus,
    pub target_quantity: f64,            // 计划产量
    pub produced_quantity: Option<f64>,  // 实际产量（完工时写入）
    pub rejected_quantity: Option<f64>,  // 不良数量（完工时写入）
    pub notes: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl ProductionRun {
    /// 是否处于计划状态（唯一可执行/取消的状态）
    pub fn is_planned(&self) -> bool {
        self.status == ProductionStatus::Planned
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// 生产单列表视图（附带配方与成品名称）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRunView {
    #[serde(flatten)]
    pub run: ProductionRun,
    pub bom_name: Option<String>,
    pub product_name: String,
}

// ==========================================
// MaterialRequirement - 物料需求（MRP 预览）
// ==========================================
// current_stock: 全部批次合计（不区分 QC 状态，保持原口径）
// eligible_stock: 放行且未过期批次合计（执行时实际可用口径）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub material_id: String,
    pub material_name: String,
    pub material_unit: String,
    pub required_amount: f64,
    pub current_stock: f64,
    pub is_shortage: bool,
    pub shortage_amount: f64,
    pub eligible_stock: f64,
    pub is_eligible_shortage: bool,
}

// ==========================================
// 执行结果
// ==========================================

/// 单批次扣减记录（FEFO 输出）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotAllocation {
    pub lot_id: String,
    pub quantity: f64,  // 本次扣减数量
    pub remaining: f64, // 扣减后剩余（0 表示批次已删除）
}

/// 单个原料的扣减明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientConsumption {
    pub material_id: String,
    pub required_quantity: f64,
    pub allocations: Vec<LotAllocation>,
}

/// 生产执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionExecution {
    pub run_id: String,
    pub product_id: String,
    pub stock_id: Option<String>, // 产量为 0 时不生成成品批次
    pub produced_quantity: f64,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub expiry_date: Option<DateTime<Utc>>,
    pub consumptions: Vec<IngredientConsumption>,
}
