// ==========================================
// 烘焙生产库存系统 - 库存批次领域模型
// ==========================================
// Batch: 原料批次（带 QC 状态）
// ProductStock: 成品批次（生产单产出）
// 约束: quantity >= 0，数量归零的批次直接删除，不保留 0 数量记录
// ==========================================

use crate::domain::types::QcStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Batch - 原料批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub material_id: String,
    pub supplier_id: Option<String>,
    pub batch_number: String, // 批号（自由文本，不要求唯一）
    pub quantity: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiry_date: DateTime<Utc>, // 到期时间（不可变）
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub received_date: DateTime<Utc>,
    pub qc_status: QcStatus,
}

impl Batch {
    /// 是否已过期（实时计算，不依赖 qc_status）
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date < now
    }
}

// ==========================================
// BatchView - 批次展示视图
// ==========================================
// 用途: 列表查询，附带原料/供应商名称与实时过期标记
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    pub material_name: Option<String>,
    pub material_unit: Option<String>,
    pub supplier_name: Option<String>,
    pub is_expired: bool,
}

// ==========================================
// ProductStock - 成品批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStock {
    pub stock_id: String,
    pub product_id: String,
    pub production_run_id: Option<String>, // 产出该批次的生产单
    pub quantity: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiry_date: DateTime<Utc>, // 生产时间 + 保质期
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub produced_date: DateTime<Utc>,
}

// ==========================================
// 库存汇总
// ==========================================

/// 原料库存汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialStockSummary {
    pub material_id: String,
    pub name: String,
    pub sku: String,
    pub unit: String,
    pub min_stock: f64,
    pub total_stock: f64,     // 全部批次（不区分 QC 状态）
    pub available_stock: f64, // 可用批次（放行且未过期）
    pub is_low_stock: bool,   // available_stock < min_stock
}

/// 成品库存汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStockSummary {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub unit: String,
    pub min_stock: f64,
    pub total_stock: f64,
    pub is_low_stock: bool,
}
