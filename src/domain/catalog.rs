// ==========================================
// 烘焙生产库存系统 - 主数据领域模型
// ==========================================
// 原料 / 供应商 / 成品 / 配方(BOM)
// 说明: 主数据的维护界面不属于本核心，这里只保留引擎需要读取的字段
// ==========================================

use serde::{Deserialize, Serialize};

/// 成品默认保质期（天），成品未设置 shelf_life_days 时使用
pub const DEFAULT_SHELF_LIFE_DAYS: i64 = 3;

// ==========================================
// RawMaterial - 原料
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMaterial {
    pub material_id: String, // 原料ID
    pub name: String,        // 名称
    pub sku: String,         // SKU（唯一）
    pub unit: String,        // 计量单位
    pub min_stock: f64,      // 最低库存阈值
    pub price: Option<f64>,  // 单价
}

// ==========================================
// Supplier - 供应商
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: String,
    pub name: String,
    pub contact: String,
}

// ==========================================
// FinishedProduct - 成品
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedProduct {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub unit: String,
    pub min_stock: f64,
    pub price: Option<f64>,
    pub shelf_life_days: Option<i64>, // 保质期（天）
}

impl FinishedProduct {
    /// 实际生效的保质期
    ///
    /// 未设置或非正数时回退到 `fallback_days`
    pub fn effective_shelf_life_days(&self, fallback_days: i64) -> i64 {
        match self.shelf_life_days {
            Some(days) if days > 0 => days,
            _ => fallback_days,
        }
    }
}

// ==========================================
// Bom - 配方头
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bom {
    pub bom_id: String,
    pub product_id: String, // 对应成品（一对一）
    pub name: String,
    pub description: Option<String>,
}

// ==========================================
// BomItem - 配方明细
// ==========================================
// 约束: quantity > 0（每生产 1 单位成品所需原料数量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomItem {
    pub bom_item_id: String,
    pub bom_id: String,
    pub material_id: String,
    pub quantity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bread(shelf_life_days: Option<i64>) -> FinishedProduct {
        FinishedProduct {
            product_id: "P1".to_string(),
            name: "Roti Tawar".to_string(),
            sku: "FG-001".to_string(),
            unit: "pcs".to_string(),
            min_stock: 10.0,
            price: None,
            shelf_life_days,
        }
    }

    #[test]
    fn test_effective_shelf_life_falls_back() {
        assert_eq!(bread(Some(5)).effective_shelf_life_days(DEFAULT_SHELF_LIFE_DAYS), 5);
        assert_eq!(bread(None).effective_shelf_life_days(DEFAULT_SHELF_LIFE_DAYS), 3);
        assert_eq!(bread(Some(0)).effective_shelf_life_days(7), 7);
    }
}
