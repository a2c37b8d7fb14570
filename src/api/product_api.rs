// ==========================================
// 烘焙生产库存系统 - 成品库存 API
// ==========================================
// 职责: 成品批次查询 / 成品 FEFO 出库 / 成品库存汇总
// 说明: 成品出库不做 QC 判定
// ==========================================

use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::validator::require_positive;
use crate::domain::production::LotAllocation;
use crate::domain::stock::{ProductStock, ProductStockSummary};
use crate::engine::inventory::InventoryEngine;
use crate::repository::product_stock_repo::ProductStockRepository;

pub struct ProductApi {
    product_stock_repo: Arc<ProductStockRepository>,
    inventory_engine: Arc<InventoryEngine>,
}

impl ProductApi {
    pub fn new(
        product_stock_repo: Arc<ProductStockRepository>,
        inventory_engine: Arc<InventoryEngine>,
    ) -> Self {
        Self {
            product_stock_repo,
            inventory_engine,
        }
    }

    /// 某成品的库存批次（按到期时间）
    pub fn get_stock_entries(&self, product_id: &str) -> ApiResult<Vec<ProductStock>> {
        Ok(self.product_stock_repo.find_by_product(product_id)?)
    }

    /// 成品 FEFO 出库
    pub fn deduct_stock(&self, product_id: &str, quantity: f64) -> ApiResult<Vec<LotAllocation>> {
        require_positive("quantity", quantity)?;
        Ok(self.inventory_engine.deduct_product_stock(product_id, quantity)?)
    }

    /// 成品库存汇总
    pub fn product_stock_summary(&self) -> ApiResult<Vec<ProductStockSummary>> {
        Ok(self.product_stock_repo.summary()?)
    }
}
