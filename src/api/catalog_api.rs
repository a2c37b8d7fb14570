// ==========================================
// 烘焙生产库存系统 - 主数据 API
// ==========================================
// 职责: 原料 / 供应商 / 成品 / 配方的录入与查询
// 说明: 生产引擎通过这些数据完成配方展开与保质期计算
// ==========================================

use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{
    normalize_optional, require_days_in_range, require_non_empty, require_non_negative, require_positive,
};
use crate::domain::catalog::{Bom, BomItem, FinishedProduct, RawMaterial, Supplier};
use crate::repository::catalog_repo::CatalogRepository;

/// 原料录入参数
#[derive(Debug, Clone)]
pub struct NewRawMaterial {
    pub name: String,
    pub sku: String,
    pub unit: String,
    pub min_stock: f64,
    pub price: Option<f64>,
}

/// 成品录入参数
#[derive(Debug, Clone)]
pub struct NewFinishedProduct {
    pub name: String,
    pub sku: String,
    pub unit: String,
    pub min_stock: f64,
    pub price: Option<f64>,
    pub shelf_life_days: Option<i64>,
}

// ==========================================
// CatalogApi - 主数据 API
// ==========================================
pub struct CatalogApi {
    catalog_repo: Arc<CatalogRepository>,
}

impl CatalogApi {
    pub fn new(catalog_repo: Arc<CatalogRepository>) -> Self {
        Self { catalog_repo }
    }

    // ==========================================
    // 原料
    // ==========================================

    /// 新增原料（SKU 唯一）
    pub fn create_raw_material(&self, input: NewRawMaterial) -> ApiResult<RawMaterial> {
        require_non_empty("name", &input.name)?;
        require_non_empty("sku", &input.sku)?;
        require_non_empty("unit", &input.unit)?;
        require_non_negative("min_stock", input.min_stock)?;

        if self.catalog_repo.find_raw_material_by_sku(input.sku.trim())?.is_some() {
            return Err(ApiError::BusinessRuleViolation(format!("SKU {} 已存在", input.sku.trim())));
        }

        let material = RawMaterial {
            material_id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            sku: input.sku.trim().to_string(),
            unit: input.unit.trim().to_string(),
            min_stock: input.min_stock,
            price: input.price,
        };
        self.catalog_repo.insert_raw_material(&material)?;
        tracing::info!(material_id = %material.material_id, sku = %material.sku, "原料已创建");
        Ok(material)
    }

    pub fn get_raw_material(&self, material_id: &str) -> ApiResult<RawMaterial> {
        self.catalog_repo
            .find_raw_material(material_id)?
            .ok_or_else(|| ApiError::NotFound(format!("RawMaterial(id={})不存在", material_id)))
    }

    pub fn list_raw_materials(&self) -> ApiResult<Vec<RawMaterial>> {
        Ok(self.catalog_repo.list_raw_materials()?)
    }

    /// 删除原料（被配方引用时拒绝）
    pub fn delete_raw_material(&self, material_id: &str) -> ApiResult<()> {
        self.catalog_repo.delete_raw_material(material_id)?;
        tracing::info!(material_id, "原料已删除");
        Ok(())
    }

    // ==========================================
    // 供应商
    // ==========================================

    pub fn create_supplier(&self, name: &str, contact: &str) -> ApiResult<Supplier> {
        require_non_empty("name", name)?;

        let supplier = Supplier {
            supplier_id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            contact: contact.trim().to_string(),
        };
        self.catalog_repo.insert_supplier(&supplier)?;
        Ok(supplier)
    }

    pub fn list_suppliers(&self) -> ApiResult<Vec<Supplier>> {
        Ok(self.catalog_repo.list_suppliers()?)
    }

    // ==========================================
    // 成品
    // ==========================================

    /// 新增成品（SKU 唯一，保质期可空）
    pub fn create_finished_product(&self, input: NewFinishedProduct) -> ApiResult<FinishedProduct> {
        require_non_empty("name", &input.name)?;
        require_non_empty("sku", &input.sku)?;
        require_non_empty("unit", &input.unit)?;
        require_non_negative("min_stock", input.min_stock)?;
        if let Some(days) = input.shelf_life_days {
            require_days_in_range("shelf_life_days", days, 1)?;
        }

        if self.catalog_repo.find_finished_product_by_sku(input.sku.trim())?.is_some() {
            return Err(ApiError::BusinessRuleViolation(format!("SKU {} 已存在", input.sku.trim())));
        }

        let product = FinishedProduct {
            product_id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            sku: input.sku.trim().to_string(),
            unit: input.unit.trim().to_string(),
            min_stock: input.min_stock,
            price: input.price,
            shelf_life_days: input.shelf_life_days,
        };
        self.catalog_repo.insert_finished_product(&product)?;
        tracing::info!(product_id = %product.product_id, sku = %product.sku, "成品已创建");
        Ok(product)
    }

    pub fn get_finished_product(&self, product_id: &str) -> ApiResult<FinishedProduct> {
        self.catalog_repo
            .find_finished_product(product_id)?
            .ok_or_else(|| ApiError::NotFound(format!("FinishedProduct(id={})不存在", product_id)))
    }

    pub fn list_finished_products(&self) -> ApiResult<Vec<FinishedProduct>> {
        Ok(self.catalog_repo.list_finished_products()?)
    }

    /// 删除成品（已有配方时拒绝）
    pub fn delete_finished_product(&self, product_id: &str) -> ApiResult<()> {
        self.catalog_repo.delete_finished_product(product_id)?;
        tracing::info!(product_id, "成品已删除");
        Ok(())
    }

    // ==========================================
    // 配方
    // ==========================================

    /// 新增配方
    ///
    /// # 参数
    /// - items: (原料ID, 单位用量) 列表，至少一行
    pub fn create_bom(
        &self,
        product_id: &str,
        name: &str,
        description: Option<&str>,
        items: &[(String, f64)],
    ) -> ApiResult<(Bom, Vec<BomItem>)> {
        require_non_empty("name", name)?;
        if items.is_empty() {
            return Err(ApiError::InvalidInput("配方至少需要一种原料".to_string()));
        }
        for (material_id, quantity) in items {
            require_positive("quantity", *quantity)?;
            if self.catalog_repo.find_raw_material(material_id)?.is_none() {
                return Err(ApiError::NotFound(format!("RawMaterial(id={})不存在", material_id)));
            }
        }
        if self.catalog_repo.find_finished_product(product_id)?.is_none() {
            return Err(ApiError::NotFound(format!("FinishedProduct(id={})不存在", product_id)));
        }

        let bom = Bom {
            bom_id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            name: name.trim().to_string(),
            description: normalize_optional(description),
        };
        let bom_items: Vec<BomItem> = items
            .iter()
            .map(|(material_id, quantity)| BomItem {
                bom_item_id: Uuid::new_v4().to_string(),
                bom_id: bom.bom_id.clone(),
                material_id: material_id.clone(),
                quantity: *quantity,
            })
            .collect();

        self.catalog_repo.insert_bom_with_items(&bom, &bom_items)?;
        tracing::info!(bom_id = %bom.bom_id, product_id, items = bom_items.len(), "配方已创建");
        Ok((bom, bom_items))
    }

    pub fn get_bom(&self, bom_id: &str) -> ApiResult<Bom> {
        self.catalog_repo
            .find_bom(bom_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Bom(id={})不存在", bom_id)))
    }

    pub fn get_bom_items(&self, bom_id: &str) -> ApiResult<Vec<BomItem>> {
        Ok(self.catalog_repo.find_bom_items(bom_id)?)
    }
}
