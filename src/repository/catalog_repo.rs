// ==========================================
// 烘焙生产库存系统 - 主数据仓储
// ==========================================
// 表: raw_material / supplier / finished_product / bom / bom_item
// 说明: 生产引擎只通过本仓储读取配方与保质期（`*_tx` 可在调用方事务内使用）
// 红线: Repository 不含业务逻辑，仅保留引用完整性校验
// ==========================================

use crate::domain::catalog::{Bom, BomItem, FinishedProduct, RawMaterial, Supplier};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// CatalogRepository - 主数据仓储
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepository {
    /// 创建新的主数据仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 原料
    // ==========================================

    /// 新增原料
    pub fn insert_raw_material(&self, material: &RawMaterial) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO raw_material (material_id, name, sku, unit, min_stock, price)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                material.material_id,
                material.name,
                material.sku,
                material.unit,
                material.min_stock,
                material.price,
            ],
        )?;
        Ok(material.material_id.clone())
    }

    /// 按ID查询原料
    pub fn find_raw_material(&self, material_id: &str) -> RepositoryResult<Option<RawMaterial>> {
        let conn = self.get_conn()?;
        Self::find_raw_material_tx(&conn, material_id)
    }

    /// 按ID查询原料（调用方连接/事务内）
    pub fn find_raw_material_tx(
        conn: &Connection,
        material_id: &str,
    ) -> RepositoryResult<Option<RawMaterial>> {
        let material = conn
            .query_row(
                r#"SELECT material_id, name, sku, unit, min_stock, price
                   FROM raw_material WHERE material_id = ?1"#,
                params![material_id],
                Self::map_raw_material,
            )
            .optional()?;
        Ok(material)
    }

    /// 按 SKU 查询原料
    pub fn find_raw_material_by_sku(&self, sku: &str) -> RepositoryResult<Option<RawMaterial>> {
        let conn = self.get_conn()?;
        let material = conn
            .query_row(
                r#"SELECT material_id, name, sku, unit, min_stock, price
                   FROM raw_material WHERE sku = ?1"#,
                params![sku],
                Self::map_raw_material,
            )
            .optional()?;
        Ok(material)
    }

    /// 查询全部原料（按名称排序）
    pub fn list_raw_materials(&self) -> RepositoryResult<Vec<RawMaterial>> {
        let conn = self.get_conn()?;
        Self::list_raw_materials_tx(&conn)
    }

    /// 查询全部原料（调用方连接/事务内）
    pub fn list_raw_materials_tx(conn: &Connection) -> RepositoryResult<Vec<RawMaterial>> {
        let mut stmt = conn.prepare(
            r#"SELECT material_id, name, sku, unit, min_stock, price
               FROM raw_material ORDER BY name"#,
        )?;
        let materials = stmt
            .query_map([], Self::map_raw_material)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(materials)
    }

    /// 删除原料
    ///
    /// # 红线
    /// - 被任何配方明细引用的原料不可删除
    pub fn delete_raw_material(&self, material_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let referenced: i64 = tx.query_row(
            "SELECT COUNT(*) FROM bom_item WHERE material_id = ?1",
            params![material_id],
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "原料 {} 已被配方引用，不可删除",
                material_id
            )));
        }

        let rows = tx.execute(
            "DELETE FROM raw_material WHERE material_id = ?1",
            params![material_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("RawMaterial", material_id));
        }

        tx.commit()?;
        Ok(())
    }

    fn map_raw_material(row: &Row<'_>) -> rusqlite::Result<RawMaterial> {
        Ok(RawMaterial {
            material_id: row.get(0)?,
            name: row.get(1)?,
            sku: row.get(2)?,
            unit: row.get(3)?,
            min_stock: row.get(4)?,
            price: row.get(5)?,
        })
    }

    // ==========================================
    // 供应商
    // ==========================================

    /// 新增供应商
    pub fn insert_supplier(&self, supplier: &Supplier) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO supplier (supplier_id, name, contact) VALUES (?1, ?2, ?3)",
            params![supplier.supplier_id, supplier.name, supplier.contact],
        )?;
        Ok(supplier.supplier_id.clone())
    }

    /// 按ID查询供应商（调用方连接/事务内）
    pub fn find_supplier_tx(conn: &Connection, supplier_id: &str) -> RepositoryResult<Option<Supplier>> {
        let supplier = conn
            .query_row(
                "SELECT supplier_id, name, contact FROM supplier WHERE supplier_id = ?1",
                params![supplier_id],
                |row| {
                    Ok(Supplier {
                        supplier_id: row.get(0)?,
                        name: row.get(1)?,
                        contact: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(supplier)
    }

    /// 查询全部供应商
    pub fn list_suppliers(&self) -> RepositoryResult<Vec<Supplier>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT supplier_id, name, contact FROM supplier ORDER BY name")?;
        let suppliers = stmt
            .query_map([], |row| {
                Ok(Supplier {
                    supplier_id: row.get(0)?,
                    name: row.get(1)?,
                    contact: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(suppliers)
    }

    // ==========================================
    // 成品
    // ==========================================

    /// 新增成品
    pub fn insert_finished_product(&self, product: &FinishedProduct) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO finished_product (product_id, name, sku, unit, min_stock, price, shelf_life_days)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                product.product_id,
                product.name,
                product.sku,
                product.unit,
                product.min_stock,
                product.price,
                product.shelf_life_days,
            ],
        )?;
        Ok(product.product_id.clone())
    }

    /// 按ID查询成品
    pub fn find_finished_product(&self, product_id: &str) -> RepositoryResult<Option<FinishedProduct>> {
        let conn = self.get_conn()?;
        Self::find_finished_product_tx(&conn, product_id)
    }

    /// 按ID查询成品（调用方连接/事务内）
    pub fn find_finished_product_tx(
        conn: &Connection,
        product_id: &str,
    ) -> RepositoryResult<Option<FinishedProduct>> {
        let product = conn
            .query_row(
                r#"SELECT product_id, name, sku, unit, min_stock, price, shelf_life_days
                   FROM finished_product WHERE product_id = ?1"#,
                params![product_id],
                Self::map_finished_product,
            )
            .optional()?;
        Ok(product)
    }

    /// 按 SKU 查询成品
    pub fn find_finished_product_by_sku(&self, sku: &str) -> RepositoryResult<Option<FinishedProduct>> {
        let conn = self.get_conn()?;
        let product = conn
            .query_row(
                r#"SELECT product_id, name, sku, unit, min_stock, price, shelf_life_days
                   FROM finished_product WHERE sku = ?1"#,
                params![sku],
                Self::map_finished_product,
            )
            .optional()?;
        Ok(product)
    }

    /// 查询全部成品
    pub fn list_finished_products(&self) -> RepositoryResult<Vec<FinishedProduct>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT product_id, name, sku, unit, min_stock, price, shelf_life_days
               FROM finished_product ORDER BY name"#,
        )?;
        let products = stmt
            .query_map([], Self::map_finished_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// 删除成品
    ///
    /// # 红线
    /// - 已有配方的成品不可删除
    pub fn delete_finished_product(&self, product_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let has_bom: i64 = tx.query_row(
            "SELECT COUNT(*) FROM bom WHERE product_id = ?1",
            params![product_id],
            |row| row.get(0),
        )?;
        if has_bom > 0 {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "成品 {} 已有配方，不可删除",
                product_id
            )));
        }

        let rows = tx.execute(
            "DELETE FROM finished_product WHERE product_id = ?1",
            params![product_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("FinishedProduct", product_id));
        }

        tx.commit()?;
        Ok(())
    }

    fn map_finished_product(row: &Row<'_>) -> rusqlite::Result<FinishedProduct> {
        Ok(FinishedProduct {
            product_id: row.get(0)?,
            name: row.get(1)?,
            sku: row.get(2)?,
            unit: row.get(3)?,
            min_stock: row.get(4)?,
            price: row.get(5)?,
            shelf_life_days: row.get(6)?,
        })
    }

    // ==========================================
    // 配方
    // ==========================================

    /// 新增配方头
    pub fn insert_bom(&self, bom: &Bom) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO bom (bom_id, product_id, name, description) VALUES (?1, ?2, ?3, ?4)",
            params![bom.bom_id, bom.product_id, bom.name, bom.description],
        )?;
        Ok(bom.bom_id.clone())
    }

    /// 按ID查询配方头
    pub fn find_bom(&self, bom_id: &str) -> RepositoryResult<Option<Bom>> {
        let conn = self.get_conn()?;
        Self::find_bom_tx(&conn, bom_id)
    }

    /// 按ID查询配方头（调用方连接/事务内）
    pub fn find_bom_tx(conn: &Connection, bom_id: &str) -> RepositoryResult<Option<Bom>> {
        let bom = conn
            .query_row(
                "SELECT bom_id, product_id, name, description FROM bom WHERE bom_id = ?1",
                params![bom_id],
                |row| {
                    Ok(Bom {
                        bom_id: row.get(0)?,
                        product_id: row.get(1)?,
                        name: row.get(2)?,
                        description: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(bom)
    }

    /// 新增配方（配方头 + 明细，同一事务）
    pub fn insert_bom_with_items(&self, bom: &Bom, items: &[BomItem]) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO bom (bom_id, product_id, name, description) VALUES (?1, ?2, ?3, ?4)",
            params![bom.bom_id, bom.product_id, bom.name, bom.description],
        )?;
        for item in items {
            tx.execute(
                "INSERT INTO bom_item (bom_item_id, bom_id, material_id, quantity) VALUES (?1, ?2, ?3, ?4)",
                params![item.bom_item_id, bom.bom_id, item.material_id, item.quantity],
            )?;
        }

        tx.commit()?;
        Ok(bom.bom_id.clone())
    }

    /// 新增配方明细
    pub fn insert_bom_item(&self, item: &BomItem) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO bom_item (bom_item_id, bom_id, material_id, quantity) VALUES (?1, ?2, ?3, ?4)",
            params![item.bom_item_id, item.bom_id, item.material_id, item.quantity],
        )?;
        Ok(item.bom_item_id.clone())
    }

    /// 查询配方明细
    pub fn find_bom_items(&self, bom_id: &str) -> RepositoryResult<Vec<BomItem>> {
        let conn = self.get_conn()?;
        Self::find_bom_items_tx(&conn, bom_id)
    }

    /// 查询配方明细（调用方连接/事务内，按插入顺序）
    pub fn find_bom_items_tx(conn: &Connection, bom_id: &str) -> RepositoryResult<Vec<BomItem>> {
        let mut stmt = conn.prepare(
            r#"SELECT bom_item_id, bom_id, material_id, quantity
               FROM bom_item WHERE bom_id = ?1 ORDER BY rowid"#,
        )?;
        let items = stmt
            .query_map(params![bom_id], |row| {
                Ok(BomItem {
                    bom_item_id: row.get(0)?,
                    bom_id: row.get(1)?,
                    material_id: row.get(2)?,
                    quantity: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn setup() -> CatalogRepository {
        CatalogRepository::new(Arc::new(Mutex::new(open_in_memory().unwrap())))
    }

    fn flour() -> RawMaterial {
        RawMaterial {
            material_id: "M1".to_string(),
            name: "Tepung Terigu".to_string(),
            sku: "RM-001".to_string(),
            unit: "kg".to_string(),
            min_stock: 50.0,
            price: Some(12000.0),
        }
    }

    fn bread() -> FinishedProduct {
        FinishedProduct {
            product_id: "P1".to_string(),
            name: "Roti Tawar".to_string(),
            sku: "FG-001".to_string(),
            unit: "pcs".to_string(),
            min_stock: 20.0,
            price: None,
            shelf_life_days: Some(3),
        }
    }

    #[test]
    fn test_duplicate_sku_rejected() {
        let repo = setup();
        repo.insert_raw_material(&flour()).unwrap();

        let mut dup = flour();
        dup.material_id = "M2".to_string();
        let err = repo.insert_raw_material(&dup).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_material_referenced_by_bom_cannot_be_deleted() {
        let repo = setup();
        repo.insert_raw_material(&flour()).unwrap();
        repo.insert_finished_product(&bread()).unwrap();
        repo.insert_bom(&Bom {
            bom_id: "BOM1".to_string(),
            product_id: "P1".to_string(),
            name: "Resep Roti".to_string(),
            description: None,
        })
        .unwrap();
        repo.insert_bom_item(&BomItem {
            bom_item_id: "BI1".to_string(),
            bom_id: "BOM1".to_string(),
            material_id: "M1".to_string(),
            quantity: 0.5,
        })
        .unwrap();

        let err = repo.delete_raw_material("M1").unwrap_err();
        assert!(matches!(err, RepositoryError::BusinessRuleViolation(_)));
        assert!(repo.find_raw_material("M1").unwrap().is_some());

        let err = repo.delete_finished_product("P1").unwrap_err();
        assert!(matches!(err, RepositoryError::BusinessRuleViolation(_)));
    }

    #[test]
    fn test_delete_unreferenced_material() {
        let repo = setup();
        repo.insert_raw_material(&flour()).unwrap();
        repo.delete_raw_material("M1").unwrap();
        assert!(repo.find_raw_material("M1").unwrap().is_none());

        let err = repo.delete_raw_material("M1").unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_bom_items_keep_insertion_order() {
        let repo = setup();
        repo.insert_raw_material(&flour()).unwrap();
        let mut sugar = flour();
        sugar.material_id = "M2".to_string();
        sugar.sku = "RM-002".to_string();
        sugar.name = "Gula".to_string();
        repo.insert_raw_material(&sugar).unwrap();
        repo.insert_finished_product(&bread()).unwrap();
        repo.insert_bom(&Bom {
            bom_id: "BOM1".to_string(),
            product_id: "P1".to_string(),
            name: "Resep Roti".to_string(),
            description: Some("standar".to_string()),
        })
        .unwrap();

        for (id, material) in [("BI-z", "M2"), ("BI-a", "M1")] {
            repo.insert_bom_item(&BomItem {
                bom_item_id: id.to_string(),
                bom_id: "BOM1".to_string(),
                material_id: material.to_string(),
                quantity: 1.0,
            })
            .unwrap();
        }

        let items = repo.find_bom_items("BOM1").unwrap();
        let materials: Vec<_> = items.iter().map(|i| i.material_id.as_str()).collect();
        assert_eq!(materials, vec!["M2", "M1"]);
    }
}
