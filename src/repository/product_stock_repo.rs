// ==========================================
// 烘焙生产库存系统 - 成品库存仓储
// ==========================================
// 表: product_stock
// 说明: 成品出库不做 QC 判定，全部批次均可参与 FEFO
// ==========================================

use crate::domain::stock::{ProductStock, ProductStockSummary};
use crate::repository::db_utils::{millis_column, to_millis};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

pub struct ProductStockRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductStockRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入成品批次
    pub fn insert_tx(conn: &Connection, stock: &ProductStock) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO product_stock (
                   stock_id, product_id, production_run_id, quantity, expiry_date, produced_date
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                stock.stock_id,
                stock.product_id,
                stock.production_run_id,
                stock.quantity,
                to_millis(&stock.expiry_date),
                to_millis(&stock.produced_date),
            ],
        )?;
        Ok(())
    }

    pub fn update_quantity_tx(conn: &Connection, stock_id: &str, quantity: f64) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE product_stock SET quantity = ?1 WHERE stock_id = ?2",
            params![quantity, stock_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("ProductStock", stock_id));
        }
        Ok(())
    }

    pub fn delete_tx(conn: &Connection, stock_id: &str) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM product_stock WHERE stock_id = ?1", params![stock_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("ProductStock", stock_id));
        }
        Ok(())
    }

    /// 查询某成品全部批次（FEFO 顺序）
    pub fn find_by_product(&self, product_id: &str) -> RepositoryResult<Vec<ProductStock>> {
        let conn = self.get_conn()?;
        Self::find_by_product_tx(&conn, product_id)
    }

    pub fn find_by_product_tx(conn: &Connection, product_id: &str) -> RepositoryResult<Vec<ProductStock>> {
        let mut stmt = conn.prepare(
            r#"SELECT stock_id, product_id, production_run_id, quantity, expiry_date, produced_date
               FROM product_stock
               WHERE product_id = ?1
               ORDER BY expiry_date ASC, produced_date ASC, stock_id ASC"#,
        )?;
        let stocks = stmt
            .query_map(params![product_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stocks)
    }

    /// 查询某生产单产出的成品批次
    pub fn find_by_production_run(&self, run_id: &str) -> RepositoryResult<Vec<ProductStock>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT stock_id, product_id, production_run_id, quantity, expiry_date, produced_date
               FROM product_stock
               WHERE production_run_id = ?1
               ORDER BY produced_date ASC"#,
        )?;
        let stocks = stmt
            .query_map(params![run_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stocks)
    }

    /// 成品库存汇总（每个成品一行，无库存的成品合计为 0）
    pub fn summary(&self) -> RepositoryResult<Vec<ProductStockSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT p.product_id, p.name, p.sku, p.unit, p.min_stock,
                      COALESCE(SUM(s.quantity), 0)
               FROM finished_product p
               LEFT JOIN product_stock s ON s.product_id = p.product_id
               GROUP BY p.product_id
               ORDER BY p.name"#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                let min_stock: f64 = row.get(4)?;
                let total_stock: f64 = row.get(5)?;
                Ok(ProductStockSummary {
                    product_id: row.get(0)?,
                    name: row.get(1)?,
                    sku: row.get(2)?,
                    unit: row.get(3)?,
                    min_stock,
                    total_stock,
                    is_low_stock: total_stock < min_stock,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ProductStock> {
        Ok(ProductStock {
            stock_id: row.get(0)?,
            product_id: row.get(1)?,
            production_run_id: row.get(2)?,
            quantity: row.get(3)?,
            expiry_date: millis_column(row, 4)?,
            produced_date: millis_column(row, 5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::{DateTime, Utc};

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_product_stock_ordering_and_update() {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO finished_product (product_id, name, sku, unit, min_stock) VALUES ('P1', 'Roti', 'FG-1', 'pcs', 0)",
            [],
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = ProductStockRepository::new(conn.clone());

        {
            let c = conn.lock().unwrap();
            for (id, expiry) in [("S2", 2_000), ("S1", 1_000)] {
                ProductStockRepository::insert_tx(
                    &c,
                    &ProductStock {
                        stock_id: id.to_string(),
                        product_id: "P1".to_string(),
                        production_run_id: None,
                        quantity: 4.0,
                        expiry_date: at(expiry),
                        produced_date: at(0),
                    },
                )
                .unwrap();
            }
            ProductStockRepository::update_quantity_tx(&c, "S1", 1.5).unwrap();
            ProductStockRepository::delete_tx(&c, "S2").unwrap();
        }

        let stocks = repo.find_by_product("P1").unwrap();
        assert_eq!(stocks.len(), 1);
        assert_eq!(stocks[0].stock_id, "S1");
        assert_eq!(stocks[0].quantity, 1.5);
        assert_eq!(stocks[0].expiry_date, at(1_000));
    }
}
