// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化 + 主数据 / 批次夹具
// 约定: 引擎层测试统一使用固定的 now，避免依赖系统时间
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;
use tempfile::NamedTempFile;
use uuid::Uuid;

use bakery_inventory::config::ConfigManager;
use bakery_inventory::domain::catalog::{Bom, BomItem, FinishedProduct, RawMaterial, Supplier};
use bakery_inventory::domain::stock::Batch;
use bakery_inventory::domain::types::QcStatus;
use bakery_inventory::engine::{
    InventoryEngine, PlanRequest, ProductionOrchestrator, QcStateMachine, ReceiveStockRequest,
};
use bakery_inventory::repository::{
    BatchRepository, CatalogRepository, ProductStockRepository, ProductionRunRepository,
    TransactionLogRepository, WasteRecordRepository,
};

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    bakery_inventory::logging::init_test();

    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = bakery_inventory::db::open_sqlite_connection(&db_path)?;
    bakery_inventory::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 测试基准时间
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

pub fn days(n: i64) -> Duration {
    Duration::days(n)
}

// ==========================================
// TestEnv - 共享连接上的仓储与引擎
// ==========================================
pub struct TestEnv {
    pub _temp_file: NamedTempFile,
    pub conn: Arc<Mutex<Connection>>,
    pub catalog_repo: CatalogRepository,
    pub batch_repo: BatchRepository,
    pub product_stock_repo: ProductStockRepository,
    pub run_repo: ProductionRunRepository,
    pub log_repo: TransactionLogRepository,
    pub waste_repo: WasteRecordRepository,
    pub config: Arc<ConfigManager>,
    pub inventory: InventoryEngine,
    pub qc: QcStateMachine,
    pub orchestrator: ProductionOrchestrator<ConfigManager>,
}

impl TestEnv {
    pub fn new() -> Self {
        let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
        let conn = bakery_inventory::db::open_sqlite_connection(&db_path).expect("打开测试数据库失败");
        let conn = Arc::new(Mutex::new(conn));

        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());

        Self {
            _temp_file: temp_file,
            catalog_repo: CatalogRepository::new(conn.clone()),
            batch_repo: BatchRepository::new(conn.clone()),
            product_stock_repo: ProductStockRepository::new(conn.clone()),
            run_repo: ProductionRunRepository::new(conn.clone()),
            log_repo: TransactionLogRepository::new(conn.clone()),
            waste_repo: WasteRecordRepository::new(conn.clone()),
            inventory: InventoryEngine::new(conn.clone()),
            qc: QcStateMachine::new(conn.clone()),
            orchestrator: ProductionOrchestrator::new(conn.clone(), config.clone()),
            config,
            conn,
        }
    }

    // ==========================================
    // 主数据夹具
    // ==========================================

    pub fn material(&self, name: &str, min_stock: f64) -> RawMaterial {
        let material = RawMaterial {
            material_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            sku: format!("RM-{}", Uuid::new_v4().simple()),
            unit: "kg".to_string(),
            min_stock,
            price: None,
        };
        self.catalog_repo.insert_raw_material(&material).unwrap();
        material
    }

    pub fn supplier(&self, name: &str) -> Supplier {
        let supplier = Supplier {
            supplier_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            contact: "010-0000".to_string(),
        };
        self.catalog_repo.insert_supplier(&supplier).unwrap();
        supplier
    }

    pub fn product(&self, name: &str, shelf_life_days: Option<i64>) -> FinishedProduct {
        let product = FinishedProduct {
            product_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            sku: format!("FP-{}", Uuid::new_v4().simple()),
            unit: "pcs".to_string(),
            min_stock: 0.0,
            price: None,
            shelf_life_days,
        };
        self.catalog_repo.insert_finished_product(&product).unwrap();
        product
    }

    /// 创建配方，items 为 (原料ID, 单位用量)
    pub fn bom(&self, product_id: &str, items: &[(&str, f64)]) -> Bom {
        let bom = Bom {
            bom_id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            name: "测试配方".to_string(),
            description: None,
        };
        let bom_items: Vec<BomItem> = items
            .iter()
            .map(|(material_id, quantity)| BomItem {
                bom_item_id: Uuid::new_v4().to_string(),
                bom_id: bom.bom_id.clone(),
                material_id: material_id.to_string(),
                quantity: *quantity,
            })
            .collect();
        self.catalog_repo.insert_bom_with_items(&bom, &bom_items).unwrap();
        bom
    }

    // ==========================================
    // 批次夹具
    // ==========================================

    /// 入库一个批次并设置 QC 状态（Pending 时不做变更）
    pub fn batch(
        &self,
        material_id: &str,
        batch_number: &str,
        quantity: f64,
        expiry_date: DateTime<Utc>,
        received_date: DateTime<Utc>,
        status: QcStatus,
    ) -> Batch {
        let req = ReceiveStockRequest {
            material_id: material_id.to_string(),
            supplier_id: None,
            batch_number: batch_number.to_string(),
            quantity,
            expiry_date,
            actor: Some("tester".to_string()),
        };
        let batch = self.inventory.receive_stock(&req, received_date).unwrap();
        if status == QcStatus::Pending {
            return batch;
        }
        self.qc.set_status(&batch.batch_id, status).unwrap()
    }

    /// 已放行批次（基准时间入库）
    pub fn released(&self, material_id: &str, batch_number: &str, quantity: f64, expiry_in_days: i64) -> Batch {
        self.batch(
            material_id,
            batch_number,
            quantity,
            base_time() + days(expiry_in_days),
            base_time() - days(1),
            QcStatus::Release,
        )
    }

    /// 计划一张生产单
    pub fn planned_run(&self, bom_id: &str, target_quantity: f64) -> String {
        let req = PlanRequest {
            bom_id: bom_id.to_string(),
            target_quantity,
            start_date: base_time(),
            notes: None,
        };
        self.orchestrator.plan(&req).unwrap().run_id
    }

    /// 某原料当前全部批次数量（按 FEFO 顺序）
    pub fn quantities(&self, material_id: &str) -> Vec<f64> {
        self.batch_repo
            .find_by_material(material_id)
            .unwrap()
            .iter()
            .map(|b| b.quantity)
            .collect()
    }

    pub fn log_count(&self) -> i64 {
        self.log_repo.count_all().unwrap()
    }
}

pub fn assert_qty(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "数量不符: actual={}, expected={}",
        actual,
        expected
    );
}
