// ==========================================
// 烘焙生产库存系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 约定: 全部仓储 / 引擎共用一个 Arc<Mutex<Connection>>
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{CatalogApi, InventoryApi, LedgerApi, ProductApi, ProductionApi};
use crate::config::config_manager::ConfigManager;
use crate::engine::{InventoryEngine, ProductionOrchestrator, QcStateMachine};
use crate::repository::{
    BatchRepository, CatalogRepository, ProductStockRepository, TransactionLogRepository,
    WasteRecordRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径（内存库为 ":memory:"）
    pub db_path: String,

    /// 共享数据库连接
    pub conn: Arc<Mutex<Connection>>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 主数据API
    pub catalog_api: Arc<CatalogApi>,

    /// 原料库存API
    pub inventory_api: Arc<InventoryApi>,

    /// 成品库存API
    pub product_api: Arc<ProductApi>,

    /// 生产单API
    pub production_api: Arc<ProductionApi>,

    /// 流水与报废台账API
    pub ledger_api: Arc<LedgerApi>,
}

impl AppState {
    /// 打开（或创建）数据库文件并初始化AppState
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并执行建库脚本（幂等，含历史 QC 状态迁移）
    /// 2. 初始化所有Repository / Engine
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("无法初始化数据库结构: {}", e))?;

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 使用内存数据库初始化（测试 / 演示）
    pub fn in_memory() -> Result<Self, String> {
        let conn = crate::db::open_in_memory().map_err(|e| format!("无法打开内存数据库: {}", e))?;
        Self::from_connection(":memory:".to_string(), Arc::new(Mutex::new(conn)))
    }

    fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        // ==========================================
        // 初始化Repository层
        // ==========================================
        let catalog_repo = Arc::new(CatalogRepository::new(conn.clone()));
        let batch_repo = Arc::new(BatchRepository::new(conn.clone()));
        let product_stock_repo = Arc::new(ProductStockRepository::new(conn.clone()));
        let transaction_log_repo = Arc::new(TransactionLogRepository::new(conn.clone()));
        let waste_repo = Arc::new(WasteRecordRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let qc_state_machine = Arc::new(QcStateMachine::new(conn.clone()));
        let inventory_engine = Arc::new(InventoryEngine::new(conn.clone()));
        let orchestrator = Arc::new(ProductionOrchestrator::new(conn.clone(), config_manager.clone()));

        // ==========================================
        // 初始化API层
        // ==========================================
        let catalog_api = Arc::new(CatalogApi::new(catalog_repo));
        let inventory_api = Arc::new(InventoryApi::new(
            batch_repo,
            inventory_engine.clone(),
            qc_state_machine,
        ));
        let product_api = Arc::new(ProductApi::new(product_stock_repo, inventory_engine));
        let production_api = Arc::new(ProductionApi::new(orchestrator));
        let ledger_api = Arc::new(LedgerApi::new(
            transaction_log_repo,
            waste_repo,
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            config_manager,
            catalog_api,
            inventory_api,
            product_api,
            production_api,
            ledger_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级:
/// 1. 环境变量 BAKERY_INVENTORY_DB_PATH
/// 2. 用户数据目录下的 bakery-inventory/bakery_inventory.db
/// 3. 当前目录 ./bakery_inventory.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("BAKERY_INVENTORY_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./bakery_inventory.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        let dir = data_dir.join("bakery-inventory-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("bakery-inventory");

        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("bakery_inventory.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_state_is_usable() {
        let state = AppState::in_memory().unwrap();
        assert_eq!(state.db_path, ":memory:");
        assert!(state.inventory_api.list_all().unwrap().is_empty());
        assert!(state.production_api.list(true).unwrap().is_empty());
    }
}
