// ==========================================
// 烘焙生产库存系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 原料批次 QC / FEFO 消耗 / 生产执行 / 流水与报废台账
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装入口
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ProductionStatus, QcStatus, TransactionType, QTY_EPSILON};

// 领域实体
pub use domain::{
    Batch, Bom, BomItem, FinishedProduct, LotAllocation, ProductStock, ProductionExecution,
    ProductionRun, RawMaterial, Supplier, TransactionLog, WasteRecord,
};

// 引擎
pub use engine::{FefoAllocator, InventoryEngine, ProductionOrchestrator, QcRules, QcStateMachine};

// API
pub use api::{ApiError, ApiResult, CatalogApi, InventoryApi, LedgerApi, ProductApi, ProductionApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "烘焙生产库存系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(DB_VERSION, "v0.1");
    }
}
