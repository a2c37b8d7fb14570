// ==========================================
// 烘焙生产库存系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod catalog;
pub mod ledger;
pub mod production;
pub mod stock;
pub mod types;

// 重导出核心类型
pub use catalog::{Bom, BomItem, FinishedProduct, RawMaterial, Supplier, DEFAULT_SHELF_LIFE_DAYS};
pub use ledger::{
    MaterialWasteTotal, TransactionLog, TransactionLogView, WasteRecord, WasteRecordView,
    WasteSummary,
};
pub use production::{
    IngredientConsumption, LotAllocation, MaterialRequirement, ProductionExecution, ProductionRun,
    ProductionRunView,
};
pub use stock::{Batch, BatchView, MaterialStockSummary, ProductStock, ProductStockSummary};
pub use types::{ProductionStatus, QcStatus, TransactionType, QTY_EPSILON};
