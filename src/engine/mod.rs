// ==========================================
// 烘焙生产库存系统 - 引擎层
// ==========================================
// 职责: 实现业务规则（QC 判定 / FEFO 分配 / 生产单编排），不拼 SQL
// 红线: 每个写操作在一个 SQLite 事务内完成
// ==========================================

pub mod fefo;
pub mod inventory;
pub mod production;
pub mod qc;

// 重导出核心引擎
pub use fefo::{FefoAllocator, StockLot, UsageContext};
pub use inventory::{InventoryEngine, ReceiveStockRequest};
pub use production::{ExecuteRequest, PlanRequest, ProductionOrchestrator};
pub use qc::{QcRules, QcStateMachine};
