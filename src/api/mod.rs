// ==========================================
// 烘焙生产库存系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，参数校验 + 错误映射
// ==========================================

pub mod catalog_api;
pub mod error;
pub mod inventory_api;
pub mod ledger_api;
pub mod product_api;
pub mod production_api;
pub mod validator;

// 重导出核心类型
pub use catalog_api::{CatalogApi, NewFinishedProduct, NewRawMaterial};
pub use error::{map_api_error, ApiError, ApiResult, ErrorResponse};
pub use inventory_api::InventoryApi;
pub use ledger_api::LedgerApi;
pub use product_api::ProductApi;
pub use production_api::ProductionApi;
