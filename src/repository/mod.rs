// ==========================================
// 烘焙生产库存系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: `*_tx(conn, ..)` 关联函数接收调用方的连接/事务，
//       由 engine 层把多个仓储的写入放进同一个事务
// ==========================================

pub mod batch_repo;
pub mod catalog_repo;
pub mod db_utils;
pub mod error;
pub mod product_stock_repo;
pub mod production_repo;
pub mod transaction_log_repo;
pub mod waste_repo;

// 重导出核心仓储
pub use batch_repo::BatchRepository;
pub use catalog_repo::CatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use product_stock_repo::ProductStockRepository;
pub use production_repo::ProductionRunRepository;
pub use transaction_log_repo::TransactionLogRepository;
pub use waste_repo::WasteRecordRepository;
