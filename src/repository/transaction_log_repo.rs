// ==========================================
// 烘焙生产库存系统 - 库存流水仓储
// ==========================================
// 表: transaction_log
// 红线: 流水只追加，唯一允许的更新是写入 archived_at
// ==========================================

mod core;
mod queries;


pub use self::core::TransactionLogRepository;
