// ==========================================
// 烘焙生产库存系统 - 应用层
// ==========================================
// 职责: 组装仓储 / 引擎 / API，提供统一入口
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
