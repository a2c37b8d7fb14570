// ==========================================
// 烘焙生产库存系统 - 生产配置读取 Trait
// ==========================================
// 职责: 定义生产/库存引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::repository::error::RepositoryResult;

// ==========================================
// ProductionConfigReader Trait
// ==========================================
// 用途: ProductionOrchestrator / LedgerApi 读取配置
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ProductionConfigReader: Send + Sync {
    /// 成品未配置保质期时使用的默认天数
    ///
    /// # 默认值
    /// - 3
    fn get_default_shelf_life_days(&self) -> RepositoryResult<i64>;

    /// 已完成生产单的归档天数（完工超过该天数的生产单可归档）
    ///
    /// # 默认值
    /// - 30
    fn get_production_archive_days(&self) -> RepositoryResult<i64>;

    /// 库存流水的归档天数
    ///
    /// # 默认值
    /// - 30
    fn get_transaction_archive_days(&self) -> RepositoryResult<i64>;
}
