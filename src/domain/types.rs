// ==========================================
// 烘焙生产库存系统 - 领域类型定义
// ==========================================
// 依据: 数据模型 - QC 状态 / 生产状态 / 流水类型
// 约定: 数据库存储与序列化统一使用小写 snake_case
// ==========================================

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 数量比较容差（浮点残差视为 0）
pub const QTY_EPSILON: f64 = 1e-9;

/// 一天的毫秒数
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// 天数类设置（保质期 / 归档天数）的上限，约 100 年
pub const MAX_DAYS_SETTING: i64 = 36_500;

// ==========================================
// QC 状态 (Quality Control Status)
// ==========================================
// pending → release | hold | reject
// hold ↔ release
// 非终态 + 过期 → expired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcStatus {
    Pending, // 待检（入库默认，不可用）
    Release, // 放行（可用）
    Hold,    // 暂扣（可逆）
    Reject,  // 拒收（终态）
    Expired, // 过期（终态）
}

impl QcStatus {
    /// 转换为数据库存储的字符串
    pub fn as_db_str(&self) -> &'static str {
        match self {
            QcStatus::Pending => "pending",
            QcStatus::Release => "release",
            QcStatus::Hold => "hold",
            QcStatus::Reject => "reject",
            QcStatus::Expired => "expired",
        }
    }

    /// 从字符串解析状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(QcStatus::Pending),
            "release" => Some(QcStatus::Release),
            "hold" => Some(QcStatus::Hold),
            "reject" => Some(QcStatus::Reject),
            "expired" => Some(QcStatus::Expired),
            _ => None,
        }
    }

    /// 从数据库列值加载
    ///
    /// 历史批次可能没有 QC 状态（NULL），按放行处理。
    /// 打开数据库时 `db::migrate_legacy_qc_status` 已经把 NULL 改写为 release，
    /// 这里只兜底外部导入的旧库。
    pub fn from_db_value(raw: Option<&str>) -> Option<Self> {
        match raw {
            None => Some(QcStatus::Release),
            Some(s) => Self::from_db_str(s),
        }
    }

    /// 是否为终态（reject / expired）
    pub fn is_terminal(&self) -> bool {
        matches!(self, QcStatus::Reject | QcStatus::Expired)
    }
}

impl fmt::Display for QcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 生产单状态 (Production Run Status)
// ==========================================
// planned → completed | cancelled（单向）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Planned,   // 已计划
    Completed, // 已完成
    Cancelled, // 已取消
}

impl ProductionStatus {
    /// 转换为数据库存储的字符串
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ProductionStatus::Planned => "planned",
            ProductionStatus::Completed => "completed",
            ProductionStatus::Cancelled => "cancelled",
        }
    }

    /// 从字符串解析状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "planned" => Some(ProductionStatus::Planned),
            "completed" => Some(ProductionStatus::Completed),
            "cancelled" => Some(ProductionStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 库存流水类型 (Transaction Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    BatchReceived,        // 批次入库
    BatchUsed,            // 批次消耗
    BatchExpiredDisposed, // 过期报废
    ProductionCompleted,  // 生产完工
}

impl TransactionType {
    /// 转换为数据库存储的字符串
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TransactionType::BatchReceived => "batch_received",
            TransactionType::BatchUsed => "batch_used",
            TransactionType::BatchExpiredDisposed => "batch_expired_disposed",
            TransactionType::ProductionCompleted => "production_completed",
        }
    }

    /// 从字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim() {
            "batch_received" => Some(TransactionType::BatchReceived),
            "batch_used" => Some(TransactionType::BatchUsed),
            "batch_expired_disposed" => Some(TransactionType::BatchExpiredDisposed),
            "production_completed" => Some(TransactionType::ProductionCompleted),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 时间辅助
// ==========================================

/// 计算 `now - days` 的截止时间（归档类操作使用）
///
/// 超出可表示的时间范围时返回 None
pub fn cutoff_before(now: DateTime<Utc>, older_than_days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(older_than_days).and_then(|d| now.checked_sub_signed(d))
}

/// 计算 `from + days` 的到期时间（成品保质期使用）
///
/// 超出可表示的时间范围时返回 None
pub fn expiry_after(from: DateTime<Utc>, shelf_life_days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(shelf_life_days).and_then(|d| from.checked_add_signed(d))
}
