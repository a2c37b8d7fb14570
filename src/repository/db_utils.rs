// ==========================================
// 烘焙生产库存系统 - 仓储层通用工具
// ==========================================
// 毫秒时间戳 <-> DateTime<Utc> 映射
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

/// DateTime 转毫秒时间戳（入库）
pub fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// 可选 DateTime 转毫秒时间戳
pub fn to_millis_opt(dt: &Option<DateTime<Utc>>) -> Option<i64> {
    dt.as_ref().map(to_millis)
}

/// 读取毫秒时间戳列
pub fn millis_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("毫秒时间戳超出范围: {}", ms).into(),
        )
    })
}

/// 读取可空毫秒时间戳列
pub fn millis_column_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let ms: Option<i64> = row.get(idx)?;
    match ms {
        None => Ok(None),
        Some(ms) => DateTime::from_timestamp_millis(ms).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Integer,
                format!("毫秒时间戳超出范围: {}", ms).into(),
            )
        }),
    }
}

/// 枚举列解析失败时的统一错误
pub fn invalid_enum_value(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("无法识别的枚举值: {}", raw).into(),
    )
}
