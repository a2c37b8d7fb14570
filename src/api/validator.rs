// ==========================================
// 烘焙生产库存系统 - 输入校验
// ==========================================
// 职责: API 入口的参数校验（非空文本 / 数量范围）
// 说明: 校验失败统一返回 ApiError::InvalidInput，不触达数据库
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::MAX_DAYS_SETTING;

/// 文本字段不能为空（去除首尾空白后）
pub fn require_non_empty(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}

/// 数量必须为有限正数
pub fn require_positive(field: &str, value: f64) -> ApiResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ApiError::InvalidInput(format!("{}必须为正数: {}", field, value)));
    }
    Ok(())
}

/// 数量必须为有限非负数
pub fn require_non_negative(field: &str, value: f64) -> ApiResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::InvalidInput(format!("{}不能为负数: {}", field, value)));
    }
    Ok(())
}

/// 天数类参数: 位于 [min, MAX_DAYS_SETTING] 区间
pub fn require_days_in_range(field: &str, days: i64, min: i64) -> ApiResult<()> {
    if days < min || days > MAX_DAYS_SETTING {
        return Err(ApiError::InvalidInput(format!(
            "{}必须在 {} 到 {} 天之间: {}",
            field, min, MAX_DAYS_SETTING, days
        )));
    }
    Ok(())
}

/// 可选文本: 去除首尾空白，空串视为未填写
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
