// ==========================================
// 烘焙生产库存系统 - 库存流水与报废台账
// ==========================================
// 红线: 流水只追加，不修改（仅允许写入 archived_at）
// 报废记录创建后不可变
// ==========================================

use crate::domain::types::TransactionType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// TransactionLog - 库存流水
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLog {
    pub log_id: String,
    pub log_type: TransactionType,
    pub batch_id: Option<String>, // 批次可能已被删除，不做外键
    pub batch_number: Option<String>,
    pub material_id: Option<String>,
    pub production_run_id: Option<String>,
    pub quantity: f64,
    pub actor: Option<String>,
    pub notes: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl TransactionLog {
    /// 创建新的流水记录
    ///
    /// 关联字段通过 `with_*` 链式补充
    pub fn new(log_type: TransactionType, quantity: f64, created_at: DateTime<Utc>) -> Self {
        Self {
            log_id: Uuid::new_v4().to_string(),
            log_type,
            batch_id: None,
            batch_number: None,
            material_id: None,
            production_run_id: None,
            quantity,
            actor: None,
            notes: None,
            created_at,
            archived_at: None,
        }
    }

    pub fn with_batch(mut self, batch_id: &str, batch_number: &str) -> Self {
        self.batch_id = Some(batch_id.to_string());
        self.batch_number = Some(batch_number.to_string());
        self
    }

    pub fn with_material(mut self, material_id: &str) -> Self {
        self.material_id = Some(material_id.to_string());
        self
    }

    pub fn with_production_run(mut self, run_id: &str) -> Self {
        self.production_run_id = Some(run_id.to_string());
        self
    }

    pub fn with_actor(mut self, actor: Option<&str>) -> Self {
        self.actor = actor.map(str::to_string);
        self
    }

    pub fn with_notes(mut self, notes: Option<&str>) -> Self {
        self.notes = notes.map(str::to_string);
        self
    }
}

/// 流水视图（附带原料名称）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLogView {
    #[serde(flatten)]
    pub log: TransactionLog,
    pub material_name: Option<String>,
}

// ==========================================
// WasteRecord - 报废记录
// ==========================================
// 过期批次报废时的快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteRecord {
    pub waste_id: String,
    pub original_batch_id: String,
    pub batch_number: String,
    pub material_id: String,
    pub quantity: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiry_date: DateTime<Utc>,
    pub disposed_by: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub disposed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// 报废记录视图（附带原料名称与单位）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteRecordView {
    #[serde(flatten)]
    pub record: WasteRecord,
    pub material_name: Option<String>,
    pub material_unit: Option<String>,
}

/// 按原料汇总的报废统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialWasteTotal {
    pub material_id: String,
    pub name: String,
    pub total_quantity: f64,
    pub count: i64,
}

/// 报废汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteSummary {
    pub total_records: i64,
    pub by_material: Vec<MaterialWasteTotal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fills_references() {
        let now = Utc::now();
        let log = TransactionLog::new(TransactionType::BatchUsed, 2.5, now)
            .with_batch("B1", "LOT-7")
            .with_material("M1")
            .with_production_run("R1")
            .with_actor(Some("operator"))
            .with_notes(None);

        assert_eq!(log.batch_id.as_deref(), Some("B1"));
        assert_eq!(log.batch_number.as_deref(), Some("LOT-7"));
        assert_eq!(log.material_id.as_deref(), Some("M1"));
        assert_eq!(log.production_run_id.as_deref(), Some("R1"));
        assert_eq!(log.actor.as_deref(), Some("operator"));
        assert!(log.notes.is_none());
        assert!(log.archived_at.is_none());
    }

    #[test]
    fn test_serialized_timestamps_are_millis() {
        let now = DateTime::from_timestamp_millis(1_735_689_600_000).unwrap();
        let log = TransactionLog::new(TransactionType::BatchReceived, 10.0, now);
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["created_at"], serde_json::json!(1_735_689_600_000_i64));
        assert_eq!(json["log_type"], serde_json::json!("batch_received"));
        assert!(json["archived_at"].is_null());
    }
}
