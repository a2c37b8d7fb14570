// ==========================================
// 烘焙生产库存系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 / busy_timeout）
// - 建库脚本幂等执行
// - 打开库时迁移历史数据（QC 状态为空的批次）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version（与 `migrations/v0.*.sql` 对齐）
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建库脚本
const SCHEMA_SQL: &str = include_str!("../migrations/v0.1_schema.sql");

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存数据库（测试 / 演示用），已建表
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 执行建库脚本并迁移历史数据
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let migrated = migrate_legacy_qc_status(conn)?;
    if migrated > 0 {
        tracing::info!(migrated, "历史批次 QC 状态为空，已迁移为 release");
    }

    match read_schema_version(conn)? {
        Some(v) if v < CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                db_version = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema 版本低于当前代码期望版本"
            );
        }
        _ => {}
    }

    Ok(())
}

/// 把 QC 状态为空的历史批次改写为 release
///
/// 历史批次没有 QC 状态时视为可用；加载阶段一次性落库，
/// 之后的 FEFO 热路径只需判断 `qc_status = 'release'`。
///
/// # 返回
/// - 被更新的批次数
pub fn migrate_legacy_qc_status(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE batch SET qc_status = 'release' WHERE qc_status IS NULL",
        [],
    )
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_legacy_null_qc_status_is_migrated() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO raw_material (material_id, name, sku, unit, min_stock)
            VALUES ('M1', 'Tepung', 'RM-001', 'kg', 0);
            INSERT INTO batch (batch_id, material_id, batch_number, quantity, expiry_date, received_date, qc_status)
            VALUES ('B1', 'M1', 'L1', 5, 0, 0, NULL),
                   ('B2', 'M1', 'L2', 5, 0, 0, 'hold');
            "#,
        )
        .unwrap();

        assert_eq!(migrate_legacy_qc_status(&conn).unwrap(), 1);

        let status: String = conn
            .query_row("SELECT qc_status FROM batch WHERE batch_id = 'B1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "release");

        let untouched: String = conn
            .query_row("SELECT qc_status FROM batch WHERE batch_id = 'B2'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(untouched, "hold");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_in_memory().unwrap();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
    }
}
