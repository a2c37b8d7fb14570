// ==========================================
// 烘焙生产库存系统 - 命令行入口
// ==========================================
// 职责: 打开数据库并输出库存概览
// 用法: BAKERY_INVENTORY_DB_PATH=/path/to.db bakery-inventory [--expire-overdue]
// --expire-overdue: 输出概览前先把已过期批次标记为 Expired
// ==========================================

use bakery_inventory::app::{get_default_db_path, AppState};
use bakery_inventory::api::map_api_error;

fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    bakery_inventory::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", bakery_inventory::APP_NAME);
    tracing::info!("系统版本: {}", bakery_inventory::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;

    // 过期扫描会写库，仅在显式指定时执行
    if std::env::args().skip(1).any(|a| a == "--expire-overdue") {
        match state.inventory_api.expire_overdue_batches() {
            Ok(n) if n > 0 => tracing::warn!(expired = n, "发现已过期批次"),
            Ok(_) => tracing::info!("没有需要标记的过期批次"),
            Err(e) => tracing::error!("过期扫描失败: {}", map_api_error(&e)),
        }
    }

    let materials = state
        .inventory_api
        .material_stock_summary()
        .map_err(|e| anyhow::anyhow!(map_api_error(&e)))?;
    println!("原料库存:");
    for m in &materials {
        println!(
            "  {:<20} 总量 {:>10.3} {:<6} 可用 {:>10.3}{}",
            m.name,
            m.total_stock,
            m.unit,
            m.available_stock,
            if m.is_low_stock { "  [低库存]" } else { "" }
        );
    }

    let products = state
        .product_api
        .product_stock_summary()
        .map_err(|e| anyhow::anyhow!(map_api_error(&e)))?;
    println!("成品库存:");
    for p in &products {
        println!(
            "  {:<20} 总量 {:>10.3} {:<6}{}",
            p.name,
            p.total_stock,
            p.unit,
            if p.is_low_stock { "  [低库存]" } else { "" }
        );
    }

    Ok(())
}
