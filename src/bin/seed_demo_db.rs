use chrono::{Duration, Local, Utc};
use std::error::Error;
use std::fs;
use std::path::Path;

use bakery_inventory::api::{map_api_error, ApiError, NewFinishedProduct, NewRawMaterial};
use bakery_inventory::app::{get_default_db_path, AppState};
use bakery_inventory::QcStatus;

// (名称, SKU, 单位, 最低库存, 单价)
const MATERIALS: &[(&str, &str, &str, f64, f64)] = &[
    ("高筋面粉", "RM-FLOUR-01", "kg", 50.0, 6.5),
    ("黄油", "RM-BUTTER-01", "kg", 10.0, 48.0),
    ("白砂糖", "RM-SUGAR-01", "kg", 20.0, 7.2),
    ("鸡蛋", "RM-EGG-01", "pcs", 120.0, 0.9),
    ("干酵母", "RM-YEAST-01", "kg", 2.0, 55.0),
];

fn api(e: ApiError) -> Box<dyn Error> {
    map_api_error(&e).into()
}

fn main() -> Result<(), Box<dyn Error>> {
    bakery_inventory::logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);

    backup_and_reset_db(&db_path)?;

    let state = AppState::new(db_path.clone())?;
    seed_demo(&state)?;
    print_quick_counts(&state)?;

    eprintln!("Seeded demo database at {}", db_path);
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

fn seed_demo(state: &AppState) -> Result<(), Box<dyn Error>> {
    let catalog = &state.catalog_api;
    let inventory = &state.inventory_api;
    let now = Utc::now();

    let supplier = catalog
        .create_supplier("城南面粉厂", "021-5555-0101")
        .map_err(api)?;

    let mut material_ids = Vec::with_capacity(MATERIALS.len());
    for (name, sku, unit, min_stock, price) in MATERIALS {
        let m = catalog
            .create_raw_material(NewRawMaterial {
                name: name.to_string(),
                sku: sku.to_string(),
                unit: unit.to_string(),
                min_stock: *min_stock,
                price: Some(*price),
            })
            .map_err(api)?;
        material_ids.push(m.material_id);
    }

    // 每种原料三个批次: 临期已放行 / 远期已放行 / 待检
    for (idx, material_id) in material_ids.iter().enumerate() {
        let plans = [
            (format!("L{:02}-A", idx), 40.0, 3, Some(QcStatus::Release)),
            (format!("L{:02}-B", idx), 60.0, 30, Some(QcStatus::Release)),
            (format!("L{:02}-C", idx), 25.0, 45, None),
        ];
        for (batch_number, qty, days, qc) in plans {
            let batch = inventory
                .receive_stock(
                    material_id,
                    Some(&supplier.supplier_id),
                    &batch_number,
                    qty,
                    now + Duration::days(days),
                    Some("seed"),
                )
                .map_err(api)?;
            if let Some(status) = qc {
                inventory.set_qc_status(&batch.batch_id, status).map_err(api)?;
            }
        }
    }

    let bread = catalog
        .create_finished_product(NewFinishedProduct {
            name: "全麦吐司".to_string(),
            sku: "FP-TOAST-01".to_string(),
            unit: "pcs".to_string(),
            min_stock: 30.0,
            price: Some(18.0),
            shelf_life_days: Some(3),
        })
        .map_err(api)?;

    let items = vec![
        (material_ids[0].clone(), 0.5),
        (material_ids[1].clone(), 0.05),
        (material_ids[2].clone(), 0.04),
        (material_ids[4].clone(), 0.01),
    ];
    let (bom, _) = catalog
        .create_bom(&bread.product_id, "全麦吐司标准配方", Some("每条 500g"), &items)
        .map_err(api)?;

    // 一张已完成 + 一张计划中的生产单
    let production = &state.production_api;
    let done = production
        .plan(&bom.bom_id, 40.0, now - Duration::hours(4), Some("早班"))
        .map_err(api)?;
    production
        .execute(&done.run_id, 38.0, 2.0, Some("两条塌陷"), Some("seed"))
        .map_err(api)?;
    production
        .plan(&bom.bom_id, 60.0, now + Duration::days(1), Some("明日早班"))
        .map_err(api)?;

    Ok(())
}

fn print_quick_counts(state: &AppState) -> Result<(), Box<dyn Error>> {
    let conn = state
        .conn
        .lock()
        .map_err(|e| format!("锁获取失败: {}", e))?;
    let tables = [
        "supplier",
        "raw_material",
        "finished_product",
        "bom",
        "bom_item",
        "batch",
        "production_run",
        "product_stock",
        "transaction_log",
        "waste_record",
    ];

    eprintln!("Row counts:");
    for t in tables {
        let sql = format!("SELECT COUNT(*) FROM {}", t);
        let c: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        eprintln!("  {:<20} {}", t, c);
    }
    Ok(())
}
