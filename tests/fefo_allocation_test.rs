// ==========================================
// FEFO 扣减集成测试
// ==========================================
// 职责: 验证原料 / 成品 FEFO 扣减在真实数据库上的行为
// 覆盖: 先到期先出 / 全有或全无 / QC 准入 / 归零删除 / 数量守恒
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

use bakery_inventory::domain::types::{QcStatus, TransactionType};
use bakery_inventory::repository::RepositoryError;
use test_helpers::{assert_qty, base_time, days, TestEnv};

// ==========================================
// 先到期先出
// ==========================================

#[test]
fn test_request_spanning_two_lots_takes_earliest_first() {
    let env = TestEnv::new();
    let flour = env.material("面粉", 0.0);
    let lot1 = env.released(&flour.material_id, "L1", 10.0, 1);
    let lot2 = env.released(&flour.material_id, "L2", 5.0, 3);

    let allocations = env
        .inventory
        .reserve_stock(&flour.material_id, 12.0, Some("tester"), None, base_time())
        .unwrap();

    assert_eq!(allocations.len(), 2);
    assert_eq!(allocations[0].lot_id, lot1.batch_id);
    assert_qty(allocations[0].quantity, 10.0);
    assert_qty(allocations[0].remaining, 0.0);
    assert_eq!(allocations[1].lot_id, lot2.batch_id);
    assert_qty(allocations[1].quantity, 2.0);
    assert_qty(allocations[1].remaining, 3.0);

    // lot1 归零后删除，只剩 lot2
    assert!(env.batch_repo.find_by_id(&lot1.batch_id).unwrap().is_none());
    let remaining = env.batch_repo.find_by_id(&lot2.batch_id).unwrap().unwrap();
    assert_qty(remaining.quantity, 3.0);
}

#[test]
fn test_later_expiry_untouched_until_earlier_exhausted() {
    let env = TestEnv::new();
    let sugar = env.material("白砂糖", 0.0);
    // 入库顺序与到期顺序相反
    let late = env.released(&sugar.material_id, "LATE", 20.0, 30);
    let early = env.released(&sugar.material_id, "EARLY", 8.0, 2);

    env.inventory
        .reserve_stock(&sugar.material_id, 5.0, None, None, base_time())
        .unwrap();

    let early_after = env.batch_repo.find_by_id(&early.batch_id).unwrap().unwrap();
    let late_after = env.batch_repo.find_by_id(&late.batch_id).unwrap().unwrap();
    assert_qty(early_after.quantity, 3.0);
    assert_qty(late_after.quantity, 20.0);
}

#[test]
fn test_same_expiry_falls_back_to_received_date() {
    let env = TestEnv::new();
    let butter = env.material("黄油", 0.0);
    let expiry = base_time() + days(10);

    let newer = env.batch(
        &butter.material_id,
        "NEW",
        4.0,
        expiry,
        base_time() - days(1),
        QcStatus::Release,
    );
    let older = env.batch(
        &butter.material_id,
        "OLD",
        4.0,
        expiry,
        base_time() - days(5),
        QcStatus::Release,
    );

    let allocations = env
        .inventory
        .reserve_stock(&butter.material_id, 4.0, None, None, base_time())
        .unwrap();

    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].lot_id, older.batch_id);
    assert!(env.batch_repo.find_by_id(&newer.batch_id).unwrap().is_some());
}

// ==========================================
// 全有或全无
// ==========================================

#[test]
fn test_insufficient_stock_leaves_lots_and_ledger_unchanged() {
    let env = TestEnv::new();
    let flour = env.material("面粉", 0.0);
    env.released(&flour.material_id, "L1", 10.0, 1);
    env.released(&flour.material_id, "L2", 5.0, 3);
    let logs_before = env.log_count();

    let err = env
        .inventory
        .reserve_stock(&flour.material_id, 20.0, None, None, base_time())
        .unwrap_err();

    match err {
        RepositoryError::InsufficientStock {
            item,
            available,
            required,
        } => {
            assert_eq!(item, "面粉");
            assert_qty(available, 15.0);
            assert_qty(required, 20.0);
        }
        other => panic!("预期 InsufficientStock，实际: {:?}", other),
    }

    assert_eq!(env.quantities(&flour.material_id), vec![10.0, 5.0]);
    assert_eq!(env.log_count(), logs_before);
}

#[test]
fn test_invalid_quantity_rejected_before_any_write() {
    let env = TestEnv::new();
    let flour = env.material("面粉", 0.0);
    env.released(&flour.material_id, "L1", 10.0, 1);

    for qty in [0.0, -1.0, f64::NAN] {
        let err = env
            .inventory
            .reserve_stock(&flour.material_id, qty, None, None, base_time())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { .. }));
    }
    assert_eq!(env.quantities(&flour.material_id), vec![10.0]);
}

// ==========================================
// QC 准入
// ==========================================

#[test]
fn test_hold_lot_skipped_even_with_earliest_expiry() {
    let env = TestEnv::new();
    let flour = env.material("面粉", 0.0);
    let lot1 = env.batch(
        &flour.material_id,
        "L1",
        10.0,
        base_time() + days(1),
        base_time() - days(1),
        QcStatus::Hold,
    );
    let lot2 = env.released(&flour.material_id, "L2", 5.0, 3);

    let allocations = env
        .inventory
        .reserve_stock(&flour.material_id, 3.0, None, None, base_time())
        .unwrap();

    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].lot_id, lot2.batch_id);
    assert_qty(allocations[0].quantity, 3.0);
    assert_qty(env.batch_repo.find_by_id(&lot1.batch_id).unwrap().unwrap().quantity, 10.0);
}

#[test]
fn test_non_released_and_past_expiry_lots_never_selected() {
    let env = TestEnv::new();
    let egg = env.material("鸡蛋", 0.0);
    for (no, status) in [
        ("P", QcStatus::Pending),
        ("H", QcStatus::Hold),
        ("R", QcStatus::Reject),
        ("E", QcStatus::Expired),
    ] {
        env.batch(
            &egg.material_id,
            no,
            100.0,
            base_time() + days(1),
            base_time() - days(2),
            status,
        );
    }
    // 放行但已过期
    env.batch(
        &egg.material_id,
        "OLD",
        100.0,
        base_time() - days(1),
        base_time() - days(20),
        QcStatus::Release,
    );
    let good = env.released(&egg.material_id, "GOOD", 6.0, 5);

    let err = env
        .inventory
        .reserve_stock(&egg.material_id, 7.0, None, None, base_time())
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::InsufficientStock { available, .. } if (available - 6.0).abs() < 1e-9
    ));

    let allocations = env
        .inventory
        .reserve_stock(&egg.material_id, 6.0, None, None, base_time())
        .unwrap();
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].lot_id, good.batch_id);
}

// ==========================================
// 数量守恒 / 归零删除 / 流水
// ==========================================

#[test]
fn test_conservation_and_usage_logs() {
    let env = TestEnv::new();
    let flour = env.material("面粉", 0.0);
    env.released(&flour.material_id, "L1", 2.5, 1);
    env.released(&flour.material_id, "L2", 3.5, 2);
    env.released(&flour.material_id, "L3", 4.0, 3);

    let before: f64 = env.quantities(&flour.material_id).iter().sum();
    let allocations = env
        .inventory
        .reserve_stock(&flour.material_id, 7.3, Some("baker"), Some("试做"), base_time())
        .unwrap();
    let after: f64 = env.quantities(&flour.material_id).iter().sum();

    let taken: f64 = allocations.iter().map(|a| a.quantity).sum();
    assert_qty(taken, 7.3);
    assert_qty(before - after, 7.3);

    // 每个被扣减批次一条 batch_used 流水
    let used = env.log_repo.find_by_type(TransactionType::BatchUsed).unwrap();
    assert_eq!(used.len(), allocations.len());
    assert!(used.iter().all(|v| v.log.actor.as_deref() == Some("baker")));
    let logged: f64 = used.iter().map(|v| v.log.quantity).sum();
    assert_qty(logged, 7.3);
}

#[test]
fn test_exhausted_lot_never_listed_with_zero_quantity() {
    let env = TestEnv::new();
    let yeast = env.material("酵母", 0.0);
    env.released(&yeast.material_id, "L1", 0.3, 1);
    env.released(&yeast.material_id, "L2", 0.3, 2);

    // 浮点累加残差不应留下零数量批次
    env.inventory
        .reserve_stock(&yeast.material_id, 0.1 + 0.2, None, None, base_time())
        .unwrap();

    let views = env.batch_repo.list_views_by_material(&yeast.material_id, base_time()).unwrap();
    assert_eq!(views.len(), 1);
    assert!(views.iter().all(|v| v.batch.quantity > 0.0));
}

// ==========================================
// 成品 FEFO
// ==========================================

#[test]
fn test_product_stock_deducted_fefo_without_qc() {
    let env = TestEnv::new();
    let flour = env.material("面粉", 0.0);
    env.released(&flour.material_id, "L1", 100.0, 30);
    let bread = env.product("吐司", Some(3));
    let bom = env.bom(&bread.product_id, &[(&flour.material_id, 0.5)]);

    let run1 = env.planned_run(&bom.bom_id, 10.0);
    let run2 = env.planned_run(&bom.bom_id, 10.0);
    let exec = bakery_inventory::engine::ExecuteRequest {
        produced_quantity: 10.0,
        rejected_quantity: 0.0,
        notes: None,
        actor: None,
    };
    let first = env.orchestrator.execute(&run1, &exec, base_time()).unwrap();
    let second = env
        .orchestrator
        .execute(&run2, &exec, base_time() + days(1))
        .unwrap();

    let allocations = env.inventory.deduct_product_stock(&bread.product_id, 12.0).unwrap();
    assert_eq!(Some(allocations[0].lot_id.as_str()), first.stock_id.as_deref());
    assert_qty(allocations[0].quantity, 10.0);
    assert_eq!(Some(allocations[1].lot_id.as_str()), second.stock_id.as_deref());
    assert_qty(allocations[1].remaining, 8.0);

    let stock = env.product_stock_repo.find_by_product(&bread.product_id).unwrap();
    assert_eq!(stock.len(), 1);

    let err = env.inventory.deduct_product_stock(&bread.product_id, 9.0).unwrap_err();
    assert!(matches!(err, RepositoryError::InsufficientStock { .. }));
}
