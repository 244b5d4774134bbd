// ==========================================
// 容量台账测试
// ==========================================
// 测试范围:
// 1. apply_committed_delta 减量钳制到 0
// 2. 档期缺失时增量上抛 NotFound
// 3. 超售允许 (committed > capacity),展示余量钳 0
// ==========================================


use bakeshop_ops::domain::slot::SlotCapacity;
use bakeshop_ops::engine::CapacityLedger;
use bakeshop_ops::repository::{RepositoryError, SlotRepository};

/// 测试: 减量超过当前值时 committed_count 钳制到 0
#[test]
fn test_decrement_floors_at_zero() {
    let (_temp_file, app) = test_helpers::create_test_app();
    let slot_id = test_helpers::create_slot(&app, 10);

    let conn = test_helpers::open_test_connection(&app.db_path).expect("打开数据库失败");

    // 先加 3,再减 8: 结果应为 0 而不是 -5
    CapacityLedger::apply_delta(&conn, &slot_id, 3).expect("增量失败");
    CapacityLedger::apply_delta(&conn, &slot_id, -8).expect("减量失败");

    assert_eq!(test_helpers::committed_count(&app, &slot_id), 0);
}

/// 测试: 档期不存在时上抛 NotFound (调用方致命错误,不吞掉)
#[test]
fn test_missing_slot_propagates_not_found() {
    let (_temp_file, app) = test_helpers::create_test_app();
    let conn = test_helpers::open_test_connection(&app.db_path).expect("打开数据库失败");

    let err = CapacityLedger::apply_delta(&conn, "no-such-slot", 5).unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

/// 测试: 增量为 0 时不触发写入,档期缺失也不报错
#[test]
fn test_zero_delta_is_noop() {
    let (_temp_file, app) = test_helpers::create_test_app();
    let conn = test_helpers::open_test_connection(&app.db_path).expect("打开数据库失败");

    // 容量中性转换不触发台账,不校验档期存在性
    assert!(CapacityLedger::apply_delta(&conn, "no-such-slot", 0).is_ok());
}

/// 测试: 超售允许,增量侧不截断
#[test]
fn test_overbooking_is_permitted() {
    let (_temp_file, app) = test_helpers::create_test_app();
    let slot_id = test_helpers::create_slot(&app, 10);

    let conn = test_helpers::open_test_connection(&app.db_path).expect("打开数据库失败");
    CapacityLedger::apply_delta(&conn, &slot_id, 14).expect("增量失败");

    let slot = app
        .slot_api
        .get_slot_detail(&slot_id)
        .expect("查询失败")
        .expect("档期不存在");
    assert_eq!(slot.committed_count, 14);
    assert!(slot.is_overbooked());
    assert_eq!(slot.overbooked_units(), 4);
    // 展示余量钳 0
    assert_eq!(slot.open_capacity(), 0);
}

/// 测试: 剩余可接数量接口
#[test]
fn test_get_slot_open_capacity() {
    let (_temp_file, app) = test_helpers::create_test_app();
    let slot_id = test_helpers::create_slot(&app, 10);

    test_helpers::place_order(
        &app,
        &slot_id,
        "王五",
        vec![test_helpers::line("F1", "原味", 4)],
    );

    assert_eq!(
        app.slot_api
            .get_slot_open_capacity(&slot_id)
            .expect("查询余量失败"),
        6
    );

    // 不存在的档期
    let err = app.slot_api.get_slot_open_capacity("no-such-slot").unwrap_err();
    assert!(matches!(err, bakeshop_ops::api::ApiError::NotFound(_)));
}

/// 测试: set_committed_count_tx 仅供重建使用,可直接覆写
#[test]
fn test_set_committed_count_for_rebuild() {
    let (_temp_file, app) = test_helpers::create_test_app();
    let slot_id = test_helpers::create_slot(&app, 10);

    let conn = test_helpers::open_test_connection(&app.db_path).expect("打开数据库失败");
    SlotRepository::set_committed_count_tx(&conn, &slot_id, 7).expect("覆写失败");
    assert_eq!(test_helpers::committed_count(&app, &slot_id), 7);
}
