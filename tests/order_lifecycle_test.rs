// ==========================================
// 订单生命周期测试
// ==========================================
// 测试范围:
// 1. 状态转换与容量台账同事务联动 (取消/撤销取消/中性转换)
// 2. SCHEDULED/PRODUCED 外部写入拒绝
// 3. 批量更新逐单适用规则、全成全败
// 4. 明细解析失败的"按 1 个计"降级
// 5. 核心不变量: committed_count == 计入状态订单数量总和
// ==========================================


use bakeshop_ops::api::ApiError;
use test_helpers::{committed_count, create_slot, create_test_app, line, place_order};

/// 测试: 容量 10 的档期,取消 4 个的订单 → 6,撤销取消 → 10
#[test]
fn test_cancel_and_reinstate_capacity() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 12);

    let order_a = place_order(&app, &slot_id, "张三", vec![line("F1", "巧克力", 4)]);
    let _order_b = place_order(&app, &slot_id, "李四", vec![line("F2", "抹茶", 6)]);
    assert_eq!(committed_count(&app, &slot_id), 10);

    // 取消 4 个的订单
    let outcome = app
        .order_api
        .update_order_status(&order_a, "CANCELED", "店长")
        .expect("取消失败");
    assert_eq!(outcome.capacity_delta, -4);
    assert_eq!(committed_count(&app, &slot_id), 6);

    // 撤销取消 (回到已确认)
    let outcome = app
        .order_api
        .update_order_status(&order_a, "CONFIRMED", "店长")
        .expect("撤销取消失败");
    assert_eq!(outcome.capacity_delta, 4);
    assert_eq!(committed_count(&app, &slot_id), 10);

    // 再取消一次: 反复取消-撤销后不变量仍成立
    app.order_api
        .update_order_status(&order_a, "CANCELED", "店长")
        .expect("再次取消失败");
    assert_eq!(committed_count(&app, &slot_id), 6);

    let audits = app.slot_api.audit_capacity().expect("巡检失败");
    assert!(audits.iter().all(|a| !a.is_drifted()));
}

/// 测试: 两个计入状态之间转换不触发台账
#[test]
fn test_neutral_transition_keeps_capacity() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 10);

    let order_id = place_order(&app, &slot_id, "张三", vec![line("F1", "原味", 3)]);
    assert_eq!(committed_count(&app, &slot_id), 3);

    let outcome = app
        .order_api
        .update_order_status(&order_id, "CONFIRMED", "店长")
        .expect("确认失败");
    assert_eq!(outcome.capacity_delta, 0);
    assert_eq!(committed_count(&app, &slot_id), 3);
}

/// 测试: SCHEDULED/PRODUCED 由备产流程维护,外部写入拒绝
#[test]
fn test_workflow_owned_statuses_rejected_externally() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 10);
    let order_id = place_order(&app, &slot_id, "张三", vec![line("F1", "原味", 2)]);

    for target in ["SCHEDULED", "PRODUCED"] {
        let err = app
            .order_api
            .update_order_status(&order_id, target, "店长")
            .unwrap_err();
        assert!(
            matches!(err, ApiError::BusinessRuleViolation(_)),
            "外部写入{}应被拒绝",
            target
        );
    }

    // 拒绝后无任何变更
    assert_eq!(committed_count(&app, &slot_id), 2);
    let order = app
        .order_api
        .get_order_detail(&order_id)
        .expect("查询失败")
        .expect("订单不存在");
    assert_eq!(order.status.to_db_str(), "SUBMITTED");
}

/// 测试: NO_SHOW 仅允许从出炉前状态进入
#[test]
fn test_no_show_guard() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 10);
    let order_id = place_order(&app, &slot_id, "张三", vec![line("F1", "原味", 2)]);

    // 推进到 READY (出炉后阶段)
    app.order_api
        .update_order_status(&order_id, "READY", "店长")
        .expect("置 READY 失败");

    let err = app
        .order_api
        .update_order_status(&order_id, "NO_SHOW", "店长")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));

    // 出炉前阶段允许,且释放容量
    let order2 = place_order(&app, &slot_id, "李四", vec![line("F1", "原味", 3)]);
    let outcome = app
        .order_api
        .update_order_status(&order2, "NO_SHOW", "店长")
        .expect("置 NO_SHOW 失败");
    assert_eq!(outcome.capacity_delta, -3);
}

/// 测试: 非法状态字符串立即拒绝,零变更
#[test]
fn test_invalid_status_string_rejected() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 10);
    let order_id = place_order(&app, &slot_id, "张三", vec![line("F1", "原味", 2)]);

    let err = app
        .order_api
        .update_order_status(&order_id, "VANISHED", "店长")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert_eq!(committed_count(&app, &slot_id), 2);
}

/// 测试: 批量取消 5 单,其中 2 单已取消,只为新取消的 3 单减容量
#[test]
fn test_bulk_cancel_only_newly_canceled_decrement() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 20);

    let mut order_ids = Vec::new();
    for i in 0..5 {
        order_ids.push(place_order(
            &app,
            &slot_id,
            &format!("客户{}", i),
            vec![line("F1", "原味", 1)],
        ));
    }
    assert_eq!(committed_count(&app, &slot_id), 5);

    // 先单独取消 2 单
    for order_id in &order_ids[..2] {
        app.order_api
            .update_order_status(order_id, "CANCELED", "店长")
            .expect("预取消失败");
    }
    assert_eq!(committed_count(&app, &slot_id), 3);

    // 批量取消全部 5 单: 已取消的 2 单容量增量为 0
    let outcomes = app
        .order_api
        .bulk_update_order_status(&order_ids, "CANCELED", "店长")
        .expect("批量取消失败");

    let total_delta: i64 = outcomes.iter().map(|o| o.capacity_delta).sum();
    assert_eq!(total_delta, -3);
    assert_eq!(committed_count(&app, &slot_id), 0);
}

/// 测试: 批量更新全成全败,失败时无任何变更
#[test]
fn test_bulk_update_is_atomic() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 10);

    let order_a = place_order(&app, &slot_id, "张三", vec![line("F1", "原味", 2)]);
    let order_b = place_order(&app, &slot_id, "李四", vec![line("F1", "原味", 3)]);

    let ids = vec![
        order_a.clone(),
        "no-such-order".to_string(),
        order_b.clone(),
    ];
    let err = app
        .order_api
        .bulk_update_order_status(&ids, "CANCELED", "店长")
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // 整体回滚: 状态与容量均未变
    assert_eq!(committed_count(&app, &slot_id), 5);
    for order_id in [&order_a, &order_b] {
        let order = app
            .order_api
            .get_order_detail(order_id)
            .expect("查询失败")
            .expect("订单不存在");
        assert_eq!(order.status.to_db_str(), "SUBMITTED");
    }
}

/// 测试: 明细解析失败时按 1 个计 (降级,不阻断转换)
#[test]
fn test_unparseable_lines_fallback_to_one_unit() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 10);

    // 绕过 API 直接插入一条明细损坏的历史订单 (计入状态,但未入台账)
    let conn = test_helpers::open_test_connection(&app.db_path).expect("打开数据库失败");
    conn.execute(
        r#"INSERT INTO customer_order (
            order_id, slot_id, customer_name, status, lines_json,
            created_at, updated_at
        ) VALUES ('legacy-1', ?1, '历史客户', 'CONFIRMED', '{broken',
                  '2026-01-01 08:00:00', '2026-01-01 08:00:00')"#,
        rusqlite::params![slot_id],
    )
    .expect("插入历史订单失败");

    // 重建容量: 损坏明细按 1 个计
    let audit = app
        .slot_api
        .rebuild_capacity(&slot_id, "店长")
        .expect("重建失败");
    assert_eq!(audit.expected, 1);
    assert_eq!(committed_count(&app, &slot_id), 1);

    // 取消该订单: 降级数量同样为 1,计数归零而不是出负
    let outcome = app
        .order_api
        .update_order_status("legacy-1", "CANCELED", "店长")
        .expect("取消失败");
    assert_eq!(outcome.capacity_delta, -1);
    assert_eq!(committed_count(&app, &slot_id), 0);
}

/// 测试: 关闭接单的档期拒绝下单;重新开放后恢复
#[test]
fn test_closed_slot_rejects_intake() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 10);

    app.slot_api
        .set_slot_open(&slot_id, false, "店长")
        .expect("关闭档期失败");

    let err = app
        .order_api
        .create_order(
            &slot_id,
            "张三",
            None,
            vec![line("F1", "原味", 2)],
            None,
            None,
            None,
            "店长",
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::BusinessRuleViolation(_)));
    assert_eq!(committed_count(&app, &slot_id), 0);

    app.slot_api
        .set_slot_open(&slot_id, true, "店长")
        .expect("开放档期失败");
    place_order(&app, &slot_id, "张三", vec![line("F1", "原味", 2)]);
    assert_eq!(committed_count(&app, &slot_id), 2);
}

/// 测试: 转换序列后核心不变量恒成立
/// committed_count == 该档期所有计入状态订单的数量总和
#[test]
fn test_capacity_invariant_across_sequences() {
    let (_temp_file, app) = create_test_app();
    let slot_id = create_slot(&app, 30);

    let a = place_order(&app, &slot_id, "甲", vec![line("F1", "原味", 2)]);
    let b = place_order(&app, &slot_id, "乙", vec![line("F2", "抹茶", 5)]);
    let _c = place_order(&app, &slot_id, "丙", vec![line("F3", "芝士", 1)]);

    let sequence = [
        (&a, "CONFIRMED"),
        (&b, "CANCELED"),
        (&a, "CANCELED"),
        (&b, "CONFIRMED"), // 撤销取消
        (&a, "SUBMITTED"), // 撤销取消
        (&b, "READY"),
        (&b, "PICKED_UP"),
        (&a, "CANCELED"),
    ];
    for (order_id, status) in sequence {
        app.order_api
            .update_order_status(order_id, status, "店长")
            .expect("状态转换失败");

        let audit = app
            .slot_api
            .audit_capacity()
            .expect("巡检失败")
            .into_iter()
            .find(|x| x.slot_id == slot_id)
            .expect("缺少巡检结果");
        assert_eq!(
            audit.drift, 0,
            "转换到{}后容量漂移: recorded={}, expected={}",
            status, audit.recorded, audit.expected
        );
    }

    // 终态: 甲取消(2 不计), 乙已取货(5 计入), 丙仍提交(1 计入)
    assert_eq!(committed_count(&app, &slot_id), 6);
}
