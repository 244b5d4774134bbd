// ==========================================
// 全业务流 E2E 测试
// ==========================================
// 场景: 开档期 → 下单 → 确认 → 草稿备产 → 纳入/加产 → 终结
//       → 取货/散卖/报损 → 拆分 → 全程容量与审计校验
// ==========================================


use std::collections::HashMap;

use rust_decimal::Decimal;
use test_helpers::{committed_count, create_slot, create_test_app, line, place_order, test_date};

#[test]
fn test_full_business_flow() {
    let (_temp_file, app) = create_test_app();

    // ===== 1. 开档期 =====
    let slot_id = create_slot(&app, 12);
    assert_eq!(
        app.slot_api
            .get_slot_open_capacity(&slot_id)
            .expect("查询余量失败"),
        12
    );

    // ===== 2. 接单 =====
    let order_a = place_order(
        &app,
        &slot_id,
        "张三",
        vec![line("F-CHOC", "巧克力", 4), line("F-MATCHA", "抹茶", 2)],
    );
    let order_b = place_order(&app, &slot_id, "李四", vec![line("F-CHOC", "巧克力", 3)]);
    let order_c = place_order(&app, &slot_id, "王五", vec![line("F-CHEESE", "芝士", 2)]);
    assert_eq!(committed_count(&app, &slot_id), 11);
    assert_eq!(
        app.slot_api
            .get_slot_open_capacity(&slot_id)
            .expect("查询余量失败"),
        1
    );

    // 确认两单,一单客户临时取消
    app.order_api
        .update_order_status(&order_a, "CONFIRMED", "店长")
        .expect("确认失败");
    app.order_api
        .update_order_status(&order_b, "CONFIRMED", "店长")
        .expect("确认失败");
    app.order_api
        .update_order_status(&order_c, "CANCELED", "店长")
        .expect("取消失败");
    assert_eq!(committed_count(&app, &slot_id), 9);

    // ===== 3. 备产草稿 =====
    let batch = app
        .batch_api
        .create_draft_batch(test_date(), "烘焙师")
        .expect("创建草稿失败");

    let available = app
        .batch_api
        .list_available_orders_for_date(test_date())
        .expect("查询候选失败");
    assert_eq!(available.len(), 2, "已取消订单不在候选中");

    for order_id in [&order_a, &order_b] {
        app.batch_api
            .assign_order_to_batch(&batch.batch_id, order_id, "烘焙师")
            .expect("纳入失败");
    }
    // 当日加产 3 个散卖
    app.batch_api
        .add_extra_to_batch(&batch.batch_id, "F-CHOC", "巧克力", 3, "烘焙师")
        .expect("加产失败");

    let detail = app
        .batch_api
        .get_batch_detail(&batch.batch_id)
        .expect("查询失败")
        .expect("备产单不存在");
    // 订单A两口味 + 订单B一口味 + 加产一条
    assert_eq!(detail.items.len(), 4);

    // 纳入只改状态,容量不变
    assert_eq!(committed_count(&app, &slot_id), 9);

    // ===== 4. 终结 (抹茶实产只有 1 个) =====
    let matcha_item = detail
        .items
        .iter()
        .find(|i| i.flavor_id == "F-MATCHA")
        .expect("缺少抹茶明细");
    let mut overrides = HashMap::new();
    overrides.insert(matcha_item.item_id.clone(), 1i64);

    let outcome = app
        .batch_api
        .finalize_batch(&batch.batch_id, &overrides, "烘焙师")
        .expect("终结失败");
    assert_eq!(outcome.records.len(), 4);
    assert_eq!(outcome.order_transitions.len(), 2);

    let total_produced: i64 = outcome.records.iter().map(|r| r.quantity).sum();
    assert_eq!(total_produced, 4 + 1 + 3 + 3);

    // 订单全部置 PRODUCED,容量中性
    for order_id in [&order_a, &order_b] {
        let order = app
            .order_api
            .get_order_detail(order_id)
            .expect("查询失败")
            .expect("订单不存在");
        assert_eq!(order.status.to_db_str(), "PRODUCED");
    }
    assert_eq!(committed_count(&app, &slot_id), 9);

    // ===== 5. 履约与散卖 =====
    app.order_api
        .bulk_update_order_status(
            &[order_a.clone(), order_b.clone()],
            "PICKED_UP",
            "店长",
        )
        .expect("批量取货失败");

    // 订单项记录随取货改判
    for record in outcome.records.iter().filter(|r| r.order_id.is_some()) {
        app.production_api
            .update_production_disposition(&record.record_id, "PICKED_UP", None, "店长")
            .expect("改判失败");
    }

    // 加产 3 个: 2 个卖出,1 个报损 (先拆再改判)
    let extra_record = outcome
        .records
        .iter()
        .find(|r| r.order_id.is_none())
        .expect("缺少加产记录");
    let (parent, _sibling) = app
        .production_api
        .split_production_record(&extra_record.record_id, 1, "WASTED", "店长")
        .expect("拆分失败");
    app.production_api
        .update_production_disposition(&parent.record_id, "SOLD", Some(Decimal::new(2800, 2)), "店长")
        .expect("改判失败");

    // 同族守恒
    let records = app
        .production_api
        .list_records_by_batch(&batch.batch_id)
        .expect("查询失败");
    assert_eq!(records.len(), 5);
    let extra_total: i64 = records
        .iter()
        .filter(|r| r.order_id.is_none())
        .map(|r| r.quantity)
        .sum();
    assert_eq!(extra_total, 3);

    let sold = records
        .iter()
        .find(|r| r.disposition.to_db_str() == "SOLD")
        .expect("缺少散卖记录");
    assert_eq!(sold.realized_revenue(), Decimal::new(5600, 2)); // 2 x 28.00

    // ===== 6. 期末校验 =====
    // 容量不变量全程成立
    let audits = app.slot_api.audit_capacity().expect("巡检失败");
    assert!(audits.iter().all(|a| !a.is_drifted()));

    // 审计日志覆盖全流程关键动作
    let actions = app
        .audit_api
        .list_recent_actions(100)
        .expect("查询日志失败");
    let types: Vec<&str> = actions.iter().map(|a| a.action_type.as_str()).collect();
    for expected in [
        "CreateSlot",
        "CreateOrder",
        "UpdateOrderStatus",
        "BulkUpdateOrderStatus",
        "CreateDraftBatch",
        "AssignOrder",
        "AddExtra",
        "FinalizeBatch",
        "UpdateDisposition",
        "SplitRecord",
    ] {
        assert!(types.contains(&expected), "缺少审计动作: {}", expected);
    }
}
