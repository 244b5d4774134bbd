// ==========================================
// 生产记录跟踪测试
// ==========================================
// 测试范围:
// 1. 拆分边界校验 (0/负数/等于/大于一律拒绝)
// 2. 拆分守恒: 任意拆分序列后同族数量总和等于原始数量
// 3. 去向反复改判、SOLD 售价缺省 0
// ==========================================


use std::collections::HashMap;

use bakeshop_ops::api::ApiError;
use bakeshop_ops::domain::production::ProductionRecord;
use bakeshop_ops::AppState;
use rust_decimal::Decimal;
use test_helpers::{create_test_app, test_date};

/// 终结一张含 quantity 个加产的备产单,返回 (batch_id, 原始记录)
fn finalize_single_extra(app: &AppState, quantity: i64) -> (String, ProductionRecord) {
    let batch = app
        .batch_api
        .create_draft_batch(test_date(), "店长")
        .expect("创建草稿失败");
    app.batch_api
        .add_extra_to_batch(&batch.batch_id, "F1", "原味", quantity, "店长")
        .expect("加产失败");
    let outcome = app
        .batch_api
        .finalize_batch(&batch.batch_id, &HashMap::new(), "店长")
        .expect("终结失败");
    (batch.batch_id.clone(), outcome.records[0].clone())
}

/// 测试: 拆分数量边界校验
#[test]
fn test_split_quantity_bounds() {
    let (_temp_file, app) = create_test_app();
    let (_batch_id, record) = finalize_single_extra(&app, 10);

    // <= 0 拒绝
    for bad in [0i64, -1] {
        let err = app
            .production_api
            .split_production_record(&record.record_id, bad, "WASTED", "店长")
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)), "{}应被拒绝", bad);
    }

    // >= 当前数量拒绝
    for bad in [10i64, 11] {
        let err = app
            .production_api
            .split_production_record(&record.record_id, bad, "WASTED", "店长")
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)), "{}应被拒绝", bad);
    }

    // 拒绝后数量未变
    let unchanged = app
        .production_api
        .get_record_detail(&record.record_id)
        .expect("查询失败")
        .expect("记录不存在");
    assert_eq!(unchanged.quantity, 10);
}

/// 测试: 记录不存在时拆分/改判报未找到
#[test]
fn test_split_missing_record() {
    let (_temp_file, app) = create_test_app();

    let err = app
        .production_api
        .split_production_record("no-such-record", 1, "WASTED", "店长")
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = app
        .production_api
        .update_production_disposition("no-such-record", "SOLD", None, "店长")
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

/// 测试: 10 个拆为 7 留 / 3 报损,父减子增且引用继承
#[test]
fn test_split_seven_three() {
    let (_temp_file, app) = create_test_app();
    let (batch_id, record) = finalize_single_extra(&app, 10);

    let (parent, sibling) = app
        .production_api
        .split_production_record(&record.record_id, 3, "WASTED", "店长")
        .expect("拆分失败");

    assert_eq!(parent.quantity, 7);
    assert_eq!(sibling.quantity, 3);
    assert_eq!(sibling.disposition.to_db_str(), "WASTED");
    // 同族引用继承 + 血缘指向父记录
    assert_eq!(sibling.batch_id, batch_id);
    assert_eq!(sibling.flavor_id, record.flavor_id);
    assert_eq!(sibling.order_id, record.order_id);
    assert_eq!(
        sibling.parent_record_id.as_deref(),
        Some(record.record_id.as_str())
    );
    // 父记录仍是原始记录 (无血缘)
    assert!(parent.parent_record_id.is_none());
}

/// 测试: 任意拆分序列后,同族数量总和恒等于原始数量
#[test]
fn test_split_conservation_over_sequence() {
    let (_temp_file, app) = create_test_app();
    let (batch_id, record) = finalize_single_extra(&app, 10);

    // 10 → (7, 3);7 → (4, 3);再把第一个子记录 3 → (2, 1)
    let (_, first_sibling) = app
        .production_api
        .split_production_record(&record.record_id, 3, "SOLD", "店长")
        .expect("第一次拆分失败");
    app.production_api
        .split_production_record(&record.record_id, 3, "GIFTED", "店长")
        .expect("第二次拆分失败");
    app.production_api
        .split_production_record(&first_sibling.record_id, 1, "PERSONAL", "店长")
        .expect("第三次拆分失败");

    let records = app
        .production_api
        .list_records_by_batch(&batch_id)
        .expect("查询失败");
    assert_eq!(records.len(), 4);

    let total: i64 = records.iter().map(|r| r.quantity).sum();
    assert_eq!(total, 10, "拆分后同族数量总和必须守恒");

    // 拆到 1 个后不可再拆
    let smallest = records
        .iter()
        .find(|r| r.quantity == 1)
        .expect("缺少 1 个的记录");
    let err = app
        .production_api
        .split_production_record(&smallest.record_id, 1, "WASTED", "店长")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

/// 测试: 去向反复改判允许;SOLD 售价缺省 0,改判他向清空售价
#[test]
fn test_redisposition_and_sale_price() {
    let (_temp_file, app) = create_test_app();
    let (_batch_id, record) = finalize_single_extra(&app, 5);

    // PENDING → SOLD (未给售价,按 0)
    let sold = app
        .production_api
        .update_production_disposition(&record.record_id, "SOLD", None, "店长")
        .expect("改判失败");
    assert_eq!(sold.sale_price, Some(Decimal::ZERO));
    assert_eq!(sold.realized_revenue(), Decimal::ZERO);

    // SOLD → SOLD (带售价,重复改判不报错)
    let sold = app
        .production_api
        .update_production_disposition(
            &record.record_id,
            "SOLD",
            Some(Decimal::new(1250, 2)), // 12.50
            "店长",
        )
        .expect("改判失败");
    assert_eq!(sold.sale_price, Some(Decimal::new(1250, 2)));
    assert_eq!(sold.realized_revenue(), Decimal::new(6250, 2)); // 5 x 12.50

    // SOLD → WASTED: 终态可再改判,售价清空
    let wasted = app
        .production_api
        .update_production_disposition(&record.record_id, "WASTED", None, "店长")
        .expect("改判失败");
    assert_eq!(wasted.disposition.to_db_str(), "WASTED");
    assert!(wasted.sale_price.is_none());

    // 负售价拒绝
    let err = app
        .production_api
        .update_production_disposition(
            &record.record_id,
            "SOLD",
            Some(Decimal::new(-100, 2)),
            "店长",
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    // 非法去向拒绝
    let err = app
        .production_api
        .update_production_disposition(&record.record_id, "EATEN", None, "店长")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

/// 测试: 按去向查询
#[test]
fn test_list_by_disposition() {
    let (_temp_file, app) = create_test_app();
    let (_batch_id, record) = finalize_single_extra(&app, 10);

    app.production_api
        .split_production_record(&record.record_id, 4, "SOLD", "店长")
        .expect("拆分失败");

    let pending = app
        .production_api
        .list_records_by_disposition("PENDING")
        .expect("查询失败");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].quantity, 6);

    let sold = app
        .production_api
        .list_records_by_disposition("SOLD")
        .expect("查询失败");
    assert_eq!(sold.len(), 1);
    assert_eq!(sold[0].quantity, 4);
}
