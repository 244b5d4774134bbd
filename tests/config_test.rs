// ==========================================
// 配置管理测试
// ==========================================
// 测试范围:
// 1. config_kv 读写与 UPSERT
// 2. 档期默认容量: 配置生效 / 缺失回落 / 非法回落
// ==========================================


use bakeshop_ops::config::{ConfigManager, DEFAULT_SLOT_CAPACITY, KEY_DEFAULT_SLOT_CAPACITY};

/// 测试: 配置值写入与覆写
#[test]
fn test_config_value_roundtrip() {
    let (_temp_file, db_path) = test_helpers::create_test_db().expect("创建测试数据库失败");
    let config = ConfigManager::new(&db_path).expect("初始化配置管理器失败");

    assert!(config
        .get_config_value("no.such.key")
        .expect("读取失败")
        .is_none());

    config
        .set_config_value(KEY_DEFAULT_SLOT_CAPACITY, "24")
        .expect("写入失败");
    assert_eq!(
        config
            .get_config_value(KEY_DEFAULT_SLOT_CAPACITY)
            .expect("读取失败")
            .as_deref(),
        Some("24")
    );

    // UPSERT 覆写
    config
        .set_config_value(KEY_DEFAULT_SLOT_CAPACITY, "16")
        .expect("覆写失败");
    assert_eq!(config.default_slot_capacity(), 16);
}

/// 测试: 配置缺失/非法时回落内置默认值
#[test]
fn test_default_slot_capacity_fallback() {
    let (_temp_file, db_path) = test_helpers::create_test_db().expect("创建测试数据库失败");
    let config = ConfigManager::new(&db_path).expect("初始化配置管理器失败");

    // 缺失
    assert_eq!(config.default_slot_capacity(), DEFAULT_SLOT_CAPACITY);

    // 非法
    config
        .set_config_value(KEY_DEFAULT_SLOT_CAPACITY, "not-a-number")
        .expect("写入失败");
    assert_eq!(config.default_slot_capacity(), DEFAULT_SLOT_CAPACITY);
}

/// 测试: 未指定容量的档期使用配置默认值
#[test]
fn test_create_slot_uses_configured_default() {
    let (_temp_file, app) = test_helpers::create_test_app();

    // 通过独立连接写入配置 (与应用共享同一数据库文件)
    let config = ConfigManager::new(&app.db_path).expect("初始化配置管理器失败");
    config
        .set_config_value(KEY_DEFAULT_SLOT_CAPACITY, "24")
        .expect("写入失败");

    let slot = app
        .slot_api
        .create_slot(test_helpers::test_date(), None, None, "店长")
        .expect("创建档期失败");
    assert_eq!(slot.total_capacity, 24);

    // 显式容量优先于配置
    let slot = app
        .slot_api
        .create_slot(test_helpers::test_date(), None, Some(6), "店长")
        .expect("创建档期失败");
    assert_eq!(slot.total_capacity, 6);
}
