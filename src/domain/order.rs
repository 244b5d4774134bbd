// ==========================================
// 烘焙工坊产销系统 - 订单领域模型
// ==========================================
// 红线: 订单对档期容量的贡献只随状态转换变化
// 红线: 明细列表为结构化带版本类型,不再是裸 JSON 习惯用法
// ==========================================

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::types::OrderStatus;

/// 明细列表当前格式版本
pub const ORDER_LINE_FORMAT_VERSION: i32 = 1;

// ==========================================
// OrderLine - 订单明细行 (口味 + 数量)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub flavor_id: String,   // 口味ID
    pub flavor_name: String, // 口味名称 (下单时快照)
    pub quantity: i64,       // 数量 (单位: 个)
}

// ==========================================
// OrderLineList - 带版本的明细列表
// ==========================================
// 解析失败是一等可恢复情形: 调用方显式走"按 1 个计"的降级路径,
// 不允许用通用异常吞掉
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineList {
    pub version: i32,          // 格式版本
    pub lines: Vec<OrderLine>, // 明细行
}

impl OrderLineList {
    /// 构造 v1 明细列表
    pub fn new(lines: Vec<OrderLine>) -> Self {
        Self {
            version: ORDER_LINE_FORMAT_VERSION,
            lines,
        }
    }

    /// 从 JSON 字符串解析
    ///
    /// # 返回
    /// - Ok(OrderLineList): 解析成功
    /// - Err: JSON 非法或版本不被支持 (历史脏数据)
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let list: OrderLineList = serde_json::from_str(raw)?;
        Ok(list)
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> String {
        // OrderLineList 的字段均可序列化,此处不会失败
        serde_json::to_string(self).unwrap_or_else(|_| "{\"version\":1,\"lines\":[]}".to_string())
    }

    /// 明细总数量 (所有行数量之和)
    pub fn total_units(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

// ==========================================
// Order - 订单
// ==========================================
// 生命周期: 提交时创建;状态转换与备产流程可变更;
// 被已完成备产单引用后永不物理删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,            // 订单ID
    pub slot_id: String,             // 所属档期
    pub customer_name: String,       // 客户姓名
    pub contact: Option<String>,     // 联系方式
    pub status: OrderStatus,         // 状态
    pub lines_json: String,          // 明细列表 (JSON, OrderLineList)

    // ===== 财务字段 (核心逻辑不消费,仅透传) =====
    pub total_price: Option<Decimal>, // 订单总价
    pub deposit: Option<Decimal>,     // 定金

    pub note: Option<String>,        // 备注
    pub created_at: NaiveDateTime,   // 创建时间
    pub updated_at: NaiveDateTime,   // 更新时间
    pub updated_by: Option<String>,  // 最近操作人
}

impl Order {
    /// 解析明细列表
    pub fn parse_lines(&self) -> Result<OrderLineList, serde_json::Error> {
        OrderLineList::parse(&self.lines_json)
    }

    /// 订单总数量,解析失败时按 1 个计
    ///
    /// 降级策略: 历史脏数据不阻断状态转换,记 warn 后按最小占用继续
    pub fn total_units_or_fallback(&self) -> i64 {
        match self.parse_lines() {
            Ok(list) => list.total_units(),
            Err(e) => {
                tracing::warn!(
                    order_id = %self.order_id,
                    error = %e,
                    "订单明细解析失败,容量按 1 个计"
                );
                1
            }
        }
    }
}
