// ==========================================
// 烘焙工坊产销系统 - 生产记录领域模型
// ==========================================
// 红线: 记录只增不删;拆分只做"父减子增",同族数量总和守恒
// 结构: 按ID寻址的平面集合,parent_record_id 仅作血缘追溯
// ==========================================

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::types::Disposition;

// ==========================================
// ProductionRecord - 生产记录
// ==========================================
// 来源: 备产单终结时按明细生成,或由既有记录拆分产生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub record_id: String,                // 记录ID
    pub batch_id: String,                 // 来源备产单
    pub order_id: Option<String>,         // 关联订单 (加产项为 None)
    pub parent_record_id: Option<String>, // 拆分来源记录 (原始记录为 None)
    pub flavor_id: String,                // 口味ID
    pub flavor_name: String,              // 口味名称
    pub quantity: i64,                    // 数量
    pub disposition: Disposition,         // 去向
    pub sale_price: Option<Decimal>,      // 售价 (去向为 SOLD 时记录,单价)
    pub created_at: NaiveDateTime,        // 创建时间
    pub updated_at: NaiveDateTime,        // 更新时间
    pub updated_by: Option<String>,       // 最近操作人
}

impl ProductionRecord {
    /// 已实现收入 (仅 SOLD 记录有意义,供报表侧消费)
    pub fn realized_revenue(&self) -> Decimal {
        if self.disposition != Disposition::Sold {
            return Decimal::ZERO;
        }
        let unit_price = self.sale_price.unwrap_or(Decimal::ZERO);
        unit_price * Decimal::from(self.quantity)
    }
}
