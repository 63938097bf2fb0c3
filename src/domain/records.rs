// ==========================================
// 保单数据批量导入 - 记录领域模型
// ==========================================
// 职责: 客户 / 保单 / 缴费 / 收据 四类实体
// 用途: 导入层写入, 仓储层落库
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Customer - 客户
// ==========================================
// 唯一键: id_number（证件号）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,                       // 内部 ID (UUID)
    pub first_name: String,               // 名（默认 Unknown）
    pub middle_name: Option<String>,      // 中间名
    pub last_name: String,                // 姓（默认 Unknown）
    pub id_number: Option<String>,        // 证件号（唯一键候选）
    pub email: Option<String>,            // 邮箱（自然键）
    pub phone: Option<String>,            // 电话
    pub address: Option<String>,          // 地址
    pub date_of_birth: Option<NaiveDate>, // 出生日期
    pub created_at: DateTime<Utc>,
}

// ==========================================
// Policy - 保单
// ==========================================
// 红线: policy_number 默认不唯一（历史数据存在合法重复）
// 红线: outstanding_balance = max(total_premium_due - amount_paid, 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    pub policy_number: Option<String>,   // 保单号（人读键）
    pub customer_id: String,             // 主客户（FK）
    pub co_customer_ids: Vec<String>,    // 共同客户（FK 列表）
    pub policy_type: Option<String>,     // 险种
    pub insurer: Option<String>,         // 承保公司
    pub start_date: Option<NaiveDate>,   // 起保日
    pub end_date: Option<NaiveDate>,     // 终保日
    pub auto_renew: bool,                // 自动续保
    pub total_premium_due: f64,          // 应缴保费
    pub amount_paid: f64,                // 已缴金额（聚合字段）
    pub outstanding_balance: f64,        // 未缴余额（聚合字段）
    pub status: String,                  // 状态（默认 Active）
    pub created_at: DateTime<Utc>,
}

// ==========================================
// Payment - 缴费
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub policy_id: String,                     // 关联保单（FK）
    pub amount: f64,                           // 缴费金额
    pub refund_amount: f64,                    // 退费金额（并入已缴）
    pub payment_method: String,                // 缴费方式（默认 Cash）
    pub payment_date: NaiveDate,               // 缴费日期（默认当天）
    pub receipt_number: Option<String>,        // 收据号（唯一键候选）
    pub transaction_reference: Option<String>, // 交易流水号
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// Receipt - 收据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: String,
    pub receipt_number: String,        // 收据号（唯一键候选）
    pub payment_id: Option<String>,    // 关联缴费（FK，可选）
    pub policy_id: String,             // 关联保单（FK）
    pub customer_id: String,           // 关联客户（缺省继承保单主客户）
    pub amount: f64,                   // 金额（缺省继承缴费金额）
    pub status: String,                // 状态（默认 Issued）
    pub location: String,              // 开具地点（由保单号前缀推断）
    pub generated_at: DateTime<Utc>,   // 开具时间（默认 now）
    pub created_at: DateTime<Utc>,
}

// ==========================================
// PolicyBalance - 保单聚合字段快照
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBalance {
    pub total_premium_due: f64,
    pub amount_paid: f64,
    pub outstanding_balance: f64,
}

impl Policy {
    pub fn balance(&self) -> PolicyBalance {
        PolicyBalance {
            total_premium_due: self.total_premium_due,
            amount_paid: self.amount_paid,
            outstanding_balance: self.outstanding_balance,
        }
    }
}
