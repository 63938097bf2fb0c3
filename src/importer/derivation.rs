// ==========================================
// 保单数据批量导入 - 字段派生服务实现
// ==========================================
// 职责: 保单聚合字段 / 未缴余额 / 收据开具地点 / 共同客户拆分
// 约束: 纯函数，不访问数据库
// ==========================================

use crate::config::ImportSettings;
use crate::domain::records::PolicyBalance;
use crate::importer::bulk_importer_trait::DerivationService as DerivationServiceTrait;

pub struct DerivationService;

impl DerivationService {
    /// 是否需要更新保单聚合字段（金额或退费为正）
    pub fn affects_balance(amount: f64, refund: f64) -> bool {
        amount > 0.0 || refund > 0.0
    }
}

impl DerivationServiceTrait for DerivationService {
    fn apply_payment(&self, balance: &PolicyBalance, amount: f64, refund: f64) -> PolicyBalance {
        // 退费并入同一入账金额
        let applied = amount + refund;
        let amount_paid = (balance.amount_paid + applied).max(0.0);
        let outstanding_balance = (balance.total_premium_due - amount_paid).max(0.0);

        PolicyBalance {
            total_premium_due: balance.total_premium_due,
            amount_paid,
            outstanding_balance,
        }
    }

    fn derive_outstanding_balance(&self, total: f64, paid: f64, provided: Option<f64>) -> f64 {
        match provided {
            Some(value) => value.max(0.0),
            None => (total - paid).max(0.0),
        }
    }

    /// # 规则
    /// - 前缀 = 保单号中首个 '-' 或 '/' 之前的部分（大写）
    /// - 前缀命中配置表 → 对应地点，否则 → 默认地点
    fn derive_receipt_location(
        &self,
        policy_number: Option<&str>,
        settings: &ImportSettings,
    ) -> String {
        policy_number
            .and_then(|number| number.trim().split(['-', '/']).next())
            .map(|prefix| prefix.trim().to_uppercase())
            .filter(|prefix| !prefix.is_empty())
            .and_then(|prefix| settings.receipt_location_prefixes.get(&prefix).cloned())
            .unwrap_or_else(|| settings.default_receipt_location.clone())
    }

    fn split_co_customers(&self, raw: &str) -> Vec<String> {
        raw.split([';', '|'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}
