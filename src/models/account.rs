use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub available: Decimal,
    pub balance: Decimal,
    pub deposit: Decimal,
    pub profit_loss: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub preferred: bool,
    pub balance: Balance,
}

/// 게이트웨이 계좌 스냅샷. 결정 직전에 매번 새로 조회하며 캐시하지 않는다.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AccountInfo {
    pub accounts: Vec<Account>,
}

impl AccountInfo {
    pub fn single(account_id: impl Into<String>, available: Decimal) -> Self {
        AccountInfo {
            accounts: vec![Account {
                account_id: account_id.into(),
                preferred: true,
                balance: Balance {
                    available,
                    balance: available,
                    ..Default::default()
                },
            }],
        }
    }

    /// 기본(preferred) 계좌의 가용 잔고. 기본 계좌가 없으면 0
    pub fn available_balance(&self) -> Decimal {
        self.accounts
            .iter()
            .find(|a| a.preferred)
            .map(|a| a.balance.available)
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_available_balance_uses_preferred_account() {
        let mut info = AccountInfo::single("A1", dec!(2500));
        info.accounts.insert(0, Account {
            account_id: "A0".to_string(),
            preferred: false,
            balance: Balance { available: dec!(99999), ..Default::default() },
        });
        assert_eq!(info.available_balance(), dec!(2500));
    }

    #[test]
    fn test_no_preferred_account_means_zero() {
        let mut info = AccountInfo::single("A1", dec!(2500));
        info.accounts[0].preferred = false;
        assert_eq!(info.available_balance(), Decimal::ZERO);
    }
}
