//! Data models for ledger accounts

use rust_decimal::Decimal;
use serde::Serialize;

use super::validation::AccountNumber;
use crate::core_types::{AccountId, Amount, TimestampMs, UserId};
use crate::money::Currency;

/// Account kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[repr(i16)]
pub enum AccountKind {
    Checking = 1,
    Saving = 2,
    Mortgage = 3,
}

impl AccountKind {
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(AccountKind::Checking),
            2 => Some(AccountKind::Saving),
            3 => Some(AccountKind::Mortgage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Checking => "CHECKING",
            AccountKind::Saving => "SAVING",
            AccountKind::Mortgage => "MORTGAGE",
        }
    }
}

impl std::str::FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CHECKING" => Ok(AccountKind::Checking),
            "SAVING" => Ok(AccountKind::Saving),
            "MORTGAGE" => Ok(AccountKind::Mortgage),
            other => Err(format!("unknown account kind: {}", other)),
        }
    }
}

/// Ledger account
///
/// Balance is only ever changed through the ledger's debit/credit operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub number: AccountNumber,
    pub owner: UserId,
    pub kind: AccountKind,
    pub balance: Amount,
    pub currency: Currency,
    /// Reporting only, never applied by the engine
    pub interest_rate: Option<Decimal>,
    pub is_active: bool,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
}

impl Account {
    /// Active and holding at least `amount`
    pub fn can_debit(&self, amount: Amount) -> bool {
        self.is_active && self.balance >= amount
    }

    pub fn masked_number(&self) -> String {
        self.number.masked()
    }
}

/// Parameters for provisioning an account (bootstrap and tests)
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner: UserId,
    pub kind: AccountKind,
    pub currency: Currency,
    pub opening_balance: Amount,
    /// Generated when absent
    pub number: Option<AccountNumber>,
    pub interest_rate: Option<Decimal>,
}

impl NewAccount {
    pub fn checking(owner: UserId, opening_balance: Amount) -> Self {
        Self {
            owner,
            kind: AccountKind::Checking,
            currency: Currency::Vnd,
            opening_balance,
            number: None,
            interest_rate: None,
        }
    }

    pub fn with_number(mut self, number: AccountNumber) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_kind(mut self, kind: AccountKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: Amount, is_active: bool) -> Account {
        Account {
            id: 1,
            number: AccountNumber::new("1000000000000001").unwrap(),
            owner: 7,
            kind: AccountKind::Checking,
            balance,
            currency: Currency::Vnd,
            interest_rate: None,
            is_active,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_account_kind_from_id() {
        assert_eq!(AccountKind::from_id(1), Some(AccountKind::Checking));
        assert_eq!(AccountKind::from_id(3), Some(AccountKind::Mortgage));
        assert_eq!(AccountKind::from_id(0), None);
        assert_eq!(AccountKind::Saving.id(), 2);
    }

    #[test]
    fn test_can_debit() {
        assert!(account(100, true).can_debit(100));
        assert!(!account(99, true).can_debit(100));
        assert!(!account(1_000, false).can_debit(1));
    }

    #[test]
    fn test_masked_number() {
        assert_eq!(account(0, true).masked_number(), "**** **** **** 0001");
    }
}
