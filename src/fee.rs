//! Fee calculation
//!
//! Pure, stateless and database-free. Percentage rates use basis-point
//! precision (10^4): 100 = 1.00%.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::Amount;

/// Rate precision (10^4 = 10,000 basis points)
pub const BPS_PRECISION: u64 = 10_000;

/// Payable service kinds for utility payments
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceKind {
    Electricity,
    Water,
    Internet,
    PhoneTopup,
    DataPackage,
    ScratchCard,
    Flight,
    Hotel,
    Movie,
    Ecommerce,
}

/// Fee category a service kind is billed under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeCategory {
    /// Percentage with a cap
    Bill,
    /// Free
    Mobile,
    /// Flat fee
    Booking,
}

impl ServiceKind {
    pub fn category(&self) -> FeeCategory {
        match self {
            ServiceKind::Electricity | ServiceKind::Water | ServiceKind::Internet => {
                FeeCategory::Bill
            }
            ServiceKind::PhoneTopup | ServiceKind::DataPackage | ServiceKind::ScratchCard => {
                FeeCategory::Mobile
            }
            ServiceKind::Flight | ServiceKind::Hotel | ServiceKind::Movie | ServiceKind::Ecommerce => {
                FeeCategory::Booking
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Electricity => "ELECTRICITY",
            ServiceKind::Water => "WATER",
            ServiceKind::Internet => "INTERNET",
            ServiceKind::PhoneTopup => "PHONE_TOPUP",
            ServiceKind::DataPackage => "DATA_PACKAGE",
            ServiceKind::ScratchCard => "SCRATCH_CARD",
            ServiceKind::Flight => "FLIGHT",
            ServiceKind::Hotel => "HOTEL",
            ServiceKind::Movie => "MOVIE",
            ServiceKind::Ecommerce => "ECOMMERCE",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "ELECTRICITY" => ServiceKind::Electricity,
            "WATER" => ServiceKind::Water,
            "INTERNET" => ServiceKind::Internet,
            "PHONE_TOPUP" => ServiceKind::PhoneTopup,
            "DATA_PACKAGE" => ServiceKind::DataPackage,
            "SCRATCH_CARD" => ServiceKind::ScratchCard,
            "FLIGHT" => ServiceKind::Flight,
            "HOTEL" => ServiceKind::Hotel,
            "MOVIE" => ServiceKind::Movie,
            "ECOMMERCE" => ServiceKind::Ecommerce,
            other => return Err(FeeError::UnknownService(other.to_string())),
        })
    }
}

/// What a fee is being charged for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Transfer,
    Deposit,
    Withdrawal,
    Utility(ServiceKind),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeeError {
    #[error("Unknown service kind: {0}")]
    UnknownService(String),

    #[error("Fee tiers must be strictly ascending by upper bound")]
    TiersNotAscending,

    #[error("Rate {0} bps exceeds 100%")]
    RateTooHigh(u64),
}

/// One transfer fee tier: amounts up to and including `up_to` pay `fee`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    pub up_to: Amount,
    pub fee: Amount,
}

/// Fee tables, loaded from `AppConfig`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub transfer_tiers: Vec<FeeTier>,
    /// Fee for transfers above the last tier
    pub transfer_fee_above: Amount,
    pub bill_rate_bps: u64,
    pub bill_fee_cap: Amount,
    pub booking_fee: Amount,
    pub deposit_fee: Amount,
    pub withdrawal_fee: Amount,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            transfer_tiers: vec![
                FeeTier { up_to: 100_000, fee: 0 },
                FeeTier { up_to: 1_000_000, fee: 5_000 },
                FeeTier { up_to: 10_000_000, fee: 10_000 },
            ],
            transfer_fee_above: 20_000,
            bill_rate_bps: 100,
            bill_fee_cap: 20_000,
            booking_fee: 5_000,
            deposit_fee: 0,
            withdrawal_fee: 0,
        }
    }
}

impl FeeSchedule {
    /// Reject schedules that would make tier lookup ambiguous
    pub fn validate(&self) -> Result<(), FeeError> {
        if self
            .transfer_tiers
            .windows(2)
            .any(|w| w[0].up_to >= w[1].up_to)
        {
            return Err(FeeError::TiersNotAscending);
        }
        if self.bill_rate_bps > BPS_PRECISION {
            return Err(FeeError::RateTooHigh(self.bill_rate_bps));
        }
        Ok(())
    }

    /// Fee for an operation of `amount` minor units.
    ///
    /// # Example
    /// ```
    /// use retail_ledger::fee::{FeeSchedule, OperationKind};
    /// let fees = FeeSchedule::default();
    /// assert_eq!(fees.fee_for(200_000, OperationKind::Transfer), 5_000);
    /// ```
    pub fn fee_for(&self, amount: Amount, op: OperationKind) -> Amount {
        match op {
            OperationKind::Transfer => self.transfer_fee(amount),
            OperationKind::Deposit => self.deposit_fee,
            OperationKind::Withdrawal => self.withdrawal_fee,
            OperationKind::Utility(service) => match service.category() {
                FeeCategory::Bill => {
                    percentage_fee(amount, self.bill_rate_bps).min(self.bill_fee_cap)
                }
                FeeCategory::Mobile => 0,
                FeeCategory::Booking => self.booking_fee,
            },
        }
    }

    fn transfer_fee(&self, amount: Amount) -> Amount {
        self.transfer_tiers
            .iter()
            .find(|tier| amount <= tier.up_to)
            .map(|tier| tier.fee)
            .unwrap_or(self.transfer_fee_above)
    }
}

/// Percentage fee rounded half-up.
///
/// Uses u128 intermediate to prevent overflow.
///
/// # Example
/// ```
/// use retail_ledger::fee::percentage_fee;
/// // 1% of 150 = 1.5 -> 2
/// assert_eq!(percentage_fee(150, 100), 2);
/// ```
#[inline]
pub fn percentage_fee(amount: Amount, rate_bps: u64) -> Amount {
    let scaled = amount as u128 * rate_bps as u128;
    let precision = BPS_PRECISION as u128;
    ((scaled + precision / 2) / precision) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_fee_tiers() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee_for(100_000, OperationKind::Transfer), 0);
        assert_eq!(fees.fee_for(500_000, OperationKind::Transfer), 5_000);
        assert_eq!(fees.fee_for(5_000_000, OperationKind::Transfer), 10_000);
        assert_eq!(fees.fee_for(50_000_000, OperationKind::Transfer), 20_000);
    }

    #[test]
    fn test_transfer_fee_boundaries() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee_for(100_001, OperationKind::Transfer), 5_000);
        assert_eq!(fees.fee_for(1_000_000, OperationKind::Transfer), 5_000);
        assert_eq!(fees.fee_for(1_000_001, OperationKind::Transfer), 10_000);
        assert_eq!(fees.fee_for(10_000_000, OperationKind::Transfer), 10_000);
        assert_eq!(fees.fee_for(10_000_001, OperationKind::Transfer), 20_000);
    }

    #[test]
    fn test_bill_fee_percentage_and_cap() {
        let fees = FeeSchedule::default();
        let electricity = OperationKind::Utility(ServiceKind::Electricity);
        assert_eq!(fees.fee_for(500_000, electricity), 5_000);
        // 1% of 3,000,000 = 30,000 -> capped
        assert_eq!(fees.fee_for(3_000_000, electricity), 20_000);
        // 1% of 12,350 = 123.5 -> 124
        assert_eq!(fees.fee_for(12_350, OperationKind::Utility(ServiceKind::Water)), 124);
    }

    #[test]
    fn test_mobile_and_booking_fees() {
        let fees = FeeSchedule::default();
        assert_eq!(
            fees.fee_for(200_000, OperationKind::Utility(ServiceKind::PhoneTopup)),
            0
        );
        assert_eq!(
            fees.fee_for(2_000_000, OperationKind::Utility(ServiceKind::Flight)),
            5_000
        );
    }

    #[test]
    fn test_cash_operations_free_by_default() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee_for(5_000_000, OperationKind::Deposit), 0);
        assert_eq!(fees.fee_for(5_000_000, OperationKind::Withdrawal), 0);
    }

    #[test]
    fn test_validate_rejects_unordered_tiers() {
        let mut fees = FeeSchedule::default();
        assert!(fees.validate().is_ok());
        fees.transfer_tiers.swap(0, 1);
        assert_eq!(fees.validate(), Err(FeeError::TiersNotAscending));
    }

    #[test]
    fn test_percentage_fee_no_overflow() {
        assert_eq!(percentage_fee(u64::MAX, 100), u64::MAX / 100);
        assert_eq!(percentage_fee(0, 100), 0);
    }

    #[test]
    fn test_service_kind_parse() {
        assert_eq!(
            "phone_topup".parse::<ServiceKind>().unwrap(),
            ServiceKind::PhoneTopup
        );
        assert!("LOTTERY".parse::<ServiceKind>().is_err());
    }
}
