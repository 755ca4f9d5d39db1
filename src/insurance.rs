// 6.1 insurance.rs: the reserve that absorbs bad debt.
// anything it cannot cover becomes system_bad_debt. inflows pay that counter down
// before they add to the balance, and no surplus leaves while it is non-zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InsuranceError {
    #[error("amount must be positive")]
    ZeroAmount,

    #[error("system bad debt {0} outstanding")]
    SystemBadDebtOutstanding(Decimal),

    #[error("insurance holds {balance}, requested {requested}")]
    InsufficientBalance { balance: Decimal, requested: Decimal },
}

/// How an inflow was split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundOutcome {
    pub debt_repaid: Decimal,
    pub retained: Decimal,
}

/// How a debt settlement was covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtSettlement {
    pub covered: Decimal,
    pub shortfall: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsuranceReserve {
    balance: Decimal,
    system_bad_debt: Decimal,
    pub total_deposits: Decimal,
    pub total_payouts: Decimal,
}

impl InsuranceReserve {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            balance: initial_balance,
            system_bad_debt: Decimal::ZERO,
            total_deposits: initial_balance,
            total_payouts: Decimal::ZERO,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn system_bad_debt(&self) -> Decimal {
        self.system_bad_debt
    }

    pub fn fund(&mut self, amount: Decimal) -> FundOutcome {
        if amount <= Decimal::ZERO {
            return FundOutcome {
                debt_repaid: Decimal::ZERO,
                retained: Decimal::ZERO,
            };
        }
        let debt_repaid = amount.min(self.system_bad_debt);
        let retained = amount - debt_repaid;
        self.system_bad_debt -= debt_repaid;
        self.balance += retained;
        self.total_deposits += amount;
        FundOutcome { debt_repaid, retained }
    }

    /// Pay out `debt` from the balance. whatever is missing becomes system bad debt.
    pub fn settle_debt(&mut self, debt: Decimal) -> DebtSettlement {
        if debt <= Decimal::ZERO {
            return DebtSettlement {
                covered: Decimal::ZERO,
                shortfall: Decimal::ZERO,
            };
        }
        let covered = debt.min(self.balance);
        let shortfall = debt - covered;
        self.balance -= covered;
        self.total_payouts += covered;
        self.system_bad_debt += shortfall;
        DebtSettlement { covered, shortfall }
    }

    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    pub fn withdraw_surplus(&mut self, amount: Decimal) -> Result<(), InsuranceError> {
        if amount <= Decimal::ZERO {
            return Err(InsuranceError::ZeroAmount);
        }
        if !self.system_bad_debt.is_zero() {
            return Err(InsuranceError::SystemBadDebtOutstanding(self.system_bad_debt));
        }
        if amount > self.balance {
            return Err(InsuranceError::InsufficientBalance {
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        self.total_payouts += amount;
        Ok(())
    }
}
