// 10.0 vault.rs: collateral balances per account. index 0 is the unit of account (UA)
// every pnl, fee and funding flow settles in. the other slots hold whitelisted
// collateral valued at a price and haircut by a weight when discounted.
// balances are plain ledger entries, no token transfer mechanics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::math::{self, MathError};
use crate::types::AccountId;

pub type CollateralIdx = usize;

/// Unit of account slot.
pub const UA: CollateralIdx = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collateral {
    pub symbol: String,
    /// Haircut applied to the value when discounted, 0 < weight <= 1.
    pub weight: Decimal,
    /// UA per token.
    pub price: Decimal,
    /// Cap on the total amount held across accounts.
    pub max_amount: Decimal,
    pub total_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VaultError {
    #[error("collateral {0} is not whitelisted")]
    UnsupportedCollateral(CollateralIdx),

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("{account} holds {balance} of collateral {collateral}, needs {requested}")]
    InsufficientBalance {
        account: AccountId,
        collateral: CollateralIdx,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("collateral {collateral} cap {max_amount} exceeded")]
    MaxAmountExceeded {
        collateral: CollateralIdx,
        max_amount: Decimal,
    },

    #[error("invalid collateral: {reason}")]
    InvalidCollateral { reason: String },

    #[error("math: {0}")]
    Math(#[from] MathError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vault {
    collaterals: Vec<Collateral>,
    balances: BTreeMap<AccountId, Vec<Decimal>>,
}

impl Default for Vault {
    fn default() -> Self {
        Self::new("UA")
    }
}

impl Vault {
    pub fn new(ua_symbol: &str) -> Self {
        Self {
            collaterals: vec![Collateral {
                symbol: ua_symbol.to_string(),
                weight: Decimal::ONE,
                price: Decimal::ONE,
                max_amount: Decimal::MAX,
                total_balance: Decimal::ZERO,
            }],
            balances: BTreeMap::new(),
        }
    }

    pub fn add_collateral(
        &mut self,
        symbol: &str,
        weight: Decimal,
        price: Decimal,
        max_amount: Decimal,
    ) -> Result<CollateralIdx, VaultError> {
        if weight <= Decimal::ZERO || weight > Decimal::ONE {
            return Err(VaultError::InvalidCollateral {
                reason: format!("weight {weight} outside (0, 1]"),
            });
        }
        if price <= Decimal::ZERO {
            return Err(VaultError::InvalidCollateral {
                reason: format!("price {price} must be positive"),
            });
        }
        self.collaterals.push(Collateral {
            symbol: symbol.to_string(),
            weight,
            price,
            max_amount,
            total_balance: Decimal::ZERO,
        });
        Ok(self.collaterals.len() - 1)
    }

    pub fn set_collateral_price(&mut self, idx: CollateralIdx, price: Decimal) -> Result<(), VaultError> {
        if idx == UA || price <= Decimal::ZERO {
            return Err(VaultError::InvalidCollateral {
                reason: format!("cannot price collateral {idx} at {price}"),
            });
        }
        self.collateral_mut(idx)?.price = price;
        Ok(())
    }

    pub fn collaterals(&self) -> &[Collateral] {
        &self.collaterals
    }

    pub fn collateral(&self, idx: CollateralIdx) -> Result<&Collateral, VaultError> {
        self.collaterals.get(idx).ok_or(VaultError::UnsupportedCollateral(idx))
    }

    fn collateral_mut(&mut self, idx: CollateralIdx) -> Result<&mut Collateral, VaultError> {
        self.collaterals.get_mut(idx).ok_or(VaultError::UnsupportedCollateral(idx))
    }

    pub fn get_balance(&self, account: AccountId, idx: CollateralIdx) -> Decimal {
        self.balances
            .get(&account)
            .and_then(|slots| slots.get(idx))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Signed ledger adjustment. only UA may go negative.
    pub fn adjust_balance(&mut self, account: AccountId, idx: CollateralIdx, delta: Decimal) -> Result<(), VaultError> {
        let slots = self.collaterals.len();
        let collateral = self.collateral_mut(idx)?;
        let new_total = math::checked_add(collateral.total_balance, delta)?;
        if delta > Decimal::ZERO && new_total > collateral.max_amount {
            return Err(VaultError::MaxAmountExceeded {
                collateral: idx,
                max_amount: collateral.max_amount,
            });
        }

        let balances = self
            .balances
            .entry(account)
            .or_insert_with(|| vec![Decimal::ZERO; slots]);
        if balances.len() < slots {
            balances.resize(slots, Decimal::ZERO);
        }
        let new_balance = math::checked_add(balances[idx], delta)?;
        if idx != UA && new_balance < Decimal::ZERO {
            return Err(VaultError::InsufficientBalance {
                account,
                collateral: idx,
                balance: balances[idx],
                requested: -delta,
            });
        }
        balances[idx] = new_balance;
        self.collaterals[idx].total_balance = new_total;
        Ok(())
    }

    pub fn deposit(&mut self, account: AccountId, idx: CollateralIdx, amount: Decimal) -> Result<(), VaultError> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::ZeroAmount);
        }
        self.adjust_balance(account, idx, amount)
    }

    pub fn withdraw(&mut self, account: AccountId, idx: CollateralIdx, amount: Decimal) -> Result<(), VaultError> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::ZeroAmount);
        }
        let balance = self.get_balance(account, idx);
        if balance < amount {
            return Err(VaultError::InsufficientBalance {
                account,
                collateral: idx,
                balance,
                requested: amount,
            });
        }
        self.adjust_balance(account, idx, -amount)
    }

    /// Move collateral between accounts.
    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        idx: CollateralIdx,
        amount: Decimal,
    ) -> Result<(), VaultError> {
        self.adjust_balance(from, idx, -amount)?;
        self.adjust_balance(to, idx, amount)
    }

    /// UA value of one collateral balance.
    pub fn collateral_value(&self, account: AccountId, idx: CollateralIdx, discounted: bool) -> Result<Decimal, VaultError> {
        let collateral = self.collateral(idx)?;
        let value = math::wad_mul(self.get_balance(account, idx), collateral.price)?;
        if discounted {
            Ok(math::wad_mul(value, collateral.weight)?)
        } else {
            Ok(value)
        }
    }

    /// Sum over all collaterals, optionally weight-discounted.
    pub fn get_reserve_value(&self, account: AccountId, discounted: bool) -> Result<Decimal, VaultError> {
        let mut total = Decimal::ZERO;
        for idx in 0..self.collaterals.len() {
            total = math::checked_add(total, self.collateral_value(account, idx, discounted)?)?;
        }
        Ok(total)
    }

    /// Discounted value of everything except UA.
    pub fn non_ua_value(&self, account: AccountId, discounted: bool) -> Result<Decimal, VaultError> {
        let total = self.get_reserve_value(account, discounted)?;
        Ok(math::checked_sub(total, self.get_balance(account, UA))?)
    }

    /// Zero every balance of an account. returns the removed UA balance.
    pub fn clear_account(&mut self, account: AccountId) -> Result<Decimal, VaultError> {
        let removed_ua = self.get_balance(account, UA);
        for idx in 0..self.collaterals.len() {
            let balance = self.get_balance(account, idx);
            if !balance.is_zero() {
                self.adjust_balance(account, idx, -balance)?;
            }
        }
        Ok(removed_ua)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountId> {
        self.balances.keys()
    }

    /// Sum of UA across all accounts, negative balances included.
    pub fn total_ua(&self) -> Decimal {
        self.collaterals[UA].total_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ALICE: AccountId = AccountId(1);
    const BOB: AccountId = AccountId(2);

    fn vault_with_eth() -> (Vault, CollateralIdx) {
        let mut vault = Vault::default();
        let eth = vault
            .add_collateral("ETH", dec!(0.8), dec!(2000), dec!(1000))
            .unwrap();
        (vault, eth)
    }

    #[test]
    fn ua_can_go_negative_collateral_cannot() {
        let (mut vault, eth) = vault_with_eth();
        vault.adjust_balance(ALICE, UA, dec!(-50)).unwrap();
        assert_eq!(vault.get_balance(ALICE, UA), dec!(-50));

        let err = vault.adjust_balance(ALICE, eth, dec!(-1)).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientBalance { .. }));
    }

    #[test]
    fn reserve_value_discounts_by_weight() {
        let (mut vault, eth) = vault_with_eth();
        vault.deposit(ALICE, UA, dec!(100)).unwrap();
        vault.deposit(ALICE, eth, dec!(1)).unwrap();

        assert_eq!(vault.get_reserve_value(ALICE, false).unwrap(), dec!(2100));
        assert_eq!(vault.get_reserve_value(ALICE, true).unwrap(), dec!(1700));
        assert_eq!(vault.non_ua_value(ALICE, true).unwrap(), dec!(1600));
    }

    #[test]
    fn withdraw_needs_balance() {
        let mut vault = Vault::default();
        vault.deposit(ALICE, UA, dec!(10)).unwrap();
        assert!(vault.withdraw(ALICE, UA, dec!(11)).is_err());
        vault.withdraw(ALICE, UA, dec!(10)).unwrap();
        assert_eq!(vault.get_balance(ALICE, UA), Decimal::ZERO);
        assert_eq!(vault.deposit(ALICE, UA, Decimal::ZERO), Err(VaultError::ZeroAmount));
    }

    #[test]
    fn collateral_cap_enforced() {
        let (mut vault, eth) = vault_with_eth();
        vault.deposit(ALICE, eth, dec!(600)).unwrap();
        let err = vault.deposit(BOB, eth, dec!(401)).unwrap_err();
        assert!(matches!(err, VaultError::MaxAmountExceeded { .. }));
    }

    #[test]
    fn unknown_collateral_rejected() {
        let mut vault = Vault::default();
        assert_eq!(
            vault.deposit(ALICE, 3, dec!(1)),
            Err(VaultError::UnsupportedCollateral(3))
        );
    }

    #[test]
    fn transfer_and_clear() {
        let (mut vault, eth) = vault_with_eth();
        vault.deposit(ALICE, eth, dec!(2)).unwrap();
        vault.adjust_balance(ALICE, UA, dec!(-30)).unwrap();
        vault.transfer(ALICE, BOB, eth, dec!(0.5)).unwrap();
        assert_eq!(vault.get_balance(BOB, eth), dec!(0.5));

        let removed = vault.clear_account(ALICE).unwrap();
        assert_eq!(removed, dec!(-30));
        assert_eq!(vault.get_reserve_value(ALICE, false).unwrap(), Decimal::ZERO);
        assert_eq!(vault.total_ua(), Decimal::ZERO);
    }
}
