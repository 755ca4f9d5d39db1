// 9.3 amm.rs: the virtual-token pool every market trades against.
// the clearing house only sees the AmmAdapter trait. ConstantProductPool is the
// reference pool used by the simulator and the tests.

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::math::{self, MathError};
use crate::types::TokenIndex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmmError {
    #[error("swap amount must be positive")]
    ZeroAmount,

    #[error("pool has no liquidity")]
    EmptyPool,

    #[error("pool cannot deliver {requested} of token {token:?}, holds {available}")]
    InsufficientLiquidity {
        token: TokenIndex,
        requested: Decimal,
        available: Decimal,
    },

    #[error("pool output {actual} below minimum {minimum}")]
    Slippage { minimum: Decimal, actual: Decimal },

    #[error("invalid liquidity deposit: {reason}")]
    InvalidDeposit { reason: String },

    #[error("burning {requested} shares exceeds supply {supply}")]
    SharesExceedSupply { requested: Decimal, supply: Decimal },

    #[error("sell and buy token must differ")]
    SameToken,

    #[error("math: {0}")]
    Math(#[from] MathError),
}

/// Price quote for a swap before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub amount_out_incl_fees: Decimal,
    pub fee_percentage: Decimal,
}

// Swap and liquidity surface of a two-token pool. amounts are unsigned,
// indices are TokenIndex::Quote (0) and TokenIndex::Base (1).
// implementations must be Clone so the engine can snapshot them for rollback.
pub trait AmmAdapter: Clone + fmt::Debug {
    /// Output after the pool fee, plus the fee fraction applied.
    fn quote(&self, sell: TokenIndex, buy: TokenIndex, amount_in: Decimal) -> Result<SwapQuote, AmmError>;

    /// Output the trade would produce with no fee taken.
    fn quote_ex_fees(&self, sell: TokenIndex, buy: TokenIndex, amount_in: Decimal) -> Result<Decimal, AmmError>;

    /// Executes the swap. returns the output net of fees. fails below `min_out`.
    fn execute(
        &mut self,
        sell: TokenIndex,
        buy: TokenIndex,
        amount_in: Decimal,
        min_out: Decimal,
    ) -> Result<Decimal, AmmError>;

    /// Shares minted for a deposit, without depositing.
    fn calc_token_amount(&self, amounts: [Decimal; 2]) -> Result<Decimal, AmmError>;

    fn add_liquidity(&mut self, amounts: [Decimal; 2], min_shares: Decimal) -> Result<Decimal, AmmError>;

    fn remove_liquidity(&mut self, shares: Decimal, min_amounts: [Decimal; 2]) -> Result<[Decimal; 2], AmmError>;

    fn total_shares(&self) -> Decimal;

    fn pool_balances(&self) -> [Decimal; 2];

    /// Quote per base implied by the pool balances. `None` for an empty pool.
    fn spot_price(&self) -> Option<Decimal> {
        let [quote, base] = self.pool_balances();
        if base.is_zero() || quote.is_zero() {
            return None;
        }
        math::wad_div(quote, base).ok()
    }
}

/// Result of executing a swap through `execute_swap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapFill {
    pub amount_in: Decimal,
    pub amount_out_ex_fees: Decimal,
    pub amount_out_incl_fees: Decimal,
    pub fee_percentage: Decimal,
}

impl SwapFill {
    /// Output tokens the pool kept as its fee.
    pub fn in_kind_fee(&self) -> Decimal {
        self.amount_out_ex_fees - self.amount_out_incl_fees
    }
}

/// Quote, then execute, and keep both the ex-fee and the incl-fee output.
pub fn execute_swap<A: AmmAdapter>(
    pool: &mut A,
    sell: TokenIndex,
    buy: TokenIndex,
    amount_in: Decimal,
) -> Result<SwapFill, AmmError> {
    let quote = pool.quote(sell, buy, amount_in)?;
    let amount_out_ex_fees = pool.quote_ex_fees(sell, buy, amount_in)?;
    let amount_out_incl_fees = pool.execute(sell, buy, amount_in, quote.amount_out_incl_fees)?;
    Ok(SwapFill {
        amount_in,
        amount_out_ex_fees,
        amount_out_incl_fees,
        fee_percentage: quote.fee_percentage,
    })
}

const SOLVER_MAX_DOUBLINGS: usize = 128;
const SOLVER_MAX_STEPS: usize = 128;

/// Smallest input (within 1e-18) whose ex-fee output reaches `target_out`.
/// bisects over `quote_ex_fees` so it works for any pool curve.
pub fn amount_in_for_exact_out<A: AmmAdapter>(
    pool: &A,
    sell: TokenIndex,
    buy: TokenIndex,
    target_out: Decimal,
) -> Result<Decimal, AmmError> {
    if target_out <= Decimal::ZERO {
        return Err(AmmError::ZeroAmount);
    }
    let available = pool.pool_balances()[buy.index()];
    if target_out >= available {
        return Err(AmmError::InsufficientLiquidity {
            token: buy,
            requested: target_out,
            available,
        });
    }

    let mut lo = Decimal::ZERO;
    let mut hi = target_out;
    let mut doublings = 0;
    while pool.quote_ex_fees(sell, buy, hi)? < target_out {
        lo = hi;
        hi = math::wad_mul(hi, Decimal::TWO)?;
        doublings += 1;
        if doublings > SOLVER_MAX_DOUBLINGS {
            return Err(AmmError::InsufficientLiquidity {
                token: buy,
                requested: target_out,
                available,
            });
        }
    }

    let epsilon = Decimal::new(1, math::WAD_DECIMALS);
    for _ in 0..SOLVER_MAX_STEPS {
        if hi - lo <= epsilon {
            break;
        }
        let mid = math::truncate((lo + hi) / Decimal::TWO);
        if pool.quote_ex_fees(sell, buy, mid)? >= target_out {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Ok(hi)
}

/// x * y = k pool that keeps its fee tokens in the reserves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantProductPool {
    balances: [Decimal; 2],
    total_shares: Decimal,
    fee: Decimal,
}

impl ConstantProductPool {
    pub fn new(fee: Decimal) -> Self {
        Self {
            balances: [Decimal::ZERO; 2],
            total_shares: Decimal::ZERO,
            fee,
        }
    }

    pub fn fee(&self) -> Decimal {
        self.fee
    }

    fn check_pair(sell: TokenIndex, buy: TokenIndex, amount_in: Decimal) -> Result<(), AmmError> {
        if sell == buy {
            return Err(AmmError::SameToken);
        }
        if amount_in <= Decimal::ZERO {
            return Err(AmmError::ZeroAmount);
        }
        Ok(())
    }

    fn shares_for(&self, amounts: [Decimal; 2]) -> Result<Decimal, AmmError> {
        let [quote, base] = amounts;
        if quote < Decimal::ZERO || base < Decimal::ZERO {
            return Err(AmmError::InvalidDeposit {
                reason: "negative amount".to_string(),
            });
        }
        if self.total_shares.is_zero() {
            if quote.is_zero() || base.is_zero() {
                return Err(AmmError::InvalidDeposit {
                    reason: "first deposit needs both tokens".to_string(),
                });
            }
            let product = math::wad_mul(quote, base)?;
            return product
                .sqrt()
                .map(math::truncate)
                .ok_or(AmmError::Math(MathError::Overflow));
        }

        let [pool_quote, pool_base] = self.balances;
        let by_quote = math::wad_div(math::wad_mul(self.total_shares, quote)?, pool_quote)?;
        let by_base = math::wad_div(math::wad_mul(self.total_shares, base)?, pool_base)?;
        let shares = by_quote.min(by_base);
        if shares.is_zero() {
            return Err(AmmError::InvalidDeposit {
                reason: "deposit mints no shares".to_string(),
            });
        }
        Ok(shares)
    }
}

impl AmmAdapter for ConstantProductPool {
    fn quote(&self, sell: TokenIndex, buy: TokenIndex, amount_in: Decimal) -> Result<SwapQuote, AmmError> {
        let ex_fees = self.quote_ex_fees(sell, buy, amount_in)?;
        let fee_amount = math::wad_mul(ex_fees, self.fee)?;
        Ok(SwapQuote {
            amount_out_incl_fees: ex_fees - fee_amount,
            fee_percentage: self.fee,
        })
    }

    fn quote_ex_fees(&self, sell: TokenIndex, buy: TokenIndex, amount_in: Decimal) -> Result<Decimal, AmmError> {
        Self::check_pair(sell, buy, amount_in)?;
        let reserve_in = self.balances[sell.index()];
        let reserve_out = self.balances[buy.index()];
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(AmmError::EmptyPool);
        }
        let numerator = math::wad_mul(reserve_out, amount_in)?;
        let denominator = math::checked_add(reserve_in, amount_in)?;
        Ok(math::wad_div(numerator, denominator)?)
    }

    fn execute(
        &mut self,
        sell: TokenIndex,
        buy: TokenIndex,
        amount_in: Decimal,
        min_out: Decimal,
    ) -> Result<Decimal, AmmError> {
        let quote = self.quote(sell, buy, amount_in)?;
        if quote.amount_out_incl_fees < min_out {
            return Err(AmmError::Slippage {
                minimum: min_out,
                actual: quote.amount_out_incl_fees,
            });
        }
        self.balances[sell.index()] = math::checked_add(self.balances[sell.index()], amount_in)?;
        self.balances[buy.index()] -= quote.amount_out_incl_fees;
        Ok(quote.amount_out_incl_fees)
    }

    fn calc_token_amount(&self, amounts: [Decimal; 2]) -> Result<Decimal, AmmError> {
        self.shares_for(amounts)
    }

    fn add_liquidity(&mut self, amounts: [Decimal; 2], min_shares: Decimal) -> Result<Decimal, AmmError> {
        let shares = self.shares_for(amounts)?;
        if shares < min_shares {
            return Err(AmmError::Slippage {
                minimum: min_shares,
                actual: shares,
            });
        }
        self.balances[0] = math::checked_add(self.balances[0], amounts[0])?;
        self.balances[1] = math::checked_add(self.balances[1], amounts[1])?;
        self.total_shares = math::checked_add(self.total_shares, shares)?;
        Ok(shares)
    }

    fn remove_liquidity(&mut self, shares: Decimal, min_amounts: [Decimal; 2]) -> Result<[Decimal; 2], AmmError> {
        if shares <= Decimal::ZERO {
            return Err(AmmError::ZeroAmount);
        }
        if shares > self.total_shares {
            return Err(AmmError::SharesExceedSupply {
                requested: shares,
                supply: self.total_shares,
            });
        }

        let amounts = if shares == self.total_shares {
            self.balances
        } else {
            [
                math::wad_div(math::wad_mul(self.balances[0], shares)?, self.total_shares)?,
                math::wad_div(math::wad_mul(self.balances[1], shares)?, self.total_shares)?,
            ]
        };
        for (amount, minimum) in amounts.iter().zip(min_amounts.iter()) {
            if amount < minimum {
                return Err(AmmError::Slippage {
                    minimum: *minimum,
                    actual: *amount,
                });
            }
        }

        self.balances[0] -= amounts[0];
        self.balances[1] -= amounts[1];
        self.total_shares -= shares;
        Ok(amounts)
    }

    fn total_shares(&self) -> Decimal {
        self.total_shares
    }

    fn pool_balances(&self) -> [Decimal; 2] {
        self.balances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seeded_pool() -> ConstantProductPool {
        let mut pool = ConstantProductPool::new(dec!(0.001));
        pool.add_liquidity([dec!(10000), dec!(10000)], Decimal::ZERO).unwrap();
        pool
    }

    #[test]
    fn first_deposit_mints_geometric_mean() {
        let mut pool = ConstantProductPool::new(dec!(0.001));
        let shares = pool.add_liquidity([dec!(4000), dec!(1000)], Decimal::ZERO).unwrap();
        assert!((shares - dec!(2000)).abs() < dec!(0.000001));
        assert_eq!(pool.spot_price(), Some(dec!(4)));
    }

    #[test]
    fn first_deposit_needs_both_tokens() {
        let mut pool = ConstantProductPool::new(dec!(0.001));
        let err = pool.add_liquidity([dec!(100), Decimal::ZERO], Decimal::ZERO).unwrap_err();
        assert!(matches!(err, AmmError::InvalidDeposit { .. }));
    }

    #[test]
    fn swap_keeps_fee_in_reserves() {
        let mut pool = seeded_pool();
        let fill = execute_swap(&mut pool, TokenIndex::Quote, TokenIndex::Base, dec!(100)).unwrap();

        // 10000 * 100 / 10100
        assert_eq!(fill.amount_out_ex_fees, dec!(99.009900990099009900));
        assert!(fill.amount_out_incl_fees < fill.amount_out_ex_fees);
        assert_eq!(fill.fee_percentage, dec!(0.001));

        let [quote, base] = pool.pool_balances();
        assert_eq!(quote, dec!(10100));
        assert_eq!(base, dec!(10000) - fill.amount_out_incl_fees);
    }

    #[test]
    fn execute_respects_min_out() {
        let mut pool = seeded_pool();
        let before = pool.clone();
        let err = pool
            .execute(TokenIndex::Base, TokenIndex::Quote, dec!(10), dec!(10))
            .unwrap_err();
        assert!(matches!(err, AmmError::Slippage { .. }));
        assert_eq!(pool, before);
    }

    #[test]
    fn proportional_deposit_then_full_removal_returns_deposit() {
        let mut pool = seeded_pool();
        let supply_before = pool.total_shares();
        let shares = pool.add_liquidity([dec!(500), dec!(500)], Decimal::ZERO).unwrap();
        let out = pool.remove_liquidity(shares, [Decimal::ZERO; 2]).unwrap();
        assert!((out[0] - dec!(500)).abs() < dec!(0.000000001));
        assert!((out[1] - dec!(500)).abs() < dec!(0.000000001));
        assert_eq!(pool.total_shares(), supply_before);
    }

    #[test]
    fn cannot_burn_more_than_supply() {
        let mut pool = seeded_pool();
        let err = pool.remove_liquidity(dec!(10001), [Decimal::ZERO; 2]).unwrap_err();
        assert!(matches!(err, AmmError::SharesExceedSupply { .. }));
    }

    #[test]
    fn solver_finds_input_for_exact_output() {
        let pool = seeded_pool();
        let input = amount_in_for_exact_out(&pool, TokenIndex::Quote, TokenIndex::Base, dec!(50)).unwrap();
        let out = pool.quote_ex_fees(TokenIndex::Quote, TokenIndex::Base, input).unwrap();
        assert!(out >= dec!(50));
        assert!(out - dec!(50) < dec!(0.000000001));
    }

    #[test]
    fn solver_rejects_draining_the_pool() {
        let pool = seeded_pool();
        let err = amount_in_for_exact_out(&pool, TokenIndex::Quote, TokenIndex::Base, dec!(10000)).unwrap_err();
        assert!(matches!(err, AmmError::InsufficientLiquidity { .. }));
    }
}
