//! In-process custody vault
//!
//! Reference [`TransferPort`] backed by an in-memory balance book. One
//! account acts as the engine's custody ledger; opens credit it, payouts
//! debit it. All checks and mutations for a call happen under a single
//! lock, so each port call is atomic.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::port::{Payout, TransferPort};
use crate::types::{AccountId, Asset};

type BalanceKey = (Asset, AccountId);

/// In-memory balance book implementing the transfer port
#[derive(Debug)]
pub struct CustodyVault {
    /// Account holding all locked stream funds and accrued fees
    custodian: AccountId,
    balances: Mutex<HashMap<BalanceKey, u128>>,
}

impl CustodyVault {
    /// Create a vault whose custody account is `custodian`
    pub fn new(custodian: AccountId) -> Self {
        Self {
            custodian,
            balances: Mutex::new(HashMap::new()),
        }
    }

    /// Fund an account out of thin air (test and demo setup)
    pub fn mint(&self, asset: &Asset, account: &AccountId, amount: u128) {
        let mut balances = self.balances.lock();
        let entry = balances
            .entry((asset.clone(), account.clone()))
            .or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Current balance of an account
    pub fn balance(&self, asset: &Asset, account: &AccountId) -> u128 {
        let balances = self.balances.lock();
        balances
            .get(&(asset.clone(), account.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Current balance of the custody account
    pub fn custody_balance(&self, asset: &Asset) -> u128 {
        self.balance(asset, &self.custodian)
    }

    /// Move funds between two accounts under an already-held lock
    ///
    /// Verifies both sides before touching either, so a failure leaves the
    /// book unchanged.
    fn transfer_locked(
        balances: &mut HashMap<BalanceKey, u128>,
        asset: &Asset,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let from_key = (asset.clone(), from.clone());
        let to_key = (asset.clone(), to.clone());

        let from_balance = balances.get(&from_key).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(Error::Transfer(format!(
                "insufficient funds: {} holds {} of {}, needs {}",
                from, from_balance, asset, amount
            )));
        }

        let to_balance = balances.get(&to_key).copied().unwrap_or(0);
        let credited = to_balance.checked_add(amount).ok_or_else(|| {
            Error::Transfer(format!("balance overflow crediting {} to {}", amount, to))
        })?;

        balances.insert(from_key, from_balance - amount);
        balances.insert(to_key, credited);
        Ok(())
    }
}

impl TransferPort for CustodyVault {
    fn transfer_in(&self, asset: &Asset, from: &AccountId, amount: u128) -> Result<()> {
        let mut balances = self.balances.lock();
        Self::transfer_locked(&mut balances, asset, from, &self.custodian, amount)
    }

    fn transfer_out(&self, asset: &Asset, to: &AccountId, amount: u128) -> Result<()> {
        let mut balances = self.balances.lock();
        Self::transfer_locked(&mut balances, asset, &self.custodian, to, amount)
    }

    fn transfer_out_batch(&self, asset: &Asset, payouts: &[Payout]) -> Result<()> {
        let mut balances = self.balances.lock();

        // Verify the whole batch is payable before moving anything.
        let mut total: u128 = 0;
        for payout in payouts {
            total = total.checked_add(payout.amount).ok_or_else(|| {
                Error::Transfer("batch payout total overflows".to_string())
            })?;
        }

        let custody_key = (asset.clone(), self.custodian.clone());
        let held = balances.get(&custody_key).copied().unwrap_or(0);
        if held < total {
            return Err(Error::Transfer(format!(
                "insufficient custody: holds {} of {}, batch needs {}",
                held, asset, total
            )));
        }

        for payout in payouts {
            Self::transfer_locked(
                &mut balances,
                asset,
                &self.custodian,
                &payout.to,
                payout.amount,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CustodyVault {
        CustodyVault::new(AccountId::new("custody"))
    }

    #[test]
    fn test_transfer_in_moves_funds_to_custody() {
        let vault = vault();
        let asset = Asset::new("USDC");
        let payer = AccountId::new("payer-1");
        vault.mint(&asset, &payer, 1_000);

        vault.transfer_in(&asset, &payer, 600).unwrap();

        assert_eq!(vault.balance(&asset, &payer), 400);
        assert_eq!(vault.custody_balance(&asset), 600);
    }

    #[test]
    fn test_insufficient_funds_leaves_book_unchanged() {
        let vault = vault();
        let asset = Asset::new("USDC");
        let payer = AccountId::new("payer-1");
        vault.mint(&asset, &payer, 100);

        assert!(vault.transfer_in(&asset, &payer, 101).is_err());

        assert_eq!(vault.balance(&asset, &payer), 100);
        assert_eq!(vault.custody_balance(&asset), 0);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let vault = vault();
        let asset = Asset::new("USDC");
        let custody = AccountId::new("custody");
        vault.mint(&asset, &custody, 500);

        let a = AccountId::new("a");
        let b = AccountId::new("b");
        let over = vec![
            Payout {
                to: a.clone(),
                amount: 300,
            },
            Payout {
                to: b.clone(),
                amount: 300,
            },
        ];
        assert!(vault.transfer_out_batch(&asset, &over).is_err());
        assert_eq!(vault.custody_balance(&asset), 500);
        assert_eq!(vault.balance(&asset, &a), 0);
        assert_eq!(vault.balance(&asset, &b), 0);

        let fits = vec![
            Payout {
                to: a.clone(),
                amount: 300,
            },
            Payout {
                to: b.clone(),
                amount: 200,
            },
        ];
        vault.transfer_out_batch(&asset, &fits).unwrap();
        assert_eq!(vault.custody_balance(&asset), 0);
        assert_eq!(vault.balance(&asset, &a), 300);
        assert_eq!(vault.balance(&asset, &b), 200);
    }

    #[test]
    fn test_zero_amount_legs_are_skipped() {
        let vault = vault();
        let asset = Asset::new("USDC");
        let custody = AccountId::new("custody");
        vault.mint(&asset, &custody, 100);

        let legs = vec![
            Payout {
                to: AccountId::new("a"),
                amount: 0,
            },
            Payout {
                to: AccountId::new("b"),
                amount: 100,
            },
        ];
        vault.transfer_out_batch(&asset, &legs).unwrap();
        assert_eq!(vault.balance(&asset, &AccountId::new("a")), 0);
        assert_eq!(vault.balance(&asset, &AccountId::new("b")), 100);
    }
}
