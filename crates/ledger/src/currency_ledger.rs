//! Currency ledger interface used for point redemption
//!
//! The points engine never holds currency itself. Redemptions are paid out
//! of a treasury account on an external ledger reached through this trait.

use anyhow::{anyhow, Result};
use loyalty_types::{AccountId, Amount, CurrencyId, Points};
use std::collections::BTreeMap;

/// Interface for the external currency ledger.
pub trait CurrencyLedger: Send + Sync {
    /// Balance of `account` in `currency`.
    fn balance_of(&self, currency: &CurrencyId, account: &AccountId) -> Result<Amount>;

    /// Move `amount` of `currency` between two accounts.
    fn transfer(
        &mut self,
        currency: &CurrencyId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()>;

    /// Currency owed for redeeming `points`.
    fn quote_points(&self, currency: &CurrencyId, points: Points) -> Result<Amount>;
}

type BalanceKey = (CurrencyId, AccountId);

fn debit(
    balances: &mut BTreeMap<BalanceKey, Amount>,
    currency: &CurrencyId,
    from: &AccountId,
    amount: Amount,
) -> Result<()> {
    let key = (currency.clone(), *from);
    let current = balances.get(&key).copied().unwrap_or(0);
    if current < amount {
        return Err(anyhow!(
            "insufficient {currency} balance for {from}: {current} < {amount}"
        ));
    }
    balances.insert(key, current - amount);
    Ok(())
}

fn credit(
    balances: &mut BTreeMap<BalanceKey, Amount>,
    currency: &CurrencyId,
    to: &AccountId,
    amount: Amount,
) -> Result<()> {
    let key = (currency.clone(), *to);
    let current = balances.get(&key).copied().unwrap_or(0);
    let updated = current
        .checked_add(amount)
        .ok_or_else(|| anyhow!("{currency} balance overflow for {to}"))?;
    balances.insert(key, updated);
    Ok(())
}

// -----------------------------------------------------------------------------
// In-memory implementation (for the node runtime and tests)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct InMemoryCurrencyLedger {
    balances: BTreeMap<BalanceKey, Amount>,
    /// currency → amount paid per redeemed point; unset means 1
    payout_rates: BTreeMap<CurrencyId, Amount>,
}

impl InMemoryCurrencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create currency out of thin air, e.g. to fund a treasury.
    pub fn mint(&mut self, currency: &CurrencyId, account: &AccountId, amount: Amount) -> Result<()> {
        credit(&mut self.balances, currency, account, amount)
    }

    pub fn set_payout_rate(&mut self, currency: CurrencyId, rate: Amount) {
        self.payout_rates.insert(currency, rate);
    }

    pub fn payout_rate(&self, currency: &CurrencyId) -> Amount {
        self.payout_rates.get(currency).copied().unwrap_or(1)
    }
}

impl CurrencyLedger for InMemoryCurrencyLedger {
    fn balance_of(&self, currency: &CurrencyId, account: &AccountId) -> Result<Amount> {
        Ok(self
            .balances
            .get(&(currency.clone(), *account))
            .copied()
            .unwrap_or(0))
    }

    fn transfer(
        &mut self,
        currency: &CurrencyId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        // Validate the credit side first so a failed transfer moves nothing.
        let to_balance = self.balance_of(currency, to)?;
        if from != to && to_balance.checked_add(amount).is_none() {
            return Err(anyhow!("{currency} balance overflow for {to}"));
        }
        debit(&mut self.balances, currency, from, amount)?;
        credit(&mut self.balances, currency, to, amount)
    }

    fn quote_points(&self, currency: &CurrencyId, points: Points) -> Result<Amount> {
        points
            .checked_mul(self.payout_rate(currency))
            .ok_or_else(|| anyhow!("quote overflow for {points} points in {currency}"))
    }
}

// -----------------------------------------------------------------------------
// Mock ledger (records calls, injects failures)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCall {
    pub currency: CurrencyId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Default)]
pub struct MockCurrencyLedger {
    balances: BTreeMap<BalanceKey, Amount>,
    transfer_calls: Vec<TransferCall>,
    fail_next_transfer: bool,
}

impl MockCurrencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, currency: &CurrencyId, account: &AccountId, amount: Amount) -> Self {
        self.balances.insert((currency.clone(), *account), amount);
        self
    }

    /// The next transfer returns an error without moving funds.
    pub fn fail_next_transfer(&mut self) {
        self.fail_next_transfer = true;
    }

    pub fn get_transfer_calls(&self) -> &[TransferCall] {
        &self.transfer_calls
    }

    pub fn clear_calls(&mut self) {
        self.transfer_calls.clear();
    }
}

impl CurrencyLedger for MockCurrencyLedger {
    fn balance_of(&self, currency: &CurrencyId, account: &AccountId) -> Result<Amount> {
        Ok(self
            .balances
            .get(&(currency.clone(), *account))
            .copied()
            .unwrap_or(0))
    }

    fn transfer(
        &mut self,
        currency: &CurrencyId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.transfer_calls.push(TransferCall {
            currency: currency.clone(),
            from: *from,
            to: *to,
            amount,
        });
        if std::mem::take(&mut self.fail_next_transfer) {
            return Err(anyhow!("injected transfer failure"));
        }
        debit(&mut self.balances, currency, from, amount)?;
        credit(&mut self.balances, currency, to, amount)
    }

    /// One unit per point.
    fn quote_points(&self, _currency: &CurrencyId, points: Points) -> Result<Amount> {
        Ok(points)
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    fn mana() -> CurrencyId {
        CurrencyId::new("MANA").unwrap()
    }

    #[test]
    fn test_in_memory_transfer() {
        let mut ledger = InMemoryCurrencyLedger::new();
        let treasury = AccountId::from_label("treasury");
        let player = AccountId::from_label("player");

        ledger.mint(&mana(), &treasury, 1_000).unwrap();
        ledger.transfer(&mana(), &treasury, &player, 300).unwrap();

        assert_eq!(ledger.balance_of(&mana(), &treasury).unwrap(), 700);
        assert_eq!(ledger.balance_of(&mana(), &player).unwrap(), 300);
    }

    #[test]
    fn test_insufficient_balance() {
        let mut ledger = InMemoryCurrencyLedger::new();
        let treasury = AccountId::from_label("treasury");
        let player = AccountId::from_label("player");

        ledger.mint(&mana(), &treasury, 100).unwrap();
        assert!(ledger.transfer(&mana(), &treasury, &player, 101).is_err());
        assert_eq!(ledger.balance_of(&mana(), &treasury).unwrap(), 100);
        assert_eq!(ledger.balance_of(&mana(), &player).unwrap(), 0);
    }

    #[test]
    fn test_balances_are_per_currency() {
        let mut ledger = InMemoryCurrencyLedger::new();
        let account = AccountId::from_label("account");
        let dai = CurrencyId::new("DAI").unwrap();

        ledger.mint(&mana(), &account, 50).unwrap();
        assert_eq!(ledger.balance_of(&dai, &account).unwrap(), 0);
    }

    #[test]
    fn test_quote_uses_payout_rate() {
        let mut ledger = InMemoryCurrencyLedger::new();
        assert_eq!(ledger.quote_points(&mana(), 42).unwrap(), 42);

        ledger.set_payout_rate(mana(), 1_000);
        assert_eq!(ledger.quote_points(&mana(), 42).unwrap(), 42_000);

        ledger.set_payout_rate(mana(), u128::MAX);
        assert!(ledger.quote_points(&mana(), 2).is_err());
    }

    #[test]
    fn test_mock_records_and_fails_once() {
        let treasury = AccountId::from_label("treasury");
        let player = AccountId::from_label("player");
        let mut mock = MockCurrencyLedger::new().with_balance(&mana(), &treasury, 500);

        mock.fail_next_transfer();
        assert!(mock.transfer(&mana(), &treasury, &player, 100).is_err());
        mock.transfer(&mana(), &treasury, &player, 100).unwrap();

        let calls = mock.get_transfer_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].amount, 100);
        assert_eq!(mock.balance_of(&mana(), &treasury).unwrap(), 400);
        assert_eq!(mock.balance_of(&mana(), &player).unwrap(), 100);
    }
}
