use crate::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Oro held in the communal bank, per player.
///
/// Every player always has an entry; players absent from a serialized map
/// read back as zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<PlayerId, u64>",
    into = "BTreeMap<PlayerId, u64>"
)]
pub struct BankBalances {
    balances: BTreeMap<PlayerId, u64>,
}

impl Default for BankBalances {
    fn default() -> Self {
        Self {
            balances: PlayerId::ALL.into_iter().map(|id| (id, 0)).collect(),
        }
    }
}

impl BankBalances {
    pub fn get(&self, player: PlayerId) -> u64 {
        self.balances.get(&player).copied().unwrap_or(0)
    }

    pub fn set(&mut self, player: PlayerId, quantity: u64) {
        self.balances.insert(player, quantity);
    }

    /// Removes `quantity` from a player's balance, returning the new balance,
    /// or `None` (leaving the balance untouched) if it would go negative.
    pub fn withdraw(&mut self, player: PlayerId, quantity: u64) -> Option<u64> {
        let remaining = self.get(player).checked_sub(quantity)?;
        self.set(player, remaining);
        Some(remaining)
    }

    pub fn total(&self) -> u64 {
        self.balances.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, u64)> + '_ {
        self.balances.iter().map(|(id, quantity)| (*id, *quantity))
    }

    /// Compact JSON object, e.g. `{"alan":100,"carlitos":0,...}`.
    pub fn to_json(&self) -> String {
        let object: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(id, quantity)| (id.as_str().to_string(), quantity.into()))
            .collect();
        serde_json::Value::Object(object).to_string()
    }
}

impl From<BTreeMap<PlayerId, u64>> for BankBalances {
    fn from(map: BTreeMap<PlayerId, u64>) -> Self {
        let mut bank = Self::default();
        for (id, quantity) in map {
            bank.set(id, quantity);
        }
        bank
    }
}

impl From<BankBalances> for BTreeMap<PlayerId, u64> {
    fn from(bank: BankBalances) -> Self {
        bank.balances
    }
}

impl FromIterator<(PlayerId, u64)> for BankBalances {
    fn from_iter<I: IntoIterator<Item = (PlayerId, u64)>>(iter: I) -> Self {
        iter.into_iter().collect::<BTreeMap<_, _>>().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_every_player() {
        let bank = BankBalances::default();
        assert_eq!(bank.iter().count(), PlayerId::ALL.len());
        assert_eq!(bank.total(), 0);
    }

    #[test]
    fn test_withdraw_never_goes_negative() {
        let mut bank: BankBalances = [(PlayerId::Alan, 100)].into_iter().collect();
        assert_eq!(bank.withdraw(PlayerId::Alan, 30), Some(70));
        assert_eq!(bank.withdraw(PlayerId::Alan, 71), None);
        assert_eq!(bank.get(PlayerId::Alan), 70);
        assert_eq!(bank.withdraw(PlayerId::Tommy, 1), None);
        assert_eq!(bank.get(PlayerId::Tommy), 0);
    }

    #[test]
    fn test_json_shape() {
        let bank: BankBalances = [(PlayerId::Alan, 100), (PlayerId::Criss, 5)]
            .into_iter()
            .collect();
        let json = bank.to_json();
        assert_eq!(
            json,
            r#"{"alan":100,"carlitos":0,"criss":5,"foquita":0,"tommy":0}"#
        );

        // Serde uses the same shape and fills in missing players.
        assert_eq!(serde_json::to_string(&bank).unwrap(), json);
        let partial: BankBalances = serde_json::from_str(r#"{"criss":5,"alan":100}"#).unwrap();
        assert_eq!(partial, bank);
    }
}
