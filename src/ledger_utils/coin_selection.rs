use crate::ledger_utils::utxo_ledger::Utxo;
use crate::tx_event::OutPoint;
use itertools::Itertools;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Selection {
    pub inputs: Vec<Utxo>,
    pub total: u64,
}

impl Selection {
    pub fn pointers(&self) -> Vec<OutPoint> {
        self.inputs
            .iter()
            .map(|utxo| utxo.pointer.clone())
            .collect()
    }

    /// What is left over once `target` is paid. Zero if the selection doesn't cover it.
    pub fn change_for(&self, target: u64) -> u64 {
        self.total.saturating_sub(target)
    }

    /// Address of the biggest input; inputs are kept in selection order.
    pub fn largest_input_address(&self) -> Option<&str> {
        self.inputs.first().map(|utxo| utxo.address.as_str())
    }
}

/// Largest amounts first until the target is covered. Equal amounts keep their insertion order.
/// Returns `None` when all of `available` together is below the target.
pub fn select_largest_first(available: &[Utxo], target: u64) -> Option<Selection> {
    let mut selection = Selection::default();
    if target == 0 {
        return Some(selection);
    }

    for utxo in available
        .iter()
        .sorted_by(|left, right| right.amount.cmp(&left.amount))
    {
        selection.total += utxo.amount;
        selection.inputs.push(utxo.clone());
        if selection.total >= target {
            return Some(selection);
        }
    }

    None
}
