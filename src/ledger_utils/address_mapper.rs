use crate::error::{LedgerError, LedgerResult};
use crate::wallet::{Party, WalletExport, WalletId, WalletRegistry};
use std::collections::{BTreeMap, HashMap};

pub trait AddressMapper {
    fn map_address(&self, address: &str) -> LedgerResult<WalletId>;

    /// Untracked addresses (vendors, external recipients) end up in the `external` bucket.
    fn map_party(&self, address: &str) -> Party {
        match self.map_address(address) {
            Ok(wallet) => Party::Wallet(wallet),
            Err(err) => {
                tracing::trace!("{}", err);
                Party::External
            }
        }
    }
}

impl AddressMapper for WalletRegistry {
    fn map_address(&self, address: &str) -> LedgerResult<WalletId> {
        self.owner_of(address)
    }
}

/// Address ownership as loaded back from `wallets.json`.
#[derive(Default)]
pub struct AddressBook {
    owners: HashMap<String, WalletId>,
}

impl AddressBook {
    pub fn from_export(export: &BTreeMap<WalletId, WalletExport>) -> Self {
        let owners = export
            .iter()
            .flat_map(|(wallet, export)| {
                export
                    .addresses
                    .iter()
                    .map(move |address| (address.clone(), *wallet))
            })
            .collect();
        Self { owners }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl AddressMapper for AddressBook {
    fn map_address(&self, address: &str) -> LedgerResult<WalletId> {
        self.owners
            .get(address)
            .copied()
            .ok_or_else(|| LedgerError::UnknownWallet(address.to_string()))
    }
}
