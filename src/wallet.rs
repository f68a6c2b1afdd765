use crate::error::{LedgerError, LedgerResult};
use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey, SignOnly};
use bitcoin::{Address, Network, PrivateKey};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WalletId {
    #[serde(rename = "A")]
    Invoicing,
    #[serde(rename = "B")]
    Treasury,
    #[serde(rename = "C")]
    Checking,
}

impl WalletId {
    pub const ALL: [WalletId; 3] = [WalletId::Invoicing, WalletId::Treasury, WalletId::Checking];

    pub fn label(&self) -> &'static str {
        match self {
            WalletId::Invoicing => "A",
            WalletId::Treasury => "B",
            WalletId::Checking => "C",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WalletId::Invoicing => "Invoicing",
            WalletId::Treasury => "Treasury",
            WalletId::Checking => "Checking",
        }
    }

    pub fn from_label(label: &str) -> Option<WalletId> {
        WalletId::ALL.into_iter().find(|id| id.label() == label)
    }

    fn index(&self) -> usize {
        match self {
            WalletId::Invoicing => 0,
            WalletId::Treasury => 1,
            WalletId::Checking => 2,
        }
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Either side of a transaction. Anything outside the three tracked wallets is `External`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Party {
    Wallet(WalletId),
    External,
}

impl Party {
    pub const EXTERNAL_LABEL: &'static str = "external";

    pub fn from_label(label: &str) -> Party {
        match WalletId::from_label(label) {
            Some(id) => Party::Wallet(id),
            None => {
                if label != Self::EXTERNAL_LABEL {
                    tracing::debug!("{}, counted as external", LedgerError::UnknownWallet(label.to_string()));
                }
                Party::External
            }
        }
    }

    pub fn wallet(&self) -> Option<WalletId> {
        match self {
            Party::Wallet(id) => Some(*id),
            Party::External => None,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Wallet(id) => f.write_str(id.label()),
            Party::External => f.write_str(Self::EXTERNAL_LABEL),
        }
    }
}

impl Serialize for Party {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Party {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Party::from_label(&label))
    }
}

/// Every address is a P2WPKH address on this network.
pub const NETWORK: Network = Network::Regtest;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletAddress {
    pub address: String,
    /// WIF
    pub private_key: String,
}

#[derive(Clone, Debug)]
pub struct Wallet {
    pub id: WalletId,
    pub name: String,
    master_key: [u8; 32],
    addresses: Vec<WalletAddress>,
    secp: Secp256k1<SignOnly>,
}

impl Wallet {
    fn new(id: WalletId, master_key: [u8; 32], pool_size: usize) -> Self {
        let mut wallet = Self {
            id,
            name: id.display_name().to_string(),
            master_key,
            addresses: Vec::with_capacity(pool_size),
            secp: Secp256k1::signing_only(),
        };
        // every wallet owns at least one address to receive change on
        for _ in 0..pool_size.max(1) {
            wallet.derive_next_address();
        }
        wallet
    }

    fn derive_next_address(&mut self) -> &WalletAddress {
        let index = self.addresses.len() as u64;
        let mut hasher = Sha256::new();
        hasher.update(self.master_key);
        hasher.update(index.to_be_bytes());
        let secret_key = secret_key_from_seed(hasher.finalize().into());
        let public_key = CompressedPublicKey(PublicKey::from_secret_key(&self.secp, &secret_key));

        self.addresses.push(WalletAddress {
            address: Address::p2wpkh(&public_key, NETWORK).to_string(),
            private_key: PrivateKey::new(secret_key, NETWORK).to_wif(),
        });
        &self.addresses[self.addresses.len() - 1]
    }

    pub fn addresses(&self) -> &[WalletAddress] {
        &self.addresses
    }

    pub fn master_public_key(&self) -> String {
        hex::encode(Sha256::digest(self.master_key))
    }

    pub fn first_address(&self) -> &str {
        self.addresses[0].address.as_str()
    }

    pub fn random_address<R: Rng>(&self, rng: &mut R) -> &str {
        self.addresses[rng.gen_range(0..self.addresses.len())]
            .address
            .as_str()
    }
}

/// Rehashes until the bytes are a valid secp256k1 scalar, which almost always holds at once.
fn secret_key_from_seed(mut seed: [u8; 32]) -> SecretKey {
    loop {
        match SecretKey::from_slice(&seed) {
            Ok(secret_key) => return secret_key,
            Err(_) => seed = Sha256::digest(seed).into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletExport {
    pub name: String,
    pub addresses: Vec<String>,
}

pub struct WalletRegistry {
    wallets: [Wallet; 3],
    owners: HashMap<String, WalletId>,
}

impl WalletRegistry {
    /// Draws one master key per wallet (in A, B, C order) and derives each address pool.
    pub fn create_wallets<R: Rng>(rng: &mut R, pool_sizes: [usize; 3]) -> Self {
        let wallets = WalletId::ALL.map(|id| {
            let master_key: [u8; 32] = rng.gen();
            Wallet::new(id, master_key, pool_sizes[id.index()])
        });

        let mut owners = HashMap::new();
        for wallet in wallets.iter() {
            tracing::debug!(
                "wallet {} master public key {}",
                wallet.id,
                wallet.master_public_key()
            );
            for address in wallet.addresses.iter() {
                owners.insert(address.address.clone(), wallet.id);
            }
        }

        tracing::info!(
            "Created wallets: {}",
            wallets
                .iter()
                .map(|wallet| format!("{} ({} addresses)", wallet.name, wallet.addresses.len()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self { wallets, owners }
    }

    pub fn wallet(&self, id: WalletId) -> &Wallet {
        &self.wallets[id.index()]
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.iter()
    }

    /// Grows the wallet's pool by one address and returns it.
    pub fn derive_next_address(&mut self, id: WalletId) -> String {
        let address = self.wallets[id.index()]
            .derive_next_address()
            .address
            .clone();
        self.owners.insert(address.clone(), id);
        address
    }

    pub fn owner_of(&self, address: &str) -> LedgerResult<WalletId> {
        self.owners
            .get(address)
            .copied()
            .ok_or_else(|| LedgerError::UnknownWallet(address.to_string()))
    }

    pub fn export(&self) -> BTreeMap<WalletId, WalletExport> {
        self.wallets
            .iter()
            .map(|wallet| {
                (
                    wallet.id,
                    WalletExport {
                        name: wallet.name.clone(),
                        addresses: wallet
                            .addresses
                            .iter()
                            .map(|address| address.address.clone())
                            .collect(),
                    },
                )
            })
            .collect()
    }
}
