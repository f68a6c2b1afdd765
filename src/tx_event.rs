use crate::exchange_rate::smallest_unit_to_native;
use crate::wallet::{Party, WalletId};
use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for OutPoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, vout) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("can't parse outpoint: {:?}", s))?;
        if txid.is_empty() {
            return Err(anyhow!("outpoint without txid: {:?}", s));
        }
        Ok(OutPoint::new(txid, u32::from_str(vout)?))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Invoice,
    Consolidation,
    Transfer,
    VendorPayment,
    TreasuryOutgoing,
    TreasuryIncoming,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Invoice => "invoice",
            TxType::Consolidation => "consolidation",
            TxType::Transfer => "transfer",
            TxType::VendorPayment => "vendor_payment",
            TxType::TreasuryOutgoing => "treasury_outgoing",
            TxType::TreasuryIncoming => "treasury_incoming",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub address: String,
    pub sats: u64,
}

impl TxOutput {
    pub fn new(address: impl Into<String>, sats: u64) -> Self {
        Self {
            address: address.into(),
            sats,
        }
    }
}

/// Fiat intent a payment was derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FiatQuote {
    pub usd: f64,
    pub btc: f64,
}

/// One variant per transaction type; each carries only what that type needs.
/// The primary output is always vout 0, change (if any) is vout 1.
#[derive(Clone, Debug, PartialEq)]
pub enum TxKind {
    Invoice {
        quote: FiatQuote,
        output: TxOutput,
    },
    Consolidation {
        inputs: Vec<OutPoint>,
        output: TxOutput,
    },
    Transfer {
        inputs: Vec<OutPoint>,
        output: TxOutput,
        change: Option<TxOutput>,
        bootstrap: bool,
    },
    VendorPayment {
        input: OutPoint,
        quote: FiatQuote,
        output: TxOutput,
        change: Option<TxOutput>,
    },
    TreasuryOutgoing {
        inputs: Vec<OutPoint>,
        quote: FiatQuote,
        output: TxOutput,
        change: Option<TxOutput>,
    },
    TreasuryIncoming {
        source: OutPoint,
        quote: FiatQuote,
        output: TxOutput,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TxRecord {
    pub txid: String,
    pub date: NaiveDate,
    pub block_height: u64,
    pub kind: TxKind,
}

impl TxRecord {
    pub fn tx_type(&self) -> TxType {
        match self.kind {
            TxKind::Invoice { .. } => TxType::Invoice,
            TxKind::Consolidation { .. } => TxType::Consolidation,
            TxKind::Transfer { .. } => TxType::Transfer,
            TxKind::VendorPayment { .. } => TxType::VendorPayment,
            TxKind::TreasuryOutgoing { .. } => TxType::TreasuryOutgoing,
            TxKind::TreasuryIncoming { .. } => TxType::TreasuryIncoming,
        }
    }

    pub fn source(&self) -> Party {
        match self.kind {
            TxKind::Invoice { .. } | TxKind::TreasuryIncoming { .. } => Party::External,
            TxKind::Consolidation { .. } => Party::Wallet(WalletId::Invoicing),
            TxKind::Transfer { .. } | TxKind::TreasuryOutgoing { .. } => {
                Party::Wallet(WalletId::Treasury)
            }
            TxKind::VendorPayment { .. } => Party::Wallet(WalletId::Checking),
        }
    }

    pub fn destination(&self) -> Party {
        match self.kind {
            TxKind::Invoice { .. } => Party::Wallet(WalletId::Invoicing),
            TxKind::Consolidation { .. } | TxKind::TreasuryIncoming { .. } => {
                Party::Wallet(WalletId::Treasury)
            }
            TxKind::Transfer { .. } => Party::Wallet(WalletId::Checking),
            TxKind::VendorPayment { .. } | TxKind::TreasuryOutgoing { .. } => Party::External,
        }
    }

    /// Pointers consumed by this transaction, external sources included.
    pub fn inputs(&self) -> Vec<OutPoint> {
        match &self.kind {
            TxKind::Invoice { .. } => vec![],
            TxKind::Consolidation { inputs, .. }
            | TxKind::Transfer { inputs, .. }
            | TxKind::TreasuryOutgoing { inputs, .. } => inputs.clone(),
            TxKind::VendorPayment { input, .. } => vec![input.clone()],
            TxKind::TreasuryIncoming { source, .. } => vec![source.clone()],
        }
    }

    pub fn output(&self) -> &TxOutput {
        match &self.kind {
            TxKind::Invoice { output, .. }
            | TxKind::Consolidation { output, .. }
            | TxKind::Transfer { output, .. }
            | TxKind::VendorPayment { output, .. }
            | TxKind::TreasuryOutgoing { output, .. }
            | TxKind::TreasuryIncoming { output, .. } => output,
        }
    }

    pub fn change(&self) -> Option<&TxOutput> {
        match &self.kind {
            TxKind::Transfer { change, .. }
            | TxKind::VendorPayment { change, .. }
            | TxKind::TreasuryOutgoing { change, .. } => change.as_ref(),
            _ => None,
        }
    }

    fn quote(&self) -> Option<&FiatQuote> {
        match &self.kind {
            TxKind::Invoice { quote, .. }
            | TxKind::VendorPayment { quote, .. }
            | TxKind::TreasuryOutgoing { quote, .. }
            | TxKind::TreasuryIncoming { quote, .. } => Some(quote),
            _ => None,
        }
    }

    /// Maps the record onto the flat document schema shared by every type.
    pub fn to_document(&self) -> TxDocument {
        let output = self.output();
        let quote = self.quote();
        let change = self.change();
        TxDocument {
            txid: self.txid.clone(),
            date: self.date,
            block_height: self.block_height,
            inputs: self.inputs(),
            usd_amount: quote.map(|quote| round_cents(quote.usd)),
            btc_amount: Some(
                quote
                    .map(|quote| quote.btc)
                    .unwrap_or_else(|| smallest_unit_to_native(output.sats)),
            ),
            satoshis: output.sats,
            to_address: output.address.clone(),
            change_address: change.map(|change| change.address.clone()),
            change_satoshis: change.map(|change| change.sats),
            wallet: match self.kind {
                TxKind::Invoice { .. } => Some(WalletId::Invoicing.to_string()),
                _ => None,
            },
            wallet_from: self.source().to_string(),
            wallet_to: self.destination().to_string(),
            tx_type: self.tx_type(),
            bootstrap: matches!(
                self.kind,
                TxKind::Transfer {
                    bootstrap: true,
                    ..
                }
            ),
        }
    }
}

fn round_cents(usd: f64) -> f64 {
    (usd * 100.0).round() / 100.0
}

/// Transaction as persisted to the `*_transactions.json` files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxDocument {
    pub txid: String,
    pub date: NaiveDate,
    pub block_height: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<OutPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btc_amount: Option<f64>,
    #[serde(default)]
    pub satoshis: u64,
    pub to_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_satoshis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    pub wallet_from: String,
    pub wallet_to: String,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bootstrap: bool,
}

impl TxDocument {
    pub fn amount_btc(&self) -> f64 {
        self.btc_amount
            .unwrap_or_else(|| smallest_unit_to_native(self.satoshis))
    }

    pub fn source(&self) -> Party {
        Party::from_label(self.wallet_from.as_str())
    }

    pub fn destination(&self) -> Party {
        Party::from_label(self.wallet_to.as_str())
    }
}
