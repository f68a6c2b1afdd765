use crate::tx_event::{TxDocument, TxRecord, TxType};
use crate::wallet::Party;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletActivity {
    pub incoming: usize,
    pub outgoing: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub source: Party,
    pub destination: Party,
    pub count: usize,
    pub satoshis: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_transactions: usize,
    pub transaction_types: BTreeMap<TxType, usize>,
    pub wallets: BTreeMap<Party, WalletActivity>,
    /// written separately to `flows.json`
    #[serde(skip)]
    pub flows: Vec<Flow>,
}

#[derive(Default)]
pub struct StatsAccumulator {
    total: usize,
    by_type: BTreeMap<TxType, usize>,
    by_party: BTreeMap<Party, WalletActivity>,
    flows: BTreeMap<(Party, Party), (usize, u64)>,
}

impl StatsAccumulator {
    pub fn add_stats(&mut self, tx_type: TxType, source: Party, destination: Party, sats: u64) {
        self.total += 1;
        *self.by_type.entry(tx_type).or_default() += 1;
        self.by_party.entry(source).or_default().outgoing += 1;
        self.by_party.entry(destination).or_default().incoming += 1;

        let flow = self.flows.entry((source, destination)).or_default();
        flow.0 += 1;
        flow.1 += sats;
    }

    pub fn add_record(&mut self, record: &TxRecord) {
        self.add_stats(
            record.tx_type(),
            record.source(),
            record.destination(),
            record.output().sats,
        );
    }

    pub fn add_document(&mut self, document: &TxDocument) {
        self.add_stats(
            document.tx_type,
            document.source(),
            document.destination(),
            document.satoshis,
        );
    }

    pub fn summary(self) -> Summary {
        Summary {
            total_transactions: self.total,
            transaction_types: self.by_type,
            wallets: self.by_party,
            flows: self
                .flows
                .into_iter()
                .map(|((source, destination), (count, satoshis))| Flow {
                    source,
                    destination,
                    count,
                    satoshis,
                })
                .collect(),
        }
    }
}

/// Orders the log by block height (stable) and summarizes it in one pass.
pub fn finalize(mut transactions: Vec<TxRecord>) -> (Vec<TxRecord>, Summary) {
    transactions.sort_by_key(|record| record.block_height);

    let mut stats = StatsAccumulator::default();
    for record in transactions.iter() {
        stats.add_record(record);
    }

    (transactions, stats.summary())
}
