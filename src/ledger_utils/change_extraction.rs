use crate::tx_event::{OutPoint, TxDocument, TxOutput};

pub const PAYMENT_VOUT: u32 = 0;
pub const CHANGE_VOUT: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputsStructure {
    pub payment: (OutPoint, TxOutput),
    pub change: Option<(OutPoint, TxOutput)>,
}

impl OutputsStructure {
    pub fn total(&self) -> u64 {
        self.payment.1.sats + self.change.as_ref().map_or(0, |(_, output)| output.sats)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(OutPoint, TxOutput)> {
        std::iter::once(&self.payment).chain(self.change.iter())
    }
}

/// Payment is vout 0. A change output is vout 1 and exists only when both its address and a
/// non-zero amount are present.
pub fn extract_changes(document: &TxDocument) -> OutputsStructure {
    let payment = (
        OutPoint::new(document.txid.clone(), PAYMENT_VOUT),
        TxOutput::new(document.to_address.clone(), document.satoshis),
    );

    let change = match (&document.change_address, document.change_satoshis) {
        (Some(address), Some(sats)) if sats > 0 => Some((
            OutPoint::new(document.txid.clone(), CHANGE_VOUT),
            TxOutput::new(address.clone(), sats),
        )),
        _ => None,
    };

    OutputsStructure { payment, change }
}

#[cfg(test)]
mod tests {
    use crate::ledger_utils::change_extraction::extract_changes;
    use crate::tx_event::{OutPoint, TxDocument, TxOutput, TxType};
    use chrono::NaiveDate;

    fn document(change_address: Option<&str>, change_satoshis: Option<u64>) -> TxDocument {
        TxDocument {
            txid: "vendor_payment_4".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            block_height: 12000,
            inputs: vec![OutPoint::new("vendor_payment_3", 1)],
            usd_amount: Some(120.0),
            btc_amount: Some(0.002),
            satoshis: 200_000,
            to_address: "vendor_4".to_string(),
            change_address: change_address.map(|address| address.to_string()),
            change_satoshis,
            wallet: None,
            wallet_from: "C".to_string(),
            wallet_to: "external".to_string(),
            tx_type: TxType::VendorPayment,
            bootstrap: false,
        }
    }

    #[test]
    fn check_split_with_change() {
        let result = extract_changes(&document(Some("c_0"), Some(50)));
        assert_eq!(
            result.payment,
            (
                OutPoint::new("vendor_payment_4", 0),
                TxOutput::new("vendor_4", 200_000)
            )
        );
        assert_eq!(
            result.change,
            Some((OutPoint::new("vendor_payment_4", 1), TxOutput::new("c_0", 50)))
        );
        assert_eq!(result.total(), 200_050);
        assert_eq!(result.iter().count(), 2);
    }

    #[test]
    fn check_split_without_change() {
        for (address, sats) in [(None, None), (Some("c_0"), Some(0)), (Some("c_0"), None)] {
            let result = extract_changes(&document(address, sats));
            assert_eq!(result.change, None);
            assert_eq!(result.total(), 200_000);
            assert_eq!(result.iter().count(), 1);
        }
    }
}
