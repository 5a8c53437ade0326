//! Wallet data source abstractions and wire types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// `status` value the API uses for a successful response.
pub const STATUS_OK: &str = "1";
/// `status` value the API uses for soft failures such as "no records".
pub const STATUS_SOFT_ERROR: &str = "0";

/// Hard failure talking to the remote API. Soft API errors are not
/// represented here; they come back as an [`ApiEnvelope`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP Status {0}")]
    Status(u16),
    #[error("Request error: {0}")]
    Network(String),
    #[error("Invalid response body: {0}")]
    Decode(String),
}

/// Response envelope shared by every API action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    /// Missing on some error bodies; treated like any non-ok status.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

impl ApiEnvelope {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Raw wei balance, when the envelope is a successful balance response.
    pub fn balance_wei(&self) -> Option<&str> {
        if self.is_ok() {
            self.result.as_str()
        } else {
            None
        }
    }

    /// Transactions carried by a successful txlist response.
    pub fn transactions(&self) -> Result<Vec<Transaction>, FetchError> {
        if !self.is_ok() {
            return Ok(Vec::new());
        }
        serde_json::from_value(self.result.clone()).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// A transaction as reported by the explorer API. Fields are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub block_number: String,
    pub time_stamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub is_error: String,
    #[serde(rename = "txreceipt_status")]
    pub txreceipt_status: String,
    pub input: String,
    pub contract_address: String,
    pub cumulative_gas_used: String,
    pub gas_used: String,
    pub confirmations: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

#[async_trait]
pub trait WalletSource: Send + Sync {
    async fn fetch_balance(&self, address: &str) -> Result<ApiEnvelope, FetchError>;

    async fn fetch_transactions(
        &self,
        address: &str,
        page: u32,
        offset: u32,
    ) -> Result<ApiEnvelope, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transaction_deserialization() {
        let raw = json!({
            "blockNumber": "1204",
            "timeStamp": "1717171717",
            "hash": "0xabc",
            "from": "0x0026",
            "to": "0x0042",
            "value": "1500000000000000000",
            "gas": "21000",
            "gasPrice": "1000",
            "isError": "0",
            "txreceipt_status": "1",
            "input": "0x",
            "contractAddress": "",
            "cumulativeGasUsed": "21000",
            "gasUsed": "21000",
            "confirmations": "7",
            "functionName": "transfer(address,uint256)"
        });

        let tx: Transaction = serde_json::from_value(raw).unwrap();
        assert_eq!(tx.block_number, "1204");
        assert_eq!(tx.time_stamp, "1717171717");
        assert_eq!(tx.gas_price, "1000");
        assert_eq!(tx.txreceipt_status, "1");
        assert_eq!(tx.cumulative_gas_used, "21000");
        assert!(tx.method_id.is_none());
        assert_eq!(tx.function_name.as_deref(), Some("transfer(address,uint256)"));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let tx: Transaction = serde_json::from_value(json!({ "hash": "0x1" })).unwrap();
        assert_eq!(tx.hash, "0x1");
        assert_eq!(tx.value, "");
        assert_eq!(tx.confirmations, "");
    }

    #[test]
    fn test_envelope_accessors() {
        let balance: ApiEnvelope =
            serde_json::from_value(json!({"status": "1", "message": "OK", "result": "42"}))
                .unwrap();
        assert!(balance.is_ok());
        assert_eq!(balance.balance_wei(), Some("42"));

        let empty: ApiEnvelope = serde_json::from_value(
            json!({"status": "0", "message": "No transactions found", "result": []}),
        )
        .unwrap();
        assert!(!empty.is_ok());
        assert_eq!(empty.balance_wei(), None);
        assert!(empty.transactions().unwrap().is_empty());

        let soft_string: ApiEnvelope = serde_json::from_value(
            json!({"status": "0", "message": "NOTOK", "result": "Error! Invalid address format"}),
        )
        .unwrap();
        assert!(soft_string.transactions().unwrap().is_empty());
    }

    #[test]
    fn test_status_less_body_is_not_ok() {
        let envelope: ApiEnvelope =
            serde_json::from_value(json!({"message": "rate limited", "result": "5"})).unwrap();
        assert!(!envelope.is_ok());
        assert_eq!(envelope.balance_wei(), None);
        assert!(envelope.transactions().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_transaction_list_is_decode_error() {
        let envelope: ApiEnvelope =
            serde_json::from_value(json!({"status": "1", "message": "OK", "result": "oops"}))
                .unwrap();
        assert!(matches!(
            envelope.transactions(),
            Err(FetchError::Decode(_))
        ));
    }
}
