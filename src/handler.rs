// src/handler.rs
use tracing::info;

use crate::message::TransactionMessage;
use crate::rabbitmq::{RabbitMQError, Result};

/// Decode a transaction body and log it.
pub fn handle_transaction_message(body: &[u8]) -> Result<()> {
    let txn = decode_transaction(body)?;

    info!(
        txn_id = %txn.txn_id,
        payment_ref_id = %txn.payment_ref_id,
        status = ?txn.status,
        method = ?txn.method,
        amount = %txn.amount,
        currency = %txn.currency,
        timestamp = %txn.timestamp.to_rfc3339(),
        payee_account = %txn.payee.number,
        payee_bank = %txn.payee.bank_code,
        payor_account = %txn.payor.number,
        payor_bank = %txn.payor.bank_code,
        "Processing transaction"
    );

    Ok(())
}

pub fn decode_transaction(body: &[u8]) -> Result<TransactionMessage> {
    serde_json::from_slice(body).map_err(RabbitMQError::Decoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, TxnMethod};

    #[test]
    fn test_valid_transaction_is_handled() {
        let msg = TransactionMessage::sample(MessageKind::Withdraw, "70120010010106020");
        let body = serde_json::to_vec(&msg).unwrap();
        assert!(handle_transaction_message(&body).is_ok());
        assert_eq!(decode_transaction(&body).unwrap().method, TxnMethod::Withdraw);
    }

    #[test]
    fn test_garbage_is_a_decoding_error() {
        let err = handle_transaction_message(b"not json").unwrap_err();
        assert!(matches!(err, RabbitMQError::Decoding(_)));
    }

    #[test]
    fn test_missing_field_is_a_decoding_error() {
        let err = handle_transaction_message(br#"{"txnId":"DEP1"}"#).unwrap_err();
        assert!(matches!(err, RabbitMQError::Decoding(_)));
    }
}
