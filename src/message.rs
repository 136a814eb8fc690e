use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which exchange family a message belongs to; used as a log label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Deposit,
    Withdraw,
}

impl MessageKind {
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::Deposit => "DEPOSIT",
            MessageKind::Withdraw => "WITHDRAW",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxnStatus {
    Success,
    Failed,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxnMethod {
    Deposit,
    Withdraw,
}

impl From<MessageKind> for TxnMethod {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Deposit => TxnMethod::Deposit,
            MessageKind::Withdraw => TxnMethod::Withdraw,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TxnAccount {
    pub number: String,
    pub currency: String,
    pub bank_code: String,
}

impl TxnAccount {
    pub fn new(number: &str, currency: &str, bank_code: &str) -> Self {
        TxnAccount {
            number: number.to_string(),
            currency: currency.to_string(),
            bank_code: bank_code.to_string(),
        }
    }
}

/// A deposit or withdrawal as it travels over the wire.
///
/// The amount serializes as a JSON string. A JSON number is also accepted
/// when decoding and is read from its literal digits, never through `f64`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    pub txn_id: String,
    pub payment_ref_id: String,
    pub status: TxnStatus,
    pub method: TxnMethod,
    pub amount: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub payee: TxnAccount,
    pub payor: TxnAccount,
}

const SAMPLE_CURRENCY: &str = "LAK";
const SAMPLE_BANK: &str = "JDB";

impl TransactionMessage {
    /// Sample deposit crediting `account_id`, with a random amount below 10 000.00.
    pub fn sample_deposit(account_id: &str) -> Self {
        let now = Utc::now();
        TransactionMessage {
            txn_id: format!("DEP{}", now.format("%Y%m%d%H%M%S")),
            payment_ref_id: format!("REF{}", now.format("%Y%m%d%H%M%S")),
            status: TxnStatus::Success,
            method: TxnMethod::Deposit,
            amount: random_amount(),
            currency: SAMPLE_CURRENCY.to_string(),
            timestamp: now,
            payee: TxnAccount::new(account_id, SAMPLE_CURRENCY, SAMPLE_BANK),
            payor: TxnAccount::new("unassigned", "unassigned", "unassigned"),
        }
    }

    /// Sample withdrawal debiting `account_id` towards a fixed external payee.
    pub fn sample_withdraw(account_id: &str) -> Self {
        let now = Utc::now();
        TransactionMessage {
            txn_id: format!("WDR{}", now.format("%Y%m%d%H%M%S")),
            payment_ref_id: format!("REF{}", now.format("%Y%m%d%H%M%S")),
            status: TxnStatus::Success,
            method: TxnMethod::Withdraw,
            amount: random_amount(),
            currency: SAMPLE_CURRENCY.to_string(),
            timestamp: now,
            payee: TxnAccount::new("1023635xxx", SAMPLE_CURRENCY, "KBANK"),
            payor: TxnAccount::new(account_id, SAMPLE_CURRENCY, SAMPLE_BANK),
        }
    }

    pub fn sample(kind: MessageKind, account_id: &str) -> Self {
        match kind {
            MessageKind::Deposit => Self::sample_deposit(account_id),
            MessageKind::Withdraw => Self::sample_withdraw(account_id),
        }
    }
}

/// Indented JSON for logs; bodies that are not JSON are shown as text.
pub fn pretty_body(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned())
}

// Minor units with two decimal places.
fn random_amount() -> Decimal {
    let minor: i64 = rand::rng().random_range(0..1_000_000);
    Decimal::new(minor, 2)
}
