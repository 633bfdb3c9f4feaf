//! Solana JSON-RPC [`Ledger`] implementation.

use std::time::Duration;

use common::{operations::Verify, Lamports};
use serde::Deserialize;
use tracerr::Traced;
use tracing as log;

use super::{Denial, Error, Ledger, Payment, Verdict};

/// [`SolanaRpc`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// URL of the Solana JSON-RPC endpoint to read transactions from.
    pub rpc_url: String,

    /// Timeout of a single RPC request.
    ///
    /// Hitting it is a transient [`Error`], not a [`Verdict`].
    pub timeout: Duration,
}

/// [`Ledger`] client reading transactions from a Solana JSON-RPC endpoint.
#[derive(Clone, Debug)]
pub struct SolanaRpc {
    /// HTTP client to perform RPC requests with.
    client: reqwest::Client,

    /// URL of the RPC endpoint.
    url: String,
}

impl SolanaRpc {
    /// Creates a new [`SolanaRpc`] client with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If failed to initialize the underlying HTTP client.
    pub fn new(conf: &Config) -> Result<Self, Traced<Error>> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(conf.timeout)
                .build()
                .map_err(tracerr::from_and_wrap!(=> Error))?,
            url: conf.rpc_url.clone(),
        })
    }
}

impl Ledger<Verify<Payment>> for SolanaRpc {
    type Ok = Verdict;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Verify(payment): Verify<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTransaction",
            "params": [payment.signature, {
                "commitment": "confirmed",
                "maxSupportedTransactionVersion": 0,
            }],
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(tracerr::from_and_wrap!(=> Error))?
            .json::<GetTransactionResponse>()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        if let Some(e) = response.error {
            log::warn!(
                code = e.code,
                message = %e.message,
                "ledger RPC error",
            );
            return Err(tracerr::new!(Error::Rpc {
                code: e.code,
                message: e.message,
            }));
        }

        Ok(evaluate(&payment, response.result.as_ref()))
    }
}

/// Evaluates the [`Verdict`] for the `payment` over the fetched transaction.
fn evaluate(payment: &Payment, tx: Option<&Transaction>) -> Verdict {
    use Denial as D;

    let Some(tx) = tx else {
        return Verdict::Rejected(D::TxNotFound);
    };

    if tx.meta.as_ref().is_some_and(|m| m.err.is_some()) {
        return Verdict::Rejected(D::TxFailed);
    }

    let Some(index) = tx
        .transaction
        .message
        .account_keys
        .iter()
        .position(|k| k.pubkey() == AsRef::<str>::as_ref(&payment.receiver))
    else {
        return Verdict::Rejected(D::ReceiverNotInTx);
    };

    let balance = |of: fn(&Meta) -> &Vec<u64>| {
        tx.meta
            .as_ref()
            .and_then(|m| of(m).get(index).copied())
            .unwrap_or(0)
    };
    let pre = balance(|m| &m.pre_balances);
    let post = balance(|m| &m.post_balances);
    let delta = i128::from(post) - i128::from(pre);

    // A negative delta reads as a zero received amount.
    let received = Lamports::from(u64::try_from(delta).unwrap_or_default());

    if delta >= i128::from(u64::from(payment.min_amount)) {
        Verdict::Confirmed { received }
    } else {
        Verdict::Rejected(D::InsufficientAmount { received })
    }
}

/// Response of the `getTransaction` RPC method.
#[derive(Debug, Deserialize)]
struct GetTransactionResponse {
    /// Fetched transaction, if any.
    result: Option<Transaction>,

    /// RPC-level error, if any.
    error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
struct RpcError {
    /// Error code.
    code: i64,

    /// Human-readable error message.
    message: String,
}

/// Confirmed transaction record.
#[derive(Debug, Deserialize)]
struct Transaction {
    /// Execution metadata of the transaction.
    meta: Option<Meta>,

    /// Transaction itself.
    transaction: TransactionData,
}

/// Execution metadata of a transaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    /// On-chain execution error, if the transaction failed.
    err: Option<serde_json::Value>,

    /// Participants' balances before the transaction, in lamports.
    #[serde(default)]
    pre_balances: Vec<u64>,

    /// Participants' balances after the transaction, in lamports.
    #[serde(default)]
    post_balances: Vec<u64>,
}

/// Payload of a transaction.
#[derive(Debug, Deserialize)]
struct TransactionData {
    /// Message of the transaction.
    message: Message,
}

/// Message of a transaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    /// Addresses participating in the transaction.
    #[serde(default)]
    account_keys: Vec<AccountKey>,
}

/// Participant address of a transaction.
///
/// Encoded either as a plain string, or as an object with a `pubkey` field,
/// depending on the requested transaction encoding.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountKey {
    /// Plain address.
    Plain(String),

    /// Address with participation metadata.
    Keyed {
        /// The address itself.
        pubkey: String,
    },
}

impl AccountKey {
    /// Returns the address of this [`AccountKey`].
    fn pubkey(&self) -> &str {
        match self {
            Self::Plain(key) => key,
            Self::Keyed { pubkey } => pubkey,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::Lamports;

    use crate::{
        domain::session::{Receiver, Signature},
        infra::ledger::{Denial, Payment, Verdict},
    };

    use super::{evaluate, GetTransactionResponse};

    const RECEIVER: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    fn payment(min_amount: u64) -> Payment {
        Payment {
            signature: Signature::new("A".repeat(64)).unwrap(),
            receiver: Receiver::new(RECEIVER).unwrap(),
            min_amount: Lamports::from(min_amount),
        }
    }

    fn parse(json: &str) -> GetTransactionResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn missing_transaction_is_not_found() {
        let response = parse(r#"{"jsonrpc":"2.0","id":1,"result":null}"#);

        assert_eq!(
            evaluate(&payment(10_000_000), response.result.as_ref()),
            Verdict::Rejected(Denial::TxNotFound),
        );
    }

    #[test]
    fn failed_transaction_cannot_pay() {
        let response = parse(&format!(
            r#"{{"result":{{
                "meta":{{
                    "err":{{"InstructionError":[0,"Custom"]}},
                    "preBalances":[0,0],
                    "postBalances":[0,20000000]
                }},
                "transaction":{{"message":{{"accountKeys":["sender","{RECEIVER}"]}}}}
            }}}}"#,
        ));

        assert_eq!(
            evaluate(&payment(10_000_000), response.result.as_ref()),
            Verdict::Rejected(Denial::TxFailed),
        );
    }

    #[test]
    fn absent_receiver_is_rejected_regardless_of_amounts() {
        let response = parse(
            r#"{"result":{
                "meta":{"err":null,"preBalances":[0],"postBalances":[99000000000]},
                "transaction":{"message":{"accountKeys":["someone-else"]}}
            }}"#,
        );

        assert_eq!(
            evaluate(&payment(10_000_000), response.result.as_ref()),
            Verdict::Rejected(Denial::ReceiverNotInTx),
        );
    }

    #[test]
    fn insufficient_delta_reports_received_amount() {
        let response = parse(&format!(
            r#"{{"result":{{
                "meta":{{
                    "err":null,
                    "preBalances":[100,1000000],
                    "postBalances":[50,6000000]
                }},
                "transaction":{{"message":{{"accountKeys":["sender","{RECEIVER}"]}}}}
            }}}}"#,
        ));

        assert_eq!(
            evaluate(&payment(10_000_000), response.result.as_ref()),
            Verdict::Rejected(Denial::InsufficientAmount {
                received: Lamports::from(5_000_000),
            }),
        );
    }

    #[test]
    fn sufficient_delta_is_confirmed() {
        let response = parse(&format!(
            r#"{{"result":{{
                "meta":{{
                    "err":null,
                    "preBalances":[20000000,5000000],
                    "postBalances":[9000000,15000000]
                }},
                "transaction":{{"message":{{"accountKeys":["sender","{RECEIVER}"]}}}}
            }}}}"#,
        ));

        assert_eq!(
            evaluate(&payment(10_000_000), response.result.as_ref()),
            Verdict::Confirmed {
                received: Lamports::from(10_000_000),
            },
        );
    }

    #[test]
    fn keyed_account_entries_are_resolved() {
        let response = parse(&format!(
            r#"{{"result":{{
                "meta":{{
                    "err":null,
                    "preBalances":[0,0],
                    "postBalances":[0,10000000]
                }},
                "transaction":{{"message":{{"accountKeys":[
                    {{"pubkey":"sender","signer":true}},
                    {{"pubkey":"{RECEIVER}","signer":false}}
                ]}}}}
            }}}}"#,
        ));

        assert_eq!(
            evaluate(&payment(10_000_000), response.result.as_ref()),
            Verdict::Confirmed {
                received: Lamports::from(10_000_000),
            },
        );
    }

    #[test]
    fn missing_balances_read_as_zero() {
        let response = parse(&format!(
            r#"{{"result":{{
                "meta":{{"err":null}},
                "transaction":{{"message":{{"accountKeys":["{RECEIVER}"]}}}}
            }}}}"#,
        ));

        assert_eq!(
            evaluate(&payment(10_000_000), response.result.as_ref()),
            Verdict::Rejected(Denial::InsufficientAmount {
                received: Lamports::from(0),
            }),
        );
    }
}
