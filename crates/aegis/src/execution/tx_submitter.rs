//! Transaction submitter: wallet signing, broadcast and receipt tracking.
//!
//! The provider carries a wallet filler, so nonce, gas and chain id are
//! filled and the request is signed locally before `eth_sendRawTransaction`.
//! Submission is split in two steps so the caller can publish the hash
//! before the receipt arrives.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::{RpcError, TransportErrorKind};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::AegisError;
use crate::execution::aave_client::ChainProvider;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// `Error(string)` selector: `keccak256("Error(string)")[0..4]`.
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `Panic(uint256)` selector: `keccak256("Panic(uint256)")[0..4]`.
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Receipt polling cadence.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// TxSender
// ---------------------------------------------------------------------------

/// Signs, broadcasts and tracks one write.
pub trait TxSender: Send + Sync + 'static {
    /// Sign and broadcast. Resolves once the hash is known.
    fn send(&self, tx: TransactionRequest)
        -> impl Future<Output = Result<B256, AegisError>> + Send;

    /// Wait for the receipt. There is no local timeout; a reverted receipt
    /// is an error.
    fn wait_for_receipt(&self, tx_hash: B256)
        -> impl Future<Output = Result<(), AegisError>> + Send;
}

// ---------------------------------------------------------------------------
// WalletSubmitter
// ---------------------------------------------------------------------------

/// [`TxSender`] backed by a local private key.
pub struct WalletSubmitter {
    provider: ChainProvider,
    address: Address,
}

impl WalletSubmitter {
    /// Build an HTTP provider with a wallet filler for `signer`.
    pub fn new(http_url: &str, signer: PrivateKeySigner) -> Result<Self, AegisError> {
        let address = signer.address();
        let url = http_url
            .parse()
            .map_err(|e| AegisError::Config(format!("invalid http rpc url: {e}")))?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        info!(address = %address, "wallet submitter initialized");
        Ok(Self { provider, address })
    }

    // -----------------------------------------------------------------------
    // Revert decoding
    // -----------------------------------------------------------------------

    /// Decode a Solidity revert reason from raw return data.
    ///
    /// `Error(string)` yields the message (Aave's numeric error codes land
    /// here) and `Panic(uint256)` a readable panic kind. Anything else,
    /// including malformed payloads, is shown as hex.
    pub fn decode_revert_reason(data: &[u8]) -> String {
        if data.is_empty() {
            return "Unknown revert".into();
        }
        let decoded = data
            .split_first_chunk::<4>()
            .and_then(|(selector, body)| match *selector {
                ERROR_SELECTOR => decode_error_string(body),
                PANIC_SELECTOR => decode_panic(body),
                _ => None,
            });
        decoded.unwrap_or_else(|| format!("0x{}", hex::encode(data)))
    }

    /// Turn an RPC error into the message shown to the user. Revert data,
    /// when the node returns any, is decoded; otherwise the raw error text
    /// is kept.
    pub fn describe_rpc_error(err: &RpcError<TransportErrorKind>) -> String {
        match err.as_error_resp().and_then(|payload| payload.as_revert_data()) {
            Some(data) => format!(
                "execution reverted: {}",
                Self::decode_revert_reason(&data)
            ),
            None => err.to_string(),
        }
    }
}

/// `offset(32) ‖ length(32) ‖ bytes`. The length word comes from the node
/// and is bounds-checked against the payload.
fn decode_error_string(body: &[u8]) -> Option<String> {
    let len = usize::try_from(U256::from_be_slice(body.get(32..64)?)).ok()?;
    let end = 64usize.checked_add(len)?;
    let text = body.get(64..end)?;
    Some(String::from_utf8_lossy(text).into_owned())
}

fn decode_panic(body: &[u8]) -> Option<String> {
    let code = U256::from_be_slice(body.get(..32)?);
    let kind = match u64::try_from(code) {
        Ok(0x01) => "assertion failed",
        Ok(0x11) => "arithmetic overflow/underflow",
        Ok(0x12) => "division by zero",
        Ok(0x21) => "enum conversion out of range",
        Ok(0x31) => "pop on empty array",
        Ok(0x32) => "array index out of bounds",
        Ok(0x41) => "too much memory allocated",
        _ => return Some(format!("Panic(0x{code:x})")),
    };
    Some(format!("Panic: {kind}"))
}

impl TxSender for WalletSubmitter {
    async fn send(&self, tx: TransactionRequest) -> Result<B256, AegisError> {
        let tx = tx.from(self.address);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| AegisError::WriteFailed {
                message: Self::describe_rpc_error(&e),
            })?;

        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, from = %self.address, "transaction broadcast");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<(), AegisError> {
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        return Err(AegisError::WriteFailed {
                            message: format!("transaction {tx_hash} reverted on-chain"),
                        });
                    }
                    info!(
                        tx_hash = %tx_hash,
                        gas_used = receipt.gas_used,
                        block = ?receipt.block_number,
                        "transaction confirmed"
                    );
                    return Ok(());
                }
                Ok(None) => {
                    debug!(tx_hash = %tx_hash, "receipt not yet available");
                }
                Err(e) => {
                    warn!(error = %e, tx_hash = %tx_hash, "receipt poll error, retrying");
                }
            }

            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn error_string_payload(msg: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(68 + msg.len());
        data.extend_from_slice(&ERROR_SELECTOR);
        data.extend_from_slice(&[0u8; 31]);
        data.push(0x20);
        data.extend_from_slice(&[0u8; 31]);
        data.push(msg.len() as u8);
        data.extend_from_slice(msg);
        data
    }

    fn panic_payload(code: u8) -> Vec<u8> {
        let mut data = vec![0u8; 36];
        data[..4].copy_from_slice(&PANIC_SELECTOR);
        data[35] = code;
        data
    }

    // -- decode_revert_reason -----------------------------------------------

    #[test]
    fn decode_empty_data_returns_unknown() {
        assert_eq!(WalletSubmitter::decode_revert_reason(&[]), "Unknown revert");
    }

    #[test]
    fn decode_short_data_returns_hex() {
        assert_eq!(WalletSubmitter::decode_revert_reason(&[0xAB, 0xCD]), "0xabcd");
    }

    #[test]
    fn decode_aave_error_code() {
        // Aave V3 reverts with numeric codes, e.g. "26" = INVALID_AMOUNT.
        let data = error_string_payload(b"26");
        assert_eq!(WalletSubmitter::decode_revert_reason(&data), "26");
    }

    #[test]
    fn decode_error_string_message() {
        let data = error_string_payload(b"ERC20: transfer amount exceeds allowance");
        assert_eq!(
            WalletSubmitter::decode_revert_reason(&data),
            "ERC20: transfer amount exceeds allowance"
        );
    }

    #[test]
    fn decode_error_string_truncated_falls_back_to_hex() {
        let mut data = error_string_payload(b"hello");
        data.truncate(70);
        assert!(WalletSubmitter::decode_revert_reason(&data).starts_with("0x08c379a0"));
    }

    #[test]
    fn decode_panic_codes() {
        assert_eq!(
            WalletSubmitter::decode_revert_reason(&panic_payload(0x01)),
            "Panic: assertion failed"
        );
        assert_eq!(
            WalletSubmitter::decode_revert_reason(&panic_payload(0x11)),
            "Panic: arithmetic overflow/underflow"
        );
        assert_eq!(
            WalletSubmitter::decode_revert_reason(&panic_payload(0x12)),
            "Panic: division by zero"
        );
        assert_eq!(
            WalletSubmitter::decode_revert_reason(&panic_payload(0x99)),
            "Panic(0x99)"
        );
    }

    #[test]
    fn decode_error_string_with_oversized_length_falls_back_to_hex() {
        let mut data = error_string_payload(b"x");
        // Length word 0xff..ff in its low 8 bytes.
        data[60..68].copy_from_slice(&[0xff; 8]);
        assert!(WalletSubmitter::decode_revert_reason(&data).starts_with("0x08c379a0"));

        let mut data = error_string_payload(b"x");
        data[36..68].copy_from_slice(&[0xff; 32]);
        assert!(WalletSubmitter::decode_revert_reason(&data).starts_with("0x08c379a0"));
    }

    #[test]
    fn decode_panic_code_wider_than_u64() {
        let mut data = panic_payload(0);
        // 2^248
        data[4] = 0x01;
        assert_eq!(
            WalletSubmitter::decode_revert_reason(&data),
            format!("Panic(0x1{})", "0".repeat(62))
        );
    }

    #[test]
    fn decode_truncated_panic_returns_hex() {
        let data = &panic_payload(0x11)[..20];
        assert!(WalletSubmitter::decode_revert_reason(data).starts_with("0x4e487b71"));
    }

    #[test]
    fn decode_unknown_selector_returns_hex() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(
            WalletSubmitter::decode_revert_reason(&data),
            "0xdeadbeef01020304"
        );
    }

    // -- construction -------------------------------------------------------

    /// Well-known local devnet key.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn new_rejects_bad_url() {
        let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
        assert!(matches!(
            WalletSubmitter::new("not a url", signer),
            Err(AegisError::Config(_))
        ));
    }
}
