use alloy::primitives::U256;
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

/// Dashboard mode. Earn routes through the ETH gateway, Leverage through
/// the pool's USDC borrow / repay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Earn,
    Leverage,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Earn => f.write_str("EARN"),
            Mode::Leverage => f.write_str("LEVERAGE"),
        }
    }
}

/// Which of the two dashboard buttons was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Primary,
    Secondary,
}

/// User-editable form state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormState {
    pub mode: Mode,
    pub amount: String,
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Supply,
    Withdraw,
    Borrow,
    Repay,
    Approve,
}

/// A validated write, ready to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIntent {
    pub kind: IntentKind,
    /// Amount as entered.
    pub amount: String,
    /// Amount at the asset's native scale (wei for ETH, 1e6 for USDC).
    pub raw_amount: U256,
}

impl TxIntent {
    /// Activity-log line announcing the write.
    pub fn log_line(&self) -> String {
        let amount = self.amount.trim();
        match self.kind {
            IntentKind::Supply => format!("Strategy: Supply {amount} ETH"),
            IntentKind::Withdraw => format!("Strategy: Recall {amount} ETH"),
            IntentKind::Borrow => format!("Strategy: Borrow {amount} USDC"),
            IntentKind::Approve => format!("Authorization: Approving {amount} USDC..."),
            IntentKind::Repay => format!("Strategy: Repay {amount} USDC"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Write lifecycle. Only the orchestrator writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TxStatus {
    #[default]
    Idle,
    /// Handed to the signer.
    Pending,
    /// Hash known, awaiting receipt.
    Confirming { tx_hash: String },
    Confirmed { tx_hash: String },
    Failed { message: String },
}

impl TxStatus {
    /// A write is in flight; both buttons are disabled.
    pub fn is_busy(&self) -> bool {
        matches!(self, TxStatus::Pending | TxStatus::Confirming { .. })
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Idle => f.write_str("idle"),
            TxStatus::Pending => f.write_str("pending (awaiting signature)"),
            TxStatus::Confirming { tx_hash } => write!(f, "confirming {tx_hash}"),
            TxStatus::Confirmed { tx_hash } => write!(f, "confirmed {tx_hash}"),
            TxStatus::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}
