//! Transaction State Machine
//!
//! Two-phase, OTP-gated money movement over the [`Ledger`](crate::ledger::Ledger).
//!
//! # State Machine
//!
//! ```text
//! PENDING → PROCESSING → COMPLETED
//!    ↓  ↘        ↓
//! CANCELLED  FAILED ←┘
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Intent first**: the PROCESSING transition is persisted before any leg is posted
//! 2. **Idempotent legs**: every posting is keyed by `(reference, leg)`
//! 3. **Explicit fail rule**: only a definitive ledger rejection is compensated;
//!    an ambiguous outcome is resolved from the posting journal
//! 4. **CAS transitions**: every status change names the status it expects

pub mod db;
pub mod engine;
pub mod error;
pub mod gate;
pub mod settlement;
pub mod state;
pub mod store;
pub mod types;
pub mod worker;


pub use db::PgTransactionStore;
pub use engine::{EngineConfig, TransactionEngine};
pub use error::TransactionError;
pub use gate::{GateConfig, GateDecision, GateKind, HighValueGate, HttpIdentityGate, StaticGate};
pub use settlement::Settlement;
pub use state::TransactionStatus;
pub use store::{InMemoryTransactionStore, TransactionStore};
pub use types::{
    Authorization, DepositRequest, Destination, ExternalService, FailureReason, HistoryFilter,
    InitiatedTransaction, OfficerAuthorization, OfficerTransferRequest, SettledTransaction,
    TransactionKind, TransactionRecord, TransferRequest, UpdatedBalances, UtilityPaymentRequest,
    WithdrawalRequest,
};
pub use worker::{RecoveryWorker, SweepReport, WorkerConfig};
