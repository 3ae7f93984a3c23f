use std::sync::Arc;
use std::time::Duration;

use retail_ledger::account::{AccountNumber, NewAccount};
use retail_ledger::bootstrap::{self, Backends};
use retail_ledger::config::AppConfig;
use retail_ledger::fee::{FeeSchedule, OperationKind};
use retail_ledger::ledger::{InMemoryLedger, Ledger};
use retail_ledger::otp::{ChallengeManager, HashParams, InMemoryOtpStore, MemoryNotifier, OtpConfig};
use retail_ledger::time::{ManualTimeSource, TimeSource};
use retail_ledger::transaction::{
    EngineConfig, InMemoryTransactionStore, RecoveryWorker, StaticGate, TransactionEngine,
    TransactionError, TransactionStatus, TransferRequest,
};

const X: u64 = 7001;
const Y: u64 = 7002;

fn fast_otp() -> OtpConfig {
    OtpConfig {
        hash: HashParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        },
        ..OtpConfig::default()
    }
}

struct Bank {
    engine: Arc<TransactionEngine>,
    ledger: Arc<InMemoryLedger>,
    notifier: Arc<MemoryNotifier>,
    clock: Arc<ManualTimeSource>,
    x_account: u64,
    y_account: u64,
}

async fn open_bank() -> Bank {
    let clock = Arc::new(ManualTimeSource::new(1_700_000_000_000));
    let ledger = Arc::new(InMemoryLedger::new(clock.clone()));
    let x = ledger
        .open_account(
            NewAccount::checking(X, 1_000_000)
                .with_number(AccountNumber::new("1000 2000 3000 4000").unwrap()),
        )
        .await
        .unwrap();
    let y = ledger
        .open_account(
            NewAccount::checking(Y, 50_000)
                .with_number(AccountNumber::new("5000 6000 7000 8000").unwrap()),
        )
        .await
        .unwrap();

    let notifier = Arc::new(MemoryNotifier::new());
    let otp = ChallengeManager::new(
        Arc::new(InMemoryOtpStore::new()),
        notifier.clone(),
        clock.clone(),
        fast_otp(),
    )
    .unwrap();
    let engine = TransactionEngine::new(
        ledger.clone(),
        Arc::new(InMemoryTransactionStore::new()),
        Arc::new(otp),
        Arc::new(StaticGate::allow_all()),
        clock.clone(),
        FeeSchedule::default(),
        EngineConfig::default(),
    );

    Bank {
        engine: Arc::new(engine),
        ledger,
        notifier,
        clock,
        x_account: x.id,
        y_account: y.id,
    }
}

async fn balance(bank: &Bank, id: u64) -> u64 {
    bank.ledger.get(id).await.unwrap().unwrap().balance
}

#[tokio::test]
async fn x_pays_y_two_hundred_thousand() {
    let bank = open_bank().await;

    let initiated = bank
        .engine
        .initiate_transfer(
            X,
            TransferRequest {
                source_account_id: Some(bank.x_account),
                destination_account_number: "5000600070008000".into(),
                amount: 200_000,
                description: Some("Invoice 42".into()),
            },
        )
        .await
        .unwrap();
    assert!(initiated.otp_issued());
    assert_eq!(initiated.fee, 5_000);
    assert_eq!(initiated.total, 205_000);

    // Nothing moves before verification
    assert_eq!(balance(&bank, bank.x_account).await, 1_000_000);

    let code = bank.notifier.last_code_for(X).unwrap();
    let settled = bank
        .engine
        .verify_transfer(X, initiated.reference, &code)
        .await
        .unwrap();

    assert_eq!(settled.record.status, TransactionStatus::Completed);
    assert!(settled.record.otp_verified);
    assert_eq!(settled.balances.source, Some(795_000));
    assert_eq!(balance(&bank, bank.x_account).await, 795_000);
    assert_eq!(balance(&bank, bank.y_account).await, 250_000);

    // The code is single use
    let replay = bank
        .engine
        .verify_transfer(X, initiated.reference, &code)
        .await;
    assert_eq!(replay.unwrap_err(), TransactionError::NotFound);
    assert_eq!(balance(&bank, bank.x_account).await, 795_000);

    // Y sees the transfer too
    let seen_by_y = bank
        .engine
        .get_transaction(Y, initiated.reference)
        .await
        .unwrap();
    assert_eq!(seen_by_y.amount, 200_000);
}

#[tokio::test]
async fn fee_tiers() {
    let fees = FeeSchedule::default();
    assert_eq!(fees.fee_for(100_000, OperationKind::Transfer), 0);
    assert_eq!(fees.fee_for(500_000, OperationKind::Transfer), 5_000);
    assert_eq!(fees.fee_for(5_000_000, OperationKind::Transfer), 10_000);
    assert_eq!(fees.fee_for(50_000_000, OperationKind::Transfer), 20_000);
}

#[tokio::test]
async fn abandoned_transfer_expires_without_moving_funds() {
    let bank = open_bank().await;
    let initiated = bank
        .engine
        .initiate_transfer(
            X,
            TransferRequest {
                source_account_id: None,
                destination_account_number: "5000-6000-7000-8000".into(),
                amount: 20_000,
                description: None,
            },
        )
        .await
        .unwrap();

    bank.clock.advance(Duration::from_secs(16 * 60));
    let worker = RecoveryWorker::with_defaults(bank.engine.clone());
    let report = worker.sweep().await.unwrap();
    assert_eq!(report.expired, 1);

    let record = bank
        .engine
        .get_transaction(X, initiated.reference)
        .await
        .unwrap();
    assert_eq!(record.status, TransactionStatus::Failed);
    assert_eq!(balance(&bank, bank.x_account).await, 1_000_000);
    assert_eq!(balance(&bank, bank.y_account).await, 50_000);
    assert!(bank.clock.now_ms() > record.created_at);
}

#[cfg(feature = "dev-otp")]
#[tokio::test]
async fn configured_bank_with_fee_sink() {
    let config = AppConfig::from_yaml(
        r#"
log_level: info
log_dir: ./logs
log_file: test.log
use_json: false
rotation: never
gateway:
  host: 127.0.0.1
  port: 0
otp:
  expose_codes: true
  hash:
    memory_kib: 64
    iterations: 1
    parallelism: 1
bootstrap:
  fee_sink:
    owner: 1
    number: "9000000000000001"
  seed_accounts:
    - owner: 7001
      number: "1000200030004000"
      opening_balance: 1000000
    - owner: 7002
      number: "5000600070008000"
      opening_balance: 50000
"#,
    )
    .unwrap();

    let clock: Arc<dyn TimeSource> = Arc::new(ManualTimeSource::new(1_700_000_000_000));
    let backends = Backends::in_memory(clock.clone());
    let ledger = backends.ledger.clone();
    let (engine, database) = bootstrap::engine_from(&config, backends, clock)
        .await
        .unwrap();
    assert!(database.is_none());
    let sink = engine.settlement().fee_sink().unwrap();

    let initiated = engine
        .initiate_transfer(
            X,
            TransferRequest {
                source_account_id: None,
                destination_account_number: "5000600070008000".into(),
                amount: 200_000,
                description: None,
            },
        )
        .await
        .unwrap();
    let code = initiated.challenge.dev_code.clone().unwrap();
    engine
        .verify_transfer(X, initiated.reference, &code)
        .await
        .unwrap();

    let sink_balance = ledger.get(sink).await.unwrap().unwrap().balance;
    assert_eq!(sink_balance, 5_000);
    let x_accounts = ledger.accounts_of(X).await.unwrap();
    assert_eq!(x_accounts[0].balance, 795_000);
}
