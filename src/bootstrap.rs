//! Startup wiring
//!
//! Picks backends from [`AppConfig`], creates the schema, provisions the
//! fee-sink and seed accounts, and assembles the [`TransactionEngine`].
//! System accounts are only ever opened here, never on demand during a
//! payment.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::account::{AccountKind, AccountNumber, NewAccount};
use crate::config::{AppConfig, BootstrapConfig, SeedAccount};
use crate::core_types::AccountId;
use crate::db::{Database, schema};
use crate::ledger::{InMemoryLedger, Ledger, PgLedger};
use crate::otp::{
    ChallengeManager, InMemoryOtpStore, LogNotifier, Notifier, NotifierConfig, NotifierKind,
    OtpStore, PgOtpStore, WebhookNotifier,
};
use crate::time::{SystemTimeSource, TimeSource};
use crate::transaction::{
    GateConfig, GateKind, HighValueGate, HttpIdentityGate, InMemoryTransactionStore,
    PgTransactionStore, StaticGate, TransactionEngine, TransactionStore,
};

/// Storage backends chosen by configuration
pub struct Backends {
    pub ledger: Arc<dyn Ledger>,
    pub otp_store: Arc<dyn OtpStore>,
    pub transactions: Arc<dyn TransactionStore>,
    /// Present when running against PostgreSQL
    pub database: Option<Arc<Database>>,
}

impl Backends {
    pub fn in_memory(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            ledger: Arc::new(InMemoryLedger::new(clock)),
            otp_store: Arc::new(InMemoryOtpStore::new()),
            transactions: Arc::new(InMemoryTransactionStore::new()),
            database: None,
        }
    }

    pub async fn postgres(
        url: &str,
        max_connections: u32,
        clock: Arc<dyn TimeSource>,
    ) -> anyhow::Result<Self> {
        let db = Database::connect(url, max_connections)
            .await
            .context("Failed to connect to PostgreSQL")?;
        schema::init_schema(db.pool())
            .await
            .context("Failed to initialize schema")?;

        let pool = db.pool().clone();
        Ok(Self {
            ledger: Arc::new(PgLedger::new(pool.clone(), clock)),
            otp_store: Arc::new(PgOtpStore::new(pool.clone())),
            transactions: Arc::new(PgTransactionStore::new(pool)),
            database: Some(Arc::new(db)),
        })
    }
}

pub fn build_notifier(config: &NotifierConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match config.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        NotifierKind::Webhook => {
            let url = config
                .webhook_url
                .clone()
                .context("notifier.webhook_url is required for the webhook notifier")?;
            let notifier = WebhookNotifier::new(url, Duration::from_millis(config.timeout_ms))?;
            Ok(Arc::new(notifier))
        }
    }
}

pub fn build_gate(config: &GateConfig) -> anyhow::Result<Arc<dyn HighValueGate>> {
    match config.kind {
        GateKind::Static if config.allow => Ok(Arc::new(StaticGate::allow_all())),
        GateKind::Static => Ok(Arc::new(StaticGate::deny_all("UNVERIFIED"))),
        GateKind::Http => {
            let url = config
                .url
                .clone()
                .context("gate.url is required for the http gate")?;
            let gate = HttpIdentityGate::new(url, Duration::from_millis(config.timeout_ms))?;
            Ok(Arc::new(gate))
        }
    }
}

/// Open `seed` unless an account with its number already exists
async fn ensure_account(ledger: &dyn Ledger, seed: &SeedAccount) -> anyhow::Result<AccountId> {
    let number = AccountNumber::new(&seed.number)
        .with_context(|| format!("Invalid seed account number: {}", seed.number))?;
    if let Some(existing) = ledger.find_by_number(number.as_str()).await? {
        if existing.owner != seed.owner {
            anyhow::bail!(
                "Account {} already belongs to user {}",
                existing.masked_number(),
                existing.owner
            );
        }
        return Ok(existing.id);
    }

    let kind: AccountKind = seed.kind.parse().map_err(anyhow::Error::msg)?;
    let account = ledger
        .open_account(
            NewAccount::checking(seed.owner, seed.opening_balance)
                .with_kind(kind)
                .with_currency(seed.currency)
                .with_number(number),
        )
        .await?;
    tracing::info!(
        account_id = account.id,
        owner = account.owner,
        number = %account.masked_number(),
        "Provisioned account"
    );
    Ok(account.id)
}

/// Provision system and seed accounts. Returns the fee-sink id, if any.
pub async fn provision(
    ledger: &dyn Ledger,
    config: &BootstrapConfig,
) -> anyhow::Result<Option<AccountId>> {
    let fee_sink = match &config.fee_sink {
        Some(seed) => Some(ensure_account(ledger, seed).await?),
        None => None,
    };
    for seed in &config.seed_accounts {
        ensure_account(ledger, seed).await?;
    }
    Ok(fee_sink)
}

/// Assemble the engine from configuration
pub async fn build_engine(
    config: &AppConfig,
) -> anyhow::Result<(Arc<TransactionEngine>, Option<Arc<Database>>)> {
    let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    let backends = match &config.postgres_url {
        Some(url) => {
            tracing::info!("Using PostgreSQL backends");
            Backends::postgres(url, config.db_max_connections, clock.clone()).await?
        }
        None => {
            tracing::warn!("No postgres_url configured, using in-memory backends");
            Backends::in_memory(clock.clone())
        }
    };
    engine_from(config, backends, clock).await
}

pub async fn engine_from(
    config: &AppConfig,
    backends: Backends,
    clock: Arc<dyn TimeSource>,
) -> anyhow::Result<(Arc<TransactionEngine>, Option<Arc<Database>>)> {
    let notifier = build_notifier(&config.notifier)?;
    let gate = build_gate(&config.gate)?;
    tracing::info!(notifier = notifier.name(), gate = gate.name(), "Adapters selected");

    let otp = ChallengeManager::new(
        backends.otp_store,
        notifier,
        clock.clone(),
        config.otp.clone(),
    )?;

    let fee_sink = provision(backends.ledger.as_ref(), &config.bootstrap).await?;

    let mut engine = TransactionEngine::new(
        backends.ledger,
        backends.transactions,
        Arc::new(otp),
        gate,
        clock,
        config.fees.clone(),
        config.engine.clone(),
    );
    if let Some(sink) = fee_sink {
        tracing::info!(account_id = sink, "Fees credited to sink account");
        engine = engine.with_fee_sink(sink);
    }
    Ok((Arc::new(engine), backends.database))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::time::ManualTimeSource;

    fn seed(owner: u64, number: &str, balance: u64) -> SeedAccount {
        SeedAccount {
            owner,
            number: number.to_string(),
            kind: "CHECKING".to_string(),
            currency: Currency::Vnd,
            opening_balance: balance,
        }
    }

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(Arc::new(ManualTimeSource::new(1_700_000_000_000)))
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let ledger = ledger();
        let config = BootstrapConfig {
            fee_sink: Some(seed(1, "9000000000000001", 0)),
            seed_accounts: vec![seed(1001, "4111 2222 3333 4444", 1_000_000)],
        };

        let first = provision(&ledger, &config).await.unwrap();
        let second = provision(&ledger, &config).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(ledger.accounts_of(1001).await.unwrap().len(), 1);
        assert_eq!(ledger.total_balance(), 1_000_000);
    }

    #[tokio::test]
    async fn test_provision_rejects_foreign_number() {
        let ledger = ledger();
        let taken = BootstrapConfig {
            fee_sink: None,
            seed_accounts: vec![seed(1001, "4111222233334444", 0)],
        };
        provision(&ledger, &taken).await.unwrap();

        let clash = BootstrapConfig {
            fee_sink: Some(seed(1, "4111222233334444", 0)),
            seed_accounts: vec![],
        };
        assert!(provision(&ledger, &clash).await.is_err());
    }

    #[tokio::test]
    async fn test_provision_rejects_bad_number() {
        let ledger = ledger();
        let config = BootstrapConfig {
            fee_sink: None,
            seed_accounts: vec![seed(1001, "12-34", 0)],
        };
        assert!(provision(&ledger, &config).await.is_err());
    }

    #[test]
    fn test_webhook_notifier_requires_url() {
        let config = NotifierConfig {
            kind: NotifierKind::Webhook,
            webhook_url: None,
            timeout_ms: 1_000,
        };
        assert!(build_notifier(&config).is_err());
    }

    #[test]
    fn test_static_gate_follows_allow_flag() {
        let allow = build_gate(&GateConfig::default()).unwrap();
        assert_eq!(allow.name(), "static");
        let http = GateConfig {
            kind: GateKind::Http,
            url: None,
            ..GateConfig::default()
        };
        assert!(build_gate(&http).is_err());
    }
}
