//! Simulation controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use escrowcore_common::{Credits, Resolution, ServiceId, TransactionId, TransactionStatus, UserId};
use escrowcore_engine::{EngineConfig, EscrowEngine};

use crate::metrics::{OpKind, SimulationMetrics};
use crate::scenario::Scenario;
use crate::users::{SimulatedUser, UserFactory};

/// Starting balance for every simulated user.
const INITIAL_DEPOSIT: Credits = Credits::new(10_000);

/// Elapsed microseconds since `started`.
fn elapsed_us(started: Instant) -> u64 {
    started.elapsed().as_micros() as u64
}

/// Drives scenarios against an in-process engine.
pub struct SimulationController {
    /// Simulated users.
    users: Vec<SimulatedUser>,
    /// The engine under load.
    engine: Arc<EscrowEngine>,
    /// Simulation metrics.
    metrics: Arc<Mutex<SimulationMetrics>>,
    /// Seed driving every RNG in the run.
    seed: u64,
}

impl SimulationController {
    /// Create a new simulation controller. A missing seed is resolved to a
    /// random one so the run can still be reproduced from the logs.
    pub fn new(user_count: usize, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);

        Self {
            users: UserFactory::create_users(user_count.max(2)),
            engine: Arc::new(EscrowEngine::new(EngineConfig::default())),
            metrics: Arc::new(Mutex::new(SimulationMetrics::new())),
            seed,
        }
    }

    /// The seed this run is using.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The engine under load.
    pub fn engine(&self) -> &Arc<EscrowEngine> {
        &self.engine
    }

    /// Create accounts and fund every user with the starting balance.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        info!(
            users = self.users.len(),
            seed = self.seed,
            "Initializing simulation"
        );

        for user in &self.users {
            self.engine.sync_profile(&user.id)?;
            self.engine.deposit(&user.id, INITIAL_DEPOSIT)?;
            debug!(user = %user.id, name = %user.name, balance = %INITIAL_DEPOSIT, "Funded user");
        }

        Ok(())
    }

    /// Run a scenario to completion.
    pub async fn run(&self, scenario: Scenario, duration: Duration) -> anyhow::Result<()> {
        info!(
            scenario = scenario.name(),
            "Running scenario: {}",
            scenario.description()
        );

        match scenario {
            Scenario::HappyPath => self.run_happy_path().await,
            Scenario::ContendedBuyer => self.run_contended_buyer().await,
            Scenario::DisputeStorm => self.run_dispute_storm().await,
            Scenario::MixedLoad => self.run_mixed_load(duration).await,
        }
    }

    /// Verify the books after a run. Fails the process if escrow holds
    /// drifted from the ledger or credits were created or destroyed.
    pub async fn verify(&self) -> anyhow::Result<()> {
        let violations = self.engine.verify_integrity();
        if !violations.is_empty() {
            for violation in &violations {
                warn!(
                    user = %violation.user_id,
                    ledger_held = %violation.ledger_held,
                    account_escrow = %violation.account_escrow,
                    "Integrity violation"
                );
            }
            anyhow::bail!("integrity check failed for {} accounts", violations.len());
        }

        let in_accounts = self.engine.store().total_credits();
        let deposited = self.engine.store().journal().total_deposited();
        if in_accounts != deposited {
            anyhow::bail!(
                "credit conservation broken: {in_accounts} in accounts, {deposited} deposited"
            );
        }

        info!(total = %in_accounts, "Books balance, credits conserved");
        Ok(())
    }

    /// Snapshot the metrics.
    pub async fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.lock().await.clone()
    }

    // --- Scenarios ---

    /// Every user commits to its neighbour and releases, all in parallel.
    async fn run_happy_path(&self) -> anyhow::Result<()> {
        let rounds = 20;
        let mut tasks = Vec::new();

        for (index, user) in self.users.iter().enumerate() {
            let buyer = user.clone();
            let provider = self.users[(index + 1) % self.users.len()].clone();
            let engine = self.engine.clone();
            let metrics = self.metrics.clone();
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(index as u64));

            tasks.push(tokio::spawn(async move {
                for _ in 0..rounds {
                    let amount = Credits::new(rng.gen_range(10..200));

                    let started = Instant::now();
                    let txn = match engine.commit(
                        &buyer.id,
                        &provider.id,
                        Some(ServiceId::new()),
                        amount,
                    ) {
                        Ok(txn) => {
                            metrics
                                .lock()
                                .await
                                .record_success(OpKind::Commit, elapsed_us(started));
                            txn
                        }
                        Err(err) => {
                            metrics.lock().await.record_error(&err);
                            continue;
                        }
                    };

                    let started = Instant::now();
                    match engine.release(txn.id, &buyer.id) {
                        Ok(_) => metrics
                            .lock()
                            .await
                            .record_success(OpKind::Release, elapsed_us(started)),
                        Err(err) => metrics.lock().await.record_error(&err),
                    }
                }
            }));
        }

        for task in tasks {
            task.await?;
        }
        Ok(())
    }

    /// Race more commits against one buyer than their balance can cover.
    /// Exactly the affordable subset must win; everything else must be
    /// rejected for insufficient funds.
    async fn run_contended_buyer(&self) -> anyhow::Result<()> {
        let amount = Credits::new(100);
        let affordable = 5usize;
        let attempts = 12usize;

        let buyer = SimulatedUser::new("contended_buyer", "Contended Buyer");
        self.engine.sync_profile(&buyer.id)?;
        self.engine
            .deposit(&buyer.id, Credits::new(100 * affordable as u64))?;

        let mut tasks = Vec::new();
        for attempt in 0..attempts {
            let provider = self.users[attempt % self.users.len()].clone();
            let buyer_id = buyer.id.clone();
            let engine = self.engine.clone();
            let metrics = self.metrics.clone();

            tasks.push(tokio::spawn(async move {
                let started = Instant::now();
                match engine.commit(&buyer_id, &provider.id, None, amount) {
                    Ok(txn) => {
                        metrics
                            .lock()
                            .await
                            .record_success(OpKind::Commit, elapsed_us(started));
                        Some(txn.id)
                    }
                    Err(err) => {
                        metrics.lock().await.record_error(&err);
                        None
                    }
                }
            }));
        }

        let mut committed = Vec::new();
        for task in tasks {
            if let Some(id) = task.await? {
                committed.push(id);
            }
        }

        if committed.len() != affordable {
            anyhow::bail!(
                "expected exactly {affordable} commits to win, got {}",
                committed.len()
            );
        }
        info!(
            winners = committed.len(),
            rejected = attempts - affordable,
            "Exactly the affordable subset committed"
        );

        // Pay the providers out so the run ends with nothing held.
        for id in committed {
            let started = Instant::now();
            self.engine.release(id, &buyer.id)?;
            self.metrics
                .lock()
                .await
                .record_success(OpKind::Release, elapsed_us(started));
        }

        Ok(())
    }

    /// Commit a batch, then race disputes against releases on the same rows.
    /// Whatever ends up frozen gets arbitrated, alternating outcomes.
    async fn run_dispute_storm(&self) -> anyhow::Result<()> {
        let batch = 30;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut rows = Vec::new();
        for i in 0..batch {
            let buyer = &self.users[i % self.users.len()];
            let provider = &self.users[(i + 1) % self.users.len()];
            let amount = Credits::new(rng.gen_range(20..300));

            let started = Instant::now();
            let txn = self
                .engine
                .commit(&buyer.id, &provider.id, Some(ServiceId::new()), amount)?;
            self.metrics
                .lock()
                .await
                .record_success(OpKind::Commit, elapsed_us(started));
            rows.push((txn.id, buyer.id.clone(), provider.id.clone()));
        }

        let mut tasks = Vec::new();

        // Two thirds of the rows get disputed, raised by either side.
        for (index, (id, buyer_id, provider_id)) in rows.iter().cloned().enumerate() {
            if index % 3 == 0 {
                continue;
            }
            let engine = self.engine.clone();
            let metrics = self.metrics.clone();

            tasks.push(tokio::spawn(async move {
                let actor = if index % 2 == 0 { provider_id } else { buyer_id };
                let started = Instant::now();
                match engine.dispute(id, &actor, "delivery contested") {
                    Ok(_) => metrics
                        .lock()
                        .await
                        .record_success(OpKind::Dispute, elapsed_us(started)),
                    Err(err) => metrics.lock().await.record_error(&err),
                }
            }));
        }

        // Meanwhile every buyer tries to release. Rows that got disputed
        // first reject the release; rows released first reject the dispute.
        for (id, buyer_id, _) in rows.iter().cloned() {
            let engine = self.engine.clone();
            let metrics = self.metrics.clone();

            tasks.push(tokio::spawn(async move {
                let started = Instant::now();
                match engine.release(id, &buyer_id) {
                    Ok(_) => metrics
                        .lock()
                        .await
                        .record_success(OpKind::Release, elapsed_us(started)),
                    Err(err) => metrics.lock().await.record_error(&err),
                }
            }));
        }

        for task in tasks {
            task.await?;
        }

        // Arbitrate whatever stayed frozen.
        let mut refund_next = false;
        for (id, _, _) in &rows {
            if self.engine.transaction(*id)?.status != TransactionStatus::Disputed {
                continue;
            }

            let resolution = if refund_next {
                Resolution::Refund
            } else {
                Resolution::Complete
            };
            refund_next = !refund_next;

            let started = Instant::now();
            match self.engine.resolve(*id, resolution) {
                Ok(_) => self
                    .metrics
                    .lock()
                    .await
                    .record_success(OpKind::Resolve, elapsed_us(started)),
                Err(err) => self.metrics.lock().await.record_error(&err),
            }
        }

        Ok(())
    }

    /// Concurrent workers performing random operations until the deadline.
    async fn run_mixed_load(&self, duration: Duration) -> anyhow::Result<()> {
        let workers = 4u64;
        let deadline = Instant::now() + duration;
        let open: Arc<Mutex<Vec<TransactionId>>> = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for worker in 0..workers {
            let engine = self.engine.clone();
            let metrics = self.metrics.clone();
            let open = open.clone();
            let users: Vec<UserId> = self.users.iter().map(|u| u.id.clone()).collect();
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(worker));

            tasks.push(tokio::spawn(async move {
                while Instant::now() < deadline {
                    let roll = rng.gen_range(0..100);

                    if roll < 10 {
                        let user = &users[rng.gen_range(0..users.len())];
                        let amount = Credits::new(rng.gen_range(50..500));

                        let started = Instant::now();
                        match engine.deposit(user, amount) {
                            Ok(_) => metrics
                                .lock()
                                .await
                                .record_success(OpKind::Deposit, elapsed_us(started)),
                            Err(err) => metrics.lock().await.record_error(&err),
                        }
                    } else if roll < 45 {
                        let buyer_idx = rng.gen_range(0..users.len());
                        let mut provider_idx = rng.gen_range(0..users.len());
                        if provider_idx == buyer_idx {
                            provider_idx = (provider_idx + 1) % users.len();
                        }
                        let amount = Credits::new(rng.gen_range(10..400));

                        let started = Instant::now();
                        match engine.commit(
                            &users[buyer_idx],
                            &users[provider_idx],
                            Some(ServiceId::new()),
                            amount,
                        ) {
                            Ok(txn) => {
                                metrics
                                    .lock()
                                    .await
                                    .record_success(OpKind::Commit, elapsed_us(started));
                                open.lock().await.push(txn.id);
                            }
                            Err(err) => metrics.lock().await.record_error(&err),
                        }
                    } else {
                        let picked = {
                            let open_guard = open.lock().await;
                            if open_guard.is_empty() {
                                None
                            } else {
                                Some(open_guard[rng.gen_range(0..open_guard.len())])
                            }
                        };
                        let Some(id) = picked else {
                            tokio::task::yield_now().await;
                            continue;
                        };
                        let Ok(txn) = engine.transaction(id) else {
                            continue;
                        };

                        let started = Instant::now();
                        let outcome = match rng.gen_range(0..4) {
                            0 => engine.release(id, &txn.buyer).map(|_| OpKind::Release),
                            1 => engine.cancel(id, &txn.buyer).map(|_| OpKind::Cancel),
                            2 => {
                                let actor = if rng.gen_bool(0.5) {
                                    &txn.buyer
                                } else {
                                    &txn.provider
                                };
                                engine
                                    .dispute(id, actor, "randomized dispute")
                                    .map(|_| OpKind::Dispute)
                            }
                            _ => {
                                let resolution = if rng.gen_bool(0.5) {
                                    Resolution::Complete
                                } else {
                                    Resolution::Refund
                                };
                                engine.resolve(id, resolution).map(|_| OpKind::Resolve)
                            }
                        };
                        match outcome {
                            Ok(op) => metrics.lock().await.record_success(op, elapsed_us(started)),
                            Err(err) => metrics.lock().await.record_error(&err),
                        }

                        let settled = engine
                            .transaction(id)
                            .map(|t| t.status.is_final())
                            .unwrap_or(true);
                        if settled {
                            open.lock().await.retain(|open_id| *open_id != id);
                        }
                    }

                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }));
        }

        for task in tasks {
            task.await?;
        }

        let still_open = open.lock().await.len();
        info!(still_open, "Mixed load finished");
        Ok(())
    }
}
