use std::panic::AssertUnwindSafe;
use std::time::Duration;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::db::HistoryStore;
use crate::errors::{CycleError, FeedError};
use crate::portfolio_spec::{PortfolioSource, PortfolioSpec};
use crate::presentation::CyclePresenter;
use crate::price_feed::PriceFeed;
use crate::valuation::{CycleReport, Quotes, ValuationEngine, engine::cycle_timestamp};

/// Where the scheduler is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Fetching,
    Backoff,
    Valuating,
    Persisting,
}

/// Result of one attempt at a cycle
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Config or feed unavailable; nothing was valued or written
    Deferred(CycleError),
    /// Valuation or persistence went wrong; results were discarded
    Failed(CycleError),
}

/// Fixed waits between attempts; there is no growth and no retry cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    pub poll_interval: Duration,
    pub backoff: Duration,
}

impl SchedulerTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            backoff: config.backoff,
        }
    }
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            backoff: Duration::from_secs(300),
        }
    }
}

/// Drives poll -> value -> persist cycles one at a time
pub struct CycleScheduler<F, P, R> {
    timing: SchedulerTiming,
    store: HistoryStore,
    feed: F,
    portfolio: P,
    presenter: R,
    state: SchedulerState,
}

impl<F, P, R> CycleScheduler<F, P, R>
where
    F: PriceFeed,
    P: PortfolioSource,
    R: CyclePresenter,
{
    pub fn new(timing: SchedulerTiming, store: HistoryStore, feed: F, portfolio: P, presenter: R) -> Self {
        Self {
            timing,
            store,
            feed,
            portfolio,
            presenter,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn presenter(&self) -> &R {
        &self.presenter
    }

    /// How long to wait before the next attempt
    pub fn delay_after(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Deferred(_) => self.timing.backoff,
            CycleOutcome::Completed(_) | CycleOutcome::Failed(_) => self.timing.poll_interval,
        }
    }

    /// Runs cycles until Ctrl-C; the first cycle starts immediately
    pub async fn run(&mut self) {
        info!(
            poll_interval_secs = self.timing.poll_interval.as_secs(),
            backoff_secs = self.timing.backoff.as_secs(),
            "Starting portfolio tracking loop"
        );

        loop {
            let outcome = self.run_once().await;
            let delay = self.delay_after(&outcome);
            debug!(state = ?self.state, delay_secs = delay.as_secs(), "Waiting for next cycle");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping after the last completed cycle");
                    break;
                }
            }
        }
    }

    /// One full attempt: load spec, fetch quotes, value, persist, present
    #[instrument(skip(self), name = "cycle")]
    pub async fn run_once(&mut self) -> CycleOutcome {
        let started_at = cycle_timestamp();
        self.transition(SchedulerState::Fetching);

        let (spec, quotes) = match self.fetch().await {
            Ok(fetched) => fetched,
            Err(reason) => {
                self.transition(SchedulerState::Backoff);
                self.presenter.cycle_deferred(&reason, self.timing.backoff);
                return CycleOutcome::Deferred(reason);
            }
        };

        let result = AssertUnwindSafe(self.valuate_and_persist(&spec, &quotes, started_at))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(CycleError::Unexpected(panic_message(panic.as_ref()))));

        self.transition(SchedulerState::Idle);
        match result {
            Ok(report) => {
                self.presenter.cycle_completed(&report);
                CycleOutcome::Completed(report)
            }
            Err(reason) => {
                error!(%reason, "Cycle failed, results discarded");
                self.presenter.cycle_failed(&reason, self.timing.poll_interval);
                CycleOutcome::Failed(reason)
            }
        }
    }

    async fn fetch(&self) -> Result<(PortfolioSpec, Quotes), CycleError> {
        let spec = self.portfolio.load()?;
        let quotes = self.feed.fetch_quotes(&spec.symbols(), &spec.currency).await?;

        // At least one configured symbol has to be priced for the cycle to be worth valuing
        if !spec.holdings.iter().any(|h| quotes.contains_key(&h.symbol)) {
            warn!(quoted = quotes.len(), "Feed returned no quotes for configured symbols");
            return Err(FeedError::NoData.into());
        }
        Ok((spec, quotes))
    }

    async fn valuate_and_persist(
        &mut self,
        spec: &PortfolioSpec,
        quotes: &Quotes,
        timestamp: DateTime<Utc>,
    ) -> Result<CycleReport, CycleError> {
        self.transition(SchedulerState::Valuating);
        let engine = ValuationEngine::new(&self.store);
        let report = engine
            .value_cycle(&spec.holdings, quotes, &spec.currency, timestamp)
            .await?;

        self.transition(SchedulerState::Persisting);
        let engine = ValuationEngine::new(&self.store);
        engine.commit(&report).await?;
        Ok(report)
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!(from = ?self.state, to = ?next, "Scheduler state change");
        self.state = next;
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during cycle".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::errors::ConfigError;
    use crate::valuation::{Change, Holding};

    /// Serves queued responses in order, then keeps failing
    #[derive(Default)]
    struct ScriptedFeed {
        responses: Mutex<VecDeque<Result<Quotes, FeedError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedFeed {
        fn with(responses: Vec<Result<Quotes, FeedError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PriceFeed for ScriptedFeed {
        async fn fetch_quotes(&self, _symbols: &[String], _currency: &str) -> Result<Quotes, FeedError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FeedError::Transport("script exhausted".to_string())))
        }
    }

    /// Quotes BTC at 2, enough to overflow a Decimal::MAX holding
    struct OverflowFeed;

    /// Answers after a pause so the cycle start and the feed response are distinguishable
    struct SlowFeed(Duration);

    #[async_trait]
    impl PriceFeed for SlowFeed {
        async fn fetch_quotes(&self, _symbols: &[String], _currency: &str) -> Result<Quotes, FeedError> {
            tokio::time::sleep(self.0).await;
            Ok(quotes(&[("BTC", dec!(100))]))
        }
    }

    #[async_trait]
    impl PriceFeed for OverflowFeed {
        async fn fetch_quotes(&self, _symbols: &[String], _currency: &str) -> Result<Quotes, FeedError> {
            Ok(quotes(&[("BTC", dec!(2))]))
        }
    }

    struct FixedPortfolio(Option<PortfolioSpec>);

    impl PortfolioSource for FixedPortfolio {
        fn load(&self) -> Result<PortfolioSpec, ConfigError> {
            self.0.clone().ok_or(ConfigError::EmptyPortfolio)
        }
    }

    #[derive(Default)]
    struct RecordingPresenter {
        completed: Mutex<Vec<CycleReport>>,
        deferred: Mutex<Vec<(String, Duration)>>,
        failed: Mutex<Vec<(String, Duration)>>,
    }

    impl CyclePresenter for RecordingPresenter {
        fn cycle_completed(&self, report: &CycleReport) {
            self.completed.lock().unwrap().push(report.clone());
        }

        fn cycle_deferred(&self, reason: &CycleError, retry_in: Duration) {
            self.deferred.lock().unwrap().push((reason.to_string(), retry_in));
        }

        fn cycle_failed(&self, reason: &CycleError, next_in: Duration) {
            self.failed.lock().unwrap().push((reason.to_string(), next_in));
        }
    }

    struct ExplodingHoldings;

    impl PortfolioSource for ExplodingHoldings {
        fn load(&self) -> Result<PortfolioSpec, ConfigError> {
            Ok(PortfolioSpec {
                // price * amount does not fit in a Decimal
                holdings: vec![Holding::new("BTC", Decimal::MAX)],
                currency: "USD".to_string(),
            })
        }
    }

    fn quotes(pairs: &[(&str, Decimal)]) -> Quotes {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    fn btc_portfolio(amount: Decimal) -> FixedPortfolio {
        FixedPortfolio(Some(PortfolioSpec {
            holdings: vec![Holding::new("BTC", amount)],
            currency: "USD".to_string(),
        }))
    }

    fn timing() -> SchedulerTiming {
        SchedulerTiming {
            poll_interval: Duration::from_secs(300),
            backoff: Duration::from_secs(120),
        }
    }

    async fn memory_store() -> HistoryStore {
        HistoryStore::init("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn end_to_end_two_cycles() {
        let feed = ScriptedFeed::with(vec![
            Ok(quotes(&[("BTC", dec!(100))])),
            Ok(quotes(&[("BTC", dec!(150))])),
        ]);
        let mut scheduler = CycleScheduler::new(
            timing(),
            memory_store().await,
            feed,
            btc_portfolio(dec!(2)),
            RecordingPresenter::default(),
        );

        let first = scheduler.run_once().await;
        let CycleOutcome::Completed(first) = first else { panic!("first cycle should complete") };
        let btc = first.observation("BTC").unwrap();
        assert_eq!((btc.amount, btc.price, btc.value), (dec!(2), dec!(100), dec!(200)));
        assert_eq!(btc.price_change, Change::Absent);
        assert_eq!(first.snapshot.total_value, dec!(200));
        assert_eq!(first.snapshot.total_change, Change::Absent);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let second = scheduler.run_once().await;
        assert_eq!(scheduler.delay_after(&second), Duration::from_secs(300));
        let CycleOutcome::Completed(second) = second else { panic!("second cycle should complete") };
        assert_eq!(second.observation("BTC").unwrap().price_change, Change::Present(dec!(50)));
        assert_eq!(second.snapshot.total_value, dec!(300));
        assert_eq!(second.snapshot.total_change, Change::Present(dec!(50)));

        assert_eq!(scheduler.presenter().completed.lock().unwrap().len(), 2);
        assert_eq!(scheduler.store().row_counts().await.unwrap(), (2, 2));
    }

    #[tokio::test]
    async fn feed_failure_backs_off_without_writing() {
        let feed = ScriptedFeed::with(vec![Err(FeedError::Status {
            status: 500,
            message: "Internal Server Error".to_string(),
        })]);
        let mut scheduler = CycleScheduler::new(
            timing(),
            memory_store().await,
            feed,
            btc_portfolio(dec!(1)),
            RecordingPresenter::default(),
        );

        let outcome = scheduler.run_once().await;
        assert!(matches!(outcome, CycleOutcome::Deferred(CycleError::FeedUnavailable(_))));
        assert_eq!(scheduler.state(), SchedulerState::Backoff);
        assert_eq!(scheduler.delay_after(&outcome), Duration::from_secs(120));
        assert_eq!(scheduler.store().row_counts().await.unwrap(), (0, 0));

        let deferred = scheduler.presenter().deferred.lock().unwrap().clone();
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].1, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn retries_indefinitely_then_recovers() {
        let mut responses: Vec<Result<Quotes, FeedError>> =
            (0..5).map(|_| Err(FeedError::NoData)).collect();
        responses.push(Ok(quotes(&[("BTC", dec!(10))])));
        let mut scheduler = CycleScheduler::new(
            timing(),
            memory_store().await,
            ScriptedFeed::with(responses),
            btc_portfolio(dec!(3)),
            RecordingPresenter::default(),
        );

        for _ in 0..5 {
            let outcome = scheduler.run_once().await;
            assert_eq!(scheduler.delay_after(&outcome), Duration::from_secs(120));
        }
        let outcome = scheduler.run_once().await;
        assert!(matches!(outcome, CycleOutcome::Completed(_)));
        assert_eq!(scheduler.feed.calls(), 6);
        assert_eq!(scheduler.store().row_counts().await.unwrap(), (1, 1));
    }

    #[tokio::test]
    async fn missing_config_defers_like_feed_failure() {
        let feed = ScriptedFeed::with(vec![Ok(quotes(&[("BTC", dec!(1))]))]);
        let mut scheduler = CycleScheduler::new(
            timing(),
            memory_store().await,
            feed,
            FixedPortfolio(None),
            RecordingPresenter::default(),
        );

        let outcome = scheduler.run_once().await;
        assert!(matches!(outcome, CycleOutcome::Deferred(CycleError::ConfigUnavailable(_))));
        assert_eq!(scheduler.state(), SchedulerState::Backoff);
        assert_eq!(scheduler.feed.calls(), 0);
        assert_eq!(scheduler.delay_after(&outcome), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn quotes_for_none_of_the_holdings_count_as_feed_failure() {
        let feed = ScriptedFeed::with(vec![Ok(quotes(&[("ETH", dec!(3000))]))]);
        let mut scheduler = CycleScheduler::new(
            timing(),
            memory_store().await,
            feed,
            btc_portfolio(dec!(1)),
            RecordingPresenter::default(),
        );

        let outcome = scheduler.run_once().await;
        assert!(matches!(outcome, CycleOutcome::Deferred(CycleError::FeedUnavailable(FeedError::NoData))));
        assert_eq!(scheduler.store().row_counts().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn unresolved_symbol_still_completes() {
        let feed = ScriptedFeed::with(vec![Ok(quotes(&[("A", dec!(10))]))]);
        let portfolio = FixedPortfolio(Some(PortfolioSpec {
            holdings: vec![Holding::new("A", dec!(1)), Holding::new("B", dec!(2))],
            currency: "USD".to_string(),
        }));
        let mut scheduler = CycleScheduler::new(
            timing(),
            memory_store().await,
            feed,
            portfolio,
            RecordingPresenter::default(),
        );

        let CycleOutcome::Completed(report) = scheduler.run_once().await else {
            panic!("cycle should complete");
        };
        assert_eq!(report.observations.len(), 1);
        assert_eq!(report.unresolved, vec!["B".to_string()]);
        assert_eq!(report.snapshot.total_value, dec!(10));
    }

    #[tokio::test]
    async fn storage_failure_fails_cycle_and_keeps_running() {
        let store = memory_store().await;
        let feed = ScriptedFeed::with(vec![
            Ok(quotes(&[("BTC", dec!(1))])),
            Ok(quotes(&[("BTC", dec!(2))])),
        ]);
        let mut scheduler = CycleScheduler::new(
            timing(),
            store.clone(),
            feed,
            btc_portfolio(dec!(1)),
            RecordingPresenter::default(),
        );
        store.close().await;

        let outcome = scheduler.run_once().await;
        assert!(matches!(outcome, CycleOutcome::Failed(CycleError::Storage(_))));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.delay_after(&outcome), Duration::from_secs(300));
        assert_eq!(scheduler.presenter().failed.lock().unwrap().len(), 1);

        // The scheduler itself is still usable for the next tick
        let outcome = scheduler.run_once().await;
        assert!(matches!(outcome, CycleOutcome::Failed(CycleError::Storage(_))));
    }

    #[tokio::test]
    async fn cycle_is_stamped_when_it_starts_not_when_quotes_arrive() {
        let mut scheduler = CycleScheduler::new(
            timing(),
            memory_store().await,
            SlowFeed(Duration::from_millis(50)),
            btc_portfolio(dec!(1)),
            RecordingPresenter::default(),
        );
        let before = Utc::now();
        let outcome = scheduler.run_once().await;
        let CycleOutcome::Completed(report) = outcome else { panic!("cycle should complete") };

        let stamped = report.snapshot.timestamp;
        assert!(stamped >= before - chrono::Duration::milliseconds(1));
        assert!(stamped < before + chrono::Duration::milliseconds(40));
        assert!(report.observations.iter().all(|o| o.timestamp == stamped));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let from_str: Box<dyn std::any::Any + Send> = Box::new("boom");
        let from_string: Box<dyn std::any::Any + Send> = Box::new("bang".to_string());
        let other: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(from_str.as_ref()), "boom");
        assert_eq!(panic_message(from_string.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "panic during cycle");
    }

    #[tokio::test]
    async fn overflowing_valuation_is_a_failed_cycle() {
        let mut scheduler = CycleScheduler::new(
            timing(),
            memory_store().await,
            OverflowFeed,
            ExplodingHoldings,
            RecordingPresenter::default(),
        );
        let outcome = scheduler.run_once().await;
        assert!(matches!(outcome, CycleOutcome::Failed(CycleError::Unexpected(_))));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.store().row_counts().await.unwrap(), (0, 0));
    }

    #[test]
    fn default_timing_is_five_minutes() {
        let timing = SchedulerTiming::default();
        assert_eq!(timing.poll_interval, Duration::from_secs(300));
        assert_eq!(timing.backoff, Duration::from_secs(300));
    }
}
