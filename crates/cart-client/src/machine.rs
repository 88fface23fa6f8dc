//! Cart cache state machine.
//!
//! `Idle → Mutating → Reconciling`. Every input is a method taking the current
//! time; every output is a list of [`Effect`]s for the driver to execute. The
//! machine never sleeps, spawns or performs I/O, so tests drive it step by
//! step with synthetic instants.
//!
//! All state changes funnel through one commit point that emits
//! [`Effect::Publish`] only when the published [`CartState`] actually changed.

use std::time::Duration;

use tokio::time::Instant;

use pantry_core::{Money, ProductId};
use pantry_core::cart::{CartItemView, CartView, ProductSummary};

// =============================================================================
// Timings
// =============================================================================

/// Delays and thresholds used by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Minimum time between two passive fetches.
    pub fetch_interval: Duration,
    /// Minimum time between two forced fetches; a forced fetch inside the
    /// window is deferred to its end.
    pub forced_fetch_interval: Duration,
    /// Retry delay after a forced fetch failed.
    pub forced_retry: Duration,
    /// Retry delay after a passive fetch failed.
    pub passive_retry: Duration,
    /// Delay of the consistency fetch after a mutation or external event.
    pub reconcile_delay: Duration,
    /// A tab hidden at least this long refetches when it becomes visible.
    pub visibility_threshold: Duration,
    /// Consecutive fetch failures before `error` is surfaced.
    pub failures_before_error: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            fetch_interval: Duration::from_millis(3000),
            forced_fetch_interval: Duration::from_millis(500),
            forced_retry: Duration::from_millis(2000),
            passive_retry: Duration::from_millis(10_000),
            reconcile_delay: Duration::from_millis(1000),
            visibility_threshold: Duration::from_secs(30),
            failures_before_error: 3,
        }
    }
}

// =============================================================================
// Inputs and outputs
// =============================================================================

/// The cart as observers see it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    pub lines: Vec<CartItemView>,
    /// Sum of quantities.
    pub count: i64,
    pub total: Money,
    /// A fetch is in flight.
    pub loading: bool,
    /// Set after repeated fetch failures; cleared by the next good fetch.
    pub error: Option<String>,
}

impl CartState {
    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartItemView> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    fn with_lines(&self, lines: Vec<CartItemView>) -> Self {
        let view = CartView::from_items(lines);
        Self {
            count: view.item_count(),
            total: view.grand_total,
            lines: view.items,
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

/// A cart change requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Add a line; an existing line is left as it is.
    Add {
        product: ProductSummary,
        quantity: i32,
    },
    /// Replace a line's quantity; zero or less removes it.
    SetQuantity { product_id: ProductId, quantity: i32 },
    /// Adjust a line's quantity; a result of zero or less removes it.
    Adjust { product_id: ProductId, delta: i32 },
    /// Remove a line.
    Remove { product_id: ProductId },
    /// Remove every line.
    Clear,
}

impl Mutation {
    /// The lines after applying this mutation to `lines`, following the
    /// cart API's rules.
    #[must_use]
    pub fn apply(&self, lines: &[CartItemView]) -> Vec<CartItemView> {
        let mut lines = lines.to_vec();
        match self {
            Self::Add { product, quantity } => {
                if !lines.iter().any(|line| line.product_id == product.id) {
                    lines.push(CartItemView::new(*quantity, product.clone()));
                }
            }
            Self::SetQuantity {
                product_id,
                quantity,
            } => change_quantity(&mut lines, *product_id, |_| *quantity),
            Self::Adjust { product_id, delta } => {
                change_quantity(&mut lines, *product_id, |current| {
                    current.saturating_add(*delta)
                });
            }
            Self::Remove { product_id } => lines.retain(|line| line.product_id != *product_id),
            Self::Clear => lines.clear(),
        }
        lines
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::SetQuantity { .. } => "set_quantity",
            Self::Adjust { .. } => "adjust",
            Self::Remove { .. } => "remove",
            Self::Clear => "clear",
        }
    }
}

fn change_quantity(
    lines: &mut Vec<CartItemView>,
    product_id: ProductId,
    change: impl FnOnce(i32) -> i32,
) {
    let Some(pos) = lines.iter().position(|line| line.product_id == product_id) else {
        return;
    };
    let quantity = lines.get(pos).map_or(0, |line| change(line.quantity));
    if quantity <= 0 {
        lines.remove(pos);
    } else if let Some(line) = lines.get_mut(pos) {
        *line = CartItemView::new(quantity, line.product.clone());
    }
}

/// Something outside the cache suggesting the server cart changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalEvent {
    /// Another view changed the cart.
    CartUpdated,
    /// The guest cart was merged after sign-in.
    CartMerged,
    /// The page became visible again after being hidden.
    VisibilityResumed { hidden_for: Duration },
}

/// Timers the machine schedules. Scheduling a kind replaces its pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Retry after a failed fetch.
    Retry,
    /// A forced fetch postponed to the end of the minimum interval.
    Deferred,
    /// Consistency fetch after a mutation or external event.
    Reconcile,
}

/// Identifies one fetch; responses carrying an older id are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchId(u64);

/// Identifies one mutation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(u64);

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start fetching the cart; report back with this id.
    StartFetch(FetchId),
    /// Abort the fetch with this id.
    CancelFetch(FetchId),
    /// Send a mutation to the cart API; report back with this id.
    Send(MutationId, Mutation),
    /// (Re)arm a timer.
    Schedule(TimerKind, Duration),
    /// Disarm a timer.
    CancelTimer(TimerKind),
    /// The published state changed.
    Publish,
}

/// Coarse phase, for observers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing in flight.
    Idle,
    /// At least one mutation awaits the server.
    Mutating,
    /// A fetch is in flight and no mutation is.
    Reconciling,
}

// =============================================================================
// Machine
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct InFlightFetch {
    id: FetchId,
    forced: bool,
    /// `mutation_seq` when the fetch started.
    mutation_seq: u64,
}

/// The cart cache state machine.
#[derive(Debug)]
pub struct CartMachine {
    timings: Timings,
    state: CartState,
    fetch: Option<InFlightFetch>,
    next_fetch: u64,
    next_mutation: u64,
    /// Bumped for every locally applied mutation.
    mutation_seq: u64,
    pending_mutations: usize,
    last_fetch_started: Option<Instant>,
    last_fetch_completed: Option<Instant>,
    failures: u32,
    /// `Some(forced)` while a retry timer is armed.
    retry: Option<bool>,
    deferred: bool,
    closed: bool,
}

impl CartMachine {
    #[must_use]
    pub fn new(timings: Timings) -> Self {
        Self {
            timings,
            state: CartState::default(),
            fetch: None,
            next_fetch: 0,
            next_mutation: 0,
            mutation_seq: 0,
            pending_mutations: 0,
            last_fetch_started: None,
            last_fetch_completed: None,
            failures: 0,
            retry: None,
            deferred: false,
            closed: false,
        }
    }

    /// The published state.
    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    /// When the last applied fetch completed.
    #[must_use]
    pub const fn last_fetch(&self) -> Option<Instant> {
        self.last_fetch_completed
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        if self.pending_mutations > 0 {
            Phase::Mutating
        } else if self.fetch.is_some() {
            Phase::Reconciling
        } else {
            Phase::Idle
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn commit(&mut self, next: CartState, effects: &mut Vec<Effect>) {
        if next != self.state {
            self.state = next;
            effects.push(Effect::Publish);
        }
    }

    /// Ask for an authoritative fetch.
    ///
    /// A passive request is dropped while a fetch is in flight or within
    /// `fetch_interval` of the previous one. A forced request cancels the
    /// in-flight fetch, or is deferred when inside `forced_fetch_interval`.
    pub fn request_fetch(&mut self, now: Instant, force: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.closed || (self.fetch.is_some() && !force) {
            return effects;
        }

        if let Some(started) = self.last_fetch_started {
            let elapsed = now.saturating_duration_since(started);
            let min = if force {
                self.timings.forced_fetch_interval
            } else {
                self.timings.fetch_interval
            };
            if elapsed < min {
                if force {
                    self.deferred = true;
                    effects.push(Effect::Schedule(TimerKind::Deferred, min - elapsed));
                }
                return effects;
            }
        }

        self.start_fetch(now, force, &mut effects);
        effects
    }

    fn start_fetch(&mut self, now: Instant, forced: bool, effects: &mut Vec<Effect>) {
        if let Some(previous) = self.fetch.take() {
            effects.push(Effect::CancelFetch(previous.id));
        }
        if std::mem::take(&mut self.deferred) {
            effects.push(Effect::CancelTimer(TimerKind::Deferred));
        }
        if self.retry.take().is_some() {
            effects.push(Effect::CancelTimer(TimerKind::Retry));
        }

        self.next_fetch += 1;
        let id = FetchId(self.next_fetch);
        self.fetch = Some(InFlightFetch {
            id,
            forced,
            mutation_seq: self.mutation_seq,
        });
        self.last_fetch_started = Some(now);
        effects.push(Effect::StartFetch(id));

        let mut next = self.state.clone();
        next.loading = true;
        self.commit(next, effects);
    }

    /// A fetch returned the server cart.
    ///
    /// Ignored unless `id` is the current fetch. Discarded, with a reconcile
    /// scheduled, when a local mutation was applied after the fetch started
    /// or is still in flight.
    pub fn fetch_succeeded(&mut self, now: Instant, id: FetchId, cart: CartView) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(fetch) = self.take_fetch(id) else {
            return effects;
        };
        self.failures = 0;

        if fetch.mutation_seq != self.mutation_seq || self.pending_mutations > 0 {
            let mut next = self.state.clone();
            next.loading = false;
            self.commit(next, &mut effects);
            effects.push(Effect::Schedule(
                TimerKind::Reconcile,
                self.timings.reconcile_delay,
            ));
            return effects;
        }

        self.last_fetch_completed = Some(now);
        let next = CartState {
            count: cart.item_count(),
            total: cart.grand_total,
            lines: cart.items,
            loading: false,
            error: None,
        };
        self.commit(next, &mut effects);
        effects
    }

    /// A fetch failed. Schedules a retry; surfaces `error` only after
    /// `failures_before_error` consecutive failures.
    pub fn fetch_failed(&mut self, id: FetchId, error: String) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(fetch) = self.take_fetch(id) else {
            return effects;
        };
        self.failures = self.failures.saturating_add(1);

        let mut next = self.state.clone();
        next.loading = false;
        if self.failures >= self.timings.failures_before_error {
            next.error = Some(error);
        }
        self.commit(next, &mut effects);

        let delay = if fetch.forced {
            self.timings.forced_retry
        } else {
            self.timings.passive_retry
        };
        self.retry = Some(fetch.forced);
        effects.push(Effect::Schedule(TimerKind::Retry, delay));
        effects
    }

    fn take_fetch(&mut self, id: FetchId) -> Option<InFlightFetch> {
        if self.closed || self.fetch.is_none_or(|fetch| fetch.id != id) {
            return None;
        }
        self.fetch.take()
    }

    /// Apply a mutation locally and emit the request for it.
    pub fn mutate(&mut self, mutation: Mutation) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.closed {
            return effects;
        }

        let next = self.state.with_lines(mutation.apply(&self.state.lines));
        self.mutation_seq += 1;
        self.pending_mutations += 1;
        self.next_mutation += 1;
        let id = MutationId(self.next_mutation);

        self.commit(next, &mut effects);
        effects.push(Effect::Send(id, mutation));
        effects
    }

    /// The server answered a mutation.
    ///
    /// Success schedules a delayed consistency fetch. Failure forces an
    /// immediate refetch, which replaces the optimistic state with the
    /// server's.
    pub fn mutation_finished(
        &mut self,
        now: Instant,
        id: MutationId,
        result: Result<(), String>,
    ) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        self.pending_mutations = self.pending_mutations.saturating_sub(1);

        match result {
            Ok(()) => vec![Effect::Schedule(
                TimerKind::Reconcile,
                self.timings.reconcile_delay,
            )],
            Err(error) => {
                tracing::debug!(mutation_id = %id, %error, "Mutation rejected, refetching");
                self.request_fetch(now, true)
            }
        }
    }

    /// An external hint that the cart may have changed.
    pub fn external(&mut self, event: ExternalEvent) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        let refetch = match event {
            ExternalEvent::CartUpdated | ExternalEvent::CartMerged => true,
            ExternalEvent::VisibilityResumed { hidden_for } => {
                hidden_for >= self.timings.visibility_threshold
            }
        };
        if refetch {
            vec![Effect::Schedule(
                TimerKind::Reconcile,
                self.timings.reconcile_delay,
            )]
        } else {
            Vec::new()
        }
    }

    /// A scheduled timer fired.
    pub fn timer_fired(&mut self, now: Instant, timer: TimerKind) -> Vec<Effect> {
        match timer {
            TimerKind::Retry => {
                let forced = self.retry.take().unwrap_or(false);
                self.request_fetch(now, forced)
            }
            TimerKind::Deferred => {
                if std::mem::take(&mut self.deferred) {
                    self.request_fetch(now, true)
                } else {
                    Vec::new()
                }
            }
            TimerKind::Reconcile => self.request_fetch(now, true),
        }
    }

    /// Tear down: cancel the in-flight fetch and every timer. Later inputs
    /// are ignored.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        self.deferred = false;
        self.retry = None;

        let mut effects = Vec::new();
        if let Some(fetch) = self.fetch.take() {
            effects.push(Effect::CancelFetch(fetch.id));
        }
        effects.extend(
            [TimerKind::Retry, TimerKind::Deferred, TimerKind::Reconcile]
                .into_iter()
                .map(Effect::CancelTimer),
        );
        effects
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: i64, stock: i32) -> ProductSummary {
        ProductSummary {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Money::from_minor(price),
            stock,
        }
    }

    fn cart(lines: &[(i32, i32, i64)]) -> CartView {
        CartView::from_items(
            lines
                .iter()
                .map(|&(id, quantity, price)| CartItemView::new(quantity, product(id, price, 10)))
                .collect(),
        )
    }

    fn started_fetch(effects: &[Effect]) -> FetchId {
        effects
            .iter()
            .find_map(|effect| match effect {
                Effect::StartFetch(id) => Some(*id),
                _ => None,
            })
            .unwrap()
    }

    fn sent_mutation(effects: &[Effect]) -> MutationId {
        effects
            .iter()
            .find_map(|effect| match effect {
                Effect::Send(id, _) => Some(*id),
                _ => None,
            })
            .unwrap()
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn machine() -> CartMachine {
        CartMachine::new(Timings::default())
    }

    #[test]
    fn test_first_fetch_starts_and_loads() {
        let mut m = machine();
        let t0 = Instant::now();

        let effects = m.request_fetch(t0, false);
        let id = started_fetch(&effects);
        assert!(effects.contains(&Effect::Publish));
        assert!(m.state().loading);
        assert_eq!(m.phase(), Phase::Reconciling);

        let effects = m.fetch_succeeded(t0 + ms(50), id, cart(&[(1, 2, 100)]));
        assert_eq!(effects, vec![Effect::Publish]);
        assert_eq!(m.state().count, 2);
        assert_eq!(m.state().total, Money::from_minor(200));
        assert!(!m.state().loading);
        assert_eq!(m.last_fetch(), Some(t0 + ms(50)));
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn test_passive_fetch_coalesced() {
        let mut m = machine();
        let t0 = Instant::now();
        let id = started_fetch(&m.request_fetch(t0, false));

        // In flight
        assert!(m.request_fetch(t0 + ms(10), false).is_empty());

        m.fetch_succeeded(t0 + ms(20), id, cart(&[]));
        // Inside the passive interval
        assert!(m.request_fetch(t0 + ms(2999), false).is_empty());
        // Past it
        started_fetch(&m.request_fetch(t0 + ms(3000), false));
    }

    #[test]
    fn test_forced_fetch_cancels_in_flight() {
        let mut m = machine();
        let t0 = Instant::now();
        let first = started_fetch(&m.request_fetch(t0, false));

        let effects = m.request_fetch(t0 + ms(600), true);
        assert!(effects.contains(&Effect::CancelFetch(first)));
        let second = started_fetch(&effects);
        assert_ne!(first, second);

        // The cancelled fetch's late response is ignored
        assert!(m.fetch_succeeded(t0 + ms(700), first, cart(&[(1, 1, 5)])).is_empty());
        assert!(m.state().lines.is_empty());
        assert!(m.state().loading);
    }

    #[test]
    fn test_forced_fetch_inside_window_is_deferred() {
        let mut m = machine();
        let t0 = Instant::now();
        let id = started_fetch(&m.request_fetch(t0, true));
        m.fetch_succeeded(t0 + ms(100), id, cart(&[]));

        let effects = m.request_fetch(t0 + ms(200), true);
        assert_eq!(
            effects,
            vec![Effect::Schedule(TimerKind::Deferred, ms(300))]
        );

        let effects = m.timer_fired(t0 + ms(500), TimerKind::Deferred);
        started_fetch(&effects);
    }

    #[test]
    fn test_stale_response_discarded_after_mutation() {
        let mut m = machine();
        let t0 = Instant::now();
        let id = started_fetch(&m.request_fetch(t0, true));

        let effects = m.mutate(Mutation::Add {
            product: product(7, 250, 5),
            quantity: 2,
        });
        let mutation = sent_mutation(&effects);
        assert_eq!(m.state().count, 2);
        assert_eq!(m.phase(), Phase::Mutating);

        // Server snapshot from before the add must not overwrite it
        let effects = m.fetch_succeeded(t0 + ms(100), id, cart(&[]));
        assert!(effects.contains(&Effect::Schedule(TimerKind::Reconcile, ms(1000))));
        assert_eq!(m.state().count, 2);
        assert!(m.state().line(ProductId::new(7)).is_some());

        let effects = m.mutation_finished(t0 + ms(150), mutation, Ok(()));
        assert_eq!(
            effects,
            vec![Effect::Schedule(TimerKind::Reconcile, ms(1000))]
        );

        let id = started_fetch(&m.timer_fired(t0 + ms(1150), TimerKind::Reconcile));
        m.fetch_succeeded(t0 + ms(1200), id, cart(&[(7, 2, 250)]));
        assert_eq!(m.state().total, Money::from_minor(500));
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn test_failed_mutation_forces_refetch() {
        let mut m = machine();
        let t0 = Instant::now();
        let id = started_fetch(&m.request_fetch(t0, false));
        m.fetch_succeeded(t0 + ms(10), id, cart(&[(1, 1, 100)]));

        let mutation = sent_mutation(&m.mutate(Mutation::SetQuantity {
            product_id: ProductId::new(1),
            quantity: 9,
        }));
        assert_eq!(m.state().count, 9);

        let effects = m.mutation_finished(t0 + ms(2000), mutation, Err("409".into()));
        let id = started_fetch(&effects);
        m.fetch_succeeded(t0 + ms(2100), id, cart(&[(1, 1, 100)]));
        assert_eq!(m.state().count, 1);
    }

    #[test]
    fn test_failures_surface_error_after_threshold() {
        let mut m = machine();
        let t0 = Instant::now();

        let id = started_fetch(&m.request_fetch(t0, false));
        let effects = m.fetch_failed(id, "offline".into());
        assert!(effects.contains(&Effect::Schedule(TimerKind::Retry, ms(10_000))));
        assert_eq!(m.state().error, None);

        let id = started_fetch(&m.timer_fired(t0 + ms(10_000), TimerKind::Retry));
        m.fetch_failed(id, "offline".into());
        assert_eq!(m.state().error, None);

        let id = started_fetch(&m.timer_fired(t0 + ms(20_000), TimerKind::Retry));
        m.fetch_failed(id, "offline".into());
        assert_eq!(m.state().error.as_deref(), Some("offline"));

        let id = started_fetch(&m.timer_fired(t0 + ms(30_000), TimerKind::Retry));
        m.fetch_succeeded(t0 + ms(30_100), id, cart(&[]));
        assert_eq!(m.state().error, None);
    }

    #[test]
    fn test_forced_failure_retries_sooner() {
        let mut m = machine();
        let t0 = Instant::now();
        let id = started_fetch(&m.request_fetch(t0, true));
        let effects = m.fetch_failed(id, "timeout".into());
        assert!(effects.contains(&Effect::Schedule(TimerKind::Retry, ms(2000))));
    }

    #[test]
    fn test_unchanged_state_not_published() {
        let mut m = machine();
        let t0 = Instant::now();
        let id = started_fetch(&m.request_fetch(t0, false));
        m.fetch_succeeded(t0, id, cart(&[(1, 1, 100)]));

        // Adding an existing line changes nothing locally
        let effects = m.mutate(Mutation::Add {
            product: product(1, 100, 10),
            quantity: 3,
        });
        assert!(!effects.contains(&Effect::Publish));
        assert_eq!(m.state().count, 1);
    }

    #[test]
    fn test_external_events_schedule_reconcile() {
        let mut m = machine();
        assert_eq!(
            m.external(ExternalEvent::CartMerged),
            vec![Effect::Schedule(TimerKind::Reconcile, ms(1000))]
        );
        assert!(
            m.external(ExternalEvent::VisibilityResumed {
                hidden_for: Duration::from_secs(5)
            })
            .is_empty()
        );
        assert_eq!(
            m.external(ExternalEvent::VisibilityResumed {
                hidden_for: Duration::from_secs(30)
            }),
            vec![Effect::Schedule(TimerKind::Reconcile, ms(1000))]
        );
    }

    #[test]
    fn test_shutdown_cancels_everything() {
        let mut m = machine();
        let t0 = Instant::now();
        let id = started_fetch(&m.request_fetch(t0, false));

        let effects = m.shutdown();
        assert!(effects.contains(&Effect::CancelFetch(id)));
        assert!(effects.contains(&Effect::CancelTimer(TimerKind::Retry)));
        assert!(effects.contains(&Effect::CancelTimer(TimerKind::Deferred)));
        assert!(effects.contains(&Effect::CancelTimer(TimerKind::Reconcile)));
        assert!(m.is_closed());

        assert!(m.request_fetch(t0 + ms(5000), true).is_empty());
        assert!(m.mutate(Mutation::Clear).is_empty());
        assert!(m.fetch_succeeded(t0, id, cart(&[])).is_empty());
        assert!(m.shutdown().is_empty());
    }

    #[test]
    fn test_local_mutation_rules() {
        let lines = cart(&[(1, 2, 100), (2, 1, 50)]).items;

        let after = Mutation::Adjust {
            product_id: ProductId::new(1),
            delta: -2,
        }
        .apply(&lines);
        assert_eq!(after.len(), 1);

        let after = Mutation::SetQuantity {
            product_id: ProductId::new(2),
            quantity: 4,
        }
        .apply(&lines);
        assert_eq!(after.get(1).unwrap().quantity, 4);
        assert_eq!(after.get(1).unwrap().item_total, Money::from_minor(200));

        // Adjusting a missing line is a no-op
        let after = Mutation::Adjust {
            product_id: ProductId::new(3),
            delta: 1,
        }
        .apply(&lines);
        assert_eq!(after, lines);

        assert!(Mutation::Clear.apply(&lines).is_empty());
    }
}
