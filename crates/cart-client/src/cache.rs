//! Async driver for the cart state machine.
//!
//! One task owns the [`CartMachine`] and is its only writer. Public calls,
//! fetch and mutation results, and timer firings all arrive on one channel
//! and are fed to the machine in order; the resulting effects are executed
//! here. Observers read the state through a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use pantry_core::ProductId;
use pantry_core::cart::{CartView, ProductSummary};

use crate::api::CartApi;
use crate::machine::{
    CartMachine, CartState, Effect, ExternalEvent, FetchId, Mutation, MutationId, TimerKind,
    Timings,
};
use crate::timer::CancellableTimer;

#[derive(Debug)]
enum Command {
    Fetch {
        force: bool,
    },
    Mutate(Mutation),
    External(ExternalEvent),
    FetchDone {
        id: FetchId,
        result: Result<CartView, String>,
    },
    MutationDone {
        id: MutationId,
        result: Result<(), String>,
    },
    TimerFired {
        timer: TimerKind,
        generation: u64,
    },
    Shutdown,
}

/// Handle to a running cart cache.
///
/// Calls return immediately; their effect is visible through
/// [`CartCache::subscribe`]. Dropping the handle shuts the cache down.
#[derive(Debug)]
pub struct CartCache {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<CartState>,
    task: JoinHandle<()>,
}

impl CartCache {
    /// Start a cache over `api` with the default timings.
    #[must_use]
    pub fn spawn<A: CartApi>(api: A) -> Self {
        Self::with_timings(api, Timings::default())
    }

    /// Start a cache over `api`.
    #[must_use]
    pub fn with_timings<A: CartApi>(api: A, timings: Timings) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(CartState::default());

        let driver = Driver {
            api: Arc::new(api),
            machine: CartMachine::new(timings),
            commands: commands.clone(),
            state: state_tx,
            fetch: None,
            timers: Timers::default(),
        };
        let task = tokio::spawn(driver.run(receiver));

        Self {
            commands,
            state,
            task,
        }
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.clone()
    }

    /// The current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// Request an authoritative fetch (coalesced; see [`Timings`]).
    pub fn fetch(&self, force: bool) {
        self.send(Command::Fetch { force });
    }

    /// Add a line, or leave an existing line untouched.
    pub fn add(&self, product: ProductSummary, quantity: i32) {
        self.send(Command::Mutate(Mutation::Add { product, quantity }));
    }

    /// Set a line's quantity; zero or less removes it.
    pub fn set_quantity(&self, product_id: ProductId, quantity: i32) {
        self.send(Command::Mutate(Mutation::SetQuantity {
            product_id,
            quantity,
        }));
    }

    /// Adjust a line's quantity by `delta`.
    pub fn adjust(&self, product_id: ProductId, delta: i32) {
        self.send(Command::Mutate(Mutation::Adjust { product_id, delta }));
    }

    /// Remove a line.
    pub fn remove(&self, product_id: ProductId) {
        self.send(Command::Mutate(Mutation::Remove { product_id }));
    }

    /// Remove every line.
    pub fn clear(&self) {
        self.send(Command::Mutate(Mutation::Clear));
    }

    /// Report an external hint that the cart may have changed.
    pub fn notify(&self, event: ExternalEvent) {
        self.send(Command::External(event));
    }

    /// Stop the cache: the in-flight fetch and all timers are cancelled and
    /// later calls are ignored.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    /// Whether the driver task has exited.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Cart cache already stopped");
        }
    }
}

impl Drop for CartCache {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

// =============================================================================
// Driver
// =============================================================================

#[derive(Debug, Default)]
struct Timers {
    retry: CancellableTimer,
    deferred: CancellableTimer,
    reconcile: CancellableTimer,
}

impl Timers {
    fn get(&mut self, timer: TimerKind) -> &mut CancellableTimer {
        match timer {
            TimerKind::Retry => &mut self.retry,
            TimerKind::Deferred => &mut self.deferred,
            TimerKind::Reconcile => &mut self.reconcile,
        }
    }
}

struct Driver<A> {
    api: Arc<A>,
    machine: CartMachine,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Sender<CartState>,
    fetch: Option<(FetchId, JoinHandle<()>)>,
    timers: Timers,
}

impl<A: CartApi> Driver<A> {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = receiver.recv().await {
            let now = Instant::now();
            let effects = match command {
                Command::Fetch { force } => self.machine.request_fetch(now, force),
                Command::Mutate(mutation) => {
                    tracing::debug!(mutation = mutation.name(), "Applying optimistic mutation");
                    self.machine.mutate(mutation)
                }
                Command::External(event) => self.machine.external(event),
                Command::FetchDone { id, result } => {
                    if self.fetch.as_ref().is_some_and(|(current, _)| *current == id) {
                        self.fetch = None;
                    }
                    match result {
                        Ok(cart) => self.machine.fetch_succeeded(now, id, cart),
                        Err(error) => {
                            tracing::warn!(%error, "Cart fetch failed");
                            self.machine.fetch_failed(id, error)
                        }
                    }
                }
                Command::MutationDone { id, result } => {
                    self.machine.mutation_finished(now, id, result)
                }
                Command::TimerFired { timer, generation } => {
                    let slot = self.timers.get(timer);
                    if !slot.is_current(generation) {
                        continue;
                    }
                    slot.fired();
                    self.machine.timer_fired(now, timer)
                }
                Command::Shutdown => {
                    let effects = self.machine.shutdown();
                    self.execute(effects);
                    break;
                }
            };
            self.execute(effects);
        }
        tracing::debug!("Cart cache stopped");
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartFetch(id) => {
                    let api = Arc::clone(&self.api);
                    let commands = self.commands.clone();
                    let handle = tokio::spawn(async move {
                        let result = api.fetch().await.map_err(|e| e.to_string());
                        let _ = commands.send(Command::FetchDone { id, result });
                    });
                    if let Some((_, previous)) = self.fetch.replace((id, handle)) {
                        previous.abort();
                    }
                }
                Effect::CancelFetch(id) => {
                    if self.fetch.as_ref().is_some_and(|(current, _)| *current == id)
                        && let Some((_, handle)) = self.fetch.take()
                    {
                        handle.abort();
                    }
                }
                Effect::Send(id, mutation) => {
                    let api = Arc::clone(&self.api);
                    let commands = self.commands.clone();
                    tokio::spawn(async move {
                        let result = api.apply(&mutation).await.map_err(|e| e.to_string());
                        let _ = commands.send(Command::MutationDone { id, result });
                    });
                }
                Effect::Schedule(timer, after) => self.schedule(timer, after),
                Effect::CancelTimer(timer) => self.timers.get(timer).cancel(),
                Effect::Publish => {
                    self.state.send_replace(self.machine.state().clone());
                }
            }
        }
    }

    fn schedule(&mut self, timer: TimerKind, after: Duration) {
        let commands = self.commands.clone();
        self.timers.get(timer).schedule(after, move |generation| {
            let _ = commands.send(Command::TimerFired { timer, generation });
        });
    }
}

impl<A> Drop for Driver<A> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.fetch.take() {
            handle.abort();
        }
    }
}
