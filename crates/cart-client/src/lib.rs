//! Optimistic cart cache for Pantry clients.
//!
//! Mutations are applied to the local cart immediately and sent to the cart
//! API in the background; the server stays the source of truth and the cache
//! reconciles against it with debounced, single-flight fetches.
//!
//! - [`machine`] holds the pure state machine (no I/O, time passed in)
//! - [`timer`] provides the cancellable timer the driver schedules with
//! - [`cache`] is the async driver that owns the machine and runs its effects
//! - [`api`] defines the [`CartApi`] seam and the HTTP implementation
//!
//! ```rust,ignore
//! let api = HttpCartApi::new("https://shop.example.com", Duration::from_secs(10))?;
//! api.start_guest_session().await?;
//! let cache = CartCache::spawn(api);
//! let mut updates = cache.subscribe();
//! cache.fetch(false);
//! cache.add(product, 1);
//! updates.changed().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod machine;
pub mod timer;

pub use api::{CartApi, ClientError, HttpCartApi};
pub use cache::CartCache;
pub use machine::{CartState, ExternalEvent, Mutation, Phase, Timings};
