//! Async access to expensive items: coalesced batch loads, per identity caching and lazily loaded fields.
//!
//! # Quick Start
//! Most collections start as a [`Batch`], which caches single item lookups and coalesces them into batched fetches:
//!
//! ```rust,ignore
//! let books = BatchBuilder::new(|ids: Vec<Identity>| async move { fetch_books(ids).await })
//!     .delay_ms(10)
//!     .build();
//!
//! // None for now, the fetch for every id asked for in the next 10ms goes out together
//! assert!(books.get(&Identity::from(42)).is_none());
//! ```
//!
//! Collections whose identities are not known up front are walked page by page with [`OnDemand`].

pub mod error;
#[doc(inline)]
pub use error::{Error, Result};

pub mod identity;
#[doc(inline)]
pub use identity::{Collected, Identifiable, Identity};

/// The coalescing window behind every batch loader.
pub mod buffer;
#[doc(inline)]
pub use buffer::{BufferSlot, CoalescingBuffer};

/// Per identity slots, each loaded at most once.
pub mod cache;
#[doc(inline)]
pub use cache::{IdentityCache, SlotState};

pub mod loader;
#[doc(inline)]
pub use loader::{loader_fn, BatchFetch, Loader};

pub mod retain;
#[doc(inline)]
pub use retain::Retain;

pub mod batch;
#[doc(inline)]
pub use batch::{Batch, BatchUncached};

pub mod builder;
#[doc(inline)]
pub use builder::BatchBuilder;

/// Paginated collections.
pub mod collection;
#[doc(inline)]
pub use collection::{AllBatch, OnDemand, Page, PageLoad};

pub mod item;
#[doc(inline)]
pub use item::{LazyFieldItem, States, WHOLE_ITEM};

pub mod preloaded;
#[doc(inline)]
pub use preloaded::Preloaded;

pub mod write_back;
#[doc(inline)]
pub use write_back::OnDemandValue;

#[cfg(test)]
pub(crate) mod test_util;
