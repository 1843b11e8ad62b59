//! # skillswap-core
//!
//! The pairwise chat authorization and messaging subsystem of SkillSwap.
//!
//! For any two users it decides whether they may exchange messages (the
//! request [`ledger`]), assigns their conversation a canonical identity,
//! persists an ordered message history, and fans mutations out to live
//! observers (the [`broker`]).  The presentation layer talks to the
//! [`service::ChatService`] facade; per-UI state lives in a
//! [`session::ChatSession`].

pub mod broker;
pub mod config;
pub mod directory;
pub mod ledger;
pub mod service;
pub mod session;

mod error;

pub use broker::{Broker, ChatEvent, Subscription, Topic};
pub use config::CoreConfig;
pub use directory::{StoreDirectory, UserDirectory, UserProfile};
pub use error::ChatError;
pub use ledger::{PairStatus, RequestLedger};
pub use service::{ChatService, IncomingRequest, PeerSummary};
pub use session::ChatSession;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing for an embedding application.
///
/// `RUST_LOG` wins when set; otherwise a moderate default filter is used.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("skillswap_core=debug,skillswap_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
