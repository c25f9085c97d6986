//! # Medianet Engine
//!
//! The epoch state machine of the oracle staker client. Wall time is
//! partitioned into epochs, each epoch into five sub-state windows, and
//! the engine does one pass of work in each:
//!
//! ```text
//! ┌──────────┐  sample data sources, seal the vote
//! │  COMMIT  │  CommitFile durable → commit(epoch, commitment)
//! └────┬─────┘
//!      ▼
//! ┌──────────┐  disclose the committed vote
//! │  REVEAL  │  reveal(epoch, values, secret)
//! └────┬─────┘
//!      ▼
//! ┌──────────┐  if elected: canonical medians from reveal events
//! │ PROPOSE  │  ProposeFile durable → propose(epoch, ids, medians, …)
//! └────┬─────┘
//!      ▼
//! ┌──────────┐  verify every peer block, dispute the first violation,
//! │ DISPUTE  │  queue granted bounties, claim matured ones
//! └────┬─────┘
//!      ▼
//! ┌──────────┐  claim the block reward if our block was confirmed
//! │ CONFIRM  │
//! └──────────┘
//! ```
//!
//! Transient failures never cross a sub-state boundary: they are retried
//! under the configured budgets and then collapse into a logged
//! `SkipEpoch`. Only configuration errors, corrupt artifacts and fatal
//! signing failures stop the loop.
//!
//! Every component takes its collaborators (chain, clock, store,
//! fetcher) as explicit handles; nothing here reaches for ambient
//! state, which is what keeps the dispute logic testable against scripted
//! chains.

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod bounty;
pub mod clock;
pub mod commit;
pub mod dispute;
pub mod propose;
pub mod reveal;
pub mod run;

pub use bounty::{seconds_to_readable, BountyClaimer, ClaimOutcome, ClaimReport};
pub use clock::{EpochClock, EpochState, NUM_EPOCH_STATES};
pub use commit::Committer;
pub use dispute::{DisputeEngine, DisputeSummary, INITIAL_GIVE_SORTED_BATCH};
pub use propose::{election_iteration, Proposal, Proposer};
pub use reveal::Revealer;
pub use run::{shutdown_channel, StakerLoop};
