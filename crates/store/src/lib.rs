//! # Medianet Artifact Store
//!
//! Durable, epoch-keyed JSON artifacts under a per-account directory:
//!
//! ```text
//! <data_dir>/<account>/
//!     run.lock                     exclusive, held for the run
//!     commit_<account>.json        written in Commit, required in Reveal
//!     propose_<account>.json       written in Propose, required in Dispute
//!     dispute_<account>.json       bounty queue, append/pop
//! ```
//!
//! Writes go to `<name>.json.tmp`, are flushed and fsynced, then renamed
//! over the target, so a crash at any point leaves the old or the new
//! file, never a partial one. Reads re-validate each artifact's
//! structural invariants; a file that fails validation is reported
//! corrupt and left untouched for manual inspection.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

mod store;

pub use store::FileStore;
