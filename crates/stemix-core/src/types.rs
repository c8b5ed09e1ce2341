//! Core domain types for Stemix.

pub mod channel;
pub mod common;
pub mod format;
pub mod job;
pub mod stem;
pub mod transport;

pub use channel::{
    any_soloed, clamp_pan, clamp_volume_db, db_to_gain, is_audible, ChannelState, MAX_PAN, MAX_VOLUME_DB, MIN_PAN,
    MIN_VOLUME_DB,
};
pub use common::format_time;
pub use format::AudioFormat;
pub use job::{JobStatus, JobStatusResponse, Metadata, ResultResponse};
pub use stem::StemSet;
pub use transport::TransportState;
