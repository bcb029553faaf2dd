//! `BusTrigger` (C7): dual-mode (push HTTP, pull subscription) ingestor
//! sharing one decode path and one [`push::Pipeline`] dispatch trait.

pub mod decode;
pub mod pull;
pub mod push;

pub use decode::decode_request;
pub use pull::{MessageSource, PullSupervisor};
pub use push::{router as push_router, Pipeline};
