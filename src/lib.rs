pub mod artifacts;
pub mod config;
pub mod consensus;
pub mod eligibility;
pub mod export;
pub mod http_client;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod projector;
pub mod ranker;
pub mod reconcile;
pub mod record;
pub mod remote;
pub mod snapshot;
pub mod top_n;
