//! Rule matching and the per-request rewrite pipeline.

pub mod matcher;
pub mod pipeline;
pub mod request;

pub use matcher::{match_host, match_url, UrlMatch};
pub use pipeline::{RedirectReason, RewriteOutcome, RewritePipeline};
pub use request::{InboundRequest, SiteBinding, SiteContext, SiteMap, SiteResolver};
