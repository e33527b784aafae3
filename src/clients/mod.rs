pub mod upstream_client;

pub use upstream_client::{StaticUpstream, UpstreamClient, UpstreamService};
