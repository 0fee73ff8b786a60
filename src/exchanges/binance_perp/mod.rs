// Core modules - one responsibility per file
pub mod rest; // client wrapper, batch encoding, listen-key bridge
pub mod signer; // HMAC-SHA256 request signing
pub mod streams; // stream names and hosts

// Endpoint groups, each an impl block on BinancePerpRestClient
pub mod account;
pub mod market_data;
pub mod trading;

pub mod builder;
pub mod connector; // REST + market streams + user data

// Re-export main types for easier importing
pub use builder::{build_connector, build_rest_client};
pub use connector::{BinancePerpConnector, MarketStreams, UserData};
pub use rest::{BinancePerpRestClient, OrderRef, OrderRefs};
pub use signer::BinancePerpSigner;
pub use streams::build_stream_url;
