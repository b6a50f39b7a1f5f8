pub mod backoff;
pub mod catalog;
pub mod connector;
pub mod demo;
pub mod descriptor;
pub mod fetcher;
pub mod registry;
pub mod state;

pub use backoff::BackoffPolicy;
pub use connector::{ConnectorSettings, SourceConnector};
pub use descriptor::{ProviderKind, SourceCategory, SourceDescriptor};
pub use fetcher::{DemoFetcher, FetcherFactory, HttpFetcher, ModeFetcherFactory, SourceFetcher};
pub use registry::{RefreshHandle, Registry, SourceMetrics};
pub use state::{RateLimitWindow, SourceSnapshot, SourceState};
