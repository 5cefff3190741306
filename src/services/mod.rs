pub mod discovery;
pub mod enrichment;
pub mod providers;
pub mod query_expander;
pub mod scoring;
pub mod selector;

pub use discovery::DiscoveryOrchestrator;
pub use enrichment::EnrichmentClient;
pub use query_expander::QueryExpander;
