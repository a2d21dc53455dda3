// Shared scoring context: historical portfolio tables and the investment thesis.
// Loaded once in `main` and shared read-only through `AppState`.

pub mod store;
pub mod summary;

pub use store::{thesis_from_upload, ContextError, ContextPaths, ContextStore, PortfolioContext};
