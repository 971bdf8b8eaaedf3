pub mod catalog;
pub mod factory;
pub mod handlers;
pub mod strategies;
pub mod validation;

pub use catalog::StandardResearchCatalog;
pub use handlers::PlaceholderHandler;
pub use validation::CoverageValidator;
