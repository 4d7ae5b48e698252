mod opencharts;
pub use opencharts::OpenChartsSource;

mod validation;
pub use validation::Validate;
