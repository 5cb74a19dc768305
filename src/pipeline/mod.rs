pub mod builder;
pub mod output;
pub mod runtime;
pub mod traits;
