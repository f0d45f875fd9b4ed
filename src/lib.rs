mod attribute_value;
mod cache;
mod config;
mod constraint;
mod context;
mod error;
mod eval;
mod export;
mod fetcher;
mod flag;
pub mod rollout;
mod segment;
mod snapshot;
mod store;
mod test_common;
mod util;
pub mod validation;
mod variation;

pub use attribute_value::*;
pub use cache::*;
pub use config::*;
pub use constraint::*;
pub use context::*;
pub use error::*;
pub use eval::*;
pub use export::*;
pub use fetcher::*;
pub use flag::*;
pub use segment::*;
pub use snapshot::*;
pub use store::*;
pub use variation::*;
