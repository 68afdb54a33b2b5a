mod config;
mod context;
mod eval;
mod feature;
mod hash;
mod route;
mod store;
mod test_common;

pub use config::*;
pub use context::*;
pub use eval::*;
pub use feature::*;
pub use hash::*;
pub use route::*;
pub use store::*;
