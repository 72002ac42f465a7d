pub mod launch;
pub mod pool;

pub use launch::{ChromiumLauncher, LaunchSettings};
pub use pool::{LeaseGuard, RendererLease, RendererPool};
