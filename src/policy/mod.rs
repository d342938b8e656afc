pub mod allowlists;
pub mod engine;
pub mod loader;

pub use allowlists::AllowlistRegistry;
pub use engine::{decide, target_domain};
pub use loader::{default_rules, seed_default_rules, PolicyLoader};
