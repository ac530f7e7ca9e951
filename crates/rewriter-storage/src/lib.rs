//! Rule source backends and the loader turning their records into rules.

pub mod loader;
pub mod memory;
pub mod mysql;

pub use loader::{parse_rules_table, RuleLoader};
pub use memory::InMemoryRuleSource;
pub use mysql::MySqlRuleSource;
