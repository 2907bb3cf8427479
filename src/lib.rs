//! Blog export migration engine.
//!
//! Pipeline: a format-specific parser normalizes a source export into
//! [`model::MigrateData`], the task builder turns that batch into ordered
//! tiers of create-resource tasks, and the runner replays the tiers against
//! a remote instance through [`client::PlatformClient`].

pub mod client;
pub mod decode;
pub mod logging;
pub mod markdown;
pub mod matter;
pub mod model;
pub mod parser;
pub mod resolve;
pub mod runner;
pub mod tasks;

pub use client::{HttpClient, PlatformClient};
pub use model::MigrateData;
pub use parser::{ParseError, ParseOptions, SourceFormat};
pub use runner::{run_plan, MigrationReport};
pub use tasks::{build_tasks, TaskContext, TaskPlan};
