//! Slave Manager and Remote Execution Protocol (spec §4.3, §4.4).

mod client;
mod error;
mod manager;
mod model;
mod server;

pub use client::{ExecuteResponse, HealthResponse, SlaveClient};
pub use error::SlaveError;
pub use manager::SlaveManager;
pub use model::{InstallMethod, Slave};
pub use server::{SlaveServerState, router as slave_router};
