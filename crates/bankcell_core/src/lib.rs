//! Core of bankcell: a hierarchical cell store of banks, registers and
//! addresses with cross-cell references and external plugin runs.

pub mod config;
pub mod extension;
pub mod format;
pub mod logging;
pub mod model;
pub mod repo;
pub mod resolve;
pub mod service;
pub mod workspace;

pub use config::{Config, ConfigError, Paths};
pub use extension::kernel::{
    CellSource, PluginKernel, PluginRunError, PluginRunOutput, PluginRunRequest,
};
pub use extension::manifest::{ManifestError, PluginManifest};
pub use format::{parse_bank_text, write_bank_text, ParseError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::bank::{Bank, CellKey, Register, DEFAULT_REGISTER};
pub use model::ids::{AddressId, BankId, IdError, RegisterId};
pub use repo::bank_repo::{BankRepository, FileBankRepository, RepoError, RepoResult};
pub use resolve::{NeedsBank, Resolver};
pub use service::export::BankExport;
pub use service::workspace_service::{OpenOutcome, ServiceError, WorkspaceService};
pub use workspace::{Lookup, Workspace};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
