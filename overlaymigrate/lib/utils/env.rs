//! Utility functions for working with environment variables.

use std::{env, path::PathBuf};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable naming the file that receives a failure report when a migration fails.
pub const DIAGNOSTIC_LOGFILE_ENV_VAR: &str = "OVERLAYMIGRATE_LOGFILE";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the diagnostic log path configured in the environment, if any.
///
/// An empty value is treated as unset.
pub fn diagnostic_log_from_env() -> Option<PathBuf> {
    env::var_os(DIAGNOSTIC_LOGFILE_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
