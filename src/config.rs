// src/config.rs

//! Default locations and names shared by both binaries

/// Package database directory, relative to the install root
pub const DEFAULT_DB_PATH: &str = "var/lib/pkg";

/// Ports tree on the host
pub const DEFAULT_PORTS_PATH: &str = "/usr/ports";

/// Post-install hook directory, relative to the install root
pub const HOOKS_DIR: &str = "usr/lib/pkg-hooks";

/// Unprivileged user that runs port builds
pub const DEFAULT_BUILD_USER: &str = "nobody";

/// Name of the advisory lock directory inside the database
pub const LOCK_DIR_NAME: &str = ".LOCK";

/// Sentinel files inside a package directory
pub const PACKAGE_NAME_FILE: &str = ".name";
pub const PACKAGE_VERSION_FILE: &str = ".version";

/// Suffixes for files staged next to their install destination
pub const STAGING_SUFFIX: &str = ".pkg.transaction.new";
pub const BACKUP_SUFFIX: &str = ".pkg.transaction.backup";
