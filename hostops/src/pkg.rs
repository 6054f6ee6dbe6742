use crate::exec::{stderr_snippet, Cmd, ExecError};
use thiserror::Error;
use tracing::{debug, info};

/// Package managers supported on target hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// Debian/Ubuntu apt-get
    AptGet,
    /// Fedora/RHEL dnf
    Dnf,
    /// No supported package manager available
    None,
}

impl PackageManager {
    /// Get the command name for this package manager
    pub fn command(&self) -> &'static str {
        match self {
            PackageManager::AptGet => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::None => "",
        }
    }

    /// Check if this package manager can be used
    pub fn is_available(&self) -> bool {
        matches!(self, PackageManager::AptGet | PackageManager::Dnf)
    }

    /// Detect the package manager present on this host, preferring apt-get.
    pub fn detect() -> PackageManager {
        if Cmd::new("apt-get").arg("--version").probe() {
            return PackageManager::AptGet;
        }

        if Cmd::new("dnf").arg("--version").probe() {
            return PackageManager::Dnf;
        }

        PackageManager::None
    }
}

/// Package operation errors
#[derive(Error, Debug)]
pub enum PkgError {
    /// No supported package manager on the host
    #[error("No supported package manager available. Install apt-get or dnf on the target host.")]
    NoPackageManager,

    /// Querying installed state failed
    #[error("Failed to query package '{package}': {reason}")]
    QueryFailed { package: String, reason: String },

    /// Installation failed
    #[error("Package installation via {manager} failed: {reason}")]
    InstallFailed { manager: String, reason: String },

    /// Command execution failed
    #[error("Command execution failed: {0}")]
    Exec(#[from] ExecError),
}

pub type PkgResult<T> = Result<T, PkgError>;

/// Outcome of an install pass: what was already there and what got installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    pub already_present: Vec<String>,
    pub installed: Vec<String>,
}

impl InstallPlan {
    /// True when the pass performed no mutating command.
    pub fn is_noop(&self) -> bool {
        self.installed.is_empty()
    }
}

/// Check whether a single package is installed.
pub fn is_installed(manager: PackageManager, package: &str) -> PkgResult<bool> {
    if !manager.is_available() {
        return Err(PkgError::NoPackageManager);
    }

    let query = match manager {
        PackageManager::AptGet => Cmd::new("dpkg-query")
            .arg("-W")
            .arg("--showformat=${Status}")
            .arg(package),
        PackageManager::Dnf => Cmd::new("rpm").arg("-q").arg(package),
        PackageManager::None => unreachable!(),
    };

    let output = query.output().map_err(|e| PkgError::QueryFailed {
        package: package.to_string(),
        reason: e.to_string(),
    })?;

    let present = match manager {
        // dpkg-query exits zero for known-but-removed packages too, so the
        // status field is what counts.
        PackageManager::AptGet => {
            output.status.success()
                && String::from_utf8_lossy(&output.stdout).contains("install ok installed")
        }
        _ => output.status.success(),
    };

    Ok(present)
}

/// Return the subset of `packages` already installed on the host.
pub fn installed(manager: PackageManager, packages: &[String]) -> PkgResult<Vec<String>> {
    let mut present = Vec::new();
    for package in packages {
        if is_installed(manager, package)? {
            present.push(package.clone());
        }
    }
    Ok(present)
}

/// Install every package in `packages` that is not already present.
///
/// A fully converged host produces an [`InstallPlan`] with an empty
/// `installed` list and no package-manager invocation at all.
pub fn install_missing(manager: PackageManager, packages: &[String]) -> PkgResult<InstallPlan> {
    if packages.is_empty() {
        return Ok(InstallPlan::default());
    }

    if !manager.is_available() {
        return Err(PkgError::NoPackageManager);
    }

    let already_present = installed(manager, packages)?;
    let missing: Vec<String> = packages
        .iter()
        .filter(|p| !already_present.contains(p))
        .cloned()
        .collect();

    if missing.is_empty() {
        debug!("All {} requested packages already installed", packages.len());
        return Ok(InstallPlan {
            already_present,
            installed: Vec::new(),
        });
    }

    info!(packages = ?missing, "Installing missing packages");

    let install = match manager {
        PackageManager::AptGet => Cmd::new("apt-get")
            .args(["install", "-y"])
            .args(missing.iter().cloned())
            .env("DEBIAN_FRONTEND", "noninteractive"),
        PackageManager::Dnf => Cmd::new("dnf")
            .args(["install", "-y"])
            .args(missing.iter().cloned()),
        PackageManager::None => unreachable!(),
    };

    let output = install.output()?;
    if !output.status.success() {
        return Err(PkgError::InstallFailed {
            manager: manager.command().to_string(),
            reason: stderr_snippet(&output),
        });
    }

    Ok(InstallPlan {
        already_present,
        installed: missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_manager_command() {
        assert_eq!(PackageManager::AptGet.command(), "apt-get");
        assert_eq!(PackageManager::Dnf.command(), "dnf");
        assert_eq!(PackageManager::None.command(), "");
    }

    #[test]
    fn test_package_manager_availability() {
        assert!(PackageManager::AptGet.is_available());
        assert!(PackageManager::Dnf.is_available());
        assert!(!PackageManager::None.is_available());
    }

    #[test]
    fn test_detect_returns_valid_variant() {
        // We can't predict what the test environment has installed, only
        // that detection settles on one of the declared variants.
        match PackageManager::detect() {
            PackageManager::AptGet | PackageManager::Dnf | PackageManager::None => {}
        }
    }

    #[test]
    fn test_install_missing_empty_list_is_noop() {
        let plan = install_missing(PackageManager::None, &[]).unwrap();
        assert!(plan.is_noop());
        assert!(plan.already_present.is_empty());
    }

    #[test]
    fn test_install_missing_requires_manager() {
        let result = install_missing(PackageManager::None, &["curl".to_string()]);
        assert!(matches!(result, Err(PkgError::NoPackageManager)));
    }

    #[test]
    fn test_is_installed_requires_manager() {
        let result = is_installed(PackageManager::None, "curl");
        assert!(matches!(result, Err(PkgError::NoPackageManager)));
    }

    #[test]
    fn test_error_display() {
        let error = PkgError::InstallFailed {
            manager: "apt-get".to_string(),
            reason: "no network".to_string(),
        };
        assert!(error.to_string().contains("apt-get"));
        assert!(error.to_string().contains("no network"));
    }
}
