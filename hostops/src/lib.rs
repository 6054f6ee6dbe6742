//! Typed host subsystem access for hostforge.
//!
//! Every mutating operation the provisioning sequence performs on a host
//! goes through this crate: package installation, systemd service control,
//! system account creation, host fact gathering, and remote execution over
//! ssh. All of it shells out to the standard host tooling and maps failures
//! into typed errors instead of raw exit codes.

pub mod account;
pub mod exec;
pub mod facts;
pub mod pkg;
pub mod remote;
pub mod svc;

pub use account::{
    ensure_group, ensure_system_user, group_exists, user_exists, AccountError, AccountResult,
    Ensured, SystemUserSpec,
};
pub use exec::{Cmd, ExecError, ExecResult};
pub use facts::{is_root, FactsError, FactsResult, HostFacts};
pub use pkg::{install_missing, installed, InstallPlan, PackageManager, PkgError, PkgResult};
pub use remote::{RemoteError, RemoteHost, RemoteResult};
pub use svc::{ServiceManager, SvcError, SvcResult, UnitActivity, UnitState};
