//! Deployment artifact rendering for hostforge.
//!
//! The provisioning sequence writes three families of files onto a host:
//! an nginx reverse-proxy site, one systemd unit per managed service, and
//! the deployed application's runtime JSON config. Each renderer here is a
//! pure function from a spec struct to file contents; the sequencer decides
//! where the bytes land.

pub mod appconfig;
pub mod nginx;
pub mod systemd;

pub use appconfig::{AppConfig, AppConfigError, AppConfigSpec};
pub use nginx::{SiteConfig, Upstream};
pub use systemd::UnitSpec;
