//! Local development server for static sites.
//!
//! [`serve_site`] runs a site with live reload, on-request compilation and
//! optional CSS autoprefixing. [`serve_scaffolder`] runs the throwaway
//! template picker used when creating a project, and [`export_site`] writes a
//! built copy of a site.

pub mod autoprefix;
pub mod compile;
pub mod config;
pub mod error;
pub mod export;
pub mod handle;
pub mod inject;
pub mod live_reload;
pub mod paths;
pub mod scaffold;
pub mod server;
pub mod site;
pub mod watcher;

pub use config::{Autoprefix, SiteOptions};
pub use error::{CompileError, ConfigError, ExportError, ScaffoldError, ServeError};
pub use export::{export_site, ExportOptions, ExportReport, Exporter, SiteExporter};
pub use handle::ServerHandle;
pub use live_reload::LiveReload;
pub use scaffold::{serve_scaffolder, ScaffoldComplete, ScaffoldServer};
pub use server::{serve_site, SiteServer};
pub use site::SiteMiddleware;
