/*!
# AOC Diagnostic Portal

A browser-based front end for the AOC / AHR structural diagnostic service.

## Overview

A user uploads a CSV of trading-system decisions. The portal extracts the
decision trajectory for display and forwards the file to the external
diagnostic API. It shows the returned metrics and gates the trajectory chart
behind an exposure level. Once the user accepts the terms and logs in, it
offers a link to the external checkout page.

The diagnostic computation itself lives behind the remote API; this crate
only uploads files, keeps per-session state and renders results.

## Flow

`no file → file loaded → diagnosis ready → terms accepted → (logged in ? payment link : login required)`,
with an explicit reset back to *no file*.

## Modules

- **classify**: Pure threshold classifiers (activity band, structural label, exposure level)
- **loader**: CSV ingestion and value-column selection
- **diagnosis**: Remote result and purchased-report payloads
- **session**: Per-session context, flow stages and the session store
- **payment**: Checkout link composition
- **config**: Environment-driven settings
- **error**: Error types
- **api**: HTTP clients for the diagnostic, PDF, auth and reports endpoints (`web`)
- **graph**: Trajectory chart rendering (`web`)
- **render**: Page view models and templates (`web`)
- **app**: Routing and handlers (`web`)

## Routes

- `/` - Portal page for the current stage
- `/upload`, `/diagnose`, `/terms`, `/reset` - Flow actions
- `/chart.png` - Trajectory chart, only at full exposure
- `/report.pdf` - Purchased PDF report
- `/login`, `/register`, `/logout`, `/reports` - Account pages
*/

pub mod classify;
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod loader;
pub mod payment;
pub mod session;

#[cfg(feature = "web")]
pub mod api;
#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod render;

pub use classify::{
    ActivityLevel, ExposureLevel, StructuralLabel, classify_activity, get_exposure_level,
    structural_label,
};
pub use config::Config;
pub use diagnosis::{DiagnosticResult, PurchasedReport};
pub use error::{ApiError, AuthError, ChartError, ConfigError, IngestError, PortalError};
pub use loader::{Trajectory, load_trajectory};
pub use session::{FlowStage, SessionState, SessionStore};
