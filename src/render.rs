#![cfg(feature = "web")]
//! Page rendering: view models plus the embedded handlebars templates

use crate::classify::{ExposureLevel, count_changes, structural_label};
use crate::diagnosis::PurchasedReport;
use crate::error::PortalError;
use crate::payment::checkout_url;
use crate::session::{Flash, FlowStage, SessionState};
use handlebars::Handlebars;
use serde::Serialize;

const PORTAL: &str = "portal";
const LOGIN: &str = "login";
const REPORTS: &str = "reports";

/// Registered page templates
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, PortalError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);

        let partials = [
            ("head", include_str!("./templates/head.hbs")),
            ("foot", include_str!("./templates/foot.hbs")),
        ];
        for (name, source) in partials {
            registry
                .register_partial(name, source)
                .map_err(|e| PortalError::Template(e.to_string()))?;
        }

        let pages = [
            (PORTAL, include_str!("./templates/portal.hbs")),
            (LOGIN, include_str!("./templates/login.hbs")),
            (REPORTS, include_str!("./templates/reports.hbs")),
        ];
        for (name, source) in pages {
            registry
                .register_template_string(name, source)
                .map_err(|e| PortalError::Template(e.to_string()))?;
        }

        Ok(Self { registry })
    }

    pub fn portal(&self, view: &PortalView) -> Result<String, PortalError> {
        self.render(PORTAL, view)
    }

    pub fn login(&self, view: &LoginView) -> Result<String, PortalError> {
        self.render(LOGIN, view)
    }

    pub fn reports(&self, view: &ReportsView) -> Result<String, PortalError> {
        self.render(REPORTS, view)
    }

    fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, PortalError> {
        self.registry
            .render(name, data)
            .map_err(|e| PortalError::Template(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct TrajectoryView {
    pub column: String,
    pub rows: usize,
    pub structure: String,
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    pub activity: String,
    pub status: String,
    pub efficiency: String,
    pub scope: String,
}

/// Everything the main portal page needs, derived from one session
#[derive(Debug, Serialize)]
pub struct PortalView {
    pub title: &'static str,
    pub authenticated: bool,
    pub email: Option<String>,
    pub flash: Option<Flash>,
    pub stage: FlowStage,
    pub file_loaded: bool,
    pub trajectory: Option<TrajectoryView>,
    pub can_diagnose: bool,
    pub cost_per_trade: f64,
    pub result: Option<ResultView>,
    pub run_count: u32,
    pub exposure: ExposureLevel,
    pub show_chart: bool,
    pub show_scope: bool,
    pub exposure_notice: &'static str,
    pub terms_accepted: bool,
    pub login_required: bool,
    pub checkout_url: Option<String>,
}

impl PortalView {
    /// Build the view for the session's current stage
    ///
    /// The result block only appears once a remote diagnosis succeeded,
    /// and the checkout link only once terms are accepted by a logged-in
    /// user.
    pub fn from_session(state: &SessionState, flash: Option<Flash>, payments_host: &str) -> Self {
        let stage = state.stage();
        let exposure = state.exposure();

        let trajectory = state.trajectory.as_ref().map(|t| TrajectoryView {
            column: t.column.clone(),
            rows: t.len(),
            structure: structural_label(count_changes(&t.values), t.len() as u64).to_string(),
        });

        let result = state.visible_result().map(|r| ResultView {
            activity: r.structural_activity.clone(),
            status: r.system_status.clone(),
            efficiency: r.efficiency_display(),
            scope: r.diagnostic_scope.clone(),
        });

        let checkout_url = match (stage, state.upload_id.as_deref()) {
            (FlowStage::PaymentLinkShown, Some(upload_id)) => {
                Some(checkout_url(payments_host, upload_id, state.email.as_deref()))
            }
            _ => None,
        };

        Self {
            title: "Nuevo Diagnóstico",
            authenticated: state.is_authenticated(),
            email: state.email.clone(),
            flash,
            stage,
            file_loaded: state.file_loaded,
            trajectory,
            can_diagnose: state.file_loaded,
            cost_per_trade: state.cost_per_trade,
            result,
            run_count: state.run_count,
            exposure,
            show_chart: exposure.shows_chart(),
            show_scope: exposure.shows_scope(),
            exposure_notice: exposure_notice(exposure),
            terms_accepted: state.terms_accepted,
            login_required: stage == FlowStage::LoginRequired,
            checkout_url,
        }
    }
}

fn exposure_notice(exposure: ExposureLevel) -> &'static str {
    match exposure {
        ExposureLevel::Full => "",
        ExposureLevel::Reduced => {
            "Vista resumida: el detalle gráfico está disponible en el reporte completo."
        }
        ExposureLevel::Minimal => "Vista mínima. Obtenga el reporte completo para el detalle.",
    }
}

#[derive(Debug, Serialize)]
pub struct LoginView {
    pub title: &'static str,
    pub authenticated: bool,
    pub email: Option<String>,
    pub flash: Option<Flash>,
}

impl LoginView {
    pub fn new(state: &SessionState, flash: Option<Flash>) -> Self {
        Self {
            title: "Login / Registro",
            authenticated: state.is_authenticated(),
            email: state.email.clone(),
            flash,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub created_at: String,
    pub amount: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportsView {
    pub title: &'static str,
    pub authenticated: bool,
    pub email: Option<String>,
    pub flash: Option<Flash>,
    pub reports: Vec<ReportRow>,
    pub load_failed: bool,
}

impl ReportsView {
    pub fn new(
        state: &SessionState,
        flash: Option<Flash>,
        reports: Vec<PurchasedReport>,
        load_failed: bool,
    ) -> Self {
        Self {
            title: "Mis Reportes",
            authenticated: state.is_authenticated(),
            email: state.email.clone(),
            flash,
            reports: reports
                .into_iter()
                .map(|r| ReportRow {
                    amount: r.amount_display(),
                    created_at: r.created_at,
                    url: r.url,
                })
                .collect(),
            load_failed,
        }
    }
}
