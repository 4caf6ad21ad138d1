use anyhow::Result;
use serde::Serialize;
use tollgate_auth::{AuthConfig, Authorization, FilterNode, RouteAnalysis};

use crate::cli::{AnalyzeArgs, OutputFormat};
use crate::manifest::Manifest;
use crate::output::{print_json, print_routes, print_warning};

/// Analysis of one route plus the response shape diagnostics.
#[derive(Debug, Serialize)]
pub struct RouteReport {
    #[serde(flatten)]
    pub analysis: RouteAnalysis,
    /// Response types that cannot be compiled against the catalog.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_errors: Vec<String>,
}

impl RouteReport {
    pub fn warnings(&self) -> Vec<String> {
        self.analysis
            .unresolved
            .iter()
            .map(|name| format!("unknown policy '{name}'"))
            .chain(self.type_errors.iter().cloned())
            .collect()
    }

    pub fn has_warnings(&self) -> bool {
        self.analysis.has_warnings() || !self.type_errors.is_empty()
    }
}

pub fn run(args: &AnalyzeArgs, config: AuthConfig, format: OutputFormat) -> Result<()> {
    let reports = analyze(args, config)?;

    match format {
        OutputFormat::Table => print_routes(&reports),
        OutputFormat::Json => print_json(&reports)?,
    }

    let flagged = reports.iter().filter(|r| r.has_warnings()).count();
    if flagged > 0 {
        if args.strict {
            anyhow::bail!("{flagged} route(s) have authorization warnings");
        }
        print_warning(&format!("{flagged} route(s) have authorization warnings"));
    }
    Ok(())
}

/// Loads the manifest and analyzes every declared route.
pub fn analyze(args: &AnalyzeArgs, config: AuthConfig) -> Result<Vec<RouteReport>> {
    let manifest = Manifest::load(&args.manifest)?;
    let registry = manifest.registry()?;
    let routes = manifest.routes();
    tracing::info!(
        policies = registry.len(),
        routes = routes.len(),
        manifest = %args.manifest,
        "Analyzing routes"
    );

    let auth = Authorization::new(registry, manifest.catalog(), config);
    let reports = auth
        .analyze_all(&routes)
        .into_iter()
        .zip(&routes)
        .map(|(analysis, route)| {
            let type_errors = route
                .action
                .response_shape()
                .and_then(|shape| {
                    FilterNode::compile(shape, auth.registry(), auth.catalog()).err()
                })
                .map(|e| vec![e.to_string()])
                .unwrap_or_default();
            RouteReport {
                analysis,
                type_errors,
            }
        })
        .collect();
    Ok(reports)
}
