use colored::Colorize;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::commands::analyze::RouteReport;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_routes(reports: &[RouteReport]) {
    if reports.is_empty() {
        println!("No routes found.");
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(["Method", "URL", "Action", "Policies", "Warnings"]);
    for report in reports {
        let route = &report.analysis;
        let warnings = report.warnings();
        builder.push_record([
            route.method.clone(),
            route.url.clone(),
            route.action.clone(),
            route.summary.clone(),
            if warnings.is_empty() {
                "-".to_string()
            } else {
                warnings.join("; ")
            },
        ]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");

    let flagged = reports.iter().filter(|r| r.has_warnings()).count();
    println!(
        "{}: {}  {}: {}",
        "Routes".cyan(),
        reports.len(),
        "With warnings".cyan(),
        flagged
    );
}
