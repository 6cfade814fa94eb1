//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::access::{AccessDeclaration, AccessEntry};
use crate::config::{ConfigHasher, ValidationResult};
use crate::planner::{AccessPlan, ActionType};
use crate::reconciler::{DriftReport, ReconciliationResult};
use crate::registrar::RegistrationOutcome;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Plan")]
    plan: String,
    #[tabled(rename = "Org")]
    org: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Declaration row for table display.
#[derive(Tabled)]
struct DeclarationRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Plan")]
    plan: String,
    #[tabled(rename = "Org")]
    org: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an access plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &AccessPlan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &AccessPlan) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - access is up to date.\n",
                "✓".green()
            );
        }

        let mut output = String::new();

        let _ = writeln!(output, "\n📋 Access Plan for broker {}", plan.broker);
        let _ = write!(
            output,
            "   Config hash: {}\n\n",
            ConfigHasher::short_hash(&plan.config_hash)
        );

        let rows: Vec<PlanActionRow> = plan
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| PlanActionRow {
                index: i + 1,
                action: Self::format_action_type(&a.action_type),
                service: a.service.clone(),
                plan: a.plan.name.clone(),
                org: a.action_type.org().unwrap_or("*").to_string(),
                reason: a.reason.clone(),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to grant, {} to revoke, {} public flag changes\n",
            plan.grant_count().to_string().green(),
            plan.revoke_count().to_string().red(),
            plan.public_change_count().to_string().yellow()
        );

        output
    }

    /// Formats compact declarations, observed or desired.
    #[must_use]
    pub fn format_declarations(&self, declarations: &[AccessDeclaration]) -> String {
        match self.format {
            OutputFormat::Json => {
                let entries: Vec<AccessEntry> =
                    declarations.iter().cloned().map(AccessEntry::from).collect();
                serde_json::to_string_pretty(&entries).unwrap_or_default()
            }
            OutputFormat::Text => {
                if declarations.is_empty() {
                    return String::from("   No access granted.\n");
                }

                let rows: Vec<DeclarationRow> = declarations
                    .iter()
                    .map(|d| DeclarationRow {
                        service: d.service().to_string(),
                        plan: d.plan().unwrap_or("*").to_string(),
                        org: if d.is_public() {
                            String::from("public")
                        } else {
                            d.org().unwrap_or("*").to_string()
                        },
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a drift report.
    #[must_use]
    pub fn format_drift(&self, report: &DriftReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                if report.is_converged() {
                    return format!(
                        "{} No drift detected - access is converged.\n",
                        "✓".green()
                    );
                }

                let mut output = format!("{} Drift detected:\n\n", "⚠".yellow());
                for tuple in &report.to_create {
                    let _ = writeln!(output, "   {} {tuple}", "+".green());
                }
                for tuple in &report.to_delete {
                    let _ = writeln!(output, "   {} {tuple}", "-".red());
                }
                if report.public_changes > 0 {
                    let _ = writeln!(
                        output,
                        "   {} {} plans with a different public flag",
                        "~".yellow(),
                        report.public_changes
                    );
                }
                output
            }
        }
    }

    /// Formats a reconciliation result.
    #[must_use]
    pub fn format_reconciliation(&self, result: &ReconciliationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Reconciliation of {} successful\n\n",
                    "✓".green(),
                    result.broker
                );
                let _ = writeln!(output, "   Public flags: {}", result.report.public_changes);
                let _ = writeln!(
                    output,
                    "   Granted: {} ({} already granted)",
                    result.report.granted, result.report.already_granted
                );
                let _ = writeln!(
                    output,
                    "   Revoked: {} ({} already gone)",
                    result.report.revoked, result.report.already_revoked
                );
                output
            }
        }
    }

    /// Formats the outcome of a broker registration.
    #[must_use]
    pub fn format_registration(&self, outcome: &RegistrationOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => {
                let marker = if outcome.is_change() {
                    "✓".green()
                } else {
                    "=".normal()
                };
                format!("{marker} {outcome}
")
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid!\n", "✓".green())
                } else {
                    format!(
                        "{} Configuration has {} errors:\n",
                        "✗".red(),
                        result.error_count()
                    )
                };

                for error in &result.errors {
                    let _ = writeln!(output, "   - {error}");
                }

                if show_warnings && result.warning_count() > 0 {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats an action type with color.
    fn format_action_type(action_type: &ActionType) -> String {
        match action_type {
            ActionType::Grant { .. } => "+grant".green().to_string(),
            ActionType::Revoke { .. } => "-revoke".red().to_string(),
            ActionType::SetPublic => "~public".yellow().to_string(),
            ActionType::SetPrivate => "~private".yellow().to_string(),
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson {
    broker: String,
    config_hash: String,
    created_at: String,
    grants: usize,
    revokes: usize,
    public_changes: usize,
    actions: Vec<ActionJson>,
}

#[derive(serde::Serialize)]
struct ActionJson {
    action_type: String,
    service: String,
    plan: String,
    plan_id: String,
    org: Option<String>,
    reason: String,
}

impl From<&AccessPlan> for PlanJson {
    fn from(plan: &AccessPlan) -> Self {
        Self {
            broker: plan.broker.clone(),
            config_hash: plan.config_hash.clone(),
            created_at: plan.created_at.to_rfc3339(),
            grants: plan.grant_count(),
            revokes: plan.revoke_count(),
            public_changes: plan.public_change_count(),
            actions: plan
                .actions
                .iter()
                .map(|a| ActionJson {
                    action_type: a.action_type.to_string(),
                    service: a.service.clone(),
                    plan: a.plan.name.clone(),
                    plan_id: a.plan.id.clone(),
                    org: a.action_type.org().map(str::to_string),
                    reason: a.reason.clone(),
                })
                .collect(),
        }
    }
}
