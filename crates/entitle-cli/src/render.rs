use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use entitle_engine::{
    DeregisterOutcome, ExtensionNode, MigrationPlan, MigrationReport, ProductStatus,
    RegisterOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

/// Spinner shown on stderr while a long-running step blocks.
pub(crate) struct TerminalSpinner {
    progress_bar: Option<ProgressBar>,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        let rendered = match self.style {
            OutputStyle::Plain => title.to_string(),
            OutputStyle::Rich => colorize(section_style(), title),
        };
        println!("{rendered}");
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_spinner(self, label: &str) -> TerminalSpinner {
        if self.style == OutputStyle::Plain {
            return TerminalSpinner { progress_bar: None };
        }

        let progress_bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
            progress_bar.set_style(style.tick_chars("|/-\\ "));
        }
        progress_bar.set_message(label.to_string());
        progress_bar.enable_steady_tick(Duration::from_millis(100));
        TerminalSpinner {
            progress_bar: Some(progress_bar),
        }
    }
}

impl TerminalSpinner {
    pub(crate) fn finish(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() {
        return OutputStyle::Plain;
    }
    resolve_output_style(std::io::stdout().is_terminal())
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "warn" => "[WARN]",
                "error" => "[ERR]",
                _ => "[INFO]",
            };
            format!("{badge} {message}")
        }
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn format_register_lines(outcome: &RegisterOutcome, server: &str) -> Vec<String> {
    let mut lines = Vec::new();
    if outcome.announced {
        lines.push(format!("Announced system to {server}"));
    } else {
        lines.push(format!("Updated system information on {server}"));
    }
    for product in &outcome.products {
        lines.push(format!("Activated {}", product.triplet()));
    }
    lines
}

pub(crate) fn format_deregister_lines(outcome: &DeregisterOutcome) -> Vec<String> {
    outcome
        .products
        .iter()
        .map(|product| format!("Deactivated {}", product.triplet()))
        .collect()
}

pub(crate) fn format_status_lines(statuses: &[ProductStatus]) -> Vec<String> {
    let mut lines = Vec::new();
    for status in statuses {
        let title = if status.summary.is_empty() {
            status.identifier.as_str()
        } else {
            status.summary.as_str()
        };
        lines.push(format!("{title} ({} {})", status.version, status.arch));
        lines.push(format!("  Status: {}", status.status));
        let details = [
            ("Subscription", &status.name),
            ("Regcode", &status.regcode),
            ("Starts at", &status.starts_at),
            ("Expires at", &status.expires_at),
            ("Subscription status", &status.subscription_status),
            ("Type", &status.subscription_type),
        ];
        for (label, value) in details {
            if !value.is_empty() {
                lines.push(format!("  {label}: {value}"));
            }
        }
    }
    lines
}

/// Indented listing of the base product's extensions with the command that
/// activates each one.
pub(crate) fn format_extension_lines(tree: &ExtensionNode) -> Vec<String> {
    let mut lines = Vec::new();
    for extension in &tree.extensions {
        push_extension_lines(extension, 0, &mut lines);
    }
    if lines.is_empty() {
        lines.push(format!("No extensions available for {}", tree.triplet()));
    }
    lines
}

fn push_extension_lines(node: &ExtensionNode, level: usize, lines: &mut Vec<String>) {
    let indent = " ".repeat(level * 4);
    let name = if node.friendly_name.is_empty() {
        node.triplet()
    } else {
        node.friendly_name.clone()
    };
    let marker = if node.activated {
        " (Activated)"
    } else if !node.available {
        " (Not available)"
    } else {
        ""
    };
    lines.push(format!("{indent}{name}{marker}"));

    let (verb, command) = if node.activated {
        ("Deactivate", "deactivate")
    } else {
        ("Activate", "activate")
    };
    let regcode = if node.free || node.activated {
        ""
    } else {
        " -r ADDITIONAL REGCODE"
    };
    lines.push(format!(
        "{indent}{verb} with: entitle {command} {}{regcode}",
        node.triplet()
    ));
    lines.push(String::new());

    for extension in &node.extensions {
        push_extension_lines(extension, level + 1, lines);
    }
}

/// Numbered listing of the available paths; unavailable paths follow
/// without numbers.
pub(crate) fn format_migration_lines(plan: &MigrationPlan) -> Vec<String> {
    let mut lines = Vec::new();
    if plan.available.is_empty() {
        lines.push("No migration available.".to_string());
    }
    for (index, path) in plan.available.iter().enumerate() {
        lines.push(format!("{} |", index + 1));
        for product in path.products() {
            let marker = if plan.is_installed(product) {
                " (already installed)"
            } else {
                ""
            };
            lines.push(format!("  {}{marker}", product.display_name()));
        }
    }

    if !plan.unavailable.is_empty() {
        lines.push(String::new());
        lines.push("Unavailable migrations:".to_string());
        for path in &plan.unavailable {
            let names = path
                .products()
                .iter()
                .map(|product| {
                    if product.available {
                        product.display_name()
                    } else {
                        format!("{} (not available)", product.display_name())
                    }
                })
                .collect::<Vec<_>>();
            lines.push(format!("  {}", names.join(", ")));
        }
    }
    lines
}

pub(crate) fn format_migration_report_lines(report: &MigrationReport) -> Vec<String> {
    let mut lines = report
        .disabled_repositories
        .iter()
        .map(|repository| format!("Disabled repository {repository}"))
        .collect::<Vec<_>>();
    if !report.base_version.is_empty() {
        lines.push(format!("Release version set to {}", report.base_version));
    }
    lines
}
