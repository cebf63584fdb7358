//! Interface de terminal do ccmonitor: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner exibido durante builds e `console`
//! para estilização com cores. O [`StatusDisplay`] acompanha visualmente
//! o estado de um projeto no terminal.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use ccmonitor::{BuildTransition, ProjectReport, ProjectState};

/// Saída de terminal para os comandos `status` e `watch`.
pub struct StatusDisplay {
    // Spinner ativo apenas enquanto o projeto está em build.
    spinner: Mutex<Option<ProgressBar>>,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl StatusDisplay {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    fn start_spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    // Imprime uma linha sem corromper o spinner, se houver.
    fn line(&self, text: String) {
        let spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        match spinner.as_ref() {
            Some(pb) => pb.suspend(|| println!("{text}")),
            None => println!("{text}"),
        }
    }

    fn state_style(&self, state: ProjectState) -> &Style {
        match state {
            ProjectState::Success => &self.green,
            ProjectState::Broken => &self.red,
            ProjectState::Building | ProjectState::BrokenAndBuilding => &self.yellow,
            ProjectState::NotConnected => &self.dim,
        }
    }

    /// Imprime o relatório completo de um projeto.
    pub fn print_report(&self, report: &ProjectReport) {
        let style = self.state_style(report.state);
        println!(
            "{} {}",
            style.apply_to(&report.project),
            style.apply_to(report.state)
        );
        if !report.connected {
            if let Some(err) = &report.last_error {
                println!("  {} {err}", self.red.apply_to("✗"));
            }
            return;
        }

        let activity = report
            .activity
            .map(|a| a.to_string())
            .unwrap_or_default();
        self.field("activity", &activity);
        self.field("last build", &report.build_status.to_string());
        self.field("label", &report.last_build_label);
        if let Some(date) = report.last_build_date {
            self.field("built at", &date.to_rfc3339());
        }
        if let Some(next) = report.next_build_time {
            self.field("next build", &next.to_rfc3339());
        }
        self.field("stage", &report.build_stage);
        self.field("message", &report.current_message);
        self.field("scheduler", &report.integrator_state.to_string());
        self.field("server", &report.server_name);
        self.field("url", &report.web_url);
        if report.estimated_remaining_secs > 0 {
            self.field("remaining", &format!("~{}s", report.estimated_remaining_secs));
        }
    }

    fn field(&self, name: &str, value: &str) {
        if !value.is_empty() {
            println!("  {:<11}{value}", self.dim.apply_to(name));
        }
    }

    /// Atualiza o spinner após cada poll no modo `watch`.
    pub fn update(&self, report: &ProjectReport) {
        let mut spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        match report.state {
            ProjectState::Building | ProjectState::BrokenAndBuilding => {
                let pb = spinner.get_or_insert_with(Self::start_spinner);
                let remaining = if report.estimated_remaining_secs > 0 {
                    format!(" (~{}s left)", report.estimated_remaining_secs)
                } else {
                    String::new()
                };
                pb.set_message(format!("{}: {}{remaining}", report.project, report.state));
            }
            _ => {
                if let Some(pb) = spinner.take() {
                    pb.finish_and_clear();
                }
            }
        }
    }

    /// Exibe uma transição de build com cor conforme o resultado.
    pub fn build_event(&self, project: &str, transition: BuildTransition) {
        let line = match transition {
            BuildTransition::Started => {
                format!("  {} {project}: {transition}", self.yellow.apply_to("▶"))
            }
            t if t.is_success() => format!("  {} {project}: {t}", self.green.apply_to("✓")),
            t => format!("  {} {project}: {t}", self.red.apply_to("✗")),
        };
        self.line(line);
    }

    /// Exibe uma mensagem publicada pelo servidor.
    pub fn message(&self, project: &str, message: &str) {
        self.line(format!("  {} {project}: {message}", self.dim.apply_to("✉")));
    }

    /// Exibe a mudança de conectividade.
    pub fn connectivity(&self, project: &str, connected: bool) {
        if connected {
            self.line(format!("  {} {project}: connected", self.green.apply_to("●")));
        } else {
            self.line(format!("  {} {project}: not connected", self.red.apply_to("○")));
        }
    }

    /// Remove o spinner ao encerrar o modo `watch`.
    pub fn finish(&self) {
        let mut spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = spinner.take() {
            pb.finish_and_clear();
        }
    }
}
