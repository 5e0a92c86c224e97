//! Saída de terminal do xrfjob: spinner durante cada etapa e resultados coloridos.
//!
//! Usa `indicatif` para o spinner e `console` para as cores.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::error::{ErrorKind, WorkflowError};
use crate::orchestrator::{FetchOutcome, GenerateOutcome, JobStatus, SubmitOutcome};
use crate::state_machine::Stage;

/// Spinner exibido enquanto uma etapa do fluxo está em execução.
pub struct StageProgress {
    pb: ProgressBar,
    // Sucesso.
    green: Style,
    // Falha.
    red: Style,
    // Etapa fora de ordem ou cache a ser resetado.
    yellow: Style,
}

impl StageProgress {
    /// Inicia o spinner com a mensagem da etapa.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    fn ok(&self, line: String) {
        self.pb.finish_and_clear();
        println!("  {} {line}", self.green.apply_to("✓"));
    }

    pub fn fetched(&self, outcome: &FetchOutcome) {
        self.ok(format!(
            "Fetched {} items for job {} (request {}) → {}",
            outcome.items.len(),
            outcome.meta.job_num,
            outcome.meta.request_num,
            Stage::Fetched
        ));
    }

    pub fn generated(&self, outcome: &GenerateOutcome) {
        self.ok(format!(
            "Generated {} readings for {} items → {}",
            outcome.readings.len(),
            outcome.item_count,
            Stage::Generated
        ));
    }

    pub fn submitted(&self, outcome: &SubmitOutcome) {
        debug!(response = %outcome.response, "service response");
        self.ok(format!(
            "{} {} readings for job {}, archived to {} → {}",
            outcome.stage,
            outcome.reading_count,
            outcome.meta.job_num,
            outcome.archive_path.display(),
            Stage::Idle
        ));
    }

    /// Limpa o spinner e imprime a falha, destacando os casos que não podem
    /// ser repetidos.
    pub fn failed(&self, err: &WorkflowError) {
        self.pb.finish_and_clear();
        match err.kind() {
            ErrorKind::ArchiveAfterSubmit => {
                println!("  {} {err}", self.red.apply_to("✗"));
                println!(
                    "  {} Upstream already holds these readings; archive manually, then `xrfjob reset`.",
                    self.yellow.apply_to("!")
                );
            }
            ErrorKind::ClearAfterSubmit => {
                println!("  {} {err}", self.red.apply_to("✗"));
                println!(
                    "  {} Upstream already holds these readings and they are archived; run `xrfjob reset`, do not resubmit.",
                    self.yellow.apply_to("!")
                );
            }
            ErrorKind::StageOutOfOrder | ErrorKind::InconsistentCache => {
                println!("  {} {err}", self.yellow.apply_to("↻"));
            }
            kind => {
                println!("  {} {kind}: {err}", self.red.apply_to("✗"));
            }
        }
    }
}

/// Imprime o job em andamento.
pub fn print_status(status: &JobStatus) {
    let bold = Style::new().bold();
    println!("{} {}", bold.apply_to("Stage:"), status.stage);
    if let Some(meta) = &status.meta {
        println!("  request: {}", meta.request_num);
        println!("  job:     {}", meta.job_num);
        println!("  machine: {}", meta.machine);
    }
    if let Some(items) = status.item_count {
        println!("  items:    {items}");
    }
    if let Some(readings) = status.reading_count {
        println!("  readings: {readings}");
    }
}
