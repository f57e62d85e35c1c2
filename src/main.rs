use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vmagent::cli::Cli;
use vmagent::config;
use vmagent::logging;
use vmagent::paths;
use vmagent::pipeline::{self, ProvisionReport};
use vmagent::progress::{OutputMode, StepProgress};
use vmagent::runner::SystemRunner;

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let is_tty = console::Term::stdout().is_term();
    let mode = OutputMode::resolve(cli.verbose, cli.quiet, is_tty);

    // Tracing to stderr would fight indicatif for the terminal, so it is
    // only enabled when there are no spinners or the user asked for detail.
    let terminal_filter = match mode {
        OutputMode::Verbose => EnvFilter::new("vmagent=debug"),
        OutputMode::Normal | OutputMode::Quiet => EnvFilter::new("off"),
        OutputMode::Plain => EnvFilter::from_default_env()
            .add_directive("vmagent=info".parse().expect("valid log directive")),
    };
    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter);

    let logs_dir = paths::logs_dir();
    let main_log = paths::main_log_path();
    let (file_layer, log_error) = match logging::open_main_log(&main_log) {
        Ok(writer) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(EnvFilter::new("vmagent=debug")),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();

    if let Some(e) = log_error {
        tracing::warn!(path = %main_log.display(), "file logging disabled: {e}");
    }

    let (config_path, optional) = cli.config_source();
    let config = config::load_config(&config_path, optional)?;
    let request = cli.request();
    let runner = SystemRunner::new(Some(logs_dir.clone()));

    let mut progress = StepProgress::new(pipeline::STEPS, mode);
    let report = pipeline::provision(&runner, &config, &request, &mut progress).await?;

    print_summary(&progress, &report, &request.name, request.vm_number);
    progress.info(&format!("tool logs: {}", logs_dir.display()));

    Ok(())
}

fn print_summary(progress: &StepProgress, report: &ProvisionReport, name: &str, vms: u32) {
    if report.failed_actions.is_empty() {
        let line = format!("{vms} agent VM(s) from box '{name}' are up.");
        match progress.mode() {
            OutputMode::Plain => progress.println(&line),
            _ => progress.println(&style(line).green().bold().to_string()),
        }
        return;
    }

    let line = format!(
        "Finished with failing tool steps: {}",
        report.failed_actions.join(", ")
    );
    match progress.mode() {
        OutputMode::Plain => progress.println(&line),
        _ => progress.println(&style(line).yellow().bold().to_string()),
    }
}
