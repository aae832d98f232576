use std::io::Write;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use mmbake_cli::{Cli, DocumentReport, Job, STRICT_FAILURE_EXIT_CODE, bake_all, plan_jobs};
use mmbake_lib::{Baker, DiagramStore};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber based on verbosity level.
///
/// Verbosity levels:
/// - 0 (default): no logging
/// - 1 (-v): INFO (renders, reuse, written documents)
/// - 2 (-vv): DEBUG (per-block decisions, mmdc invocations)
/// - 3 (-vvv): TRACE (scanner transitions)
/// - 4+ (-vvvv): TRACE with file/line numbers
fn init_tracing(verbose: u8) {
    if verbose == 0 {
        return;
    }

    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            1 => "warn,mmbake_lib=info,mmbake_cli=info,mmbake=info".to_string(),
            2 => "info,mmbake_lib=debug,mmbake_cli=debug,mmbake=debug".to_string(),
            _ => "debug,mmbake_lib=trace,mmbake_cli=trace,mmbake=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(verbose >= 4)
                .with_line_number(verbose >= 4)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let jobs = plan_jobs(&cli.inputs, &cli.out_dir)?;
    if cli.json && jobs.contains(&Job::Stdin) {
        return Err(eyre!("--json cannot be combined with stdin input"));
    }

    let config = cli.bake_config().wrap_err("Failed to load configuration")?;
    let store = DiagramStore::open(&cli.out_dir)
        .wrap_err_with(|| format!("Failed to open output directory {:?}", cli.out_dir))?;
    let baker = Baker::mmdc(config);

    let reports = bake_all(&baker, &store, jobs, cli.jobs, std::io::stdin()).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_reports(&reports)?;
    }

    let failed: usize = reports.iter().map(|report| report.failed).sum();
    if cli.strict && failed > 0 {
        eprintln!("{failed} diagram(s) failed to render");
        std::process::exit(STRICT_FAILURE_EXIT_CODE);
    }

    Ok(())
}

/// Writes stdin results to stdout and a one-line summary per file to stderr.
fn print_reports(reports: &[DocumentReport]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for report in reports {
        match (&report.text, &report.output) {
            (Some(text), _) => {
                stdout
                    .write_all(text.as_bytes())
                    .wrap_err("Failed to write to stdout")?;
            }
            (None, Some(output)) => {
                eprintln!(
                    "{}: {} rendered, {} failed -> {}",
                    report.input,
                    report.rendered,
                    report.failed,
                    output.display()
                );
            }
            (None, None) => {}
        }
    }
    stdout.flush().wrap_err("Failed to write to stdout")?;
    Ok(())
}
