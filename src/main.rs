use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use timetable_scheduler::export::{Exporter, SolutionPayload};
use timetable_scheduler::model::ScheduleModel;
use timetable_scheduler::parser::{load_config, load_json, validate_input, validate_model};
use timetable_scheduler::repair::{EventPayload, RepairPipeline, DEFAULT_LEDGER_FILE};
use timetable_scheduler::solver::{solve, SolveProgress};

#[derive(Parser)]
#[command(name = "timetable-scheduler")]
#[command(about = "Constraint-driven university timetable generator with incremental repair")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a weekly timetable from a configuration
    Generate {
        /// Configuration file (JSON or TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Where to write the ranked solution payload
        #[arg(short, long, default_value = "timetable.json")]
        output: PathBuf,

        /// Suppress progress output, print a JSON summary only
        #[arg(short, long)]
        quiet: bool,
    },

    /// Apply disruptive events to an existing timetable
    Repair {
        /// Configuration file (JSON or TOML)
        #[arg(long)]
        config: PathBuf,

        /// Prior schedule (exporter format); omitted = generate a fresh seed
        #[arg(long)]
        existing: Option<PathBuf>,

        /// Events file describing the disruptions
        #[arg(long)]
        events: PathBuf,

        /// Where to save the updated timetable payload
        #[arg(long, default_value = "updated_timetable.json")]
        output: PathBuf,

        /// Section-view payload before the update, for the PDF renderer
        #[arg(long = "pdf-before")]
        pdf_before: Option<PathBuf>,

        /// Section-view payload after the update, for the PDF renderer
        #[arg(long = "pdf-after")]
        pdf_after: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            config,
            output,
            quiet,
        } => run_generate(&config, &output, quiet),
        Commands::Repair {
            config,
            existing,
            events,
            output,
            pdf_before,
            pdf_after,
        } => run_repair(
            &config,
            existing.as_deref(),
            &events,
            &output,
            pdf_before.as_deref(),
            pdf_after.as_deref(),
        ),
    }
}

fn run_generate(config_path: &Path, output: &Path, quiet: bool) -> Result<()> {
    let config = load_config(config_path).context("Failed to load configuration")?;
    let validation = validate_input(&config)?;

    let model = ScheduleModel::from_config(config)?;
    let semantic = validate_model(&model)?;

    if !quiet {
        for warning in validation.warnings.iter().chain(semantic.warnings.iter()) {
            println!("{} {}", "Warning:".yellow(), warning);
        }
        println!(
            "Loaded {} sections, {} subjects, {} labs, {} faculty, {} rooms",
            model.sections.len(),
            model.subjects.len(),
            model.labs.len(),
            model.faculty.len(),
            model.rooms.len()
        );
        println!("\nGenerating timetable...\n");
    }

    let progress = Arc::new(SolveProgress::new());
    let solutions = solve(&model, progress.clone(), quiet)?;

    let required = timetable_scheduler::model::required_class_count(&model);

    let payloads: Vec<SolutionPayload> = solutions
        .iter()
        .map(|solution| {
            Exporter::new(&model, &solution.chromosome).solution_payload(
                solution.rank,
                solution.fitness,
                required,
            )
        })
        .collect();

    std::fs::write(output, serde_json::to_string_pretty(&payloads)?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let snapshot = progress.snapshot();
    if quiet {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "solutions": payloads.len(),
                "best_fitness": solutions[0].raw_fitness,
                "generations": snapshot.generation,
                "status": snapshot.status,
                "violations": solutions[0].chromosome.violations,
            }))?
        );
    } else {
        let stats = &payloads[0].statistics;
        println!();
        if solutions[0].chromosome.violations.is_empty() {
            println!("{}", "✓ Timetable generated successfully".green().bold());
        } else {
            println!("{}", "✗ Timetable has constraint violations".red().bold());
            for (kind, count) in &solutions[0].chromosome.violations {
                println!("  - {}: {}", kind.red(), count);
            }
        }
        println!();
        println!("  Classes:      {}/{}", stats.total_classes, stats.required_classes);
        println!("  Lab sessions: {}", stats.lab_sessions);
        println!("  Electives:    {}", stats.electives_assigned);
        println!("  Fitness:      {:.1}", solutions[0].raw_fitness);
        println!("  Elapsed:      {}ms", snapshot.elapsed_ms);
        println!();
        println!("Solutions written to: {}", output.display().to_string().green());
    }

    Ok(())
}

fn run_repair(
    config_path: &Path,
    existing: Option<&Path>,
    events_path: &Path,
    output: &Path,
    pdf_before: Option<&Path>,
    pdf_after: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path).context("Failed to load configuration")?;
    validate_input(&config)?;

    let prior = existing
        .map(|path| load_json::<serde_json::Value>(path).context("Failed to load prior schedule"))
        .transpose()?;

    let mut pipeline = RepairPipeline::new(
        config,
        prior.as_ref(),
        Path::new(DEFAULT_LEDGER_FILE),
    )?;

    // Pre-update section view for the external renderer
    if let Some(path) = pdf_before {
        let exporter = Exporter::new(pipeline.model(), pipeline.seed_schedule());
        std::fs::write(path, serde_json::to_string_pretty(&exporter.section_view())?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let payload: EventPayload = load_json(events_path).context("Failed to load events")?;
    let outcome = pipeline.apply_events(&payload)?;

    let required = pipeline.required_classes();
    let exporter = Exporter::new(pipeline.model(), &outcome.solution);
    let solution_payload = exporter.solution_payload(1, outcome.solution.fitness, required);

    std::fs::write(output, serde_json::to_string_pretty(&solution_payload)?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let report_path = output.with_file_name("substitution_report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&outcome.report)?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    if let Some(path) = pdf_after {
        std::fs::write(path, serde_json::to_string_pretty(&exporter.section_view())?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!(
        "{} {} substituted, {} shifted, {} unassigned, {} ignored",
        "Repair complete:".green().bold(),
        outcome.report.substitutions.len(),
        outcome.report.shifted.len(),
        outcome.report.unassigned.len(),
        outcome.report.ignored_events.len()
    );
    if !outcome.report.ignored_events.is_empty() {
        for message in &outcome.report.ignored_events {
            println!("  {} {}", "Ignored:".yellow(), message);
        }
    }
    println!("Updated timetable written to: {}", output.display().to_string().green());

    Ok(())
}
