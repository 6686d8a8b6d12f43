use clap::{Args, Parser, Subcommand};
use dh_app::{
    AnalysisOverrides, AppResult, DiagnoseOptions, DiagnoseProgressEvent, DiagnoseRequest,
    DiagnoseStage, diagnose_service, snapshot_service,
};
use dh_diagnostics::{DegeneracyReport, IdsOutcome, SingularValueThreshold};
use dh_solver::NlpOptions;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "degenhunt")]
#[command(about = "Degeneracy Hunter - locate redundant equality constraints", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate snapshot file syntax and structure
    Validate {
        /// Path to the snapshot (.yaml, .yml or .json)
        snapshot_path: PathBuf,
    },
    /// Show variable and constraint counts
    Summary {
        /// Path to the snapshot
        snapshot_path: PathBuf,
    },
    /// List constraints whose residual exceeds the tolerance
    Residuals {
        /// Path to the snapshot
        snapshot_path: PathBuf,
        /// Residual tolerance (default 1e-5)
        #[arg(long)]
        tol: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// List variables at or near a bound
    Bounds {
        /// Path to the snapshot
        snapshot_path: PathBuf,
        #[command(flatten)]
        bounds: BoundArgs,
        #[arg(long)]
        json: bool,
    },
    /// Singular value analysis of the equality Jacobian
    Rank {
        /// Path to the snapshot
        snapshot_path: PathBuf,
        #[command(flatten)]
        threshold: ThresholdArgs,
        /// Number of smallest singular values to print
        #[arg(long, default_value_t = 10)]
        show: usize,
        #[arg(long)]
        json: bool,
    },
    /// Run the full diagnosis and store the report
    Diagnose {
        /// Path to the snapshot
        snapshot_path: PathBuf,
        #[command(flatten)]
        analysis: AnalysisArgs,
        /// Gauss-Newton iterations used to establish the point (0 analyses it as given)
        #[arg(long, default_value_t = 0)]
        nlp_iterations: usize,
        /// Skip cache and force a new diagnosis
        #[arg(long)]
        no_cache: bool,
        #[arg(long)]
        json: bool,
    },
    /// List stored reports for a snapshot
    Reports {
        /// Path to the snapshot
        snapshot_path: PathBuf,
    },
    /// Show a stored report
    ShowReport {
        /// Path to the snapshot
        snapshot_path: PathBuf,
        /// Report ID to display
        report_id: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Default)]
struct BoundArgs {
    /// Bound tolerance (default 1e-5)
    #[arg(long = "bound-tol")]
    tol: Option<f64>,
    /// Scale the bound tolerance by max(1, |bound|)
    #[arg(long)]
    relative: bool,
    #[arg(long)]
    skip_lower: bool,
    #[arg(long)]
    skip_upper: bool,
}

#[derive(Args, Debug, Default)]
#[group(multiple = false)]
struct ThresholdArgs {
    /// Absolute singular value threshold
    #[arg(long)]
    svd_abs: Option<f64>,
    /// Singular value threshold relative to the largest singular value
    #[arg(long)]
    svd_rel: Option<f64>,
    /// max(m, n) * largest singular value * machine epsilon
    #[arg(long)]
    svd_machine: bool,
}

impl ThresholdArgs {
    fn threshold(&self) -> Option<SingularValueThreshold> {
        if self.svd_machine {
            Some(SingularValueThreshold::MachinePrecision)
        } else if let Some(value) = self.svd_abs {
            Some(SingularValueThreshold::absolute(value))
        } else {
            self.svd_rel.map(SingularValueThreshold::relative)
        }
    }
}

#[derive(Args, Debug, Default)]
struct AnalysisArgs {
    /// Residual tolerance (default 1e-5)
    #[arg(long)]
    residual_tol: Option<f64>,
    #[command(flatten)]
    bounds: BoundArgs,
    #[command(flatten)]
    threshold: ThresholdArgs,
    /// Minimum singular vector entry for a candidate equation
    #[arg(long)]
    candidate_tol: Option<f64>,
    /// Bound on the IDS multipliers
    #[arg(long)]
    big_m: Option<f64>,
    /// Slack on the IDS null-space rows
    #[arg(long)]
    null_space_tol: Option<f64>,
    /// Solve the per-candidate MILPs in parallel
    #[arg(long)]
    parallel: bool,
}

impl AnalysisArgs {
    fn overrides(&self) -> AnalysisOverrides {
        AnalysisOverrides {
            residual_tol: self.residual_tol,
            candidate_tol: self.candidate_tol,
            big_m: self.big_m,
            null_space_tol: self.null_space_tol,
            parallel: self.parallel,
            singular_value_threshold: self.threshold.threshold(),
            ..bound_overrides(&self.bounds)
        }
    }
}

fn bound_overrides(bounds: &BoundArgs) -> AnalysisOverrides {
    AnalysisOverrides {
        bound_tol: bounds.tol,
        relative_bounds: bounds.relative,
        skip_lower: bounds.skip_lower,
        skip_upper: bounds.skip_upper,
        ..AnalysisOverrides::default()
    }
}

fn main() -> AppResult<()> {
    // Logs go to stderr so that --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { snapshot_path } => cmd_validate(&snapshot_path),
        Commands::Summary { snapshot_path } => cmd_summary(&snapshot_path),
        Commands::Residuals {
            snapshot_path,
            tol,
            json,
        } => cmd_residuals(&snapshot_path, tol, json),
        Commands::Bounds {
            snapshot_path,
            bounds,
            json,
        } => cmd_bounds(&snapshot_path, &bounds, json),
        Commands::Rank {
            snapshot_path,
            threshold,
            show,
            json,
        } => cmd_rank(&snapshot_path, &threshold, show, json),
        Commands::Diagnose {
            snapshot_path,
            analysis,
            nlp_iterations,
            no_cache,
            json,
        } => cmd_diagnose(&snapshot_path, &analysis, nlp_iterations, !no_cache, json),
        Commands::Reports { snapshot_path } => cmd_reports(&snapshot_path),
        Commands::ShowReport {
            snapshot_path,
            report_id,
            json,
        } => cmd_show_report(&snapshot_path, &report_id, json),
    }
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_validate(snapshot_path: &Path) -> AppResult<()> {
    println!("Validating snapshot: {}", snapshot_path.display());
    let snapshot = snapshot_service::load_snapshot(snapshot_path)?;
    snapshot_service::compile_snapshot(&snapshot)?;
    println!("✓ Snapshot is valid");
    Ok(())
}

fn cmd_summary(snapshot_path: &Path) -> AppResult<()> {
    let snapshot = snapshot_service::load_snapshot(snapshot_path)?;
    let summary = snapshot_service::summarize_snapshot(&snapshot)?;
    let m = &summary.model;

    println!("Snapshot '{}' (version {})", summary.name, summary.version);
    println!(
        "  Variables:   {} ({} fixed, {} bounded)",
        m.variables, m.fixed_variables, m.bounded_variables
    );
    println!("  Equalities:  {}", m.equality_constraints);
    println!("  Inequalities: {}", m.inequality_constraints);
    println!("  Degrees of freedom: {}", m.degrees_of_freedom);
    if summary.has_analysis {
        println!("  Carries analysis settings");
    }
    Ok(())
}

fn cmd_residuals(snapshot_path: &Path, tol: Option<f64>, json: bool) -> AppResult<()> {
    let overrides = AnalysisOverrides {
        residual_tol: tol,
        ..AnalysisOverrides::default()
    };
    let violations = diagnose_service::residual_report(snapshot_path, &overrides)?;
    if json {
        return print_json(&violations);
    }

    if violations.is_empty() {
        println!("✓ No constraint residual exceeds the tolerance");
    } else {
        println!("Constraints with large residuals:");
        for v in &violations {
            println!("  {:<24} {:>14.6e}  ({:?})", v.name, v.residual, v.kind);
        }
    }
    Ok(())
}

fn cmd_bounds(snapshot_path: &Path, bounds: &BoundArgs, json: bool) -> AppResult<()> {
    let violations = diagnose_service::bound_report(snapshot_path, &bound_overrides(bounds))?;
    if json {
        return print_json(&violations);
    }

    if violations.is_empty() {
        println!("✓ No variable is near a bound");
    } else {
        println!("Variables at or near a bound:");
        for v in &violations {
            println!(
                "  {:<24} {:?} bound {}  value {}  distance {:.3e}{}",
                v.name,
                v.side,
                v.bound,
                v.value,
                v.distance,
                if v.fixed { "  (fixed)" } else { "" }
            );
        }
    }
    Ok(())
}

fn cmd_rank(
    snapshot_path: &Path,
    threshold: &ThresholdArgs,
    show: usize,
    json: bool,
) -> AppResult<()> {
    let overrides = AnalysisOverrides {
        singular_value_threshold: threshold.threshold(),
        ..AnalysisOverrides::default()
    };
    let rank = diagnose_service::rank_report(snapshot_path, &overrides)?;
    if json {
        return print_json(&rank);
    }

    println!(
        "Equality Jacobian: {} rows x {} columns",
        rank.rows, rank.columns
    );
    println!("  Threshold:  {:.3e}", rank.threshold);
    println!("  Deficiency: {}", rank.deficiency);
    println!("  Smallest singular values:");
    for (i, s) in rank.smallest(show).iter().enumerate() {
        println!("    {:>3}  {:.6e}", i + 1, s);
    }
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &DiagnoseProgressEvent) {
    let spinner = ['|', '/', '-', '\\'];
    let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
    let stage = match event.stage {
        DiagnoseStage::Analysis(state) => format!("{:?}", state),
        other => format!("{:?}", other),
    };
    let mut line = format!(
        "\r{} {}  elapsed={:.2}s",
        spinner[spin_idx], stage, event.elapsed_wall_s
    );
    if let Some(msg) = &event.message {
        line.push_str(&format!("  {}", msg));
    }
    print!("{}", line);
    let _ = io::stdout().flush();
}

fn cmd_diagnose(
    snapshot_path: &Path,
    analysis: &AnalysisArgs,
    nlp_iterations: usize,
    use_cache: bool,
    json: bool,
) -> AppResult<()> {
    let request = DiagnoseRequest {
        snapshot_path,
        overrides: analysis.overrides(),
        options: DiagnoseOptions {
            use_cache,
            nlp: NlpOptions {
                max_iterations: nlp_iterations,
                ..NlpOptions::default()
            },
            ..DiagnoseOptions::default()
        },
    };

    let response = if json {
        diagnose_service::ensure_diagnosis(&request)?
    } else {
        let mut last_emit = Instant::now();
        let response = diagnose_service::ensure_diagnosis_with_progress(
            &request,
            Some(&mut |event| {
                if last_emit.elapsed().as_millis() >= 50 || event.stage == DiagnoseStage::Completed
                {
                    render_cli_progress(&event);
                    last_emit = Instant::now();
                }
            }),
        )?;
        clear_progress_line();
        response
    };

    tracing::debug!(
        report_id = %response.report_id,
        total_time_s = response.total_time_s,
        cached = response.loaded_from_cache,
        "diagnose finished"
    );
    if json {
        return print_json(&response.report);
    }

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.report_id);
    } else {
        println!("✓ Diagnosis completed: {}", response.report_id);
    }
    if let Some(nlp) = &response.nlp {
        println!(
            "  Point established: {:?} after {} iterations (residual norm {:.3e})",
            nlp.status, nlp.iterations, nlp.residual_norm
        );
    }
    print_report(&response.report);
    Ok(())
}

fn print_report(report: &DegeneracyReport) {
    println!("\nResidual violations: {}", report.residual_violations.len());
    for v in &report.residual_violations {
        println!("  {:<24} {:>14.6e}", v.name, v.residual);
    }
    println!("Bound violations: {}", report.bound_violations.len());
    for v in &report.bound_violations {
        println!("  {:<24} {:?}  distance {:.3e}", v.name, v.side, v.distance);
    }

    println!(
        "\nJacobian {}x{}, threshold {:.3e}, deficiency {}",
        report.rank.rows, report.rank.columns, report.rank.threshold, report.rank.deficiency
    );
    if report.is_healthy() {
        println!("✓ Equality constraints are linearly independent at this point");
        return;
    }

    let names = |ids: &[dh_core::ConId]| -> String {
        ids.iter()
            .map(|&id| report.constraint_name(id))
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!("\nCandidate equations: {}", names(&report.candidates.constraints));
    println!("\nIrreducible degenerate sets:");
    for result in &report.degenerate_sets {
        let seed = report.constraint_name(result.seed);
        match &result.outcome {
            IdsOutcome::Found { members, verified } => {
                let flag = match verified {
                    Some(false) => "  (minimality check failed)",
                    _ => "",
                };
                println!("  {:<24} {{{}}}{}", seed, names(members), flag);
            }
            IdsOutcome::NoDegenerateSet => println!("  {:<24} none found", seed),
            IdsOutcome::Failed { stage, reason } => {
                println!("  {:<24} {} solver failed: {}", seed, stage, reason)
            }
        }
    }

    if !report.distinct_sets.is_empty() {
        println!("\nDistinct sets:");
        for set in &report.distinct_sets {
            println!("  {{{}}}", names(set));
        }
    }
}

fn cmd_reports(snapshot_path: &Path) -> AppResult<()> {
    let reports = diagnose_service::list_reports(snapshot_path)?;

    if reports.is_empty() {
        println!("No stored reports for {}", snapshot_path.display());
    } else {
        println!("Stored reports:");
        for manifest in reports {
            println!(
                "  {} ({})  {:?}  deficiency={}  sets={}",
                manifest.report_id,
                manifest.timestamp,
                manifest.state,
                manifest.deficiency,
                manifest.distinct_sets
            );
        }
    }
    Ok(())
}

fn cmd_show_report(snapshot_path: &Path, report_id: &str, json: bool) -> AppResult<()> {
    let (manifest, report) = diagnose_service::load_report(snapshot_path, report_id)?;
    if json {
        return print_json(&report);
    }

    println!("Report {}", manifest.report_id);
    println!("  Snapshot: {}", manifest.snapshot_name);
    println!("  Created:  {}", manifest.timestamp);
    println!("  Version:  {}", manifest.tool_version);
    print_report(&report);
    Ok(())
}
