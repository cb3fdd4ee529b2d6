use clap::{Parser, Subcommand, ValueEnum};
use clinical_core::trace::{self, CaseRecord};
use clinical_core::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cmtree")]
#[command(about = "Case-management decision tree tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override config file location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scenario tree file (.toml or .json); defaults to the reference tree
    #[arg(long, global = true)]
    scenario: Option<PathBuf>,

    /// Override the configured random seed
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the tree and check that every sick classification resolves
    Validate,

    /// Resolve a single case
    Resolve {
        /// Morbidity classification
        #[arg(long, value_enum)]
        state: CaseState,

        /// Age in years
        #[arg(long, default_value_t = 10.0)]
        age: f64,

        /// Parasite density (parasites/µL) seen by the diagnostic
        #[arg(long, default_value_t = 0.0)]
        density: f64,

        /// Random substream to draw from
        #[arg(long, default_value_t = 0)]
        stream: u64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Resolve a batch of synthetic cases and tally the outcomes
    Simulate {
        /// Number of cases
        #[arg(long, default_value_t = 1000)]
        cases: u64,

        /// Write a per-case CSV trace
        #[arg(long)]
        trace: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CaseState {
    Fever,
    Uncomplicated,
    SecondCase,
    Severe,
}

impl From<CaseState> for PgState {
    fn from(state: CaseState) -> Self {
        match state {
            CaseState::Fever => PgState::NON_MALARIA_FEVER,
            CaseState::Uncomplicated => PgState::UNCOMPLICATED,
            CaseState::SecondCase => PgState::UNCOMPLICATED_SECOND,
            CaseState::Severe => PgState::SEVERE,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    clinical_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let seed = cli.seed.unwrap_or(config.simulation.seed);
    let scenario = cli.scenario.clone().or_else(|| config.scenario.path.clone());
    let diagnostic = config.diagnostic.build()?;
    tracing::info!(
        "Seed {}, scenario {:?}, diagnostic {:?}",
        seed,
        scenario,
        diagnostic
    );

    let result = match cli.command {
        Commands::Validate => cmd_validate(scenario.as_deref()),
        Commands::Resolve {
            state,
            age,
            density,
            stream,
            json,
        } => {
            if density.is_nan() || density < 0.0 {
                return Err(Error::Config(format!(
                    "--density must be non-negative, got {}",
                    density
                )));
            }
            let case = CaseInput {
                state: state.into(),
                age_years: age,
                density,
            };
            cmd_resolve(scenario.as_deref(), &diagnostic, seed, stream, &case, json)
        }
        Commands::Simulate { cases, trace } => {
            cmd_simulate(scenario.as_deref(), &diagnostic, seed, cases, trace.as_deref())
        }
    };

    if let Err(e) = &result {
        if e.is_configuration() {
            tracing::error!("Scenario {:?} is invalid: {}", scenario, e);
        }
    }
    result
}

fn load_scenario(path: Option<&Path>) -> Result<TreeConfig> {
    match path {
        Some(path) => load_tree(path),
        None => Ok(get_reference_tree().clone()),
    }
}

fn cmd_validate(scenario: Option<&Path>) -> Result<()> {
    let tree_config = load_scenario(scenario)?;
    let tree = DecisionTree::build(&tree_config)?;
    let report = tree.check_coverage(&CmId::legal_roots())?;

    println!("✓ Tree is valid");
    println!("  Mask: {}", tree.mask());
    println!(
        "  Nodes: {} ({} branch sets, {} leaves)",
        tree.len(),
        tree.branch_set_count(),
        tree.leaf_count()
    );
    println!(
        "  Paths: {} from {} root classifications",
        report.paths, report.roots
    );
    if !report.unused_nodes.is_empty() {
        println!("  ⚠ Unused nodes:");
        for id in &report.unused_nodes {
            println!("    - {}", id);
        }
    }
    Ok(())
}

fn cmd_resolve(
    scenario: Option<&Path>,
    diagnostic: &Diagnostic,
    seed: u64,
    stream: u64,
    case: &CaseInput,
    json: bool,
) -> Result<()> {
    let cm = CaseManagement::from_scenario(&load_scenario(scenario)?)?;
    let mut rng = SimRng::substream(seed, stream);
    let mut queue = Vec::new();

    let id = cm.execute(&mut queue, case, &mut rng, diagnostic)?;

    if json {
        let output = serde_json::json!({
            "final_id": id.to_string(),
            "masked_id": id.masked(cm.tree().mask()).to_string(),
            "medications": queue,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Decision: {} (masked {})", id, id.masked(cm.tree().mask()));
    if queue.is_empty() {
        println!("  No treatment");
    }
    for med in &queue {
        match med.duration_hours {
            Some(duration) => println!(
                "  → {} {} mg at +{}h over {}h",
                med.drug, med.qty, med.time_hours, duration
            ),
            None => println!("  → {} {} mg at +{}h", med.drug, med.qty, med.time_hours),
        }
    }
    Ok(())
}

fn cmd_simulate(
    scenario: Option<&Path>,
    diagnostic: &Diagnostic,
    seed: u64,
    cases: u64,
    trace_path: Option<&Path>,
) -> Result<()> {
    let cm = CaseManagement::from_scenario(&load_scenario(scenario)?)?;
    let mask = cm.tree().mask();

    // Case inputs come from their own stream so they never shift the
    // decision draws.
    let mut population = SimRng::substream(seed, u64::MAX);
    let mut tally: BTreeMap<CmId, u64> = BTreeMap::new();
    let mut records = Vec::new();
    let mut queue = Vec::new();

    for i in 0..cases {
        let case = synthetic_case(&mut population);
        let mut rng = SimRng::substream(seed, i);
        let id = cm.execute(&mut queue, &case, &mut rng, diagnostic)?;

        *tally.entry(id.masked(mask)).or_insert(0) += 1;
        if trace_path.is_some() {
            records.push(CaseRecord {
                case: i,
                stream: i,
                state: case.state.0,
                age_years: case.age_years,
                final_id: id,
                masked_id: id.masked(mask),
                medications: queue.clone(),
            });
        }
    }

    println!("Resolved {} cases (seed {})", cases, seed);
    for (id, count) in &tally {
        println!(
            "  {}  {:>8}  {:>6.2}%",
            id,
            count,
            100.0 * *count as f64 / cases.max(1) as f64
        );
    }

    if let Some(path) = trace_path {
        trace::write_csv(path, &records)?;
        println!("✓ Trace written to {}", path.display());
    }
    Ok(())
}

fn synthetic_case(population: &mut SimRng) -> CaseInput {
    let states = PgState::LEGAL_SICK_STATES;
    let index = ((population.uniform() * states.len() as f64) as usize).min(states.len() - 1);
    let age_years = population.uniform() * 60.0;
    let density = if population.uniform() < 0.3 {
        0.0
    } else {
        10f64.powf(population.uniform() * 5.0)
    };

    CaseInput {
        state: states[index],
        age_years,
        density,
    }
}
