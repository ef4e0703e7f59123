use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{error, info, warn};
use std::path::PathBuf;

use regionmesh::config_loader;
use regionmesh::orchestrator::NetworkGroup;
use regionmesh::provider::SimulatedProvider;
use regionmesh::registry::write_outputs;

/// Build and converge a peered multi-region virtual network
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the network group configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Provider state file, created on first run
    #[arg(short, long, default_value = "regionmesh_state.json")]
    state: PathBuf,

    /// Where to publish per-region network handles
    #[arg(short, long, default_value = "regionmesh_output/outputs.json")]
    output: PathBuf,

    /// Print what a build would converge and exit without touching state
    #[arg(long)]
    plan: bool,

    /// Destroy every resource of the group instead of building it
    #[arg(long, conflicts_with = "plan")]
    teardown: bool,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting RegionMesh");
    info!("Configuration file: {:?}", args.config);

    let config = config_loader::load_config(&args.config)?;
    let group = NetworkGroup::from_config(&config).wrap_err("Invalid network group")?;

    if args.plan {
        let plan = group.plan()?;
        let rendered = serde_yaml::to_string(&plan).wrap_err("Failed to render plan")?;
        println!("{}", rendered);
        return Ok(());
    }

    let provider = SimulatedProvider::load(&args.state)
        .wrap_err_with(|| format!("Failed to load provider state from {:?}", args.state))?;

    if args.teardown {
        let report = group.teardown(&provider);
        // Whatever was removed before a failure is persisted
        provider
            .save(&args.state)
            .wrap_err_with(|| format!("Failed to save provider state to {:?}", args.state))?;
        let report = report.wrap_err_with(|| format!("Teardown of '{}' failed", group.name()))?;

        info!(
            "Teardown complete: {} association(s), {} rule(s), {} route(s), {} link(s), {} network(s) removed",
            report.associations_removed,
            report.rules_removed,
            report.routes_removed,
            report.links_removed,
            report.networks_removed
        );
        return Ok(());
    }

    let result = group.build(&provider);
    provider
        .save(&args.state)
        .wrap_err_with(|| format!("Failed to save provider state to {:?}", args.state))?;

    let report = match result {
        Ok(report) => report,
        Err(failure) => {
            // Publish partial outputs so consumers see which regions are not ready
            write_outputs(&failure.report.registry(), &args.output)?;
            error!(
                "Build halted; {} of {} edge(s) converged. Re-run to resume.",
                failure.report.links.len(),
                failure.report.edges.len()
            );
            return Err(failure.error)
                .wrap_err_with(|| format!("Build of network group '{}' failed", group.name()));
        }
    };

    write_outputs(&report.registry(), &args.output)?;

    for name in &report.orphaned_links {
        warn!("Orphaned link left in place: {}", name);
    }
    for (region, output) in &report.outputs {
        info!(
            "{}: {} {} (ready: {})",
            region, output.network_id, output.cidr, output.ready
        );
    }
    info!("Outputs written to {:?}", args.output);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["regionmesh", "--config", "group.yaml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("group.yaml"));
        assert_eq!(args.state, PathBuf::from("regionmesh_state.json"));
        assert_eq!(args.output, PathBuf::from("regionmesh_output/outputs.json"));
        assert!(!args.plan);
        assert!(!args.teardown);
    }

    #[test]
    fn test_plan_conflicts_with_teardown() {
        assert!(Args::try_parse_from(["regionmesh", "-c", "g.yaml", "--plan", "--teardown"]).is_err());
        assert!(Args::try_parse_from(["regionmesh"]).is_err());
    }
}
