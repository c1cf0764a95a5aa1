// src/bin/port.rs

use anyhow::{Context, Result, bail};
use pkgport::cli::{PortCli, PortCommand};
use pkgport::confirm::{AssumeYes, Confirm, TerminalConfirm};
use pkgport::console;
use pkgport::interrupt::Interrupt;
use pkgport::ports::{BuildScheduler, PortBuildRunner, PortGraph, PortListing, Targets};
use tracing::info;

fn open_graph(cli: &PortCli) -> Result<PortGraph> {
    let mut graph = PortGraph::open(&cli.root, &cli.ports_path, &cli.db_path)
        .with_context(|| format!("Failed to open ports tree {}", cli.ports_path.display()))?;
    graph.prepare().context("Failed to load ports")?;
    Ok(graph)
}

fn main() -> Result<()> {
    let cli: PortCli = console::parse_args();
    console::init_tracing(cli.trace);

    let interrupt = Interrupt::new();
    console::install_interrupt_handlers(&interrupt)?;

    let confirm: Box<dyn Confirm> = if cli.interactive {
        Box::new(TerminalConfirm)
    } else {
        Box::new(AssumeYes)
    };

    match &cli.command {
        PortCommand::Depends { json } => {
            let graph = open_graph(&cli)?;
            if *json {
                let listing: Vec<PortListing> = graph.ports().iter().map(PortListing::from).collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for port in graph.ports() {
                    print!("{}", port.describe());
                }
            }
        }
        PortCommand::Upgrade { targets } => {
            let mut graph = open_graph(&cli)?;
            let mut runner = PortBuildRunner::new(&cli.build_user, confirm.as_ref(), interrupt.clone())?;
            let report = BuildScheduler::new(&mut runner, confirm.as_ref(), interrupt.clone())
                .upgrade(&mut graph, targets)?;
            info!("Upgrade finished after {} passes", report.passes);
            for summary in &report.removed {
                info!("Removed {}/{}", summary.name, summary.version);
            }
            if !report.failed.is_empty() {
                bail!("Failed to build: {}", report.failed.join(" "));
            }
        }
        PortCommand::Add { targets } => {
            let mut list = Targets::load(cli.ports_path.join("targets"))?;
            for target in targets {
                if !list.add(target) {
                    info!("{} is already a target", target);
                }
            }
            list.save()?;
        }
        PortCommand::Delete { targets } => {
            let mut list = Targets::load(cli.ports_path.join("targets"))?;
            for target in targets {
                if list.delete(target) == 0 {
                    info!("{} is not a target", target);
                }
            }
            list.save()?;
        }
        PortCommand::Targets => {
            let list = Targets::load(cli.ports_path.join("targets"))?;
            for target in list.entries() {
                println!("{}", target);
            }
        }
    }
    Ok(())
}
