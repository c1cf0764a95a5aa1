// src/ports/scheduler.rs

//! Upgrade scheduling over a prepared [`PortGraph`]
//!
//! Full passes over the graph repeat until a pass sets no new flag. Flags
//! are never cleared, so the loop runs at most once per flag per port,
//! plus the final quiet pass.
//!
//! Per marked port that is neither finished nor failed:
//!
//! 1. Mark every dependency for processing
//! 2. Re-check whether the expected package is installed now
//! 3. An installed port is finished once its runtime dependencies are
//! 4. Try a prebuilt package when runtime dependencies are finished; a
//!    build-time port only once some build has asked for it
//! 5. Build from source; on a live system, wait for build-time
//!    dependencies to be finished first

use super::{BuildRunner, BuildStep, PortGraph, Status};
use crate::confirm::Confirm;
use crate::db::PackageSummary;
use crate::error::{Error, Result};
use crate::interrupt::Interrupt;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Outcome of one upgrade run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Passes over the graph, including the final one without changes
    pub passes: usize,
    /// Paths of ports whose build failed
    pub failed: Vec<String>,
    /// Names of non build-time ports still not installed
    pub not_actual: Vec<String>,
    /// Packages removed by the obsolete-package pass
    pub removed: Vec<PackageSummary>,
}

pub struct BuildScheduler<'a> {
    runner: &'a mut dyn BuildRunner,
    confirm: &'a dyn Confirm,
    interrupt: Interrupt,
}

impl<'a> BuildScheduler<'a> {
    pub fn new(runner: &'a mut dyn BuildRunner, confirm: &'a dyn Confirm, interrupt: Interrupt) -> Self {
        Self {
            runner,
            confirm,
            interrupt,
        }
    }

    /// Bring `requested` ports (all ports when empty) and their
    /// dependencies up to date
    pub fn upgrade(&mut self, graph: &mut PortGraph, requested: &[String]) -> Result<ScheduleReport> {
        if requested.is_empty() {
            for index in 0..graph.ports().len() {
                graph.port_mut(index).status.insert(Status::MarkToProcess);
            }
        } else {
            for path in requested {
                match graph.index_of(path) {
                    Some(index) => {
                        graph.port_mut(index).status.insert(Status::MarkToProcess);
                    }
                    None => warn!("Port {} is not loaded, add it to targets first", path),
                }
            }
        }

        for index in 0..graph.ports().len() {
            let dependencies = graph.resolve_dependencies(index);
            graph.port_mut(index).all_dependencies = dependencies;
        }

        let mut report = ScheduleReport::default();
        let mut changed = true;
        while changed {
            self.interrupt.check("upgrade")?;
            changed = false;
            report.passes += 1;
            for index in 0..graph.ports().len() {
                changed |= self.process(graph, index)?;
            }
            debug!("Pass {} done, changed: {}", report.passes, changed);
        }

        for port in graph.ports() {
            if port.is(Status::HaveError) {
                report.failed.push(port.path.clone());
            }
            if !port.is(Status::Actual) && !port.is(Status::BuildTime) {
                warn!("Package not actual: {}", port.name);
                report.not_actual.push(port.name.clone());
            }
        }

        if graph.is_live_system() {
            report.removed = self.remove_obsolete(graph)?;
        }
        Ok(report)
    }

    /// One scheduling step for one port; returns whether any flag was set
    fn process(&mut self, graph: &mut PortGraph, index: usize) -> Result<bool> {
        let port = graph.port(index);
        if !port.is(Status::MarkToProcess) || port.is(Status::Finished) || port.is(Status::HaveError) {
            return Ok(false);
        }
        let mut changed = false;

        for dependency in graph.port(index).all_dependencies.clone() {
            changed |= graph.port_mut(dependency).status.insert(Status::MarkToProcess);
        }

        if !graph.port(index).is(Status::Actual) && graph.is_port_installed(index)? {
            changed |= graph.port_mut(index).status.insert(Status::Actual);
        }

        let runtime_finished = self.runtime_dependencies_finished(graph, index);

        let port = graph.port(index);
        if port.is(Status::Actual) {
            if runtime_finished {
                changed |= graph.port_mut(index).status.insert(Status::Finished);
            }
            return Ok(changed);
        }

        let wanted = !port.is(Status::BuildTime) || port.is(Status::BuildTimeNeeded);
        if !port.is(Status::MarkToBuild) && wanted && runtime_finished {
            info!("Trying get package for {}", port.name);
            if self.run(graph, index, BuildStep::Fetch)? {
                graph.port_mut(index).status.insert(Status::Actual);
            } else {
                graph.port_mut(index).status.insert(Status::MarkToBuild);
            }
            return Ok(true);
        }

        if graph.port(index).is(Status::MarkToBuild) {
            let mut ready = true;
            if graph.is_live_system() {
                for dependency in graph.port(index).all_dependencies.clone() {
                    let status = &mut graph.port_mut(dependency).status;
                    if !status.contains(Status::BuildTime) {
                        continue;
                    }
                    changed |= status.insert(Status::BuildTimeNeeded);
                    if !status.contains(Status::Finished) {
                        ready = false;
                    }
                }
            }
            if ready {
                info!("Building {}", graph.port(index).name);
                if self.run(graph, index, BuildStep::Build)? {
                    graph.port_mut(index).status.insert(Status::Actual);
                } else {
                    error!("Build of {} failed", graph.port(index).path);
                    graph.port_mut(index).status.insert(Status::HaveError);
                }
                changed = true;
            }
        }
        Ok(changed)
    }

    fn runtime_dependencies_finished(&self, graph: &PortGraph, index: usize) -> bool {
        graph.port(index).all_dependencies.iter().all(|&d| {
            let dependency = graph.port(d);
            dependency.is(Status::BuildTime) || dependency.is(Status::Finished)
        })
    }

    /// Run a step; success only counts once the package is installed
    fn run(&mut self, graph: &PortGraph, index: usize, step: BuildStep) -> Result<bool> {
        match self.runner.run_step(graph, index, step) {
            Ok(true) => {
                let installed = graph.is_port_installed(index)?;
                if !installed {
                    warn!("{} for {} left the package not installed", step, graph.port(index).path);
                }
                Ok(installed)
            }
            Ok(false) => Ok(false),
            Err(e @ Error::Interrupted(_)) => Err(e),
            Err(e) => {
                warn!("{} for {}: {}", step, graph.port(index).path, e);
                Ok(false)
            }
        }
    }

    /// Drop installed packages without a port, or whose port is only
    /// needed at build time
    fn remove_obsolete(&mut self, graph: &PortGraph) -> Result<Vec<PackageSummary>> {
        let mut db = graph.database()?.with_interrupt(self.interrupt.clone());
        let installed: BTreeSet<String> = db.list()?.into_iter().map(|p| p.name).collect();

        let mut removed = Vec::new();
        for name in installed {
            let obsolete = graph
                .get_port_by_name(&name)
                .is_none_or(|port| port.is(Status::BuildTime));
            if !obsolete {
                continue;
            }
            if !self.confirm.confirm(&format!("Drop package {}?", name))? {
                continue;
            }
            info!("Remove package: {}", name);
            removed.extend(db.drop_packages(&name, None)?);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AssumeYes;
    use crate::ports::tests::{graph, write_recipe};
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    /// Writes a database record for ports whose step is scripted to succeed
    #[derive(Default)]
    struct ScriptedRunner {
        fetch_ok: Vec<&'static str>,
        build_ok: Vec<&'static str>,
        calls: Vec<(String, BuildStep)>,
    }

    impl BuildRunner for ScriptedRunner {
        fn run_step(&mut self, graph: &PortGraph, index: usize, step: BuildStep) -> Result<bool> {
            let port = graph.port(index);
            self.calls.push((port.path.clone(), step));
            let ok = match step {
                BuildStep::Fetch => self.fetch_ok.contains(&port.path.as_str()),
                BuildStep::Build => self.build_ok.contains(&port.path.as_str()),
            };
            if ok {
                let dir = graph.root().join(graph.db_path()).join(&port.name);
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join(port.package_version(graph.arch())), "").unwrap();
            }
            Ok(ok)
        }
    }

    fn steps(runner: &ScriptedRunner) -> HashMap<String, Vec<BuildStep>> {
        let mut steps: HashMap<String, Vec<BuildStep>> = HashMap::new();
        for (path, step) in &runner.calls {
            steps.entry(path.clone()).or_default().push(*step);
        }
        steps
    }

    fn prepared(root: &Path, targets: &str, recipes: &[(&str, &str)]) -> PortGraph {
        let ports = root.join("ports");
        fs::create_dir_all(&ports).unwrap();
        fs::write(ports.join("targets"), targets).unwrap();
        for (path, body) in recipes {
            write_recipe(&ports, path, body);
        }
        let mut graph = graph(root, &ports);
        graph.prepare().unwrap();
        graph
    }

    #[test]
    fn test_failed_build_dependency_blocks_only_its_dependents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut graph = prepared(
            temp_dir.path(),
            "app/p\napp/r\n",
            &[
                ("app/p", "NAME=p\nVERSION=1\nBUILD=1\nBUILD_DEPENDS='dev/q'\n"),
                ("dev/q", "NAME=q\nVERSION=1\nBUILD=1\n"),
                ("app/r", "NAME=r\nVERSION=1\nBUILD=1\n"),
            ],
        );
        graph.set_live_system(true);

        let mut runner = ScriptedRunner {
            build_ok: vec!["app/r"],
            ..Default::default()
        };
        let confirm = AssumeYes;
        let report = BuildScheduler::new(&mut runner, &confirm, Interrupt::new())
            .upgrade(&mut graph, &[])
            .unwrap();

        let p = graph.get_port("app/p").unwrap();
        assert!(!p.is(Status::Actual));
        assert!(!p.is(Status::Finished));
        assert!(graph.get_port("dev/q").unwrap().is(Status::HaveError));
        assert!(graph.get_port("app/r").unwrap().is(Status::Finished));

        let steps = steps(&runner);
        assert_eq!(steps["app/p"], vec![BuildStep::Fetch]);
        assert_eq!(steps["dev/q"], vec![BuildStep::Fetch, BuildStep::Build]);
        assert_eq!(steps["app/r"], vec![BuildStep::Fetch, BuildStep::Build]);

        assert_eq!(report.failed, vec!["dev/q".to_string()]);
        assert_eq!(report.not_actual, vec!["p".to_string()]);
        // r is kept, nothing else was installed
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_dependencies_are_built_first() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut graph = prepared(
            temp_dir.path(),
            "app/foo\n",
            &[
                ("app/foo", "NAME=foo\nVERSION=2\nBUILD=1\nDEPENDS='lib/bar'\n"),
                ("lib/bar", "NAME=bar\nVERSION=1\nBUILD=1\n"),
            ],
        );

        let mut runner = ScriptedRunner {
            fetch_ok: vec!["lib/bar"],
            build_ok: vec!["app/foo"],
            ..Default::default()
        };
        let confirm = AssumeYes;
        let report = BuildScheduler::new(&mut runner, &confirm, Interrupt::new())
            .upgrade(&mut graph, &["app/foo".to_string()])
            .unwrap();

        let order: Vec<(&str, BuildStep)> = runner.calls.iter().map(|(p, s)| (p.as_str(), *s)).collect();
        assert_eq!(
            order,
            vec![
                ("lib/bar", BuildStep::Fetch),
                ("app/foo", BuildStep::Fetch),
                ("app/foo", BuildStep::Build),
            ]
        );
        assert!(graph.get_port("app/foo").unwrap().is(Status::Finished));
        assert!(report.not_actual.is_empty());
        assert!(report.passes <= graph.ports().len() * Status::ALL.len() + 1);
    }

    #[test]
    fn test_build_time_cycle_terminates() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut graph = prepared(
            temp_dir.path(),
            "app/a\n",
            &[
                ("app/a", "NAME=a\nVERSION=1\nBUILD=1\nBUILD_DEPENDS='dev/b'\n"),
                ("dev/b", "NAME=b\nVERSION=1\nBUILD=1\nBUILD_DEPENDS='dev/c'\n"),
                ("dev/c", "NAME=c\nVERSION=1\nBUILD=1\nBUILD_DEPENDS='dev/b'\n"),
            ],
        );
        graph.set_live_system(true);

        let mut runner = ScriptedRunner::default();
        let confirm = AssumeYes;
        let report = BuildScheduler::new(&mut runner, &confirm, Interrupt::new())
            .upgrade(&mut graph, &[])
            .unwrap();

        assert!(report.passes <= graph.ports().len() * Status::ALL.len() + 1);
        assert_eq!(report.not_actual, vec!["a".to_string()]);
    }

    #[test]
    fn test_live_system_removes_obsolete_packages() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let mut graph = prepared(
            root,
            "app/foo\n",
            &[
                ("app/foo", "NAME=foo\nVERSION=1\nBUILD=1\nBUILD_DEPENDS='dev/make'\n"),
                ("dev/make", "NAME=make\nVERSION=1\nBUILD=1\n"),
            ],
        );
        graph.set_live_system(true);
        for (name, version) in [("foo", "1-1-x86_64"), ("make", "1-1-x86_64"), ("stale", "0.1")] {
            let dir = root.join("var/lib/pkg").join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(version), "").unwrap();
        }

        let mut runner = ScriptedRunner::default();
        let confirm = AssumeYes;
        let report = BuildScheduler::new(&mut runner, &confirm, Interrupt::new())
            .upgrade(&mut graph, &[])
            .unwrap();

        assert!(runner.calls.is_empty());
        let removed: Vec<&str> = report.removed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(removed, vec!["make", "stale"]);
        assert!(root.join("var/lib/pkg/foo/1-1-x86_64").exists());
    }

    #[test]
    fn test_interrupt_stops_scheduling() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut graph = prepared(temp_dir.path(), "app/foo\n", &[("app/foo", "NAME=foo\nVERSION=1\n")]);

        let interrupt = Interrupt::new();
        interrupt.trigger();
        let mut runner = ScriptedRunner::default();
        let confirm = AssumeYes;
        let result = BuildScheduler::new(&mut runner, &confirm, interrupt).upgrade(&mut graph, &[]);

        assert!(matches!(result, Err(Error::Interrupted(_))));
        assert!(runner.calls.is_empty());
    }
}
