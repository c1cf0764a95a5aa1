// src/ports/mod.rs

//! Ports tree: recipes, their dependency graph and build scheduling
//!
//! A port is identified by its path under `<ports>/pkgblds/`. Recipes are
//! shell fragments evaluated through a [`ScriptEngine`]; the graph reads
//! their metadata back variable by variable.
//!
//! Loading happens in three stages (see [`PortGraph::prepare`]):
//!
//! 1. Targets and their runtime `DEPENDS` closure
//! 2. The `BUILD_DEPENDS` closure of everything loaded so far, flagged
//!    [`Status::BuildTime`] when first reached that way
//! 3. Build ids, computed once the whole graph is known, since a recipe
//!    may ask which optional dependencies are present

mod recipe;
mod runner;
mod scheduler;
mod status;
mod targets;

pub use runner::{BuildRunner, BuildStep, BuildUser, PortBuildRunner};
pub use scheduler::{BuildScheduler, ScheduleReport};
pub use status::{PortStatus, Status};
pub use targets::Targets;

use crate::db::PackageDatabase;
use crate::error::{Error, Result};
use crate::shell::{ScriptEngine, Shell};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One recipe's metadata plus its scheduling state
#[derive(Debug, Clone, Default, Serialize)]
pub struct Port {
    pub path: String,
    pub name: String,
    pub version: String,
    pub sources_name: String,
    pub sources_version: String,
    pub build: String,
    pub depends: Vec<String>,
    pub build_depends: Vec<String>,
    pub optional_depends: Vec<String>,
    pub version_depends: Vec<String>,
    /// Indices into the owning graph; filled by the scheduler
    #[serde(skip)]
    pub all_dependencies: Vec<usize>,
    pub keep_old: bool,
    #[serde(skip)]
    pub status: PortStatus,
}

impl Port {
    /// `<version>-<build>-<arch>`, the version the package is installed as
    pub fn package_version(&self, arch: &str) -> String {
        format!("{}-{}-{}", self.version, self.build, arch)
    }

    pub fn is(&self, status: Status) -> bool {
        self.status.contains(status)
    }

    /// Listing used by `port depends`
    ///
    /// `[AB]` flags actual and build-time ports, followed by one line per
    /// non-empty dependency list.
    pub fn describe(&self) -> String {
        let mut out = String::from("[");
        if self.is(Status::Actual) {
            out.push('A');
        }
        if self.is(Status::BuildTime) {
            out.push('B');
        }
        out.push_str(&format!(
            "]{} ({}/{}-{})\n",
            self.path, self.name, self.version, self.build
        ));

        let lists = [
            ("Depends:", &self.depends),
            ("Version depends:", &self.version_depends),
            ("Optional depends:", &self.optional_depends),
            ("Build depends:", &self.build_depends),
        ];
        for (label, list) in lists {
            if list.is_empty() {
                continue;
            }
            out.push_str(&format!("{:>36}", label));
            for dependency in list {
                out.push(' ');
                out.push_str(dependency);
            }
            out.push('\n');
        }
        out
    }
}

/// `port depends --json` entry
#[derive(Debug, Serialize)]
pub struct PortListing<'a> {
    pub actual: bool,
    pub build_time: bool,
    #[serde(flatten)]
    pub port: &'a Port,
}

impl<'a> From<&'a Port> for PortListing<'a> {
    fn from(port: &'a Port) -> Self {
        Self {
            actual: port.is(Status::Actual),
            build_time: port.is(Status::BuildTime),
            port,
        }
    }
}

/// All loaded ports, keyed by path, in load order
pub struct PortGraph {
    root: PathBuf,
    ports_path: PathBuf,
    db_path: PathBuf,
    arch: String,
    live_system: bool,
    ignored: BTreeSet<String>,
    targets: Targets,
    ports: Vec<Port>,
    index: HashMap<String, usize>,
    engine: Box<dyn ScriptEngine>,
}

impl PortGraph {
    /// Open the ports tree with a fresh `/bin/sh` as script engine
    pub fn open(root: &Path, ports_path: &Path, db_path: &Path) -> Result<Self> {
        let uts = nix::sys::utsname::uname()?;
        let arch = uts.machine().to_string_lossy().into_owned();
        Self::with_engine(root, ports_path, db_path, &arch, Box::new(Shell::spawn()?))
    }

    pub fn with_engine(
        root: &Path,
        ports_path: &Path,
        db_path: &Path,
        arch: &str,
        engine: Box<dyn ScriptEngine>,
    ) -> Result<Self> {
        let targets = Targets::load(ports_path.join("targets"))?;
        Ok(Self {
            root: root.to_path_buf(),
            ports_path: ports_path.to_path_buf(),
            db_path: db_path.to_path_buf(),
            arch: arch.to_string(),
            live_system: root == Path::new("/"),
            ignored: BTreeSet::new(),
            targets,
            ports: Vec::new(),
            index: HashMap::new(),
            engine,
        })
    }

    /// Override live-system detection (root `/` by default)
    pub fn set_live_system(&mut self, live: bool) {
        self.live_system = live;
    }

    pub fn is_live_system(&self) -> bool {
        self.live_system
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ports_path(&self) -> &Path {
        &self.ports_path
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, index: usize) -> &Port {
        &self.ports[index]
    }

    pub(crate) fn port_mut(&mut self, index: usize) -> &mut Port {
        &mut self.ports[index]
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    pub fn get_port(&self, path: &str) -> Option<&Port> {
        self.index_of(path).map(|i| &self.ports[i])
    }

    pub fn get_port_by_name(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut Targets {
        &mut self.targets
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored.contains(path)
    }

    /// Handle on the package database the ports install into
    pub fn database(&self) -> Result<PackageDatabase> {
        PackageDatabase::new(&self.root, &self.db_path)
    }

    /// Load a port and its runtime dependencies, memoized by path
    ///
    /// With `build_time`, build dependencies are pulled in too and flagged
    /// [`Status::BuildTime`]. A port already loaded is left as it is.
    pub fn load_port(&mut self, path: &str, build_time: bool) -> Result<()> {
        if path.is_empty() {
            return Err(Error::InvalidPackage("empty port path".to_string()));
        }
        if self.index.contains_key(path) {
            return Ok(());
        }

        let recipe = recipe::recipe_path(&self.ports_path, path)?;
        if !recipe.is_file() {
            warn!("No recipe for port {} at {}", path, recipe.display());
        }

        self.engine.run(&recipe::reset_script(path))?;
        self.engine.run_file(&recipe)?;
        self.engine.run(recipe::SOURCES_DEFAULTS)?;

        let mut port = Port {
            path: path.to_string(),
            name: self.engine.read_variable("NAME")?,
            version: self.engine.read_variable("VERSION")?,
            sources_name: self.engine.read_variable("SOURCES_NAME")?,
            sources_version: self.engine.read_variable("SOURCES_VERSION")?,
            depends: self.read_list("DEPENDS")?,
            optional_depends: self.read_list("OPTIONAL_DEPENDS")?,
            version_depends: self.read_list("VERSION_DEPENDS")?,
            build_depends: self.read_list("BUILD_DEPENDS")?,
            keep_old: self.engine.read_variable("KEEPOLD")? == "y",
            ..Port::default()
        };
        if build_time {
            port.status.insert(Status::BuildTime);
        }
        debug!("Loaded port {} ({}/{})", path, port.name, port.version);

        let depends = port.depends.clone();
        let build_depends = port.build_depends.clone();
        self.index.insert(path.to_string(), self.ports.len());
        self.ports.push(port);

        for dependency in &depends {
            self.load_port(dependency, build_time)?;
        }
        if build_time {
            for dependency in &build_depends {
                self.load_port(dependency, true)?;
            }
        }
        Ok(())
    }

    fn read_list(&mut self, name: &str) -> Result<Vec<String>> {
        let value = self.engine.read_variable(name)?;
        Ok(value.split_whitespace().map(str::to_string).collect())
    }

    /// `planned`/`version` definitions for a port's recipe
    pub fn build_functions(&self, index: usize) -> String {
        let port = &self.ports[index];
        let planned: Vec<&str> = port
            .optional_depends
            .iter()
            .filter(|d| self.index.contains_key(d.as_str()) && !self.is_ignored(d))
            .map(String::as_str)
            .collect();
        let versions: Vec<(&str, &str)> = port
            .version_depends
            .iter()
            .filter_map(|d| self.get_port(d).map(|p| (d.as_str(), p.version.as_str())))
            .collect();
        recipe::build_functions(&planned, &versions)
    }

    /// Re-evaluate the recipe with live `planned`/`version` and read `BUILD`
    pub fn calculate_build(&mut self, index: usize) -> Result<()> {
        let path = self.ports[index].path.clone();
        let functions = self.build_functions(index);
        let recipe = recipe::recipe_path(&self.ports_path, &path)?;

        self.engine.run(&recipe::reset_script(&path))?;
        self.engine.run(&functions)?;
        self.engine.run_file(&recipe)?;
        self.ports[index].build = self.engine.read_variable("BUILD")?;
        Ok(())
    }

    /// Read the ports configuration, load targets and build dependencies,
    /// compute build ids and mark what is already installed
    pub fn prepare(&mut self) -> Result<()> {
        let config = self.ports_path.join("ports.conf");
        self.engine
            .run(&recipe::config_prelude(&self.root, &self.ports_path, &self.arch))?;
        self.engine.run_file(&config)?;
        self.ignored = self
            .engine
            .read_variable("IGNORED_DEPENDS")?
            .split_whitespace()
            .map(str::to_string)
            .collect();

        for target in self.targets.entries().to_vec() {
            self.load_port(&target, false)?;
        }

        // Ports appended below are visited by this same loop
        let mut index = 0;
        while index < self.ports.len() {
            for dependency in self.ports[index].build_depends.clone() {
                self.load_port(&dependency, true)?;
            }
            index += 1;
        }

        for index in 0..self.ports.len() {
            self.calculate_build(index)?;
        }

        for index in 0..self.ports.len() {
            if self.is_port_installed(index)? {
                self.ports[index].status.insert(Status::Actual);
            }
        }
        info!("Loaded {} ports", self.ports.len());
        Ok(())
    }

    /// A port without version is always satisfied
    pub fn is_port_installed(&self, index: usize) -> Result<bool> {
        let port = &self.ports[index];
        if port.version.is_empty() {
            return Ok(true);
        }
        self.database()?
            .is_installed(&port.name, &port.package_version(&self.arch))
    }

    /// Runtime, build and present optional dependencies, deduplicated
    pub fn resolve_dependencies(&self, index: usize) -> Vec<usize> {
        let port = &self.ports[index];
        let optional = port
            .optional_depends
            .iter()
            .filter(|d| !self.is_ignored(d));

        let mut resolved = Vec::new();
        for dependency in port.depends.iter().chain(&port.build_depends).chain(optional) {
            if let Some(i) = self.index_of(dependency)
                && !resolved.contains(&i)
            {
                resolved.push(i);
            }
        }
        resolved
    }
}
