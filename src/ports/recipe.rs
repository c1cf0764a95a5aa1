// src/ports/recipe.rs

//! Shell fragments fed to the script engine around recipe evaluation

use crate::error::Result;
use crate::filesystem::root_join;
use crate::shell::shell_quote;
use std::path::{Path, PathBuf};

/// Variables a recipe may set, cleared before each evaluation
pub const RECIPE_VARIABLES: [&str; 10] = [
    "NAME",
    "VERSION",
    "SOURCES_NAME",
    "SOURCES_VERSION",
    "BUILD",
    "DEPENDS",
    "OPTIONAL_DEPENDS",
    "BUILD_DEPENDS",
    "VERSION_DEPENDS",
    "KEEPOLD",
];

/// `<ports>/pkgblds/<port>/build.sh`
pub fn recipe_path(ports_path: &Path, port_path: &str) -> Result<PathBuf> {
    root_join(&ports_path.join("pkgblds"), port_path).map(|dir| dir.join("build.sh"))
}

/// Clear the recipe namespace and stub `planned`/`version` as unsatisfiable
pub fn reset_script(port_path: &str) -> String {
    let mut script = format!("PORT_PATH={}\n", shell_quote(port_path));
    for variable in RECIPE_VARIABLES {
        script.push_str(variable);
        script.push_str("=''\n");
    }
    script.push_str("planned() {\nreturn 1\n}\n");
    script.push_str("version() {\nreturn 1\n}\n");
    script
}

/// Fill blank source name/version from the package name/version
pub const SOURCES_DEFAULTS: &str = "\
if test -z \"$SOURCES_NAME\"
then
SOURCES_NAME=\"$NAME\"
fi
if test -z \"$SOURCES_VERSION\"
then
SOURCES_VERSION=\"$VERSION\"
fi
";

/// `planned` answers for present optional dependencies; `version` echoes
/// the resolved version of a version dependency
pub fn build_functions(planned: &[&str], versions: &[(&str, &str)]) -> String {
    let mut script = String::from("planned() {\n");
    for dependency in planned {
        script.push_str(&format!("test \"$1\" = {} && return 0\n", shell_quote(dependency)));
    }
    script.push_str("return 1\n}\n");

    script.push_str("version() {\n");
    for (dependency, version) in versions {
        script.push_str(&format!(
            "test \"$1\" = {} && echo {} && return 0\n",
            shell_quote(dependency),
            shell_quote(version)
        ));
    }
    script.push_str("printf ''\n}\n");
    script
}

/// Environment for sourcing `ports.conf`
pub fn config_prelude(root: &Path, ports_path: &Path, arch: &str) -> String {
    let ports = ports_path.to_string_lossy();
    format!(
        "IGNORED_DEPENDS=''\n\
         ROOTDIR={root}\n\
         PORTSBASEDIR={ports}\n\
         PORTS_ARCH={arch}\n\
         CONFPATH={conf}\n\
         CONFSDIR={confs}\n\
         SCRIPTSDIR={scripts}\n",
        root = shell_quote(&root.to_string_lossy()),
        ports = shell_quote(&ports),
        arch = shell_quote(arch),
        conf = shell_quote(&format!("{}/ports.conf", ports)),
        confs = shell_quote(&format!("{}/ports.conf.d", ports)),
        scripts = shell_quote(&format!("{}/pkgblds-scripts", ports)),
    )
}

/// Script handed to `/bin/sh` for a build step
pub fn build_script(ports_path: &Path, port_path: &str, functions: &str) -> String {
    let ports = ports_path.to_string_lossy();
    format!(
        "PORTSROOT={}\nPORT_PATH={}\n{}. {} \"$@\"\n",
        shell_quote(&ports),
        shell_quote(port_path),
        functions,
        shell_quote(&format!("{}/build_template.sh", ports))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{ScriptEngine, Shell};

    #[test]
    fn test_recipe_path() {
        let path = recipe_path(Path::new("/usr/ports"), "dev/libfoo").unwrap();
        assert_eq!(path, PathBuf::from("/usr/ports/pkgblds/dev/libfoo/build.sh"));
        assert!(recipe_path(Path::new("/usr/ports"), "../x").is_err());
    }

    #[test]
    fn test_build_functions_in_shell() {
        let mut shell = Shell::spawn().unwrap();
        shell
            .run(&build_functions(&["opt/zlib"], &[("dev/gcc", "13.2")]))
            .unwrap();
        shell
            .run("A=$(planned opt/zlib && echo y); B=$(planned opt/other && echo y); V=$(version dev/gcc); W=$(version dev/none)\n")
            .unwrap();

        assert_eq!(shell.read_variable("A").unwrap(), "y");
        assert_eq!(shell.read_variable("B").unwrap(), "");
        assert_eq!(shell.read_variable("V").unwrap(), "13.2");
        assert_eq!(shell.read_variable("W").unwrap(), "");
    }

    #[test]
    fn test_reset_script_clears_variables() {
        let mut shell = Shell::spawn().unwrap();
        shell.run("NAME=stale\nDEPENDS=x\n").unwrap();
        shell.run(&reset_script("base/foo")).unwrap();
        assert_eq!(shell.read_variable("NAME").unwrap(), "");
        assert_eq!(shell.read_variable("DEPENDS").unwrap(), "");
        assert_eq!(shell.read_variable("PORT_PATH").unwrap(), "base/foo");
    }

    #[test]
    fn test_build_script_sources_template() {
        let script = build_script(Path::new("/usr/ports"), "base/foo", "planned() {\nreturn 1\n}\n");
        assert!(script.starts_with("PORTSROOT='/usr/ports'\nPORT_PATH='base/foo'\nplanned()"));
        assert!(script.ends_with(". '/usr/ports/build_template.sh' \"$@\"\n"));
    }
}
