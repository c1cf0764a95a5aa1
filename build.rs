// build.rs

use clap::CommandFactory;
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[allow(dead_code)]
#[path = "src/config.rs"]
mod config;

#[allow(dead_code)]
#[path = "src/cli.rs"]
mod cli;

fn render(command: clap::Command, man_dir: &Path, name: &str) {
    let man = Man::new(command);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join(format!("{}.1", name));
    fs::write(&man_path, buffer).expect("Failed to write man page");
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-changed=src/config.rs");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    render(cli::PkgCli::command(), &man_dir, "pkg");
    render(cli::PortCli::command(), &man_dir, "port");
}
