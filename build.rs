//! Build script rendering the `courier` manual page from its clap definition.

use std::{fs, path::PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-changed=build.rs");

    let cmd = cli::Cli::command();
    let page = format!("{}.1", cmd.get_name());
    let out_dir = PathBuf::from("target/generated-man");
    fs::create_dir_all(&out_dir)?;

    let mut rendered = Vec::new();
    Man::new(cmd).render(&mut rendered)?;
    fs::write(out_dir.join(page), rendered)?;
    Ok(())
}
