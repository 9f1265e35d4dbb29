use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{Shell, generate_to};

// Only clap types live in cli.rs, so it builds against the build-dependencies.
#[path = "src/cli.rs"]
#[allow(dead_code)]
mod cli;

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").ok_or("OUT_DIR is unset")?);
    let mut afero = cli::Cli::command();

    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;
    write_man_pages(&afero, &man_dir)?;

    let completion_dir = out_dir.join("completions");
    fs::create_dir_all(&completion_dir)?;
    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
        generate_to(shell, &mut afero, "afero", &completion_dir)?;
    }
    Ok(())
}

/// One page per visible command: `afero.1`, `afero-config.1`,
/// `afero-config-use.1` and so on.
fn write_man_pages(root: &clap::Command, dir: &Path) -> Result<(), Box<dyn Error>> {
    let mut pending = vec![root.clone()];
    while let Some(cmd) = pending.pop() {
        let page = cmd.get_name().to_owned();
        pending.extend(
            cmd.get_subcommands()
                .filter(|sub| !sub.is_hide_set())
                .map(|sub| sub.clone().name(format!("{page}-{}", sub.get_name()))),
        );

        let mut roff = Vec::new();
        clap_mangen::Man::new(cmd).render(&mut roff)?;
        fs::write(dir.join(format!("{page}.1")), roff)?;
    }
    Ok(())
}
