use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;

pub fn run(log: &str, release: bool) -> Result<()> {
    println!();
    println!("{}", crate::banner("two-core emulator").cyan().bold());
    println!("   {}", format!("RUST_LOG={log}").dimmed());
    println!();

    let mut cmd = Command::new("cargo");
    cmd.args(["run", "-p", "firmware", "--bin", "dualcore_sim", "--features", "emulator"])
        .env("RUST_LOG", log);
    if release {
        cmd.arg("--release");
    }

    // Inherit stdio so the emulator's log streams straight through.
    let status = cmd.status().context("Failed to start the emulator")?;
    if !status.success() {
        eprintln!("{}", "✗ Emulator exited with an error".red().bold());
        anyhow::bail!("Emulator failed: {status}");
    }

    println!();
    println!("{}", "✓ Emulator finished".green());
    Ok(())
}
