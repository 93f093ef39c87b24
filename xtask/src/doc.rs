use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Package and the features that expose its host-side API (mocks, emulator).
const PACKAGES: &[(&str, &str)] = &[
    ("platform", "std"),
    ("lowpower", "std"),
    ("firmware", "emulator"),
];

/// Crate whose index page is the entry point.
const LANDING: &str = "lowpower";

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", crate::banner("doc").cyan().bold());
    println!();

    let start = Instant::now();
    for &(package, features) in PACKAGES {
        let status = Command::new("cargo")
            .args(["doc", "--no-deps", "--document-private-items"])
            .args(["-p", package, "--features", features])
            .status()
            .with_context(|| format!("failed to run cargo doc for {package}"))?;
        if !status.success() {
            println!("  {} {package}", "✗".red().bold());
            anyhow::bail!("cargo doc failed for {package} (features: {features})");
        }
        println!("  {} {package} [{features}]", "✓".green());
    }
    println!(
        "\n{}",
        format!("Documented {} crates in {:.2}s", PACKAGES.len(), start.elapsed().as_secs_f64())
            .green()
    );

    if open {
        let landing = format!("target/doc/{LANDING}/index.html");
        Command::new("cargo")
            .args(["doc", "--no-deps", "-p", LANDING, "--features", "std", "--open"])
            .status()
            .with_context(|| format!("failed to open {landing}"))?;
    } else {
        println!("   {}", format!("Entry point: target/doc/{LANDING}/index.html").dimmed());
    }
    println!();
    Ok(())
}
