use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Embedded target every `no_std` crate must build for.
const TARGET: &str = "thumbv7em-none-eabihf";

/// Whether a failed step aborts the run or is only reported.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Gate {
    Required,
    Advisory,
}

struct Step {
    label: &'static str,
    args: &'static [&'static str],
    gate: Gate,
}

const STEPS: &[Step] = &[
    Step {
        label: "platform + lowpower (no_std)",
        args: &["check", "-p", "platform", "-p", "lowpower", "--target", TARGET],
        gate: Gate::Required,
    },
    Step {
        label: "lowpower with defmt",
        args: &["check", "-p", "lowpower", "--target", TARGET, "--features", "defmt"],
        gate: Gate::Required,
    },
    Step {
        label: "firmware hardware target",
        args: &["check", "-p", "firmware", "--target", TARGET, "--features", "hardware"],
        gate: Gate::Required,
    },
    Step {
        label: "firmware emulator (host)",
        args: &["check", "-p", "firmware", "--features", "emulator"],
        gate: Gate::Required,
    },
    Step {
        label: "clippy",
        args: &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        gate: Gate::Advisory,
    },
    Step {
        label: "formatting",
        args: &["fmt", "--all", "--check"],
        gate: Gate::Advisory,
    },
];

pub fn run() -> Result<()> {
    println!();
    println!("{}", crate::banner("check").cyan().bold());
    println!();

    let total_start = Instant::now();

    for step in STEPS {
        println!("{}", format!("  Checking {}...", step.label).cyan());
        let start = Instant::now();

        let output = Command::new("cargo")
            .args(step.args)
            .output()
            .with_context(|| format!("Failed to run cargo for {}", step.label))?;

        if output.status.success() {
            println!(
                "{}",
                format!(
                    "  ✓ {} passed in {:.2}s",
                    step.label,
                    start.elapsed().as_secs_f64()
                )
                .green()
            );
        } else if step.gate == Gate::Required {
            eprintln!("{}", format!("  ✗ {} failed", step.label).red().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            anyhow::bail!("{} failed", step.label);
        } else {
            // Advisory steps are shown, not enforced.
            eprintln!("{}", format!("  ⚠ {} reported issues", step.label).yellow().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        }
        println!();
    }

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
