// src/bin/cron_setup.rs
//
// Install or remove the 8 AM daily briefing cron job. Linux and macOS only;
// Windows installs use Task Scheduler instead. Entries are tagged with a
// comment marker so reinstalls replace rather than duplicate.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use clap::Parser;

const CRON_MARKER: &str = "# dental-daily-briefing";
const CRON_SCHEDULE: &str = "0 8 * * *";

/// Manage the daily briefing cron job (Linux / macOS only).
#[derive(Debug, Parser)]
#[command(name = "cron_setup")]
struct Cli {
    /// Remove the cron job.
    #[arg(long, conflicts_with = "status")]
    remove: bool,

    /// Show the current cron job status.
    #[arg(long)]
    status: bool,
}

fn main() -> anyhow::Result<()> {
    if cfg!(windows) {
        anyhow::bail!("cron is not available on Windows; use Task Scheduler instead");
    }

    let cli = Cli::parse();
    if cli.remove {
        remove()
    } else if cli.status {
        status()
    } else {
        install()
    }
}

fn install() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;

    let mut lines = read_crontab()?;
    let before = lines.len();
    lines.retain(|l| !l.contains(CRON_MARKER));
    if lines.len() < before {
        println!(
            "Removed {} existing job(s) before re-installing.",
            before - lines.len()
        );
    }

    let job = job_line()?;
    lines.push(job.clone());
    write_crontab(&lines)?;

    println!("Cron job installed: runs every day at 08:00 AM.");
    println!("Command : {job}");
    println!("Cron log: logs/cron.log");
    Ok(())
}

fn remove() -> anyhow::Result<()> {
    let mut lines = read_crontab()?;
    let before = lines.len();
    lines.retain(|l| !l.contains(CRON_MARKER));
    let removed = before - lines.len();
    write_crontab(&lines)?;
    if removed > 0 {
        println!("Removed {removed} cron job(s).");
    } else {
        println!("No cron job found to remove.");
    }
    Ok(())
}

fn status() -> anyhow::Result<()> {
    let jobs: Vec<String> = read_crontab()?
        .into_iter()
        .filter(|l| l.contains(CRON_MARKER))
        .collect();
    if jobs.is_empty() {
        println!("No cron job currently installed.");
    } else {
        println!("Found {} installed job(s):", jobs.len());
        for job in jobs {
            println!("  {job}");
        }
    }
    Ok(())
}

/// Run the briefing from the project directory so .env and logs/ resolve.
/// The main binary sits next to this one.
fn job_line() -> anyhow::Result<String> {
    let exe = std::env::current_exe()?;
    let briefing_bin: PathBuf = exe.with_file_name("dental-briefing-server");
    let workdir = std::env::current_dir()?;
    Ok(format!(
        "{CRON_SCHEDULE} cd {} && {} --briefing >> logs/cron.log 2>&1 {CRON_MARKER}",
        workdir.display(),
        briefing_bin.display()
    ))
}

fn read_crontab() -> anyhow::Result<Vec<String>> {
    let output = Command::new("crontab").arg("-l").output()?;
    // A missing crontab exits non-zero; treat that as empty.
    if !output.status.success() {
        return Ok(Vec::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}

fn write_crontab(lines: &[String]) -> anyhow::Result<()> {
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }

    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(Stdio::piped())
        .spawn()?;
    child
        .stdin
        .as_mut()
        .ok_or_else(|| anyhow::anyhow!("failed to open crontab stdin"))?
        .write_all(body.as_bytes())?;
    let exit = child.wait()?;
    anyhow::ensure!(exit.success(), "crontab update failed");
    Ok(())
}
