//! Command-line shell over `secretscan-core`: flag parsing, Docker export
//! plumbing for image/container targets, and JSON/table rendering.

use clap::Parser;
use secretscan_core::coordinator::{Coordinator, ScanRequest};
use secretscan_core::engine::Engine;
use secretscan_core::finding::{Finding, SecretScanDoc};
use secretscan_core::options::ScanOptions;
use secretscan_core::rule::Severity;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "secretscan", about = "Scan a filesystem, image, or container for leaked secrets")]
struct Cli {
    /// Scan a saved/pulled image by name (e.g. `alpine:3.19`).
    #[arg(long = "image-name", value_name = "NAME")]
    image_name: Option<String>,

    /// Scan a local directory.
    #[arg(long = "local", value_name = "PATH")]
    local: Option<PathBuf>,

    /// Scan a running container's exported filesystem.
    #[arg(long = "container-id", value_name = "ID")]
    container_id: Option<String>,

    /// Namespace the container belongs to, recorded for logging only.
    #[arg(long = "container-ns", value_name = "NAMESPACE")]
    container_ns: Option<String>,

    /// Path the host filesystem is mounted at, used to resolve container
    /// paths when the scanner itself runs inside a sidecar.
    #[arg(long = "host-mount-path", value_name = "PATH")]
    host_mount_path: Option<String>,

    /// Additional rule catalog file. Repeatable.
    #[arg(long = "config-path", value_name = "PATH")]
    config_path: Vec<PathBuf>,

    /// Append `-config-path` catalogs to the default catalog instead of
    /// replacing it.
    #[arg(long = "merge-configs")]
    merge_configs: bool,

    #[arg(long = "maximum-file-size", value_name = "KB", default_value_t = 256)]
    maximum_file_size: u64,

    #[arg(long = "max-secrets", value_name = "N", default_value_t = 1000)]
    max_secrets: usize,

    #[arg(long = "multi-match")]
    multi_match: bool,

    #[arg(long = "max-multi-match", value_name = "N", default_value_t = 3)]
    max_multi_match: usize,

    #[arg(long = "output", value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// Size of the tokio runtime's worker thread pool backing the whole
    /// process (distinct from `-workers-per-scan`, which shards one scan's
    /// file matching). Defaults to the tokio runtime's own CPU-count heuristic.
    #[arg(long = "threads", value_name = "N")]
    threads: Option<usize>,

    #[arg(long = "workers-per-scan", value_name = "N", default_value_t = 1)]
    workers_per_scan: usize,

    #[arg(long = "inactive-threshold", value_name = "SECS", default_value_t = 600)]
    inactive_threshold: u64,

    #[arg(long = "temp-directory", value_name = "PATH")]
    temp_directory: Option<PathBuf>,

    #[arg(long = "fail-on-count", value_name = "N")]
    fail_on_count: Option<usize>,

    #[arg(long = "fail-on-high-count", value_name = "N")]
    fail_on_high_count: Option<usize>,

    #[arg(long = "fail-on-medium-count", value_name = "N")]
    fail_on_medium_count: Option<usize>,

    #[arg(long = "fail-on-low-count", value_name = "N")]
    fail_on_low_count: Option<usize>,

    #[arg(long = "debug")]
    debug: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}

fn options_from_cli(cli: &Cli) -> ScanOptions {
    let defaults = ScanOptions::default();
    ScanOptions {
        maximum_file_size_kb: cli.maximum_file_size,
        max_secrets: cli.max_secrets,
        multi_match: cli.multi_match,
        max_multi_match: cli.max_multi_match,
        workers_per_scan: cli.workers_per_scan,
        inactive_threshold_secs: cli.inactive_threshold,
        temp_directory: cli.temp_directory.clone().unwrap_or(defaults.temp_directory),
        host_mount_path: cli.host_mount_path.clone(),
        ..defaults
    }
}

/// `docker save` an image into a temp tarball the coordinator can extract.
fn docker_save(image_name: &str, dest: &PathBuf) -> Result<(), String> {
    let status = Command::new("docker")
        .args(["save", "-o"])
        .arg(dest)
        .arg(image_name)
        .status()
        .map_err(|e| format!("failed to run docker save: {e}"))?;
    if !status.success() {
        return Err(format!("docker save exited with {status}"));
    }
    Ok(())
}

/// `docker export` a running container's filesystem into a temp tarball.
fn docker_export(container_id: &str, dest: &PathBuf) -> Result<(), String> {
    let status = Command::new("docker")
        .args(["export", "-o"])
        .arg(dest)
        .arg(container_id)
        .status()
        .map_err(|e| format!("failed to run docker export: {e}"))?;
    if !status.success() {
        return Err(format!("docker export exited with {status}"));
    }
    Ok(())
}

fn build_request(cli: &Cli, staging_dir: &std::path::Path) -> Result<ScanRequest, String> {
    let selected = [cli.image_name.is_some(), cli.local.is_some(), cli.container_id.is_some()]
        .iter()
        .filter(|b| **b)
        .count();
    if selected != 1 {
        return Err("exactly one of -image-name, -local, -container-id must be given".to_string());
    }

    if let Some(path) = &cli.local {
        let abs = path.canonicalize().map_err(|e| format!("resolving local path: {e}"))?;
        return Ok(ScanRequest::Path(abs));
    }
    if let Some(name) = &cli.image_name {
        let tar_path = staging_dir.join("image.tar");
        docker_save(name, &tar_path)?;
        return Ok(ScanRequest::Image { name: name.clone(), tar_path });
    }
    if let Some(id) = &cli.container_id {
        let tar_path = staging_dir.join("container.tar");
        docker_export(id, &tar_path)?;
        return Ok(ScanRequest::Container {
            id: id.clone(),
            namespace: cli.container_ns.clone(),
            tar_path,
        });
    }
    unreachable!("selected count checked above")
}

fn print_json(scan_id: &str, findings: &[Finding]) {
    for finding in findings {
        let doc = SecretScanDoc { scan_id: scan_id.to_string(), finding: finding.clone() };
        match serde_json::to_string(&doc) {
            Ok(line) => println!("{line}"),
            Err(e) => error!(error = %e, "failed to serialize finding"),
        }
    }
}

fn print_table(findings: &[Finding]) {
    println!("{:<8} {:<32} {:<40} {:>6} {}", "SEVERITY", "RULE", "FILE", "LINE", "EXCERPT");
    for f in findings {
        println!(
            "{:<8} {:<32} {:<40} {:>6} {}",
            format!("{:?}", f.severity),
            f.rule,
            f.full_filename,
            f.starting_line_number.map(|n| n.to_string()).unwrap_or_default(),
            f.match_excerpt
        );
    }
}

fn exit_code(cli: &Cli, findings: &[Finding]) -> i32 {
    let count = findings.len();
    let high = findings.iter().filter(|f| f.severity == Severity::High || f.severity == Severity::Critical).count();
    let medium = findings.iter().filter(|f| f.severity == Severity::Medium).count();
    let low = findings.iter().filter(|f| f.severity == Severity::Low).count();

    let breached = cli.fail_on_count.map(|t| count >= t).unwrap_or(false)
        || cli.fail_on_high_count.map(|t| high >= t).unwrap_or(false)
        || cli.fail_on_medium_count.map(|t| medium >= t).unwrap_or(false)
        || cli.fail_on_low_count.map(|t| low >= t).unwrap_or(false);

    if breached {
        1
    } else {
        0
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(n) = cli.threads {
        builder.worker_threads(n);
    }
    let runtime = match builder.enable_io().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            std::process::exit(2);
        }
    };

    runtime.block_on(run(cli));
}

async fn run(cli: Cli) {
    let staging = match tempfile::tempdir() {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "failed to create staging directory");
            std::process::exit(2);
        }
    };

    let request = match build_request(&cli, staging.path()) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "invalid scan request");
            std::process::exit(2);
        }
    };

    let options = options_from_cli(&cli);
    let engine = match Engine::from_config_paths(&cli.config_path, cli.merge_configs, options) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            error!(error = %e, "failed to build engine");
            std::process::exit(2);
        }
    };

    let coordinator = Arc::new(Coordinator::new(engine));
    let scan_id = Uuid::new_v4().to_string();
    info!(scan_id, "starting scan");

    let mut handle = match coordinator.submit(scan_id.clone(), request).await {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "failed to start scan");
            std::process::exit(2);
        }
    };

    let mut findings = Vec::new();
    while let Some(finding) = handle.findings.recv().await {
        findings.push(finding);
    }

    match cli.output {
        OutputFormat::Json => print_json(&scan_id, &findings),
        OutputFormat::Table => print_table(&findings),
    }

    std::process::exit(exit_code(&cli, &findings));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["secretscan"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn parses_local_scan() {
        let cli = parse(&["--local", "/tmp/x"]);
        assert_eq!(cli.local, Some(PathBuf::from("/tmp/x")));
        assert!(cli.image_name.is_none());
    }

    #[test]
    fn rejects_no_target() {
        let cli = parse(&[]);
        let dir = tempfile::tempdir().unwrap();
        assert!(build_request(&cli, dir.path()).is_err());
    }

    #[test]
    fn rejects_multiple_targets() {
        let cli = parse(&["--local", "/tmp/x", "--image-name", "alpine"]);
        let dir = tempfile::tempdir().unwrap();
        assert!(build_request(&cli, dir.path()).is_err());
    }

    #[test]
    fn exit_code_zero_with_no_thresholds() {
        let cli = parse(&["--local", "/tmp/x"]);
        assert_eq!(exit_code(&cli, &[]), 0);
    }

    #[test]
    fn exit_code_one_when_count_threshold_breached() {
        let cli = parse(&["--local", "/tmp/x", "--fail-on-count", "1"]);
        let finding = Finding {
            rule_id: 0,
            rule: "test".into(),
            severity: Severity::Low,
            score: 1,
            layer_id: String::new(),
            full_filename: "f".into(),
            filename: "f".into(),
            file_extension: String::new(),
            starting_line_number: Some(1),
            match_excerpt: String::new(),
            match_line: String::new(),
            match_from_byte: 0,
            match_to_byte: 0,
        };
        assert_eq!(exit_code(&cli, &[finding]), 1);
    }
}
