//! topo CLI: switch transcripts → link graph → anomalies and diagrams.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::Result;

use switch_topo::anomaly::AnomalyDetector;
use switch_topo::canon::canonical;
use switch_topo::config::TopoConfig;
use switch_topo::export::{ExportError, ExportFormat, export};
use switch_topo::import::{ImportStatus, import_file};
use switch_topo::model::{Anomaly, Confidence, Link, LinkKey, LinkType, Severity};
use switch_topo::paths::TopoPaths;
use switch_topo::store::{GraphReader, GraphWriter, TopoStore};

#[derive(Parser)]
#[command(name = "topo", version, about = "Switch transcripts to a trust-labelled link graph")]
struct Cli {
    /// Database file (default: $XDG_DATA_HOME/switch-topo/topo.redb).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Configuration file (default: $XDG_CONFIG_HOME/switch-topo/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `switch_topo=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one or more transcript files.
    Import {
        /// Transcript files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Device name (default: derived from each file name).
        #[arg(long)]
        device: Option<String>,

        /// Re-import files whose content was imported before.
        #[arg(long)]
        force: bool,
    },

    /// Run the anomaly rules.
    Detect {
        /// Only this device (default: every device).
        #[arg(long)]
        device: Option<String>,
    },

    /// Draw a topology diagram.
    Export {
        /// Center device, optionally followed by more seed devices.
        #[arg(required = true)]
        devices: Vec<String>,

        /// mermaid, markdown or dot.
        #[arg(long, default_value = "mermaid")]
        format: ExportFormat,

        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Physical link cap for single-device diagrams.
        #[arg(long)]
        max_links: Option<usize>,

        /// Hop limit; enables multi-hop mode.
        #[arg(long)]
        depth: Option<usize>,

        /// Confidence tiers to draw (comma-separated).
        #[arg(long, value_delimiter = ',')]
        confidence: Vec<Confidence>,
    },

    /// Change the confidence of an existing link.
    Mark {
        device: String,
        src_if: String,
        dst_device: String,
        dst_if: String,
        confidence: Confidence,
    },

    /// Add or update a link by hand.
    Link {
        device: String,
        src_if: String,
        dst_device: String,
        dst_if: String,

        /// Mark the link as an aggregation-group link.
        #[arg(long)]
        aggregated: bool,

        #[arg(long, default_value = "trusted")]
        confidence: Confidence,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List known devices.
    Devices {
        /// Show anomaly counts per device.
        #[arg(long)]
        anomalies: bool,
    },

    /// List recorded anomalies, newest first.
    Anomalies {
        /// info, warning or error.
        #[arg(long)]
        severity: Option<Severity>,

        #[arg(long)]
        device: Option<String>,
    },

    /// List imported transcripts, newest first.
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Print the effective configuration.
    Config,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (db_path, config_path) = match (cli.db.clone(), cli.config.clone()) {
        (Some(db), Some(config)) => (db, config),
        (db, config) => {
            let paths = TopoPaths::resolve()?;
            (
                db.unwrap_or_else(|| paths.database_file()),
                config.unwrap_or_else(|| paths.config_file()),
            )
        }
    };
    let config = TopoConfig::load(&config_path)?;

    if let Commands::Config = cli.command {
        println!("# {}", config_path.display());
        print!("{}", config.to_toml().map_err(|e| miette::miette!("{e}"))?);
        return Ok(());
    }

    let store = TopoStore::open(&db_path)?;

    match cli.command {
        Commands::Import {
            files,
            device,
            force,
        } => {
            let mut import_config = config.import().with_force(force);
            import_config.device = device;

            let mut failed = 0;
            for file in &files {
                match import_file(&store, file, &import_config) {
                    Ok(report) => {
                        let short = &report.hash[..16];
                        match report.status {
                            ImportStatus::Skipped => {
                                println!("skipped  {} (already imported, hash {short})", file.display());
                            }
                            ImportStatus::Imported => {
                                let c = report.counts;
                                println!(
                                    "imported {} as {}: {} neighbors, {} links, {} trunks, {} interfaces, {} stp-blocked (hash {short})",
                                    file.display(),
                                    report.device,
                                    c.neighbors,
                                    c.links,
                                    c.trunks,
                                    c.interfaces,
                                    c.stp_blocked,
                                );
                                for anomaly in &report.anomalies {
                                    println!("  {}", describe(anomaly));
                                }
                            }
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        eprintln!("{:?}", miette::Report::new(e));
                    }
                }
            }
            if failed > 0 {
                miette::bail!("{failed} of {} transcripts failed to import", files.len());
            }
        }

        Commands::Detect { device } => {
            let detector = AnomalyDetector::new(config.detector());
            let reports = match device {
                Some(device) => vec![detector.detect(&store, &device)?],
                None => detector.detect_all(&store)?,
            };
            for report in &reports {
                println!(
                    "{}: {} anomalies{}",
                    report.device,
                    report.anomalies.len(),
                    if report.retired > 0 {
                        format!(" ({} retired)", report.retired)
                    } else {
                        String::new()
                    }
                );
                for anomaly in &report.anomalies {
                    println!("  {}", describe(anomaly));
                }
                for failure in &report.failures {
                    println!("  rule {} failed: {}", failure.rule, failure.message);
                }
            }
        }

        Commands::Export {
            devices,
            format,
            output,
            max_links,
            depth,
            confidence,
        } => {
            let mut request = config.export(devices).with_format(format);
            if let Some(max) = max_links {
                request = request.with_max_phy_links(max);
            }
            if let Some(depth) = depth {
                request = request.with_depth(depth);
            }
            if !confidence.is_empty() {
                request = request.with_confidence(confidence);
            }

            let read = store.read()?;
            let diagram = export(&read, &request)?;
            match output {
                Some(path) => {
                    write_output(&path, &diagram.text)?;
                    eprintln!(
                        "wrote {} ({} nodes, {} edges{})",
                        path.display(),
                        diagram.nodes,
                        diagram.edges,
                        if diagram.truncated > 0 {
                            format!(", {} physical links left out", diagram.truncated)
                        } else {
                            String::new()
                        }
                    );
                }
                None => print!("{}", diagram.text),
            }
        }

        Commands::Mark {
            device,
            src_if,
            dst_device,
            dst_if,
            confidence,
        } => {
            let key = LinkKey::new(device, canonical(&src_if), dst_device, canonical(&dst_if));
            let mut session = store.write()?;
            let link = session.set_link_confidence(&key, confidence)?;
            session.commit()?;
            println!("{} is now {}", link.key, link.confidence);
        }

        Commands::Link {
            device,
            src_if,
            dst_device,
            dst_if,
            aggregated,
            confidence,
            notes,
        } => {
            let key = LinkKey::new(device, canonical(&src_if), dst_device, canonical(&dst_if));
            let link_type = if aggregated {
                LinkType::Aggregated
            } else {
                LinkType::Physical
            };
            let mut link = Link::new(key, link_type).with_confidence(confidence);
            link.notes = notes;

            let mut session = store.write()?;
            let stored = session.upsert_link(&link)?;
            session.commit()?;
            println!(
                "#{} {} ({}, {})",
                stored.id, stored.key, stored.link_type, stored.confidence
            );
        }

        Commands::Devices { anomalies } => {
            let read = store.read()?;
            let devices = read.devices()?;
            if devices.is_empty() {
                println!("No devices imported.");
            }
            for device in &devices {
                let links = read.links_touching(&device.name)?;
                let mut line = format!("{:<24} {:>4} links", device.name, links.len());
                if anomalies {
                    let found = read.anomalies(Some(device.name.as_str()), None)?;
                    line.push_str(&format!(" {:>4} anomalies", found.len()));
                }
                println!("{line}");
            }
        }

        Commands::Anomalies { severity, device } => {
            let read = store.read()?;
            let found = read.anomalies(device.as_deref(), severity)?;
            if found.is_empty() {
                println!("No anomalies.");
            }
            for anomaly in &found {
                println!("#{} {} {}", anomaly.seq, anomaly.device, describe(anomaly));
            }
        }

        Commands::History { limit } => {
            let read = store.read()?;
            for record in read.imports()?.iter().take(limit) {
                println!(
                    "{} {:<20} {} {}",
                    record.imported_at,
                    record.device,
                    &record.hash[..16],
                    record.source
                );
            }
        }

        Commands::Config => {}
    }

    Ok(())
}

fn describe(anomaly: &Anomaly) -> String {
    format!("[{}] {}: {}", anomaly.severity, anomaly.kind, anomaly.detail)
}

fn write_output(path: &Path, text: &str) -> std::result::Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    std::fs::write(path, text).map_err(io_err)
}
