/*
* virt-cluster Command Line Interface
* -----------------------------------
* Git-style subcommands over the cluster query engine:
*
* virt-cluster
* ├── list [--all]                      // every running domain on the cluster
* ├── find <pattern>...                 // locate domains by name or glob
* ├── hosts [--uris]                    // per-host inventory rows
* ├── select [--mem|--packing] [--type] // pick one host for a new workload
* └── init [--force]                    // write a default config file
*
* Data rows go to stdout, whitespace-separated and uncolored so they stay
* awk-friendly; diagnostics and status text go to stderr. Exit status is 0
* on success and 1 when find or select comes up empty.
*/

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;

use crate::cluster::{select, Cluster, Selector};
use crate::config::{generate_default_config, Settings, DEFAULT_CONFIG_PATH};
use crate::core::inventory::DomainRecord;
use crate::core::libvirt::LibvirtTransport;
use crate::core::transport::Transport;

#[derive(Parser)]
#[command(name = "virt-cluster")]
#[command(about = "Query and place workloads across a cluster of libvirt hosts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the configuration file
    #[arg(short = 'f', long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Print a header row above tabular output
    #[arg(short = 'H', long, global = true)]
    headers: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List domains running on the cluster
    List {
        /// Include defined but inactive domains
        #[arg(short, long)]
        all: bool,
    },
    /// Locate domains by exact name or glob pattern
    Find {
        #[arg(required = true, value_name = "PATTERN")]
        patterns: Vec<String>,
    },
    /// Display information for all hosts in the cluster
    Hosts {
        /// Show connection URIs instead of hostnames
        #[arg(short, long)]
        uris: bool,
    },
    /// Pick one host suitable for a new workload
    Select {
        /// Prefer the host with the most available memory
        #[arg(short, long)]
        mem: bool,
        /// Prefer the host with the lowest domains-per-CPU ratio
        #[arg(short, long, conflicts_with = "mem")]
        packing: bool,
        /// Restrict hosts to a specific hypervisor type
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        hv_type: Option<String>,
    },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::new_from_file(path)?,
        None => Settings::new()?,
    };
    if cli.headers {
        settings.cluster.headers = true;
    }

    // Bare invocation behaves as "list".
    let command = cli.command.unwrap_or(Commands::List { all: false });

    if let Commands::Init { force } = command {
        let path = cli
            .config
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        return handle_init(&path, force);
    }

    let cluster = Cluster::new(LibvirtTransport, settings);
    match command {
        Commands::List { all } => handle_list(&cluster, all),
        Commands::Find { patterns } => handle_find(&cluster, &patterns),
        Commands::Hosts { uris } => handle_hosts(&cluster, uris),
        Commands::Select {
            mem,
            packing,
            hv_type,
        } => handle_select(&cluster, mem, packing, hv_type.as_deref()),
        Commands::Init { .. } => unreachable!("handled above"),
    }
}

fn persist_flag(persistent: bool) -> &'static str {
    if persistent {
        "y"
    } else {
        "n"
    }
}

fn print_domain_row(d: &DomainRecord) {
    println!(
        "{} {} {} {}",
        d.host_uri,
        d.name,
        persist_flag(d.persistent),
        d.state
    );
}

fn handle_list<T: Transport>(cluster: &Cluster<T>, all: bool) -> Result<ExitCode> {
    if cluster.settings().cluster.headers {
        println!("URI name persist state");
    }
    for record in cluster.domains(all) {
        match record {
            Ok(d) => print_domain_row(&d),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!("{e}"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_find<T: Transport>(cluster: &Cluster<T>, patterns: &[String]) -> Result<ExitCode> {
    if cluster.settings().cluster.headers {
        println!("URI name persist state");
    }
    let mut found = false;
    for pattern in patterns {
        let matches = cluster.lookup(pattern)?;
        for d in &matches {
            print_domain_row(d);
        }
        found = found || !matches.is_empty();
    }
    if found {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{}", "Nothing found.".red());
        Ok(ExitCode::from(1))
    }
}

fn handle_hosts<T: Transport>(cluster: &Cluster<T>, uris: bool) -> Result<ExitCode> {
    if cluster.settings().cluster.headers {
        let name_column = if uris { "uri" } else { "name" };
        println!("{name_column} type arch memtotal memavail cpus active defined");
    }
    for record in cluster.hosts() {
        match record {
            Ok(h) => println!(
                "{} {} {} {} {} {} {} {}",
                if uris { &h.uri } else { &h.hostname },
                h.hypervisor,
                h.arch,
                h.mem_total_mb,
                h.mem_avail_mb,
                h.cpus,
                h.active_domains,
                h.defined_domains
            ),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!("{e}"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_select<T: Transport>(
    cluster: &Cluster<T>,
    mem: bool,
    packing: bool,
    hv_type: Option<&str>,
) -> Result<ExitCode> {
    let selector = if mem {
        Selector::Mem
    } else if packing {
        Selector::Packing
    } else {
        cluster.settings().cluster.selector
    };

    // Host-level failures cannot be fatal, so skip-and-warn keeps the
    // reduction lazy over the remaining hosts.
    let candidates = cluster.hosts().filter_map(|record| match record {
        Ok(h) => Some(h),
        Err(e) => {
            warn!("{e}");
            None
        }
    });

    match select(candidates, hv_type, selector) {
        Some(host) => {
            println!("{}", host.uri);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("{}", "Nothing selected by filters.".red());
            Ok(ExitCode::from(1))
        }
    }
}

fn handle_init(path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        eprintln!(
            "{} {} already exists, use --force to overwrite",
            "error:".red(),
            path.display()
        );
        return Ok(ExitCode::FAILURE);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut rendered = toml::to_string_pretty(&generate_default_config())?;
    rendered.push_str(
        "\n# Per-host credentials:\n\
         # [auth.\"qemu+ssh://host1/system\"]\n\
         # username = \"admin\"\n\
         # password = \"secret\"\n",
    );
    std::fs::write(path, rendered)?;

    println!(
        "{} Wrote default configuration to {}",
        "✓".green(),
        path.display()
    );
    Ok(ExitCode::SUCCESS)
}
