//! Garage CLI - command-line client for garage-server.
//!
//! This is the entry point for the `garage` binary. Every command prints its
//! result as aligned text followed by `OK`, or the server's message followed
//! by `FAIL` with a non-zero exit status.

mod client;
mod render;
mod types;

use std::process::ExitCode;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};

use client::ServerClient;
use types::ActionOptions;

/// Garage CLI - manage cluster nodes through garage-server.
#[derive(Parser, Debug)]
#[command(name = "garage")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL.
    #[arg(
        short,
        long,
        env = "GARAGE_SERVER",
        default_value = "http://localhost:3030",
        global = true
    )]
    server: String,

    /// Enable debug logging.
    #[arg(long, default_value = "false", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all clusters.
    Clusters,
    /// Register clusters from directories containing cluster.yml.
    AddCluster {
        /// Cluster directories, as seen by the server.
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Reload every cluster registered from a directory.
    Reload,
    /// List all nodes in CLUSTER.
    Nodes {
        /// Name of the cluster.
        cluster: String,
    },
    /// Show node details.
    Node {
        /// Name of the cluster.
        cluster: String,
        /// Id of the node.
        id: String,
    },
    /// Start nodes.
    Start {
        /// Name of the cluster.
        cluster: String,
        /// Node ids or ranges such as `1-5`.
        #[arg(required = true)]
        ids: Vec<String>,
        /// Start from a clean state.
        #[arg(long)]
        clean: bool,
    },
    /// Stop nodes, or all nodes of CLUSTER when no ids are given.
    Stop {
        /// Name of the cluster.
        cluster: String,
        /// Node ids or ranges such as `1-5`.
        ids: Vec<String>,
        #[command(flatten)]
        options: StopOptions,
    },
    /// Show server version.
    Info,
    /// Ask the server to exit.
    Shutdown,
}

#[derive(ClapArgs, Debug)]
struct StopOptions {
    /// Remove node data after stopping.
    #[arg(long)]
    clean: bool,
    /// Stop even if the node is already stopping.
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("garage=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let client = ServerClient::new(&args.server);
    tracing::debug!(server = client.base_url(), command = ?args.command, "Running command");

    match run(&client, args.command).await {
        Ok(()) => {
            println!("OK");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{e:#}");
            println!("FAIL");
            ExitCode::FAILURE
        }
    }
}

async fn run(client: &ServerClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Clusters => {
            let clusters = client.list_clusters().await.context("listing clusters")?;
            for info in clusters.values() {
                print!("{}", render::cluster(info));
            }
        }
        Command::AddCluster { paths } => {
            let added = client.add_clusters(paths).await.context("adding clusters")?;
            for info in &added {
                print!("{}", render::cluster(info));
            }
        }
        Command::Reload => client.reload().await.context("reloading clusters")?,
        Command::Nodes { cluster } => {
            let nodes = client
                .list_nodes(&cluster)
                .await
                .with_context(|| format!("listing nodes of {cluster}"))?;
            for (id, status) in &nodes {
                print!("{}", render::node(id, status));
            }
        }
        Command::Node { cluster, id } => {
            let status = client
                .node(&cluster, &id)
                .await
                .with_context(|| format!("reading node {id} of {cluster}"))?;
            print!("{}", render::node(&id, &status));
        }
        Command::Start {
            cluster,
            ids,
            clean,
        } => {
            let options = ActionOptions {
                force: false,
                clean,
            };
            client
                .start_nodes(&cluster, ids, options)
                .await
                .with_context(|| format!("starting nodes of {cluster}"))?;
        }
        Command::Stop {
            cluster,
            ids,
            options,
        } => {
            let ids = (!ids.is_empty()).then_some(ids);
            let options = ActionOptions {
                force: options.force,
                clean: options.clean,
            };
            client
                .stop_nodes(&cluster, ids, options)
                .await
                .with_context(|| format!("stopping nodes of {cluster}"))?;
        }
        Command::Info => {
            let info = client.info().await.context("reading server info")?;
            print!("{}", render::server_info(&info));
        }
        Command::Shutdown => client.shutdown().await.context("requesting shutdown")?,
    }
    Ok(())
}
