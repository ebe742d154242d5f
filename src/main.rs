use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dockhand::cli::{Args, Commands, ConfigDiscovery, DockhandConfig, render_command};
use dockhand::container::{
    Console, ContainerClient, ContainerError, ContainerInfo, ExecSpec, HostConsole, ProgressMode,
    ProgressReporter, ResourceRecord, RollbackSink, TerminalBridge, VolumeInfo, WriterSink,
    exec_to_writer, exit_status, find_service_container, prefixed_containers, prefixed_volumes,
    rollback,
};
use dockhand::env;
use std::io::{IsTerminal, Stderr, Stdout};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let (config, source) = match ConfigDiscovery::load(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);
    info!("Configuration: {}", source);

    let code = match run(args, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    // An interactive session can leave a blocking stdin read behind; exiting
    // directly avoids waiting on it during runtime shutdown.
    std::process::exit(code);
}

fn init_logging(args: &Args, config: &DockhandConfig) {
    let default_filter = if args.verbose {
        env::VERBOSE_LOG_FILTER
    } else {
        config.logging.filter.as_str()
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args, config: DockhandConfig) -> Result<i32> {
    match args.command {
        Commands::ShowConfig => {
            ConfigDiscovery::show_discovery_info(args.config.as_deref());
            println!();
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(0)
        }
        Commands::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("Configuration file: {}", path.display());
            Ok(0)
        }
        command => {
            let client = ContainerClient::with_config(config.client_config())
                .await
                .context("could not reach the container runtime")?;
            dispatch(command, &client, &config).await
        }
    }
}

async fn dispatch(
    command: Commands,
    client: &ContainerClient,
    config: &DockhandConfig,
) -> Result<i32> {
    let prefix_or_default =
        |prefix: Option<String>| prefix.unwrap_or_else(|| config.discovery.prefix.clone());

    match command {
        Commands::Ps { prefix, json } => {
            let containers = prefixed_containers(client, &prefix_or_default(prefix)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&containers)?);
            } else {
                print_containers(&containers);
            }
            Ok(0)
        }
        Commands::Volumes { prefix, json } => {
            let volumes = prefixed_volumes(client, &prefix_or_default(prefix)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&volumes)?);
            } else {
                print_volumes(&volumes);
            }
            Ok(0)
        }
        Commands::Find { service, prefix } => {
            let container =
                find_service_container(client, &prefix_or_default(prefix), &service).await?;
            println!("{}", container.id);
            Ok(0)
        }
        Commands::Exec { container, cmd } => {
            info!("Running `{}` in {}", render_command(&cmd), container);

            let mut spec = ExecSpec::builder()
                .cmd(cmd)
                .privileged(config.exec.privileged);
            if let Some(ref user) = config.exec.user {
                spec = spec.user(user.as_str());
            }
            if let Some(ref dir) = config.exec.working_dir {
                spec = spec.working_dir(dir.as_str());
            }

            let mut stdout = tokio::io::stdout();
            let success = exec_to_writer(client, &container, &spec.build(), &mut stdout).await?;
            Ok(if success { 0 } else { 1 })
        }
        Commands::Shell {
            container,
            unprivileged,
            cmd,
        } => {
            let cmd = if cmd.is_empty() {
                config.exec.shell.clone()
            } else {
                cmd
            };
            info!("Attaching `{}` in {}", render_command(&cmd), container);

            let mut console = HostConsole::new();
            let session = TerminalBridge::new(client, &mut console)
                .privileged(config.exec.privileged && !unprivileged)
                .run(&container, cmd)
                .await?;

            Ok(exit_status(session.exit_code))
        }
        Commands::Purge { prefix, yes } => {
            let prefix = prefix_or_default(prefix);
            let containers: Vec<ResourceRecord> = prefixed_containers(client, &prefix)
                .await?
                .into_iter()
                .map(|c| ResourceRecord::container(c.id))
                .collect();
            let volumes: Vec<ResourceRecord> = prefixed_volumes(client, &prefix)
                .await?
                .into_iter()
                .map(|v| ResourceRecord::volume(v.name))
                .collect();

            if !yes {
                for record in containers.iter().chain(&volumes) {
                    println!("would remove {}", record);
                }
                println!(
                    "Re-run with --yes to remove {} resources",
                    containers.len() + volumes.len()
                );
                return Ok(0);
            }

            let mut sink = PurgeSink::default();
            rollback(client, &containers, &volumes, &mut sink).await;

            if sink.failures > 0 {
                eprintln!("{} resources could not be removed", sink.failures);
                return Ok(1);
            }
            Ok(0)
        }
        Commands::Pull { image } => {
            let stdout = std::io::stdout();
            let mode = ProgressMode::for_terminal(stdout.is_terminal(), HostConsole::new().width());
            let mut reporter = ProgressReporter::new(stdout, mode);

            client.pull_image(&image, |line| reporter.line(line)).await?;
            reporter.finish()?;
            Ok(0)
        }
        Commands::ShowConfig | Commands::InitConfig => unreachable!("handled without a client"),
    }
}

fn print_containers(containers: &[ContainerInfo]) {
    println!(
        "{:<14}{:<32}{:<24}{:<10}CREATED",
        "CONTAINER ID", "NAME", "IMAGE", "STATE"
    );
    for c in containers {
        let id: String = c.id.chars().take(12).collect();
        let created = DateTime::<Utc>::from_timestamp(c.created, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!(
            "{:<14}{:<32}{:<24}{:<10}{}",
            id,
            c.names.join(","),
            c.image,
            c.state,
            created
        );
    }
}

fn print_volumes(volumes: &[VolumeInfo]) {
    println!("{:<40}{:<10}MOUNTPOINT", "VOLUME NAME", "DRIVER");
    for v in volumes {
        println!("{:<40}{:<10}{}", v.name, v.driver, v.mountpoint);
    }
}

/// Prints like the rollback sink and counts failures for the exit status.
struct PurgeSink {
    inner: WriterSink<Stdout, Stderr>,
    failures: usize,
}

impl Default for PurgeSink {
    fn default() -> Self {
        Self {
            inner: WriterSink::stdio(),
            failures: 0,
        }
    }
}

impl RollbackSink for PurgeSink {
    fn attempted(&mut self, record: &ResourceRecord) {
        self.inner.attempted(record);
    }

    fn failed(&mut self, record: &ResourceRecord, error: &ContainerError) {
        self.failures += 1;
        self.inner.failed(record, error);
    }
}
