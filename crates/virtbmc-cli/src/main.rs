//! virtbmc - command-line client for the virtbmc daemon.
//!
//! This is the entry point for the `virtbmc` binary. Every subcommand is a
//! call against the daemon API; errors are printed as `Error: <message>`.

mod client;
mod output;
mod types;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use client::{ClientError, DaemonClient};

/// Manage virtual BMCs through the virtbmc daemon.
#[derive(Parser, Debug)]
#[command(name = "virtbmc")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Daemon URL.
    #[arg(
        long,
        global = true,
        env = "VIRTBMC_URL",
        default_value = "http://127.0.0.1:6230"
    )]
    daemon: String,

    /// Enable debug logging.
    #[arg(short = 'd', long, global = true, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new virtual BMC for a managed instance.
    Add(AddArgs),
    /// Delete virtual BMCs, stopping them first.
    Delete {
        /// BMC names.
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Start serving virtual BMCs.
    Start {
        /// BMC names.
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Stop serving virtual BMCs.
    Stop {
        /// BMC names.
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List all virtual BMCs.
    List,
    /// Show the settings of one virtual BMC.
    Show {
        /// BMC name.
        name: String,
    },
    /// List the drivers the daemon can build.
    Drivers,
}

#[derive(clap::Args, Debug)]
struct AddArgs {
    /// Name or UUID of the managed instance.
    name: String,

    /// Driver that controls the instance.
    #[arg(long, env = "VIRTBMC_DRIVER", default_value = "openstack")]
    driver: String,

    /// Named cloud to connect to (openstack driver).
    #[arg(long = "os-cloud", value_name = "NAME")]
    cloud: Option<String>,

    /// The BMC username (default: admin).
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// The BMC password (default: password).
    #[arg(short = 'P', long)]
    password: Option<String>,

    /// Port to listen on (default: 623).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Address to listen on (default: '::').
    #[arg(short = 'a', long)]
    address: Option<String>,
}

impl AddArgs {
    /// Build the raw config, leaving unset settings to the daemon's defaults.
    fn into_raw(self) -> Map<String, Value> {
        let mut raw = Map::new();
        raw.insert("name".into(), Value::String(self.name));
        raw.insert("driver".into(), Value::String(self.driver));
        let optional = [
            ("cloud", self.cloud.map(Value::String)),
            ("username", self.username.map(Value::String)),
            ("password", self.password.map(Value::String)),
            ("port", self.port.map(Value::from)),
            ("address", self.address.map(Value::String)),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                raw.insert(key.into(), value);
            }
        }
        raw
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("virtbmc_cli=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let client = DaemonClient::new(&args.daemon);
    tracing::debug!(daemon = %args.daemon, command = ?args.command, "Running command");

    match run(&client, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(client: &DaemonClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Add(add) => {
            let created = client.create_bmc(&add.into_raw()).await?;
            tracing::debug!(name = %created.name, "Created bmc");
        }
        Command::Delete { names } => {
            for_each(&names, |name| client.delete_bmc(name)).await?;
        }
        Command::Start { names } => {
            for_each(&names, |name| async move {
                client.start_bmc(name).await.map(|_| ())
            })
            .await?;
        }
        Command::Stop { names } => {
            for_each(&names, |name| async move {
                client.stop_bmc(name).await.map(|_| ())
            })
            .await?;
        }
        Command::List => {
            let bmcs = client.list_bmcs().await?;
            if bmcs.is_empty() {
                anyhow::bail!("No BMCs currently created");
            }
            println!("{}", output::bmc_table(&bmcs));
        }
        Command::Show { name } => {
            let bmc = client
                .get_bmc(&name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("bmc with that name doesn't exist"))?;
            println!("{}", output::property_table(&bmc));
        }
        Command::Drivers => {
            for driver in client.list_drivers().await? {
                println!("{driver}");
            }
        }
    }
    Ok(())
}

/// Apply `op` to each name in order, stopping at the first failure.
async fn for_each<'a, F, Fut>(names: &'a [String], op: F) -> Result<(), ClientError>
where
    F: Fn(&'a str) -> Fut,
    Fut: std::future::Future<Output = Result<(), ClientError>>,
{
    for name in names {
        op(name).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn add_keeps_only_given_settings() {
        let args = parse(&["virtbmc", "add", "vm-1", "--driver", "dummy", "-p", "6231"]);
        let Command::Add(add) = args.command else {
            panic!("expected add");
        };
        let raw = add.into_raw();

        assert_eq!(raw["name"], "vm-1");
        assert_eq!(raw["driver"], "dummy");
        assert_eq!(raw["port"], 6231);
        assert!(!raw.contains_key("username"));
        assert!(!raw.contains_key("cloud"));
    }

    #[test]
    fn add_passes_cloud() {
        let args = parse(&[
            "virtbmc",
            "add",
            "vm-1",
            "--driver",
            "openstack",
            "--os-cloud",
            "lab",
            "-u",
            "root",
            "-P",
            "calvin",
            "-a",
            "127.0.0.1",
        ]);
        let Command::Add(add) = args.command else {
            panic!("expected add");
        };
        let raw = add.into_raw();

        assert_eq!(raw["cloud"], "lab");
        assert_eq!(raw["username"], "root");
        assert_eq!(raw["password"], "calvin");
        assert_eq!(raw["address"], "127.0.0.1");
    }

    #[test]
    fn start_requires_a_name() {
        assert!(Args::try_parse_from(["virtbmc", "start"]).is_err());
        let args = parse(&["virtbmc", "start", "a", "b"]);
        assert!(matches!(args.command, Command::Start { names } if names == ["a", "b"]));
    }
}
