use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    fn enroll(&self, roll_number: &str, name: &str, email: &str, descriptor: &[f64]) -> zbus::Result<String>;
    fn recognize(&self, descriptor: &[f64], subject: &str, session_id: &str) -> zbus::Result<String>;
    fn mark_manual(&self, roll_number: &str, subject: &str, session_id: &str) -> zbus::Result<String>;
    fn list_identities(&self) -> zbus::Result<String>;
    fn list_events(&self) -> zbus::Result<String>;
    fn summary(&self, day: &str) -> zbus::Result<String>;
    fn purge_all(&self) -> zbus::Result<bool>;
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    /// Talk to a daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a student
    Enroll {
        /// Unique roll number
        #[arg(short, long)]
        roll: String,
        #[arg(short, long)]
        name: String,
        /// Defaults to one derived from the name
        #[arg(short, long, default_value = "")]
        email: String,
        /// Comma-separated values, or @path to a JSON array
        #[arg(short, long)]
        descriptor: String,
    },
    /// Recognize a face descriptor and record attendance
    Recognize {
        /// Comma-separated values, or @path to a JSON array
        #[arg(short, long)]
        descriptor: String,
        #[arg(short, long, default_value = "")]
        subject: String,
        #[arg(long, default_value = "")]
        session: String,
    },
    /// Mark attendance manually by roll number
    Mark {
        roll: String,
        #[arg(short, long, default_value = "")]
        subject: String,
        #[arg(long, default_value = "")]
        session: String,
    },
    /// List enrolled students
    List,
    /// List attendance events, most recent first
    Events,
    /// Show attendance statistics
    Summary {
        /// Restrict to one day (YYYY-MM-DD)
        #[arg(long)]
        day: Option<String>,
    },
    /// Delete every student and attendance event
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    tracing::debug!(system_bus = cli.system, "connecting to rollcalld");

    let connection = if cli.system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    };
    let connection = connection.context("failed to connect to D-Bus")?;
    let proxy = AttendanceProxy::new(&connection)
        .await
        .context("rollcalld is not reachable")?;

    match cli.command {
        Commands::Enroll { roll, name, email, descriptor } => {
            let descriptor = parse_descriptor(&descriptor)?;
            print_json(&proxy.enroll(&roll, &name, &email, &descriptor).await?)?;
        }
        Commands::Recognize { descriptor, subject, session } => {
            let descriptor = parse_descriptor(&descriptor)?;
            print_json(&proxy.recognize(&descriptor, &subject, &session).await?)?;
        }
        Commands::Mark { roll, subject, session } => {
            print_json(&proxy.mark_manual(&roll, &subject, &session).await?)?;
        }
        Commands::List => print_json(&proxy.list_identities().await?)?,
        Commands::Events => print_json(&proxy.list_events().await?)?,
        Commands::Summary { day } => {
            print_json(&proxy.summary(day.as_deref().unwrap_or("")).await?)?;
        }
        Commands::Purge { yes } => {
            if !yes {
                bail!("refusing to purge without --yes");
            }
            proxy.purge_all().await?;
            println!("All students and attendance records cleared");
        }
        Commands::Status => print_json(&proxy.status().await?)?,
    }

    Ok(())
}

/// Parse `"0.1,0.2,0.3"` or `"@file.json"` (a JSON array of numbers).
fn parse_descriptor(arg: &str) -> Result<Vec<f64>> {
    if let Some(path) = arg.strip_prefix('@') {
        let path = Path::new(path);
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read descriptor file {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON array of numbers", path.display()));
    }

    let values = arg
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().with_context(|| format!("invalid descriptor value {s:?}")))
        .collect::<Result<Vec<_>>>()?;
    if values.is_empty() {
        bail!("descriptor is empty");
    }
    Ok(values)
}

fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw).context("daemon returned invalid JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
