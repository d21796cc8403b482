use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "overwatch", about = "Multi-stage reconnaissance scan orchestrator")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API and the scan scheduler.
    Serve(ServeArgs),
    /// Check that every required external tool is installed.
    Check,
    /// Run one scan from the terminal and wait for it to finish.
    Scan(ScanArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Bind address. Defaults to the configured http_server.host.
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port. Defaults to the configured http_server.port.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ScanArgs {
    /// Project name; the slug is derived from it.
    #[arg(long)]
    pub name: String,

    /// Seed target (domain). Can be specified multiple times.
    #[arg(long = "target", action = clap::ArgAction::Append, required = true)]
    pub targets: Vec<String>,

    /// Use the seed targets as-is instead of enumerating subdomains.
    #[arg(long, default_value_t = false)]
    pub skip_subdomain_enum: bool,
}
