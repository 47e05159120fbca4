use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use framecat::{setup_tracing, AppError, AppResult, Relay, RelayConfig, Role};
use tokio::runtime;

#[derive(Parser)]
#[command(name = "framecat", about = "Relay stdio over a length-framed stream connection")]
pub struct CommandLine {
    /// listen for connections
    #[arg(short = 'l', long = "listen")]
    pub listen: bool,
    /// port number to listen on or connect to
    #[arg(short, long)]
    pub port: Option<u16>,
    /// print total sent and received bytes before exit
    #[arg(short = 's', long = "stats")]
    pub stats: bool,
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    /// print framecat version
    #[arg(short = 'v', long = "version")]
    pub version: bool,
    /// host to connect to (required, but unused with -l)
    #[arg(required_unless_present = "version")]
    pub hostname: Option<String>,
}

fn print_version() {
    eprintln!("framecat: version {}", env!("CARGO_PKG_VERSION"));
}

fn run(commandline: CommandLine) -> AppResult<()> {
    let relay_config = RelayConfig::set_up_config(commandline.conf.as_deref(), commandline.port)?;
    let _tracing_guard = setup_tracing(&relay_config.log)?;

    let port = relay_config.network.port;
    let role = if commandline.listen {
        Role::Server { port }
    } else {
        let host = commandline
            .hostname
            .ok_or_else(|| AppError::InvalidValue("please specify host to connect".into()))?;
        Role::Client { host, port }
    };

    // startup tokio runtime
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let relay = Relay::new(relay_config, role, commandline.stats);
    let result = relay.start(&rt);
    // a stdin read may still be parked on the blocking pool
    rt.shutdown_timeout(Duration::from_millis(100));
    result
}

fn main() -> ExitCode {
    let commandline = CommandLine::parse();
    if commandline.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    match run(commandline) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("framecat: {}", err);
            ExitCode::FAILURE
        }
    }
}
