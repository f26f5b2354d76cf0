//! Command-line interface for doa-bridge.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Every option is optional here; unset values fall through to the
/// environment, the config file, and finally the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind the WebSocket server to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Host on which the engine is running.
    pub engine_host: Option<String>,
    /// Port on which the engine's control connection listens.
    pub engine_port: Option<u16>,
    /// Id of the pooling plug-in instance to control.
    pub pooling_id: Option<String>,
    /// Id of the classification plug-in instance used for startup
    /// discovery of the angle grid.
    pub classification_id: Option<String>,
    /// Full path of the pool variable to visualise.
    pub pool_path: Option<String>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Long("engine-host") => {
                result.engine_host = Some(parser.value()?.parse()?);
            }
            Long("engine-port") => {
                let value: String = parser.value()?.parse()?;
                result.engine_port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("engine-port", value))?,
                );
            }
            Long("pooling-id") => {
                result.pooling_id = Some(parser.value()?.parse()?);
            }
            Long("classification-id") => {
                result.classification_id = Some(parser.value()?.parse()?);
            }
            Long("pool-path") => {
                result.pool_path = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"doa-bridge {version}
WebSocket bridge for live control and visualisation of an audio processing engine

USAGE:
    doa-bridge [OPTIONS]

OPTIONS:
    -H, --host <ADDR>            Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>            Port to listen on [default: 3000]
        --engine-host <HOST>     Engine control host [default: 127.0.0.1]
        --engine-port <PORT>     Engine control port [default: 33337]
        --pooling-id <ID>        Pooling plug-in instance to control [default: pool]
        --classification-id <ID> Classification plug-in instance for the
                                 angle grid [default: svm]
        --pool-path <PATH>       Full path of the pool variable to visualise;
                                 derived from the pooling plug-in if unset
    -c, --config <FILE>          Path to configuration file (JSON)
    -l, --log-level <LVL>        Log level (error, warn, info, debug, trace)
    -h, --help                   Print help
    -V, --version                Print version

ENVIRONMENT VARIABLES:
    DOA_BRIDGE_HOST          Bind address (overrides config)
    DOA_BRIDGE_PORT          Bind port (overrides config)
    DOA_BRIDGE_ENGINE_HOST   Engine control host (overrides config)
    DOA_BRIDGE_ENGINE_PORT   Engine control port (overrides config)
    DOA_BRIDGE_LOG_LEVEL     Log level (overrides config)
    RUST_LOG                 Alternative log level setting

EXAMPLES:
    # Start with defaults (localhost:3000, engine on localhost:33337)
    doa-bridge

    # Serve on all interfaces against a remote engine
    doa-bridge -H 0.0.0.0 -p 8080 --engine-host 10.0.0.5

    # Control a specific pooling instance with an explicit pool variable
    doa-bridge --pooling-id pool2 --pool-path mha.doachain.doasvm_mon.pool

    # Start with config file
    doa-bridge -c /etc/doa-bridge/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("doa-bridge {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
