use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tokio::runtime;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

use simple_message::service::EXIT_FAILURE;
use simple_message::{serve, setup_tracing, verbosity_level, AppResult, ServerConfig};

#[derive(Parser)]
#[command(
    version,
    about = "Accept bulletin board postings and hand every connection to a handler program"
)]
pub struct CommandLine {
    /// port to listen on [0..65535]
    #[arg(short, long)]
    pub port: u16,
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<PathBuf>,
    /// log level (v: debug, vv: trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

fn main() -> ExitCode {
    let commandline = match CommandLine::try_parse() {
        Ok(commandline) => commandline,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // logging depends on the config, so config errors go straight to stderr
    let config = match ServerConfig::set_up_config(commandline.conf.as_ref(), commandline.port) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error in reading config files: {}", err);
            return ExitCode::from(err.exit_code());
        }
    };
    let level = verbosity_level(LevelFilter::INFO, commandline.verbose);
    let _guard = match setup_tracing(level, &config.log) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(config: &ServerConfig) -> AppResult<()> {
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(serve(config))?;
    info!("server shutdown complete");
    Ok(())
}
