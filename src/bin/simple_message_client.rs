use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tokio::runtime;
use tracing::error;
use tracing::level_filters::LevelFilter;

use simple_message::service::EXIT_FAILURE;
use simple_message::{
    setup_tracing, verbosity_level, AppError, AppResult, Client, LogConfig, Posting,
};

#[derive(Parser)]
#[command(version, about = "Post a message to a bulletin board server")]
pub struct CommandLine {
    /// full qualified domain name or IP address of the server
    #[arg(short, long)]
    pub server: String,
    /// well-known port of the server [0..65535]
    #[arg(short, long)]
    pub port: String,
    /// name of the posting user
    #[arg(short, long)]
    pub user: String,
    /// URL pointing to an image of the posting user
    #[arg(short, long)]
    pub image: Option<String>,
    /// message to be added to the bulletin board
    #[arg(short, long)]
    pub message: String,
    /// verbose output (v: info, vv: debug, vvv: trace)
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

    let level = verbosity_level(LevelFilter::WARN, commandline.verbose);
    let _guard = match setup_tracing(level, &LogConfig::default()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match run(commandline) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(commandline: CommandLine) -> AppResult<()> {
    let CommandLine {
        server,
        port,
        user,
        image,
        message,
        ..
    } = commandline;
    let posting = Posting::new(user, image, message)?;

    let rt = runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(async {
        let client: Client = Client::default();
        let session = client.connect(&server, &port).await?;
        println!("client: connecting to {}", session.peer().ip());
        session.send(&posting).await?;
        Ok::<(), AppError>(())
    })
}
