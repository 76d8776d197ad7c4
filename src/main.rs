use env_logger::Env;
use pin_deploy_imgs::args::{Action, Args};
use pin_deploy_imgs::errors::*;
use pin_deploy_imgs::pin;
use std::env;
use std::io;
use std::process::ExitCode;

async fn run() -> Result<()> {
    let Some(args) = Args::from_args(env::args_os())? else {
        return Ok(());
    };

    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::init_from_env(Env::default().default_filter_or(log_level));

    match args.action() {
        Action::Usage => Args::print_usage(io::stdout()).context("Failed to print usage"),
        Action::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Action::Pin(path) => pin::run(path).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            let code = ErrorKind::of(&err).map_or(1, ErrorKind::exit_code);
            ExitCode::from(code)
        }
    }
}
