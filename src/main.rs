#[macro_use]
extern crate log;

mod config;

use config::Config;
use psx_core::{Bios, System};

use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "usage: psxemu [--config <file>] [bios]";

struct Args {
    config: Option<PathBuf>,
    bios: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let mut args = Args { config: None, bios: None };
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(iter.next()?)),
            _ if args.bios.is_none() => args.bios = Some(PathBuf::from(arg)),
            _ => return None,
        }
    }

    Some(args)
}

fn main() -> ExitCode {
    let Some(args) = parse_args() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let loaded = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::from_default_path(),
    };

    let filter = loaded
        .as_ref()
        .ok()
        .and_then(|config| config.log.clone())
        .unwrap_or_else(|| "info".to_string());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config = loaded.unwrap_or_else(|err| {
        warn!("{err}, using default settings");
        Config::default()
    });

    let Some(path) = args.bios.or(config.bios) else {
        error!("no BIOS given");
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let bios = match Bios::from_file(&path) {
        Ok(bios) => bios,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    info!("running BIOS '{}'", bios.name());

    let mut system = System::new(bios);
    let res = match config.steps {
        Some(steps) => system.run(steps),
        None => loop {
            if let Err(err) = system.run(1_000_000) {
                break Err(err);
            }
        },
    };

    match res {
        Ok(()) => {
            info!("stopped at pc {:08x}", system.cpu().pc());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
