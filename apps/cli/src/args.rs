use std::env;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct CliArgs {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub interval_minutes: Option<u64>,
}

pub fn parse_args() -> Result<CliArgs, String> {
    let mut args = env::args().skip(1);
    let mut parsed = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --port".to_string())?;
                let port = value
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port value: {value}"))?;
                parsed.port = Some(port);
            }
            "--data-dir" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --data-dir".to_string())?;
                parsed.data_dir = Some(PathBuf::from(value));
            }
            "--interval-minutes" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --interval-minutes".to_string())?;
                let minutes = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid interval value: {value}"))?;
                if minutes == 0 {
                    return Err("refresh interval must be at least one minute".to_string());
                }
                parsed.interval_minutes = Some(minutes);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                return Err(format!("unknown argument: {arg}"));
            }
        }
    }

    Ok(parsed)
}

pub fn print_help() {
    println!(
        "Quota Relay\n\n\
Usage:\n  quota-relay [--port <port>] [--data-dir <dir>] [--interval-minutes <minutes>]\n\n\
Options:\n  --port <port>                Override the configured API port for this run only\n  --data-dir <dir>             Override the data directory\n  --interval-minutes <minutes> Override the refresh interval\n  -h, --help                   Show this help message\n"
    );
}
