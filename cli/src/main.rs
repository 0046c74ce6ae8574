use blocks_window::{Config, HttpLedger};
use clap::Parser;
use env_logger::Env;
use log::info;
use std::error::Error;
use std::io::Write;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if std::env::var("LOG_AVOID_TIMESTAMP").is_ok() {
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{:5} {} {}",
                record.level(),
                record.target(),
                record.args()
            )
        });
    }
    builder.init();
    info!("start");

    let config = Config::parse();
    config.validate()?;

    let ledger = Arc::new(HttpLedger::from_config(&config)?);
    let report = blocks_window::find_heaviest_window(&config, ledger)?;
    println!("{}", report);

    info!("end");
    Ok(())
}
