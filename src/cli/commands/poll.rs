use crate::cli::commands::open_db;
use crate::cli::parser::Commands;
use crate::clients::cloud::{CloudClient, ZohoPeopleClient};
use crate::clients::device::ExportDirDevice;
use crate::config::Config;
use crate::core::ingest::{PollReport, poll_cloud, poll_device};
use crate::errors::AppResult;
use crate::ui::messages::{info, success, warning};
use crate::utils::time::format_timestamp;

pub fn handle_device(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::PollDevice { export_dir } = cmd {
        let mut pool = open_db(cfg)?;
        let dir = export_dir.as_deref().unwrap_or(&cfg.device.export_dir);
        info(format!("Reading terminal export from {}", dir));

        let device = ExportDirDevice::new(dir);
        let report = poll_device(&mut pool.conn, &device, &cfg.device.label)?;
        print_report("Device", &report);
    }
    Ok(())
}

pub fn handle_cloud(cfg: &Config) -> AppResult<()> {
    let mut pool = open_db(cfg)?;
    let client = ZohoPeopleClient::new(&cfg.cloud)?;
    let token = client.get_access_token()?;

    let report = poll_cloud(
        &mut pool.conn,
        &client,
        &token,
        cfg.cloud.initial_lookback_days,
    )?;
    print_report("Cloud", &report);
    Ok(())
}

pub(crate) fn print_report(source: &str, r: &PollReport) {
    if r.failed > 0 {
        warning(format!("{} poll: {}", source, r.summary()));
    } else {
        success(format!("{} poll: {}", source, r.summary()));
    }
    if let Some(hw) = &r.high_water {
        info(format!("Checkpoint: {}", format_timestamp(hw)));
    }
}
