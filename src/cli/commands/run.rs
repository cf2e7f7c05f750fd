use crate::cli::commands::open_db;
use crate::cli::commands::poll::print_report;
use crate::cli::parser::Commands;
use crate::clients::cloud::ZohoPeopleClient;
use crate::clients::device::ExportDirDevice;
use crate::config::Config;
use crate::core::runner::{CycleOptions, Step, run_cycle};
use crate::errors::AppResult;
use crate::ui::messages::{error, header, info, success, warning};
use chrono::Duration;

fn show<T>(name: &str, step: &Step<T>, done: impl Fn(&T)) {
    match step {
        Step::Done(v) => done(v),
        Step::Failed(e) => error(format!("{}: {}", name, e)),
        Step::Skipped(why) => warning(format!("{} skipped: {}", name, why)),
    }
}

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Run { export_dir } = cmd {
        let mut pool = open_db(cfg)?;
        let dir = export_dir.as_deref().unwrap_or(&cfg.device.export_dir);

        let device = ExportDirDevice::new(dir);
        let cloud = ZohoPeopleClient::new(&cfg.cloud)?;
        let opts = CycleOptions {
            device_label: cfg.device.label.clone(),
            lookback_days: cfg.cloud.initial_lookback_days,
            conflict_window: Duration::seconds(cfg.reconcile.conflict_window_secs),
        };

        header("Reconciliation cycle");
        let report = run_cycle(&mut pool.conn, &device, &cloud, &opts);

        show("Device poll", &report.device, |r| print_report("Device", r));
        show("Cloud poll", &report.cloud, |r| print_report("Cloud", r));
        show("Resolve", &report.resolve, |r| {
            info(format!("Resolve: {} device rows retired", r.retired.len()))
        });
        show("Push", &report.push, |r| {
            success(format!(
                "Push: {} pending, {} pushed, {} not in roster, {} rejected, {} failed",
                r.pending, r.pushed, r.not_in_roster, r.rejected, r.failed
            ))
        });
    }
    Ok(())
}
