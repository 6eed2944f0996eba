use anyhow::Context;
use tracing::{error, info};

use apl_loaderd::{AgentConfig, Application};
use apl_observe::logger_init;

fn main() -> anyhow::Result<()> {
    // 1) Config + logger, while the process is still single-threaded
    let cfg = AgentConfig::from_env().context("read configuration")?;
    logger_init(&cfg.logger).context("init logger")?;
    info!(
        target: "apl.loaderd",
        listen = %cfg.listen,
        boot_spec = %cfg.boot_spec.display(),
        "apploader starting"
    );

    // 2) Runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    // 3) Run the boot sequence
    if let Err(e) = rt.block_on(Application::new(cfg).run()) {
        error!(target: "apl.loaderd", error = %e, "apploader failed");
        return Err(e.into());
    }

    info!(target: "apl.loaderd", "apploader finished");
    Ok(())
}
