use script_bridge::bridge::{Bridge, BridgeState, HeadlessUiManager, TokioSourceLoader};
use script_bridge::config::BridgeConfig;
use script_bridge::core::logging;
use script_bridge::scripting::ExecutorFactory;
use std::time::Duration;

fn main() {
    if let Err(e) = run() {
        eprintln!("script-bridge failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::load_or_default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    logging::init(&config.logging);

    if config.executor_name.is_none() {
        config.executor_name = Some(ExecutorFactory::QUICKJS.to_string());
    }
    let watch = config.watch_bundle;

    let runtime = tokio::runtime::Runtime::new()?;
    let mut bridge = Bridge::new(config);
    bridge.set_ui_manager(Box::new(HeadlessUiManager));
    bridge.set_source_loader(Box::new(TokioSourceLoader::new(runtime.handle().clone())));
    bridge.init()?;
    bridge.start()?;

    loop {
        bridge.wait_and_pump(Duration::from_millis(50));
        match bridge.state() {
            BridgeState::Failed if !watch => return Err("bundle failed to load".into()),
            BridgeState::Ready if bridge.js_app_started() && !watch => break,
            BridgeState::Ready if bridge.config().app_name.is_none() && !watch => break,
            _ => {}
        }
    }

    tracing::info!(
        target: "bridge",
        diagnostics = bridge.diagnostics().total(),
        "Bridge finished"
    );
    bridge.shutdown();
    Ok(())
}
