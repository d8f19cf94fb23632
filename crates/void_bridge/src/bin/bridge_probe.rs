//! Bridge probe
//!
//! Loads a plugin directory and prints what the registry made of it.
//!
//! Run with: cargo run -p void_bridge --bin bridge_probe -- [--config bridge.toml] <plugin-dir>

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use void_bridge::{
    CommandHandler, EntityClassRegistration, ScriptHost, ScriptRole, ScriptSystem, ScriptSystemConfig, TypeKey,
};

/// Host that logs every registration
struct LoggingHost;

impl ScriptHost for LoggingHost {
    fn register_entity_class(&self, class: &EntityClassRegistration) {
        log::info!(
            "entity class {} ({} editor properties)",
            class.name,
            class.properties.len()
        );
    }

    fn register_actor_class(&self, name: &str) {
        log::info!("actor class {}", name);
    }

    fn register_game_rules(&self, name: &str) {
        log::info!("game rules {}", name);
    }

    fn register_flow_node(&self, path: &str) {
        log::info!("flow node {}", path);
    }

    fn register_ui_event_system(&self, name: &str) {
        log::info!("ui event system {}", name);
    }

    fn register_console_command(&self, name: &str, comment: &str, _handler: CommandHandler) {
        log::info!("console command {} - {}", name, comment);
    }

    fn register_editor_extension(&self, name: &str, ty: &TypeKey) {
        log::info!("editor extension {} ({})", name, ty);
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config_path = None;
    let mut directory = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = args.next().map(PathBuf::from);
        } else if directory.is_none() {
            directory = Some(PathBuf::from(arg));
        }
    }

    let Some(directory) = directory else {
        eprintln!("usage: bridge_probe [--config <file>] <plugin-dir>");
        return ExitCode::from(2);
    };

    let mut config = match config_path {
        Some(path) => match ScriptSystemConfig::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ScriptSystemConfig::default(),
    };
    config.apply_env_overrides();
    config.plugin_directories = vec![directory];

    let system = ScriptSystem::builder()
        .config(config)
        .host(Arc::new(LoggingHost))
        .build();

    let report = system.load_plugins();
    system.post_init();

    println!();
    println!("Loaded {} unit(s), {} failed, {} type(s)", report.loaded.len(), report.failed.len(), report.types);
    for (path, reason) in &report.failed {
        println!("  failed: {} ({})", path.display(), reason);
    }

    for role in ScriptRole::ALL {
        let descriptors: Vec<_> = system
            .descriptors(role)
            .into_iter()
            .filter(|d| d.role() == role)
            .collect();
        if descriptors.is_empty() {
            continue;
        }

        println!();
        println!("{} ({})", role, descriptors.len());
        for descriptor in descriptors {
            println!("  {:<32} {}", descriptor.script_name(), descriptor.key());
        }
    }

    if report.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
