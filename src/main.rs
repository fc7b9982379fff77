//! Strata - headless game runtime host
//!
//! Loads the configuration, builds an engine over the scene files and runs
//! the advance/render loop on the headless backend until an exit is requested.

use strata::config::AppConfig;
use strata::engine::Engine;
use strata_core::converter::TemplateConverter;
use strata_core::exit::ExitCode;
use strata_render::HeadlessBackend;

/// What the host does after an engine run
enum RunOutcome {
    Quit(ExitCode),
    Restart(String),
}

fn main() {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}. Using defaults.", e);
        AppConfig::default()
    });

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.debug.log_level)).init();
    log::info!("Starting Strata");

    let mut start_scene = config.scenes.start.clone();
    loop {
        match run(&config, &start_scene) {
            Ok(RunOutcome::Quit(code)) => {
                log::info!("Exiting: {}", code);
                if code == ExitCode::Exception {
                    std::process::exit(1);
                }
                break;
            }
            Ok(RunOutcome::Restart(scene)) => {
                log::info!("Restarting with scene '{}'", scene);
                start_scene = scene;
            }
            Err(e) => {
                log::error!("{}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Run one engine from start to stop
fn run(config: &AppConfig, start_scene: &str) -> Result<RunOutcome, Box<dyn std::error::Error>> {
    let converter = TemplateConverter::from_directory(&config.scenes.directory)?;
    let mut engine = Engine::new(config.engine_settings(), Box::new(converter));
    let mut backend = HeadlessBackend::new(config.rendering.width, config.rendering.height);

    engine.start();
    if let Err(e) = engine.add_scene(start_scene, true) {
        log::warn!("Cannot add start scene: {}", e);
    }

    let mut frames = 0u64;
    while !engine.exit_info().is_requested() {
        if engine.advance() && engine.render(&mut backend) {
            frames += 1;
            backend.take_calls();
            if config.host.max_frames > 0 && frames >= config.host.max_frames {
                log::info!("Rendered {} frames", frames);
                engine.request_exit(ExitCode::QuitGame, None);
            }
        }
    }

    let exit = engine.exit_info().clone();
    engine.stop();

    Ok(match exit.code {
        ExitCode::Restart => RunOutcome::Restart(exit.filename.unwrap_or_else(|| start_scene.to_string())),
        code => RunOutcome::Quit(code),
    })
}
