//! Knockdown headless runner
//!
//! Loads settings, plays the first stage with a scripted volley of drags and
//! logs what happened. Useful for tuning without a renderer attached.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Knockdown (headless) starting...");

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The wasm host drives `Game::frame` itself
}

#[cfg(not(target_arch = "wasm32"))]
fn run() -> knockdown::GameResult<()> {
    use std::path::PathBuf;

    use glam::Vec3;
    use knockdown::Settings;
    use knockdown::consts::SIM_DT;
    use knockdown::sim::{FrameInput, Game, MenuAction, PointerEvent, PointerPhase, builtin_stages};

    /// Frames to let each shot play out
    const FRAMES_PER_SHOT: usize = 90;
    /// Distance from a target the drag ends at
    const STANDOFF: f32 = 8.0;
    /// Drag length
    const PULL: f32 = 3.0;

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("settings.json"));
    let settings = Settings::load_or_default(&path)?;
    let mut game = Game::new(settings, builtin_stages())?;

    game.frame(
        &FrameInput {
            menu: vec![MenuAction::Play],
            ..FrameInput::default()
        },
        SIM_DT,
    )?;
    log_events(&mut game);

    let camera = game.stage().settings.camera;
    let targets: Vec<Vec3> = game.stage().objects.iter().map(|o| o.position).collect();
    for target in targets {
        let away = (camera - target).with_y(0.0).normalize_or_zero();
        let end = target + away * STANDOFF;
        let start = end - away * PULL;
        let input = FrameInput {
            pointer: vec![
                PointerEvent::on_ground(PointerPhase::Down, start),
                PointerEvent::on_ground(PointerPhase::Move, end),
                PointerEvent::on_ground(PointerPhase::Up, end),
            ],
            ..FrameInput::default()
        };
        game.frame(&input, SIM_DT)?;
        for _ in 0..FRAMES_PER_SHOT {
            game.frame(&FrameInput::default(), SIM_DT)?;
            log_events(&mut game);
        }
    }

    let state = game.state();
    log::info!(
        "{}: phase {:?}, score {}, balls fired {}",
        game.stage().title,
        state.phase,
        state.score,
        state.projectiles
    );
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn log_events(game: &mut knockdown::sim::Game) {
    use knockdown::sim::GameEvent;

    for event in game.drain_events() {
        match event {
            GameEvent::Score(score) => log::info!(
                "Object #{} scored {:+} at {}",
                score.object_id,
                score.delta,
                score.position
            ),
            other => log::debug!("{other:?}"),
        }
    }
}
