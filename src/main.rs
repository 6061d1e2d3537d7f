/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::time::{Duration, Instant};

use log::{info, warn};

use config::GameConfig;
use domain::entity::Dir;
use sim::event::GameEvent;
use sim::level::load_levels;
use sim::progress::{FileProgress, Progress, ProgressSink};
use sim::world::{Phase, WorldState, SELECT_VISIBLE};
use ui::gamepad::GamepadState;
use ui::input::{InputState, Intent};
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    let config = GameConfig::load();
    init_logging(&config);
    for w in &config.warnings {
        warn!("{w}");
    }

    let levels = load_levels(&config.levels_path);
    let mut world = WorldState::new(levels, &config);

    let mut progress: Box<dyn ProgressSink> = match FileProgress::open_default() {
        Ok(store) => {
            info!(
                "progress file: {} ({} levels completed)",
                store.path().display(),
                store.progress().completed_count()
            );
            Box::new(store)
        }
        Err(e) => {
            warn!("could not read progress, starting fresh in memory: {e}");
            Box::new(Progress::default())
        }
    };

    let mut renderer = Renderer::new();

    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();

    let result = game_loop(&mut world, &mut renderer, sound.as_ref(), progress.as_mut(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing orbpush!");
}

/// `RUST_LOG` overrides the default `warn` filter. With `general.log_file`
/// set, records go to that file instead of stderr.
fn init_logging(config: &GameConfig) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(path) = &config.log_file {
        match File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("could not open log file {}: {e}", path.display()),
        }
    }
    builder.init();
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    progress: &mut dyn ProgressSink,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        info!("gamepad connected");
    }
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(config.speed.tick_rate_ms);
    let mut events: Vec<GameEvent> = Vec::with_capacity(32);
    // Held direction whose last automatic repeat was rejected.
    let mut hold_blocked: Option<Dir> = None;

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }

        let mut intents = kb.intents();
        intents.extend(gp.intents());
        let fresh = !intents.is_empty();
        if fresh {
            hold_blocked = None;
        }
        for intent in intents {
            handle_intent(world, intent, progress, &mut events);
        }

        // Walk-on-hold: re-submit a held direction once the turn is idle.
        let held = kb.held_dir().or_else(|| gp.held_dir());
        if held != hold_blocked {
            hold_blocked = None;
        }
        if !fresh && world.phase == Phase::Playing && !world.turn.is_busy() {
            if let Some(dir) = held.filter(|&d| hold_blocked != Some(d)) {
                if !world.submit_move(dir, &mut events) {
                    hold_blocked = Some(dir);
                }
            }
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= tick_rate {
            let dt_ms = u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX);
            world.tick(dt_ms, progress, &mut events);
            last_tick = Instant::now();
        }

        if let Some(sfx) = sound {
            sfx.play_events(&events);
        }
        events.clear();

        renderer.render(world, progress)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn handle_intent(
    world: &mut WorldState,
    intent: Intent,
    progress: &mut dyn ProgressSink,
    events: &mut Vec<GameEvent>,
) {
    match world.phase {
        Phase::LevelSelect => match intent {
            Intent::Move(Dir::Up | Dir::Left) => world.select_move(-1),
            Intent::Move(Dir::Down | Dir::Right) => world.select_move(1),
            Intent::PageUp => world.select_move(-(SELECT_VISIBLE as i32)),
            Intent::PageDown => world.select_move(SELECT_VISIBLE as i32),
            Intent::Confirm => {
                world.select_confirm(progress);
            }
            _ => {}
        },
        Phase::Playing => match intent {
            Intent::Move(dir) => {
                world.submit_move(dir, events);
            }
            Intent::Undo => {
                world.undo(events);
            }
            Intent::Restart => world.restart_level(events),
            Intent::Back => world.back_to_select(),
            _ => {}
        },
        Phase::Dying => match intent {
            Intent::Restart | Intent::Confirm => world.restart_level(events),
            Intent::Back => world.back_to_select(),
            _ => {}
        },
        Phase::Won => match intent {
            Intent::Confirm => world.advance_after_win(),
            Intent::Restart => world.restart_level(events),
            Intent::Back => world.back_to_select(),
            _ => {}
        },
        Phase::AllClear => {
            if matches!(intent, Intent::Confirm | Intent::Back) {
                world.back_to_select();
            }
        }
    }
}
