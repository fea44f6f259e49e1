use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use boundary_map::app::{inner_pixels, App};
use boundary_map::data::{FsLoader, LayerId};
use boundary_map::map::ProjectionKind;
use boundary_map::{ui, MapConfig};
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal choropleth of historical boundaries, vote shares and risk grids")]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the GeoJSON layers
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    projection: Option<ProjectionKind>,

    /// Log file (the terminal is taken by the map)
    #[arg(long, default_value = "boundary-map.log")]
    log_file: PathBuf,

    /// Write the map as SVG to this file and exit
    #[arg(long)]
    export_svg: Option<PathBuf>,

    /// SVG export width in pixels
    #[arg(long, default_value_t = 960)]
    width: usize,

    /// SVG export height in pixels
    #[arg(long, default_value_t = 720)]
    height: usize,

    /// Use the built-in demo layers instead of reading files
    #[arg(long)]
    demo: bool,
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("boundary_map=info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn load_config(args: &Args) -> Result<MapConfig> {
    let mut config = match &args.config {
        Some(path) => MapConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))?,
        None => MapConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(kind) = args.projection {
        config.projection.kind = kind;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;
    let config = load_config(&args)?;
    info!(data_dir = %config.data_dir.display(), projection = ?config.projection.kind, "starting");

    let mut app = App::new(config, Box::new(FsLoader), args.demo);

    if let Some(out) = &args.export_svg {
        return export_svg(&mut app, out, args.width, args.height);
    }

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    // Run the app
    let result = run(&mut terminal, &mut app);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

fn export_svg(app: &mut App, out: &Path, width: usize, height: usize) -> Result<()> {
    app.initialise(&mut || (width, height))?;
    let svg = app.export_svg().context("map was not initialised")?;
    fs::write(out, svg).with_context(|| format!("writing {}", out.display()))?;
    info!(path = %out.display(), "SVG written");
    Ok(())
}

/// Handle mouse events for hovering, panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Moved => app.pointer_moved(mouse.column, mouse.row),
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(30.0, 0.0),
        MouseEventKind::ScrollRight => app.pan(-30.0, 0.0),
        // Click and drag to pan
        MouseEventKind::Down(MouseButton::Left) => app.begin_drag(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => {
            app.handle_drag(mouse.column, mouse.row);
            app.pointer_moved(mouse.column, mouse.row);
        }
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    // A failed initialisation is shown in the map area; a later resize retries
    let _ = app.initialise(&mut || {
        terminal
            .size()
            .map(|s| inner_pixels(s.width as usize, s.height as usize))
            .unwrap_or((0, 0))
    });

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) => {
                    // Only handle key press events (not release)
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => app.quit(),

                            // Pan with hjkl or arrow keys
                            KeyCode::Left | KeyCode::Char('h') => app.pan_left(),
                            KeyCode::Right | KeyCode::Char('l') => app.pan_right(),
                            KeyCode::Up | KeyCode::Char('k') => app.pan_up(),
                            KeyCode::Down | KeyCode::Char('j') => app.pan_down(),

                            // Zoom
                            KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                            KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                            // Layer toggles
                            KeyCode::Char('1') => app.toggle_layer(LayerId::Historical),
                            KeyCode::Char('2') => app.toggle_layer(LayerId::Administrative),
                            KeyCode::Char('3') => app.toggle_layer(LayerId::RiskGrid),

                            // Reset view
                            KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(),
                            KeyCode::Char('R') => app.reload(),

                            _ => {}
                        }
                    }
                }
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
