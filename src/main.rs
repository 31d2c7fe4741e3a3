use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use sdl2::keyboard::Keycode;
use survivor_gfx::display::{Display, InputEvent, Palette, RenderTarget};
use survivor_gfx::draw::{IconSet, WindowTable, WINDOW_MAIN};
use survivor_gfx::gbuffer::{GraphicBuffer, LogicPage, Viewport};
use survivor_gfx::video::{Rect, SdlVideo, SurfaceFlags, Video};
use survivor_gfx::{GfxError, VideoConfig};

const CONFIG_FILE: &str = "video.json";
const TILE: i32 = 24;
const SIDEBAR: i32 = 160;
const WINDOW_TACTICAL: usize = 1;

/// Parse command line arguments on top of the config file
fn parse_args() -> VideoConfig {
    let args: Vec<String> = std::env::args().collect();

    // The config file comes first so later flags override it
    let mut path = PathBuf::from(CONFIG_FILE);
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        if let Some(p) = args.get(pos + 1) {
            path = PathBuf::from(p);
        }
    }
    let mut config = match VideoConfig::load(&path) {
        Ok(config) => {
            log::info!("loaded {}", path.display());
            config
        },
        Err(e) => {
            log::debug!("no config at {} ({}), using defaults", path.display(), e);
            VideoConfig::default()
        },
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--no-vsync" => config.vsync = false,
            "--system-memory" => config.video_memory = false,
            "--config" => i += 1,
            "--width" | "-w" => {
                if i + 1 < args.len() {
                    if let Ok(w) = args[i + 1].parse::<u32>() {
                        config.width = w;
                    }
                    i += 1;
                }
            },
            "--height" | "-h" => {
                if i + 1 < args.len() {
                    if let Ok(h) = args[i + 1].parse::<u32>() {
                        config.height = h;
                    }
                    i += 1;
                }
            },
            "--scale" | "-s" => {
                if i + 1 < args.len() {
                    if let Ok(s) = args[i + 1].parse::<u32>() {
                        config.scale = s.max(1);
                    }
                    i += 1;
                }
            },
            "--resolution" | "-r" => {
                if i + 1 < args.len() {
                    // WxH, e.g. 640x400
                    let parts: Vec<&str> = args[i + 1].split('x').collect();
                    if parts.len() == 2 {
                        if let (Ok(w), Ok(h)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
                            config.width = w;
                            config.height = h;
                        }
                    }
                    i += 1;
                }
            },
            "--help" => {
                println!("Usage: survivor-gfx [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --width W, -w W           Page width (default: 640)");
                println!("  --height H, -h H          Page height (default: 400)");
                println!("  --resolution WxH, -r WxH  Set both (e.g., 320x200)");
                println!("  --scale N, -s N           Window pixels per page pixel");
                println!("  --no-vsync                Disable VSync");
                println!("  --system-memory           Keep pages in system memory");
                println!("  --config PATH             Config file (default: {})", CONFIG_FILE);
                println!("  --help                    Show this help message");
                std::process::exit(0);
            },
            other => log::warn!("ignoring unknown argument {}", other),
        }
        i += 1;
    }

    config
}

/// A page: surface-backed when video memory is wanted and available
fn create_page(
    video: &Rc<dyn Video>,
    width: i32,
    height: i32,
    flags: SurfaceFlags,
    video_memory: bool,
) -> Result<GraphicBuffer<'static>, GfxError> {
    if video_memory {
        let page = GraphicBuffer::with_surface(width, height, Rc::clone(video), flags)?;
        if page.is_allocated() {
            return Ok(page);
        }
        log::warn!("falling back to system memory for {:?} page", flags);
    }
    GraphicBuffer::with_size(width, height)
}

/// Terrain-ish tiles: checker, cross and a transparent diamond
fn build_icons() -> Option<IconSet> {
    let size = TILE as usize;
    let mut data = Vec::with_capacity(size * size * 3);
    for y in 0..size {
        for x in 0..size {
            data.push(if (x / 6 + y / 6) % 2 == 0 { 40 } else { 48 });
        }
    }
    for y in 0..size {
        for x in 0..size {
            data.push(if x == size / 2 || y == size / 2 { 200 } else { 60 });
        }
    }
    let half = (size / 2) as i32;
    for y in 0..size as i32 {
        for x in 0..size as i32 {
            let inside = (x - half).abs() + (y - half).abs() < half;
            data.push(if inside { 120 + (y as u8) * 4 } else { 0 });
        }
    }
    IconSet::new(TILE, TILE, data, true)
}

fn build_palette() -> Palette {
    let mut palette = Palette::grayscale();
    for i in 0..64u8 {
        palette.set(120 + i, 255, 160 - i * 2, i * 3);
    }
    palette.set(200, 220, 40, 40);
    palette.set(250, 80, 200, 255);
    palette
}

#[derive(Default)]
struct FrameStats {
    presented: u32,
    skipped: u32,
    since: Option<Instant>,
}

impl FrameStats {
    fn record(&mut self, presented: bool) {
        if presented {
            self.presented += 1;
        } else {
            self.skipped += 1;
        }
        let since = *self.since.get_or_insert_with(Instant::now);
        if since.elapsed() >= Duration::from_secs(5) {
            log::info!(
                "{} frames presented, {} skipped in {:.1}s",
                self.presented,
                self.skipped,
                since.elapsed().as_secs_f32()
            );
            *self = Self::default();
        }
    }
}

/// Compose one frame into whatever page is selected
fn render<'v>(
    page: &LogicPage<'v>,
    tactical: &'v Viewport<'v>,
    icons: &IconSet,
    windows: &WindowTable,
    frame: i32,
) {
    let Some(current) = page.current() else {
        return;
    };
    page.clear(0);

    {
        let _tactical = page.scoped(tactical);
        let scroll = frame % TILE;
        let cols = tactical.width() / TILE + 2;
        let rows = tactical.height() / TILE + 2;
        for row in 0..rows {
            for col in 0..cols {
                let icon = if (row + col) % 7 == 0 { 1 } else { 0 };
                page.draw_stamp(
                    icons,
                    icon,
                    col * TILE - scroll,
                    row * TILE,
                    None,
                    windows,
                    WINDOW_MAIN,
                );
            }
        }
        let unit_x = (frame * 2) % (tactical.width() + TILE) - TILE;
        // Units stay inside the inset window
        page.draw_stamp(
            icons,
            2,
            unit_x,
            tactical.height() / 2 - TILE,
            None,
            windows,
            WINDOW_TACTICAL,
        );
        page.draw_rect(0, 0, tactical.width() - 1, tactical.height() - 1, 250);
    }

    // Sidebar goes to the full page through the outer selection
    let sidebar_x = current.width() - SIDEBAR;
    page.draw_line(sidebar_x, 0, sidebar_x, current.height() - 1, 200);
    let pulse = frame % 64;
    page.draw_rect(sidebar_x + 8, 8, sidebar_x + 8 + pulse, 24, 120 + pulse as u8);
}

fn main() -> Result<(), GfxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = parse_args();
    let width = config.width.max(SIDEBAR as u32 + TILE as u32);
    let height = config.height.max(TILE as u32);

    let (mut display, texture_creator) =
        Display::with_options(&config.title, width, height, config.vsync, config.scale)?;
    let mut target = RenderTarget::with_size(&texture_creator, width, height)?;

    let sdl_video = Rc::new(SdlVideo::new()?);
    let video: Rc<dyn Video> = sdl_video.clone();

    let (w, h) = (width as i32, height as i32);
    let seen = create_page(
        &video,
        w,
        h,
        SurfaceFlags::VISIBLE | SurfaceFlags::VIDEOMEM,
        config.video_memory,
    )?;
    let hidden = create_page(&video, w, h, SurfaceFlags::VIDEOMEM, config.video_memory)?;
    if seen.attach_surface(&hidden) {
        log::info!("hidden page attached to visible page");
    }
    log::debug!("seen {:?}", seen);
    log::debug!("hidden {:?}", hidden);

    let seen_page = seen.view();
    let hid_page = hidden.view();
    let tactical = Viewport::new(&hidden, 0, 0, w - SIDEBAR, h);
    let mut windows = WindowTable::new(Rect::new(0, 0, tactical.width(), tactical.height()));
    windows.set(
        WINDOW_TACTICAL,
        Rect::new(TILE, TILE, tactical.width() - 2 * TILE, tactical.height() - 2 * TILE),
    );

    let icons = build_icons().ok_or(GfxError::InvalidDimensions {
        width: TILE,
        height: TILE,
    })?;
    let palette = build_palette();
    let logic = LogicPage::with_page(&hid_page);

    log::info!(
        "survivor-gfx {}x{} x{} vsync={} pages in {}",
        width,
        height,
        config.scale,
        config.vsync,
        if seen.is_hardware() { "video memory" } else { "system memory" }
    );
    log::info!("Controls: Space pause, M masked flip, S save config, Escape quit");

    let mut stats = FrameStats::default();
    let mut frame = 0;
    let mut paused = false;
    let mut masked = false;

    'main: loop {
        for event in display.poll_events() {
            match event {
                InputEvent::Quit => break 'main,
                InputEvent::KeyDown(Keycode::Escape) => break 'main,
                InputEvent::KeyDown(Keycode::Space) => paused = !paused,
                InputEvent::KeyDown(Keycode::M) => {
                    masked = !masked;
                    log::info!("masked flip {}", if masked { "on" } else { "off" });
                },
                InputEvent::KeyDown(Keycode::S) => match config.save(CONFIG_FILE) {
                    Ok(()) => log::info!("config saved to {}", CONFIG_FILE),
                    Err(e) => log::error!("failed to save config: {}", e),
                },
                InputEvent::FocusGained => sdl_video.set_focus(true),
                InputEvent::FocusLost => sdl_video.set_focus(false),
                _ => {},
            }
        }

        if !paused {
            frame += 1;
        }
        render(&logic, &tactical, &icons, &windows, frame);

        if !hid_page.blit(&seen_page, 0, 0, 0, 0, w, h, masked) {
            log::trace!("page flip skipped");
        }
        let presented = display.present(&mut target, &seen_page, &palette)?;
        stats.record(presented);
    }

    log::info!("{} locks taken", survivor_gfx::gbuffer::total_locks());
    Ok(())
}
