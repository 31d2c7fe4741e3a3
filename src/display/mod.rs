mod palette;

pub use palette::{Palette, VGA_PALETTE_SIZE};

use crate::error::{GfxError, Result};
use crate::gbuffer::Viewport;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, Texture, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::EventPump;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 400;

pub struct Display {
    canvas: Canvas<Window>,
    event_pump: EventPump,
    width: u32,
    height: u32,
}

/// Streaming texture plus the RGBA scratch the 8-bit page is converted into
pub struct RenderTarget<'a> {
    texture: Texture<'a>,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    row: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum InputEvent {
    Quit,
    KeyDown(Keycode),
    KeyUp(Keycode),
    FocusGained,
    FocusLost,
}

impl Display {
    /// Create display with VSync enabled at the default resolution
    pub fn new(title: &str) -> Result<(Self, TextureCreator<WindowContext>)> {
        Self::with_options(title, DEFAULT_WIDTH, DEFAULT_HEIGHT, true, 1)
    }

    /// Create display for a `width`x`height` page shown at `scale`x
    pub fn with_options(
        title: &str,
        width: u32,
        height: u32,
        vsync: bool,
        scale: u32,
    ) -> Result<(Self, TextureCreator<WindowContext>)> {
        let scale = scale.max(1);
        let sdl_context = sdl2::init().map_err(GfxError::Sdl)?;
        let video_subsystem = sdl_context.video().map_err(GfxError::Sdl)?;

        let window = video_subsystem
            .window(title, width * scale, height * scale)
            .position_centered()
            .build()
            .map_err(|e| GfxError::Sdl(e.to_string()))?;

        let mut canvas_builder = window.into_canvas().accelerated();
        if vsync {
            canvas_builder = canvas_builder.present_vsync();
        }
        let canvas = canvas_builder
            .build()
            .map_err(|e| GfxError::Sdl(e.to_string()))?;

        let texture_creator = canvas.texture_creator();
        let event_pump = sdl_context.event_pump().map_err(GfxError::Sdl)?;

        log::info!(
            "display {}x{} (x{}) vsync={}",
            width,
            height,
            scale,
            vsync
        );

        Ok((
            Self {
                canvas,
                event_pump,
                width,
                height,
            },
            texture_creator,
        ))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Show `page` through `palette`.
    ///
    /// The page is locked for the conversion. Returns `Ok(false)` and skips
    /// the frame when the lock is denied.
    pub fn present(
        &mut self,
        target: &mut RenderTarget,
        page: &Viewport<'_>,
        palette: &Palette,
    ) -> Result<bool> {
        if !page.lock() {
            log::trace!("present skipped: page lock denied");
            return Ok(false);
        }
        target.convert(page, palette);
        page.unlock();

        target
            .texture
            .update(None, &target.rgba, (target.width * 4) as usize)
            .map_err(|e| GfxError::Sdl(e.to_string()))?;
        self.canvas
            .copy(&target.texture, None, None)
            .map_err(GfxError::Sdl)?;
        self.canvas.present();
        Ok(true)
    }

    pub fn poll_events(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();

        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => events.push(InputEvent::Quit),
                Event::KeyDown {
                    keycode: Some(k), ..
                } => events.push(InputEvent::KeyDown(k)),
                Event::KeyUp {
                    keycode: Some(k), ..
                } => events.push(InputEvent::KeyUp(k)),
                Event::Window { win_event, .. } => match win_event {
                    WindowEvent::FocusGained => events.push(InputEvent::FocusGained),
                    WindowEvent::FocusLost | WindowEvent::Minimized => {
                        events.push(InputEvent::FocusLost)
                    },
                    _ => {},
                },
                _ => {},
            }
        }

        events
    }
}

impl<'a> RenderTarget<'a> {
    /// Create render target with default resolution
    pub fn new(texture_creator: &'a TextureCreator<WindowContext>) -> Result<Self> {
        Self::with_size(texture_creator, DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Create render target with custom resolution
    pub fn with_size(
        texture_creator: &'a TextureCreator<WindowContext>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::RGBA8888, width, height)
            .map_err(|e| GfxError::Sdl(e.to_string()))?;
        Ok(Self {
            texture,
            width,
            height,
            rgba: vec![0; width as usize * height as usize * 4],
            row: vec![0; width as usize],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Convert the locked page into the RGBA scratch; rows or columns the
    /// page doesn't cover are left black
    fn convert(&mut self, page: &Viewport<'_>, palette: &Palette) {
        self.rgba.fill(0);
        let row_bytes = self.width as usize * 4;
        let rows = (page.height().max(0) as u32).min(self.height);
        for y in 0..rows {
            let copied = page.read_row(y as i32, &mut self.row);
            let start = y as usize * row_bytes;
            palette.write_rgba8888(&self.row[..copied], &mut self.rgba[start..start + row_bytes]);
        }
    }
}
