/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The world is continuous (pixel units); it is scaled down to whatever
/// area the terminal leaves below the HUD.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{Archetype, Direction, Entity, SpriteTag};
use crate::domain::geometry::{Bounds, Rect};
use crate::sim::event::MessageKey;
use crate::sim::score::{Resource, MAX_VALUE};
use crate::sim::world::WorldState;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for every cell, never terminal-default,
    /// so row gaps on VTE terminals match the cell color.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Never produced by compose; forces a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn invalidate(&mut self) {
        self.cells.fill(Cell::INVALID);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width {
                break;
            }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn put_centered(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        let len = s.chars().count();
        let x = self.width.saturating_sub(len) / 2;
        self.put_str(x, y, s, fg, bg);
    }
}

// ── Layout ──

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// Rows below the map: message + help.
const FOOTER_ROWS: usize = 2;
const BAR_WIDTH: usize = 12;

/// Maps world pixels onto the terminal rectangle reserved for the map.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Viewport {
    col: usize,
    row: usize,
    cols: usize,
    rows: usize,
    sx: f32,
    sy: f32,
}

impl Viewport {
    fn fit(bounds: Bounds, term_w: usize, term_h: usize) -> Self {
        let cols = term_w.max(1);
        let rows = term_h.saturating_sub(MAP_ROW + FOOTER_ROWS).max(1);
        Viewport {
            col: 0,
            row: MAP_ROW,
            cols,
            rows,
            sx: cols as f32 / bounds.width.max(1.0),
            sy: rows as f32 / bounds.height.max(1.0),
        }
    }

    /// Terminal cell covering a world point, clamped to the map area.
    fn cell_of(&self, x: f32, y: f32) -> (usize, usize) {
        let c = ((x * self.sx).floor().max(0.0) as usize).min(self.cols - 1);
        let r = ((y * self.sy).floor().max(0.0) as usize).min(self.rows - 1);
        (self.col + c, self.row + r)
    }

    /// Inclusive cell span of a world rectangle.
    fn span(&self, rect: &Rect) -> ((usize, usize), (usize, usize)) {
        let a = self.cell_of(rect.pos.x, rect.pos.y);
        let b = self.cell_of(rect.pos.x + rect.size.w - 0.01, rect.pos.y + rect.size.h - 0.01);
        (a, b)
    }
}

// ── Palette ──

const GRASS: Color = Color::Rgb { r: 26, g: 44, b: 30 };
const ZONE_BG: Color = Color::Rgb { r: 60, g: 52, b: 24 };
const HUD_DIM: Color = Color::Rgb { r: 120, g: 120, b: 140 };

fn background_color(name: &str) -> Color {
    match name {
        "orchard" => Color::Rgb { r: 34, g: 40, b: 22 },
        "hollow" => Color::Rgb { r: 24, g: 22, b: 38 },
        "clearing" => Color::Rgb { r: 36, g: 48, b: 36 },
        _ => GRASS,
    }
}

fn resource_color(r: Resource) -> Color {
    match r {
        Resource::Energy => Color::Rgb { r: 255, g: 210, b: 60 },
        Resource::Love => Color::Rgb { r: 255, g: 90, b: 130 },
        Resource::Friendship => Color::Rgb { r: 90, g: 200, b: 255 },
    }
}

fn resource_label(r: Resource) -> &'static str {
    match r {
        Resource::Energy => "Energy",
        Resource::Love => "Love",
        Resource::Friendship => "Friend",
    }
}

/// Glyph and color for an NPC this frame.
fn npc_glyph(e: &Entity) -> (char, Color) {
    let (idle, walk, color) = match e.archetype {
        Archetype::Wanderer => ('o', 'O', Color::Rgb { r: 200, g: 200, b: 200 }),
        Archetype::Fleer => ('r', 'R', Color::Rgb { r: 120, g: 230, b: 120 }),
        Archetype::Chaser => ('x', 'X', Color::Rgb { r: 255, g: 80, b: 60 }),
        Archetype::TollCollector => ('t', 'T', Color::Rgb { r: 240, g: 200, b: 80 }),
        Archetype::Ambush => ('m', 'M', Color::Rgb { r: 190, g: 110, b: 255 }),
    };
    match e.sprite {
        SpriteTag::Attack => ('!', Color::White),
        SpriteTag::Walking if e.frame() % 2 == 1 => (idle, color),
        SpriteTag::Walking => (walk, color),
        SpriteTag::Idle => (idle, color),
    }
}

fn player_glyph(dir: Direction) -> char {
    match dir {
        Direction::Up => '▲',
        Direction::Down => '▼',
        Direction::Left => '◀',
        Direction::Right => '▶',
    }
}

/// Message table. Wording lives here; the core only emits keys.
fn message_text(key: MessageKey, w: &WorldState) -> String {
    match key {
        MessageKey::LevelName(id) => match w.orchestrator.current_def() {
            Ok(def) if def.id == id => def.name.clone(),
            _ => format!("Area {}", id),
        },
        MessageKey::Low(r) => format!("Your {} is running low!", r.name()),
        MessageKey::Exhausted(r) => format!("You ran out of {}...", r.name()),
        MessageKey::Offer(Archetype::Ambush) => "A stranger offers a gift. Z: accept  X: refuse".into(),
        MessageKey::Offer(_) => "Pay the toll? Z: love  X: friendship".into(),
        MessageKey::Ambushed => "It was a trap!".into(),
        MessageKey::GameOver => "GAME OVER".into(),
        MessageKey::NewGame => "A new day begins".into(),
        MessageKey::Paused => "PAUSED".into(),
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_level: Option<u32>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_level: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        self.back.invalidate();
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, world: &WorldState) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.invalidate();
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // New background on level change: repaint everything.
        let level = world.orchestrator.current_level();
        if self.last_level != Some(level) {
            self.back.invalidate();
            self.last_level = Some(level);
        }

        self.compose(world);
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    fn compose(&mut self, w: &WorldState) {
        self.front.clear();
        if self.front.width == 0 || self.front.height <= MAP_ROW + FOOTER_ROWS {
            return;
        }
        let view = Viewport::fit(w.ctx.bounds, self.front.width, self.front.height);

        self.compose_hud(w);
        self.compose_map(w, &view);
        self.compose_footer(w, &view);

        if w.paused {
            self.compose_pause_overlay(&view);
        } else if w.ctx.game_over.is_active() {
            self.compose_game_over(w, &view);
        }
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        // No ResetColor: the terminal default may differ from BASE_BG.
        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_hud(&mut self, w: &WorldState) {
        let mut x = 1;
        for r in Resource::ALL {
            let value = w.ctx.score.get(r);
            let color = resource_color(r);
            let label = format!("{:<6} ", resource_label(r));
            self.front.put_str(x, HUD_ROW, &label, HUD_DIM, Color::Reset);
            x += label.chars().count();

            if w.ctx.score.bar_visible(r) {
                let filled = (value.max(0) as usize * BAR_WIDTH + (MAX_VALUE as usize - 1)) / MAX_VALUE as usize;
                for i in 0..BAR_WIDTH {
                    let ch = if i < filled { '█' } else { '░' };
                    self.front.set(x + i, HUD_ROW, Cell::new(ch, color, Color::Reset));
                }
            }
            x += BAR_WIDTH;
            self.front.put_str(x, HUD_ROW, &format!(" {:>3}   ", value), color, Color::Reset);
            x += 7;
        }

        if let Ok(def) = w.orchestrator.current_def() {
            let name = format!("◈ {}", def.name);
            let nx = self.front.width.saturating_sub(name.chars().count() + 1);
            if nx > x {
                self.front.put_str(nx, HUD_ROW, &name, Color::White, Color::Reset);
            }
        }
    }

    fn compose_map(&mut self, w: &WorldState, view: &Viewport) {
        let bg = w
            .orchestrator
            .current_def()
            .map(|d| background_color(&d.background))
            .unwrap_or(GRASS);

        for r in view.row..view.row + view.rows {
            for c in view.col..view.col + view.cols {
                let ch = if (r * 7 + c * 3) % 23 == 0 { '·' } else { ' ' };
                self.front.set(c, r, Cell::new(ch, Color::Rgb { r: 60, g: 90, b: 60 }, bg));
            }
        }

        if let Ok(def) = w.orchestrator.current_def() {
            for zone in &def.zones {
                let ((c0, r0), (c1, r1)) = view.span(&zone.rect());
                for r in r0..=r1 {
                    for c in c0..=c1 {
                        self.front.set(c, r, Cell::new('▒', Color::Rgb { r: 200, g: 170, b: 80 }, ZONE_BG));
                    }
                }
            }
        }

        // Mid-transition the roster is stale or empty; the fade hides it.
        let fading = w.orchestrator.is_transitioning();
        if !fading {
            for e in w.orchestrator.roster().iter().filter(|e| e.is_visible) {
                let (ch, fg) = npc_glyph(e);
                let c = e.rect().center();
                let (col, row) = view.cell_of(c.x, c.y);
                let cell_bg = self.front.get(col, row).bg;
                self.front.set(col, row, Cell::new(ch, fg, cell_bg));
            }
        }

        let pc = w.player.rect().center();
        let (col, row) = view.cell_of(pc.x, pc.y);
        let cell_bg = self.front.get(col, row).bg;
        let fg = if w.player.frozen { HUD_DIM } else { Color::Rgb { r: 255, g: 255, b: 255 } };
        self.front.set(col, row, Cell::new(player_glyph(w.player.direction), fg, cell_bg));

        if fading {
            self.compose_fade(w, view);
        }
    }

    /// Darken rows in proportion to transition progress.
    fn compose_fade(&mut self, w: &WorldState, view: &Viewport) {
        let t = w.orchestrator.transition();
        let elapsed = w.ctx.now.saturating_sub(t.start_time) as f32;
        let k = if t.duration == 0 { 1.0 } else { (elapsed / t.duration as f32).clamp(0.0, 1.0) };
        let dark = (view.rows as f32 * k).ceil() as usize;
        for r in view.row..view.row + dark.min(view.rows) {
            for c in view.col..view.col + view.cols {
                self.front.set(c, r, Cell::new(' ', Color::Reset, Color::Black));
            }
        }
    }

    fn compose_footer(&mut self, w: &WorldState, view: &Viewport) {
        let msg_row = view.row + view.rows;
        let help_row = msg_row + 1;

        if let Some(m) = w.message.filter(|m| m.key != MessageKey::Paused) {
            let text = message_text(m.key, w);
            self.front.put_centered(msg_row, &text, Color::Rgb { r: 255, g: 220, b: 120 }, Color::Reset);
        }

        let help = if w.new_game_affordance {
            "ENTER: New game   ESC: Quit"
        } else {
            "Arrows/WASD: Move   Z/X: Choose   F1: Pause   ESC: Quit"
        };
        self.front.put_str(1, help_row, help, HUD_DIM, Color::Reset);
    }

    fn compose_game_over(&mut self, w: &WorldState, view: &Viewport) {
        let red = Color::Rgb { r: 255, g: 70, b: 70 };
        let mid = view.row + view.rows / 2;
        self.front.put_centered(mid.saturating_sub(1), "╔═══════════════════╗", red, Color::Reset);
        self.front.put_centered(mid, "║     GAME OVER     ║", red, Color::Reset);
        self.front.put_centered(mid + 1, "╚═══════════════════╝", red, Color::Reset);
        if w.new_game_affordance {
            self.front.put_centered(mid + 3, "▸ ENTER: Play again", Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
        }
    }

    fn compose_pause_overlay(&mut self, view: &Viewport) {
        let dim = Color::Rgb { r: 40, g: 40, b: 40 };
        let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
        let key_c = Color::Rgb { r: 100, g: 200, b: 255 };

        let box_w = 28_usize.min(view.cols);
        let box_h = 7_usize.min(view.rows);
        let box_x = view.col + view.cols.saturating_sub(box_w) / 2;
        let box_y = view.row + view.rows.saturating_sub(box_h) / 2;

        for y in box_y..box_y + box_h {
            for x in box_x..box_x + box_w {
                self.front.set(x, y, Cell::new(' ', Color::Reset, dim));
            }
        }
        self.front.put_str(box_x + 4, box_y + 1, "╔══════════════════╗", hdr, dim);
        self.front.put_str(box_x + 4, box_y + 2, "║      PAUSED      ║", hdr, dim);
        self.front.put_str(box_x + 4, box_y + 3, "╚══════════════════╝", hdr, dim);
        self.front.put_str(box_x + 2, box_y + 5, "F1 Resume   ESC Quit", key_c, dim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::domain::geometry::{Size, Vec2};
    use crate::sim::level::builtin_levels;

    #[test]
    fn viewport_maps_corners_inside_map_area() {
        let v = Viewport::fit(Bounds::new(800.0, 600.0), 80, 24);
        assert_eq!(v.rows, 24 - MAP_ROW - FOOTER_ROWS);
        assert_eq!(v.cell_of(0.0, 0.0), (0, MAP_ROW));
        assert_eq!(v.cell_of(800.0, 600.0), (79, MAP_ROW + v.rows - 1));
        assert_eq!(v.cell_of(-50.0, 9999.0), (0, MAP_ROW + v.rows - 1));
    }

    #[test]
    fn rect_span_covers_whole_rect() {
        let v = Viewport::fit(Bounds::new(800.0, 600.0), 80, 24);
        let r = Rect { pos: Vec2::new(0.0, 0.0), size: Size::new(20.0, 30.0) };
        let ((c0, r0), (c1, r1)) = v.span(&r);
        assert_eq!((c0, r0), (0, MAP_ROW));
        assert_eq!(c1, 1);
        assert!(r1 >= r0);
    }

    #[test]
    fn level_message_uses_level_name() {
        let mut w = WorldState::new(Tuning::default(), builtin_levels(), Some(1));
        w.start(0);
        let name = w.orchestrator.current_def().map(|d| d.name.clone()).unwrap_or_default();
        assert_eq!(message_text(MessageKey::LevelName(w.orchestrator.current_level()), &w), name);
        assert_eq!(message_text(MessageKey::LevelName(99), &w), "Area 99");
    }

    #[test]
    fn compose_draws_player_and_bars() {
        let mut w = WorldState::new(Tuning::default(), builtin_levels(), Some(1));
        w.start(0);
        let mut r = Renderer::new();
        r.front.resize(80, 24);
        r.compose(&w);
        let row: String = (0..80).map(|x| r.front.get(x, HUD_ROW).ch).collect();
        assert!(row.contains("Energy"));
        assert!(row.contains('█'));
        let glyphs: Vec<char> = r.front.cells.iter().map(|c| c.ch).collect();
        assert!(glyphs.iter().any(|c| "▲▼◀▶".contains(*c)));
    }
}
