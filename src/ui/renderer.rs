/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Lay out the next screen into the `front` buffer (array of Cell)
///   2. Compare each cell with the `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// Layout: three panels side by side (global keys, themes, now playing)
/// over a footer row of toggles. Colors come from the player's palette.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::model::{Colormap, Rgb};
use crate::sim::view::{Field, Screen, Tier, Toggle};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BLANK: Cell = Cell { ch: ' ', fg: Color::Black, bg: Color::White };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell { ch: '\0', fg: Color::Magenta, bg: Color::Magenta };
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb { r: rgb.0, g: rgb.1, b: rgb.2 }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn fill(&mut self, cell: Cell) {
        self.cells.fill(cell);
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

    /// Write at most `max` chars of `s` at (x, y).
    fn put_str(&mut self, x: usize, y: usize, max: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().take(max).enumerate() {
            self.set(x + i, y, Cell { ch, fg, bg });
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, bg: Color) {
        for row in y..y + h {
            for col in x..x + w {
                self.set(col, row, Cell { ch: ' ', fg: bg, bg });
            }
        }
    }
}

// ── Renderer ──

const PANEL_TOP: usize = 1;
const FOOTER_ROWS: usize = 2;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame.
        self.back.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, screen: &Screen) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.fill(Cell::INVALID);
            queue!(self.writer, Clear(ClearType::All))?;
        }

        compose(&mut self.front, screen);
        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last: Option<(Color, Color)> = None;
        let mut cursor_at: Option<(usize, usize)> = None;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if last != Some((cell.fg, cell.bg)) {
                    queue!(self.writer, SetForegroundColor(cell.fg), SetBackgroundColor(cell.bg))?;
                    last = Some((cell.fg, cell.bg));
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }
}

// ── Compose: build front buffer content ──

fn tier_color(palette: &Colormap, tier: Tier) -> Color {
    match tier {
        Tier::Normal => color(palette.text),
        Tier::Emphasized => color(palette.emph),
        Tier::Faded => color(palette.fade),
    }
}

fn compose(buf: &mut FrameBuffer, screen: &Screen) {
    let palette = &screen.palette;
    let bg = color(palette.bg);
    buf.fill(Cell { ch: ' ', fg: color(palette.text), bg });

    let panel_w = buf.width / 3;
    let panels: [(&str, &[Field]); 3] = [
        ("Global Keys", &screen.global_effects),
        ("Themes", &screen.themes),
        ("Now Playing", &screen.now_playing),
    ];
    let panel_h = buf.height.saturating_sub(FOOTER_ROWS + PANEL_TOP);
    for (i, (title, fields)) in panels.iter().enumerate() {
        compose_panel(buf, palette, i * panel_w + 1, panel_w.saturating_sub(2), panel_h, title, fields);
    }

    compose_footer(buf, palette, &screen.footer);
}

fn compose_panel(
    buf: &mut FrameBuffer,
    palette: &Colormap,
    x: usize,
    width: usize,
    height: usize,
    title: &str,
    fields: &[Field],
) {
    let bg = color(palette.bg);
    buf.put_str(x, PANEL_TOP, width, title, color(palette.text), bg);
    buf.put_str(x, PANEL_TOP + 1, width, &"─".repeat(title.chars().count()), color(palette.fade), bg);

    // header, rule, blank line
    let rows = height.saturating_sub(3);
    for (row, field) in fields.iter().take(rows).enumerate() {
        buf.put_str(x, PANEL_TOP + 3 + row, width, &field.text, tier_color(palette, field.tier), bg);
    }
}

/// Footer entries share the bottom rows evenly. Key on the first line,
/// state on the second; entries in their "off" state are drawn inverted.
fn compose_footer(buf: &mut FrameBuffer, palette: &Colormap, toggles: &[Toggle]) {
    if toggles.is_empty() || buf.height < FOOTER_ROWS {
        return;
    }
    let top = buf.height - FOOTER_ROWS;
    let cell_w = buf.width / toggles.len();
    for (i, toggle) in toggles.iter().enumerate() {
        let (fg, bg) = if toggle.on {
            (color(palette.text), color(palette.bg))
        } else {
            (color(palette.bg), color(palette.text))
        };
        let x = i * cell_w;
        buf.fill_rect(x, top, cell_w, FOOTER_ROWS, bg);
        for (line, text) in [toggle.key.as_str(), toggle.state].into_iter().enumerate() {
            let len = text.chars().count().min(cell_w);
            let pad = (cell_w - len) / 2;
            buf.put_str(x + pad, top + line, cell_w, text, fg, bg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(buf: &FrameBuffer, y: usize) -> String {
        (0..buf.width).map(|x| buf.get(x, y).ch).collect()
    }

    fn screen() -> Screen {
        Screen {
            palette: Colormap::default(),
            global_effects: vec![Field { text: "1 - Thunder".into(), tier: Tier::Emphasized }],
            themes: vec![Field { text: "f - Forest".into(), tier: Tier::Normal }],
            now_playing: Vec::new(),
            footer: vec![
                Toggle { key: "F1".into(), state: "allow music", on: true },
                Toggle { key: "Space".into(), state: "paused", on: false },
            ],
        }
    }

    #[test]
    fn panels_are_laid_out_in_columns() {
        let mut buf = FrameBuffer::new(60, 12);
        compose(&mut buf, &screen());
        let header = row(&buf, PANEL_TOP);
        assert_eq!(header.find("Global Keys"), Some(1));
        assert_eq!(header.find("Themes"), Some(21));
        assert_eq!(header.find("Now Playing"), Some(41));
        assert!(row(&buf, PANEL_TOP + 3).contains("1 - Thunder"));
    }

    #[test]
    fn field_tiers_pick_palette_colors() {
        let mut buf = FrameBuffer::new(60, 12);
        compose(&mut buf, &screen());
        let palette = Colormap::default();
        assert_eq!(buf.get(1, PANEL_TOP + 3).fg, color(palette.emph));
        assert_eq!(buf.get(21, PANEL_TOP + 3).fg, color(palette.text));
    }

    #[test]
    fn inactive_footer_entries_are_inverted() {
        let mut buf = FrameBuffer::new(60, 12);
        compose(&mut buf, &screen());
        let palette = Colormap::default();
        assert_eq!(buf.get(0, 10).bg, color(palette.bg));
        assert_eq!(buf.get(30, 10).bg, color(palette.text));
        assert!(row(&buf, 11).contains("paused"));
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let mut buf = FrameBuffer::new(3, 1);
        compose(&mut buf, &screen());
    }
}
