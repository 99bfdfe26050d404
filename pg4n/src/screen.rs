//! Mirror of the terminal screen psql draws on.
//!
//! Only the text grid and the cursor are tracked. Colors and other SGR
//! attributes are parsed and dropped, and so is every sequence psql and
//! readline do not use. The grid size is fixed for the whole session.

use unicode_width::UnicodeWidthChar;

/// Placeholder stored in the cell right of a double width character.
const WIDE_TAIL: char = '\0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

impl TerminalSize {
    /// Zero dimensions (a detached terminal) fall back to the default size.
    #[must_use]
    pub fn or_default(self) -> Self {
        if self.rows == 0 || self.cols == 0 {
            Self::default()
        } else {
            self
        }
    }
}

/// Incremental VT interpreter over a fixed size grid.
pub struct ScreenModel {
    parser: vte::Parser,
    grid: Grid,
}

impl ScreenModel {
    #[must_use]
    pub fn new(size: TerminalSize) -> Self {
        Self {
            parser: vte::Parser::new(),
            grid: Grid::new(size.or_default()),
        }
    }

    /// Replays raw output bytes onto the grid. Unknown or malformed
    /// sequences are ignored.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.grid, bytes);
    }

    /// The grid rows, each trimmed of trailing whitespace.
    #[must_use]
    pub fn visible_lines(&self) -> Vec<String> {
        self.grid.lines()
    }

    /// The visible lines joined with `\n`.
    #[must_use]
    pub fn text(&self) -> String {
        self.visible_lines().join("\n")
    }

    /// A private copy of the current screen for look-ahead.
    ///
    /// The copy starts with a fresh parser, so an escape sequence split
    /// across the previous chunk boundary is not carried over.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            parser: vte::Parser::new(),
            grid: self.grid.clone(),
        }
    }

    /// Cursor position as `(row, col)`, zero based.
    #[must_use]
    pub const fn cursor(&self) -> (usize, usize) {
        (self.grid.row, self.grid.col)
    }

    #[must_use]
    pub const fn size(&self) -> TerminalSize {
        self.grid.size
    }
}

#[derive(Debug, Clone)]
struct Grid {
    cells: Vec<Vec<char>>,
    size: TerminalSize,
    row: usize,
    col: usize,
    /// Set after writing to the last column; the next printable character
    /// wraps first.
    wrap_pending: bool,
    scroll_top: usize,
    scroll_bottom: usize,
    saved_cursor: Option<(usize, usize)>,
    saved_primary: Option<(Vec<Vec<char>>, usize, usize)>,
}

impl Grid {
    fn new(size: TerminalSize) -> Self {
        Self {
            cells: Self::blank_cells(size),
            size,
            row: 0,
            col: 0,
            wrap_pending: false,
            scroll_top: 0,
            scroll_bottom: usize::from(size.rows) - 1,
            saved_cursor: None,
            saved_primary: None,
        }
    }

    fn blank_cells(size: TerminalSize) -> Vec<Vec<char>> {
        vec![vec![' '; usize::from(size.cols)]; usize::from(size.rows)]
    }

    fn blank_row(&self) -> Vec<char> {
        vec![' '; self.cols()]
    }

    fn rows(&self) -> usize {
        usize::from(self.size.rows)
    }

    fn cols(&self) -> usize {
        usize::from(self.size.cols)
    }

    fn lines(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| {
                let line: String = row.iter().filter(|&&c| c != WIDE_TAIL).collect();
                line.trim_end().to_string()
            })
            .collect()
    }

    fn move_to(&mut self, row: usize, col: usize) {
        self.row = row.min(self.rows() - 1);
        self.col = col.min(self.cols() - 1);
        self.wrap_pending = false;
    }

    fn linefeed(&mut self) {
        if self.row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.row + 1 < self.rows() {
            self.row += 1;
        }
        self.wrap_pending = false;
    }

    fn reverse_index(&mut self) {
        if self.row == self.scroll_top {
            self.scroll_down(1);
        } else if self.row > 0 {
            self.row -= 1;
        }
        self.wrap_pending = false;
    }

    fn scroll_up(&mut self, count: usize) {
        for _ in 0..count.min(self.scroll_bottom + 1 - self.scroll_top) {
            self.cells.remove(self.scroll_top);
            let blank = self.blank_row();
            self.cells.insert(self.scroll_bottom, blank);
        }
    }

    fn scroll_down(&mut self, count: usize) {
        for _ in 0..count.min(self.scroll_bottom + 1 - self.scroll_top) {
            self.cells.remove(self.scroll_bottom);
            let blank = self.blank_row();
            self.cells.insert(self.scroll_top, blank);
        }
    }

    fn erase_in_display(&mut self, mode: u16) {
        match mode {
            0 => {
                self.erase_in_line(0);
                for row in &mut self.cells[self.row + 1..] {
                    row.fill(' ');
                }
            }
            1 => {
                self.erase_in_line(1);
                for row in &mut self.cells[..self.row] {
                    row.fill(' ');
                }
            }
            2 | 3 => {
                for row in &mut self.cells {
                    row.fill(' ');
                }
            }
            _ => {}
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let col = self.col;
        let line = &mut self.cells[self.row];
        match mode {
            0 => line[col..].fill(' '),
            1 => line[..=col].fill(' '),
            2 => line.fill(' '),
            _ => {}
        }
    }

    fn delete_chars(&mut self, count: usize) {
        let col = self.col;
        let line = &mut self.cells[self.row];
        let count = count.min(line.len() - col);
        line.drain(col..col + count);
        line.extend(std::iter::repeat_n(' ', count));
    }

    fn insert_blanks(&mut self, count: usize) {
        let col = self.col;
        let cols = self.cols();
        let line = &mut self.cells[self.row];
        let count = count.min(cols - col);
        for _ in 0..count {
            line.insert(col, ' ');
        }
        line.truncate(cols);
    }

    fn erase_chars(&mut self, count: usize) {
        let col = self.col;
        let line = &mut self.cells[self.row];
        let end = (col + count).min(line.len());
        line[col..end].fill(' ');
    }

    fn insert_lines(&mut self, count: usize) {
        if !(self.scroll_top..=self.scroll_bottom).contains(&self.row) {
            return;
        }
        for _ in 0..count.min(self.scroll_bottom + 1 - self.row) {
            self.cells.remove(self.scroll_bottom);
            let blank = self.blank_row();
            self.cells.insert(self.row, blank);
        }
        self.col = 0;
    }

    fn delete_lines(&mut self, count: usize) {
        if !(self.scroll_top..=self.scroll_bottom).contains(&self.row) {
            return;
        }
        for _ in 0..count.min(self.scroll_bottom + 1 - self.row) {
            self.cells.remove(self.row);
            let blank = self.blank_row();
            self.cells.insert(self.scroll_bottom, blank);
        }
        self.col = 0;
    }

    fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let bottom = bottom.min(self.rows() - 1);
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
            self.move_to(0, 0);
        }
    }

    fn enter_alternate_screen(&mut self) {
        if self.saved_primary.is_none() {
            let blank = Self::blank_cells(self.size);
            let primary = std::mem::replace(&mut self.cells, blank);
            self.saved_primary = Some((primary, self.row, self.col));
        }
    }

    fn leave_alternate_screen(&mut self) {
        if let Some((cells, row, col)) = self.saved_primary.take() {
            self.cells = cells;
            self.move_to(row, col);
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.size);
    }
}

/// First parameter value, where a missing or zero value means `default`.
fn param(params: &[u16], idx: usize, default: u16) -> usize {
    match params.get(idx) {
        Some(&0) | None => usize::from(default),
        Some(&value) => usize::from(value),
    }
}

impl vte::Perform for Grid {
    fn print(&mut self, c: char) {
        let width = c.width().unwrap_or(0);
        let cols = self.cols();
        if width == 0 || width > cols {
            return;
        }

        if self.wrap_pending || (width == 2 && self.col + 1 >= cols) {
            self.col = 0;
            self.linefeed();
        }

        self.cells[self.row][self.col] = c;
        if width == 2 {
            self.cells[self.row][self.col + 1] = WIDE_TAIL;
        }

        if self.col + width >= cols {
            self.col = cols - 1;
            self.wrap_pending = true;
        } else {
            self.col += width;
        }
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | 0x0b | 0x0c => self.linefeed(),
            b'\r' => {
                self.col = 0;
                self.wrap_pending = false;
            }
            0x08 => {
                self.col = self.col.saturating_sub(1);
                self.wrap_pending = false;
            }
            b'\t' => {
                let next = (self.col / 8 + 1) * 8;
                self.move_to(self.row, next);
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &vte::Params, intermediates: &[u8], _ignore: bool, action: char) {
        let params: Vec<u16> = params.iter().map(|p| p.first().copied().unwrap_or(0)).collect();

        if intermediates == [b'?'] {
            let alternate = params.iter().any(|p| matches!(p, 47 | 1047 | 1049));
            match action {
                'h' if alternate => self.enter_alternate_screen(),
                'l' if alternate => self.leave_alternate_screen(),
                _ => {}
            }
            return;
        }
        if !intermediates.is_empty() {
            return;
        }

        let n = param(&params, 0, 1);
        match action {
            'A' => self.move_to(self.row.saturating_sub(n), self.col),
            'B' | 'e' => self.move_to(self.row + n, self.col),
            'C' | 'a' => self.move_to(self.row, self.col + n),
            'D' => self.move_to(self.row, self.col.saturating_sub(n)),
            'E' => self.move_to(self.row + n, 0),
            'F' => self.move_to(self.row.saturating_sub(n), 0),
            'G' | '`' => self.move_to(self.row, n - 1),
            'H' | 'f' => self.move_to(n - 1, param(&params, 1, 1) - 1),
            'd' => self.move_to(n - 1, self.col),
            'J' => self.erase_in_display(params.first().copied().unwrap_or(0)),
            'K' => self.erase_in_line(params.first().copied().unwrap_or(0)),
            'P' => self.delete_chars(n),
            '@' => self.insert_blanks(n),
            'X' => self.erase_chars(n),
            'L' => self.insert_lines(n),
            'M' => self.delete_lines(n),
            'S' => self.scroll_up(n),
            'T' => self.scroll_down(n),
            'r' => self.set_scroll_region(n - 1, param(&params, 1, self.size.rows) - 1),
            's' => self.saved_cursor = Some((self.row, self.col)),
            'u' => {
                if let Some((row, col)) = self.saved_cursor {
                    self.move_to(row, col);
                }
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if !intermediates.is_empty() {
            return;
        }
        match byte {
            b'7' => self.saved_cursor = Some((self.row, self.col)),
            b'8' => {
                if let Some((row, col)) = self.saved_cursor {
                    self.move_to(row, col);
                }
            }
            b'D' => self.linefeed(),
            b'E' => {
                self.col = 0;
                self.linefeed();
            }
            b'M' => self.reverse_index(),
            b'c' => self.reset(),
            _ => {}
        }
    }
}
