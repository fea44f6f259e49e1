use crate::choropleth::Rgb;

/// One terminal cell: a 2x4 dot pattern drawn in `fg` over a solid `bg`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub dots: u8,
    pub fg: Option<Rgb>,
    pub bg: Rgb,
}

impl Cell {
    fn blank(bg: Rgb) -> Self {
        Self { dots: 0, fg: None, bg }
    }

    /// Braille glyph for the dot pattern (U+2800 when empty)
    pub fn glyph(&self) -> char {
        char::from_u32(0x2800 + self.dots as u32).unwrap_or(' ')
    }
}

/// Braille Unicode canvas with per-cell colour.
/// Each character cell represents a 2x4 pixel grid (8 dots) for strokes,
/// and carries a background colour for area fills.
/// Unicode Braille patterns: U+2800 to U+28FF
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    cells: Vec<Cell>,
}

impl BrailleCanvas {
    /// Create a new canvas with the given character dimensions.
    /// Effective pixel resolution: width*2 x height*4
    pub fn new(width: usize, height: usize, background: Rgb) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::blank(background); width * height],
        }
    }

    /// Reset every cell to an empty pattern over `background`
    pub fn clear(&mut self, background: Rgb) {
        self.cells.fill(Cell::blank(background));
    }

    /// Resize, dropping all content
    pub fn resize(&mut self, width: usize, height: usize, background: Rgb) {
        self.width = width;
        self.height = height;
        self.cells = vec![Cell::blank(background); width * height];
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_width(&self) -> usize {
        self.width * 2
    }

    pub fn pixel_height(&self) -> usize {
        self.height * 4
    }

    pub fn cell(&self, cx: usize, cy: usize) -> Option<&Cell> {
        if cx >= self.width || cy >= self.height {
            return None;
        }
        self.cells.get(cy * self.width + cx)
    }

    /// Set a dot at the given pixel coordinates, in `color` blended at
    /// `alpha` over the cell's background.
    /// Braille dot layout per character:
    /// ```text
    /// (0,0) (1,0)   bits: 0x01 0x08
    /// (0,1) (1,1)   bits: 0x02 0x10
    /// (0,2) (1,2)   bits: 0x04 0x20
    /// (0,3) (1,3)   bits: 0x40 0x80
    /// ```
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb, alpha: f64) {
        let cx = x / 2;
        let cy = y / 4;

        if cx >= self.width || cy >= self.height {
            return;
        }

        let bit = match (x % 2, y % 4) {
            (0, 0) => 0x01,
            (1, 0) => 0x08,
            (0, 1) => 0x02,
            (1, 1) => 0x10,
            (0, 2) => 0x04,
            (1, 2) => 0x20,
            (0, 3) => 0x40,
            (1, 3) => 0x80,
            _ => 0,
        };

        let cell = &mut self.cells[cy * self.width + cx];
        cell.dots |= bit;
        cell.fg = Some(color.over(cell.bg, alpha));
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    pub fn set_pixel_signed(&mut self, x: i32, y: i32, color: Rgb, alpha: f64) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize, color, alpha);
        }
    }

    /// Composite `color` at `alpha` over a cell's background
    pub fn fill_cell(&mut self, cx: usize, cy: usize, color: Rgb, alpha: f64) {
        if cx >= self.width || cy >= self.height {
            return;
        }
        let cell = &mut self.cells[cy * self.width + cx];
        cell.bg = color.over(cell.bg, alpha);
    }

    /// Get a specific row as a string of glyphs
    pub fn row_to_string(&self, row: usize) -> String {
        if row >= self.height {
            return String::new();
        }
        self.cells[row * self.width..(row + 1) * self.width]
            .iter()
            .map(Cell::glyph)
            .collect()
    }

    /// Cells of one row, left to right
    pub fn row_cells(&self, row: usize) -> &[Cell] {
        if row >= self.height {
            return &[];
        }
        &self.cells[row * self.width..(row + 1) * self.width]
    }

    /// Convert the canvas to a string of Braille characters
    #[cfg(test)]
    pub fn to_string(&self) -> String {
        (0..self.height)
            .map(|row| self.row_to_string(row))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
