//! In-RAM copy of the display contents with dirty-region tracking.
//!
//! The pixel store uses the same layout as the SSD1306 display RAM: pages of
//! `NUM_PIXEL_COLS` segments, each segment holding 8 vertically stacked pixels with the least
//! significant bit at the top. A horizontal-addressing transfer of a run of the store therefore
//! needs no reshuffling.
//!
//! The dirty region is kept in segment coordinates: columns `0..=COL_MAX` and pages
//! `0..=PAGE_MAX`, both ends inclusive.

use itertools::iproduct;

use crate::command::consts::*;
use crate::error::FramebufferError;

/// Inclusive bounding box of the modified segments: columns `x1..=x2`, pages `y1..=y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DirtyArea {
    pub x1: u8,
    pub x2: u8,
    pub y1: u8,
    pub y2: u8,
}

impl DirtyArea {
    const FULL_FRAME: DirtyArea = DirtyArea {
        x1: 0,
        x2: COL_MAX,
        y1: 0,
        y2: PAGE_MAX,
    };

    fn first_segment(&self) -> usize {
        self.y1 as usize * NUM_PIXEL_COLS + self.x1 as usize
    }

    fn last_segment(&self) -> usize {
        self.y2 as usize * NUM_PIXEL_COLS + self.x2 as usize
    }
}

/// Clip a value between some low and high limit.
fn clip<T: PartialOrd>(lo: T, x: T, hi: T) -> T {
    match () {
        _ if x > hi => hi,
        _ if x < lo => lo,
        _ => x,
    }
}

fn segment_index(x: u8, y: u8) -> usize {
    (y as usize / 8) * NUM_PIXEL_COLS + x as usize
}

/// Mask of the bits of `page` that fall within pixel rows `row_start..row_end`.
fn row_mask(page: i16, row_start: i16, row_end: i16) -> u8 {
    let lo = clip(0, row_start - page * 8, 8);
    let hi = clip(0, row_end - page * 8, 8);
    let below_hi = (1u16 << hi) - 1;
    let below_lo = (1u16 << lo) - 1;
    (below_hi & !below_lo) as u8
}

pub struct Framebuffer {
    segments: [u8; BUFFER_SIZE],
    dirty_area: DirtyArea,
    is_dirty: bool,
    is_locked: bool,
    /// The dirty region has not been drained by `copy_dirty_area` yet. Unlike `is_dirty`, this
    /// survives `dirty_area_buffer`.
    undrained: bool,
    /// Next segment to be copied out by `copy_dirty_area`, while a drain is in progress.
    cursor: Option<usize>,
    overflowed: bool,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    /// Construct a cleared framebuffer. The whole frame starts out dirty, so the first transfer
    /// overwrites whatever the display RAM held at power-up.
    pub const fn new() -> Self {
        Framebuffer {
            segments: [0; BUFFER_SIZE],
            dirty_area: DirtyArea::FULL_FRAME,
            is_dirty: true,
            is_locked: false,
            undrained: true,
            cursor: None,
            overflowed: false,
        }
    }

    /// Clear every pixel and return to the freshly constructed state.
    pub fn init(&mut self) {
        *self = Self::new();
    }

    /// Mark the whole frame dirty without touching the pixels, so the next transfer resends
    /// everything.
    pub fn invalidate(&mut self) {
        self.dirty_area = DirtyArea::FULL_FRAME;
        self.is_dirty = true;
        self.undrained = true;
        self.cursor = None;
    }

    /// Set the pixel at column `x`, row `y`. Does nothing outside the frame.
    pub fn set_pixel(&mut self, x: u8, y: u8) {
        if (x as usize) < NUM_PIXEL_COLS && (y as usize) < NUM_PIXEL_ROWS {
            self.segments[segment_index(x, y)] |= 1 << (y % 8);
            self.update_dirty_area(x, y / 8, x, y / 8);
        }
    }

    /// Clear the pixel at column `x`, row `y`. Does nothing outside the frame.
    pub fn clear_pixel(&mut self, x: u8, y: u8) {
        if (x as usize) < NUM_PIXEL_COLS && (y as usize) < NUM_PIXEL_ROWS {
            self.segments[segment_index(x, y)] &= !(1 << (y % 8));
            self.update_dirty_area(x, y / 8, x, y / 8);
        }
    }

    /// Read the pixel at column `x`, row `y`, or `None` outside the frame.
    pub fn get_pixel(&self, x: u8, y: u8) -> Option<bool> {
        if (x as usize) < NUM_PIXEL_COLS && (y as usize) < NUM_PIXEL_ROWS {
            Some(self.segments[segment_index(x, y)] & (1 << (y % 8)) != 0)
        } else {
            None
        }
    }

    /// OR a `width` x `height` pixel bitmap onto the frame with its top-left corner at (`x`,
    /// `y`).
    ///
    /// `data` is laid out like the frame itself: rows of `width` segments, `(height + 7) / 8`
    /// rows, least significant bit at the top. Missing trailing bytes read as blank. Parts of
    /// the bitmap outside the frame are cropped; a bitmap entirely outside the frame changes
    /// nothing, dirty region included.
    pub fn blit(&mut self, x: i16, y: i16, width: u8, height: u8, data: &[u8]) {
        let width = width as i16;
        let height = height as i16;
        let cols = NUM_PIXEL_COLS as i16;
        let rows = NUM_PIXEL_ROWS as i16;
        if width == 0 || height == 0 || x >= cols || y >= rows || x + width <= 0 || y + height <= 0
        {
            return;
        }

        // Visible part of the bitmap, in frame pixels. End coordinates are exclusive.
        let col_start = clip(0, x, cols);
        let col_end = clip(0, x + width, cols);
        let row_start = clip(0, y, rows);
        let row_end = clip(0, y + height, rows);
        let first_page = row_start / 8;
        let last_page = (row_end - 1) / 8;

        // Source row k lands on frame page `page_offset + k`, moved down by `shift` bits; its
        // top `shift` bits spill into the page below.
        let page_offset = y.div_euclid(8);
        let shift = y.rem_euclid(8) as u32;
        let source_rows = (height + 7) / 8;
        let source = |row: i16, col: i16| -> u16 {
            if row < 0 || row >= source_rows {
                return 0;
            }
            data.get((row * width + col) as usize)
                .copied()
                .unwrap_or(0) as u16
        };

        for (page, col) in iproduct!(first_page..=last_page, col_start..col_end) {
            let row = page - page_offset;
            let src_col = col - x;
            let lower = source(row, src_col) << shift;
            let upper = source(row - 1, src_col) >> (8 - shift);
            let bits = (lower | upper) as u8 & row_mask(page, row_start, row_end);
            self.segments[page as usize * NUM_PIXEL_COLS + col as usize] |= bits;
        }

        self.update_dirty_area(
            col_start as u8,
            first_page as u8,
            (col_end - 1) as u8,
            last_page as u8,
        );
    }

    pub fn lock(&mut self) {
        self.is_locked = true;
    }

    pub fn unlock(&mut self) {
        self.is_locked = false;
    }

    /// Whether a transfer to the display is in progress. Writes made while locked are not
    /// refused, but may be sent half-applied or lost from the dirty region.
    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// Whether the frame holds modifications not yet handed out for transfer.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Whether a drain ran past the end of the pixel store since the last `init`.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Bounds of the dirty region. Only meaningful while `is_dirty`, or after
    /// `dirty_area_buffer` until the next modification.
    pub fn dirty_area(&self) -> DirtyArea {
        self.dirty_area
    }

    /// Hand out the run of segments covering the dirty region, for a horizontal-addressing
    /// transfer.
    ///
    /// The run starts at column 0 of the first dirty page and ends at the last dirty segment,
    /// so it can include clean segments around a dirty rectangle narrower than the frame. The
    /// returned page number is where the transfer has to start.
    ///
    /// This clears the dirty flag. The region bounds are kept until the next modification.
    pub fn dirty_area_buffer(&mut self) -> (u8, &[u8]) {
        let first = self.dirty_area.y1 as usize * NUM_PIXEL_COLS;
        let last = self.dirty_area.last_segment();
        self.is_dirty = false;
        (self.dirty_area.y1, &self.segments[first..=last])
    }

    /// Copy the next part of the dirty rectangle into `buffer`, page by page and within each
    /// page only the dirty columns. Returns the number of bytes copied.
    ///
    /// Call repeatedly until it returns 0. The call that copies the last dirty segment also
    /// clears the dirty flag and unlocks the framebuffer. An empty `buffer` makes no progress.
    ///
    /// A region already handed out by `dirty_area_buffer` is still drained, with the bounds it
    /// had then.
    pub fn copy_dirty_area(&mut self, buffer: &mut [u8]) -> Result<usize, FramebufferError> {
        let area = self.dirty_area;
        let last = area.last_segment();
        let skip = NUM_PIXEL_COLS - (area.x2 - area.x1) as usize - 1;
        let mut pos = match self.cursor {
            Some(pos) => pos,
            None if self.undrained => area.first_segment(),
            None => return Ok(0),
        };

        let mut copied = 0;
        for slot in buffer.iter_mut() {
            *slot = match self.segments.get(pos) {
                Some(segment) => *segment,
                None => {
                    self.overflowed = true;
                    self.cursor = None;
                    return Err(FramebufferError::Overflow);
                }
            };
            copied += 1;

            if pos % NUM_PIXEL_COLS == area.x2 as usize {
                pos += skip;
            }
            pos += 1;

            if pos > last {
                self.is_dirty = false;
                self.undrained = false;
                self.is_locked = false;
                self.cursor = None;
                return Ok(copied);
            }
        }
        self.cursor = Some(pos);
        Ok(copied)
    }

    /// Grow the dirty region to cover the given segment rectangle. The first modification after
    /// the region was handed out starts a new region.
    fn update_dirty_area(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) {
        if x2 > COL_MAX || y2 > PAGE_MAX {
            self.overflowed = true;
            return;
        }
        if !self.is_dirty {
            self.dirty_area = DirtyArea { x1, x2, y1, y2 };
            self.cursor = None;
        }
        let area = &mut self.dirty_area;
        area.x1 = area.x1.min(x1);
        area.y1 = area.y1.min(y1);
        area.x2 = area.x2.max(x2);
        area.y2 = area.y2.max(y2);
        self.is_dirty = true;
        self.undrained = true;
    }
}
