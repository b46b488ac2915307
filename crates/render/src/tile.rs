//! Tile model and grid planning
//!
//! Each page is split into a grid of cells sized so that one cell, rendered at
//! the current zoom, is close to [`TILE_SIZE`] device pixels on each edge.
//! The planner works out which cells of which pages intersect the visible
//! window, and the viewer schedules those cells as render tasks.

use std::hash::{Hash, Hasher};

use crate::bitmap::PixelBuffer;
use crate::layout::{DocumentLayout, ScrollAxis, SizeF};

/// Default tile edge length in device pixels.
pub const TILE_SIZE: f32 = 256.0;

/// Sub-rectangle of a page in relative coordinates, each edge in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RelativeBounds {
    /// The whole page, used by thumbnails.
    pub const FULL: RelativeBounds = RelativeBounds {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };

    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    fn bits(&self) -> [u32; 4] {
        // +0.0 folds negative zero into positive zero
        [
            (self.left + 0.0).to_bits(),
            (self.top + 0.0).to_bits(),
            (self.right + 0.0).to_bits(),
            (self.bottom + 0.0).to_bits(),
        ]
    }
}

/// Identity of a cache entry: page plus bounds, compared by value.
#[derive(Debug, Clone, Copy)]
pub struct TileKey {
    pub page: u32,
    pub bounds: RelativeBounds,
}

impl TileKey {
    pub fn new(page: u32, bounds: RelativeBounds) -> Self {
        Self { page, bounds }
    }
}

impl PartialEq for TileKey {
    fn eq(&self, other: &Self) -> bool {
        self.page == other.page && self.bounds.bits() == other.bounds.bits()
    }
}

impl Eq for TileKey {}

impl Hash for TileKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.page.hash(state);
        self.bounds.bits().hash(state);
    }
}

/// A rasterized fragment of a page.
///
/// `cache_order` is the priority the tile was requested with. Promotions
/// are tracked by the cache and show up in its snapshot orders.
#[derive(Debug)]
pub struct Tile<P = PixelBuffer> {
    pub page: u32,
    pub bounds: RelativeBounds,
    pub pixels: P,
    pub is_thumbnail: bool,
    pub cache_order: u32,
}

impl<P> Tile<P> {
    pub fn key(&self) -> TileKey {
        TileKey::new(self.page, self.bounds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

impl GridSize {
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
}

/// Cells of one page that intersect the visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRange {
    pub page: u32,
    pub grid: GridSize,
    pub left_top: GridCell,
    pub right_bottom: GridCell,
}

impl RenderRange {
    pub fn cell_count(&self) -> u32 {
        (self.right_bottom.row - self.left_top.row + 1) * (self.right_bottom.col - self.left_top.col + 1)
    }
}

/// Visible part of the strip in document coordinates at the current zoom,
/// already grown by the preload margin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VisibleWindow {
    pub first_x: f32,
    pub first_y: f32,
    pub last_x: f32,
    pub last_y: f32,
}

impl VisibleWindow {
    /// Window for a viewport scrolled to (`scroll_x`, `scroll_y`).
    ///
    /// Negative scroll (content centred inside a larger viewport) counts as
    /// zero, and the leading edge never extends before the document start.
    pub fn new(scroll_x: f32, scroll_y: f32, width: f32, height: f32, preload: f32) -> Self {
        let x = scroll_x.max(0.0);
        let y = scroll_y.max(0.0);
        Self {
            first_x: (x - preload).max(0.0),
            first_y: (y - preload).max(0.0),
            last_x: x + width + preload,
            last_y: y + height + preload,
        }
    }

    fn first_main(&self, axis: ScrollAxis) -> f32 {
        match axis {
            ScrollAxis::Vertical => self.first_y,
            ScrollAxis::Horizontal => self.first_x,
        }
    }

    fn last_main(&self, axis: ScrollAxis) -> f32 {
        match axis {
            ScrollAxis::Vertical => self.last_y,
            ScrollAxis::Horizontal => self.last_x,
        }
    }
}

/// A grid cell ready to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedCell {
    pub page: u32,
    pub row: u32,
    pub col: u32,
    pub bounds: RelativeBounds,
    /// Pixel size of the rendered fragment.
    pub render_width: f32,
    pub render_height: f32,
}

/// Splits pages into tile grids and intersects them with the visible window.
#[derive(Debug, Clone, Copy)]
pub struct TileGridPlanner {
    tile_size: f32,
}

impl Default for TileGridPlanner {
    fn default() -> Self {
        Self::new(TILE_SIZE)
    }
}

impl TileGridPlanner {
    pub fn new(tile_size: f32) -> Self {
        Self { tile_size }
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Grid for a page of `page_size` (zoom 1) rendered at `zoom`.
    pub fn grid_for(&self, page_size: SizeF, zoom: f32) -> GridSize {
        if page_size.width <= 0.0 || page_size.height <= 0.0 || zoom <= 0.0 || self.tile_size <= 0.0 {
            return GridSize::default();
        }
        GridSize {
            rows: (page_size.height * zoom / self.tile_size).ceil() as u32,
            cols: (page_size.width * zoom / self.tile_size).ceil() as u32,
        }
    }

    /// Render ranges of every page touched by `window`, in page order.
    ///
    /// The first page is clipped to the window's leading edge, the last page
    /// to its trailing edge, and pages in between span their full length.
    pub fn render_ranges(&self, layout: &DocumentLayout, window: &VisibleWindow, zoom: f32) -> Vec<RenderRange> {
        if layout.page_count() == 0 {
            return Vec::new();
        }
        let axis = layout.axis();
        let first_page = layout.page_at_offset(window.first_main(axis), zoom);
        let last_page = layout.page_at_offset(window.last_main(axis), zoom);

        let mut ranges = Vec::with_capacity((last_page - first_page + 1) as usize);
        for page in first_page..=last_page {
            let page_offset = layout.page_offset(page, zoom);
            let page_end = page_offset + layout.page_length(page, zoom);

            let main_first = if page == first_page {
                window.first_main(axis)
            } else {
                page_offset
            };
            let main_last = if page == last_page {
                window.last_main(axis)
            } else {
                page_end
            };
            let (first_x, first_y, last_x, last_y) = match axis {
                ScrollAxis::Vertical => (window.first_x, main_first, window.last_x, main_last),
                ScrollAxis::Horizontal => (main_first, window.first_y, main_last, window.last_y),
            };

            let grid = self.grid_for(layout.page_size(page), zoom);
            if grid.is_empty() {
                continue;
            }
            let scaled = layout.scaled_page_size(page, zoom);
            let row_height = scaled.height / grid.rows as f32;
            let col_width = scaled.width / grid.cols as f32;
            let secondary = layout.secondary_page_offset(page, zoom);

            let (left_top, right_bottom) = match axis {
                ScrollAxis::Vertical => (
                    GridCell {
                        row: floor_index(first_y - page_offset, row_height),
                        col: floor_index(first_x - secondary, col_width),
                    },
                    GridCell {
                        row: ceil_index(last_y - page_offset, row_height),
                        col: floor_index(last_x - secondary, col_width),
                    },
                ),
                ScrollAxis::Horizontal => (
                    GridCell {
                        row: floor_index(first_y - secondary, row_height),
                        col: floor_index(first_x - page_offset, col_width),
                    },
                    GridCell {
                        row: floor_index(last_y - secondary, row_height),
                        col: ceil_index(last_x - page_offset, col_width),
                    },
                ),
            };

            let right_bottom = GridCell {
                row: right_bottom.row.min(grid.rows - 1),
                col: right_bottom.col.min(grid.cols - 1),
            };
            let left_top = GridCell {
                row: left_top.row.min(right_bottom.row),
                col: left_top.col.min(right_bottom.col),
            };

            ranges.push(RenderRange {
                page,
                grid,
                left_top,
                right_bottom,
            });
        }
        ranges
    }

    /// Cells of `range` in row-major order, skipping cells with no area.
    pub fn cells(&self, range: &RenderRange) -> impl Iterator<Item = PlannedCell> + '_ {
        let RenderRange {
            page,
            grid,
            left_top,
            right_bottom,
        } = *range;
        let part_width = 1.0 / grid.cols as f32;
        let part_height = 1.0 / grid.rows as f32;
        let part_render_width = self.tile_size / part_width;
        let part_render_height = self.tile_size / part_height;

        (left_top.row..=right_bottom.row)
            .flat_map(move |row| (left_top.col..=right_bottom.col).map(move |col| (row, col)))
            .filter_map(move |(row, col)| {
                let left = part_width * col as f32;
                let top = part_height * row as f32;
                let width = if left + part_width > 1.0 { 1.0 - left } else { part_width };
                let height = if top + part_height > 1.0 { 1.0 - top } else { part_height };
                let render_width = part_render_width * width;
                let render_height = part_render_height * height;
                (render_width > 0.0 && render_height > 0.0).then_some(PlannedCell {
                    page,
                    row,
                    col,
                    bounds: RelativeBounds::new(left, top, left + width, top + height),
                    render_width,
                    render_height,
                })
            })
    }
}

fn floor_index(distance: f32, cell: f32) -> u32 {
    (distance.max(0.0) / cell).floor() as u32
}

fn ceil_index(distance: f32, cell: f32) -> u32 {
    (distance.max(0.0) / cell).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageSize;
    use crate::layout::{FitPolicy, LayoutOptions, SpacingConfig, ViewportSize};
    use std::collections::HashSet;

    fn layout(pages: usize, viewport: ViewportSize, axis: ScrollAxis) -> DocumentLayout {
        DocumentLayout::new(
            vec![PageSize::new(600.0, 800.0); pages],
            viewport,
            LayoutOptions {
                axis,
                fit_policy: if axis.is_vertical() { FitPolicy::Width } else { FitPolicy::Height },
                fit_each_page: false,
                spacing: SpacingConfig {
                    page_separator: 10.0,
                    ..SpacingConfig::default()
                },
            },
        )
    }

    #[test]
    fn test_grid_matches_tile_size() {
        let planner = TileGridPlanner::default();
        assert_eq!(planner.grid_for(SizeF::new(300.0, 400.0), 1.0), GridSize { rows: 2, cols: 2 });
        assert_eq!(planner.grid_for(SizeF::new(300.0, 400.0), 2.0), GridSize { rows: 4, cols: 3 });
        assert_eq!(planner.grid_for(SizeF::new(256.0, 512.0), 1.0), GridSize { rows: 2, cols: 1 });
        assert!(planner.grid_for(SizeF::default(), 1.0).is_empty());
    }

    #[test]
    fn test_single_page_inside_window_is_fully_covered() {
        let layout = layout(1, ViewportSize::new(300, 500), ScrollAxis::Vertical);
        let planner = TileGridPlanner::default();

        for zoom in [1.0f32, 1.5, 2.0] {
            let window = VisibleWindow::new(0.0, 0.0, 300.0 * zoom, 400.0 * zoom + 100.0, 20.0);
            let ranges = planner.render_ranges(&layout, &window, zoom);

            assert_eq!(ranges.len(), 1);
            let range = ranges[0];
            assert_eq!(range.left_top, GridCell { row: 0, col: 0 });
            assert_eq!(
                range.right_bottom,
                GridCell {
                    row: range.grid.rows - 1,
                    col: range.grid.cols - 1
                }
            );
            assert_eq!(planner.cells(&range).count() as u32, range.grid.rows * range.grid.cols);
        }
    }

    #[test]
    fn test_cells_tile_the_page_without_gaps() {
        let planner = TileGridPlanner::default();
        let range = RenderRange {
            page: 0,
            grid: GridSize { rows: 3, cols: 2 },
            left_top: GridCell::default(),
            right_bottom: GridCell { row: 2, col: 1 },
        };

        let cells: Vec<_> = planner.cells(&range).collect();
        let area: f32 = cells.iter().map(|c| c.bounds.width() * c.bounds.height()).sum();
        assert!((area - 1.0).abs() < 1e-5);

        let last = cells.last().unwrap();
        assert!((last.bounds.right - 1.0).abs() < 1e-6);
        assert!((last.bounds.bottom - 1.0).abs() < 1e-6);
        assert!((cells[0].render_width - 256.0).abs() < 1e-3);
        assert!((cells[0].render_height - 256.0).abs() < 1e-3);
    }

    #[test]
    fn test_window_spanning_pages_clips_ends() {
        let layout = layout(3, ViewportSize::new(300, 500), ScrollAxis::Vertical);
        let planner = TileGridPlanner::default();

        // from the lower half of page 0 into the top of page 1
        let window = VisibleWindow::new(0.0, 300.0, 300.0, 200.0, 0.0);
        let ranges = planner.render_ranges(&layout, &window, 1.0);

        assert_eq!(ranges.iter().map(|r| r.page).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(ranges[0].left_top.row, 1);
        assert_eq!(ranges[0].right_bottom.row, 1);
        assert_eq!(ranges[1].left_top.row, 0);
        assert_eq!(ranges[1].right_bottom.row, 1);
    }

    #[test]
    fn test_interior_pages_are_fully_covered() {
        let layout = layout(4, ViewportSize::new(300, 500), ScrollAxis::Vertical);
        let planner = TileGridPlanner::default();

        let window = VisibleWindow::new(0.0, 350.0, 300.0, 800.0, 0.0);
        let ranges = planner.render_ranges(&layout, &window, 1.0);

        assert_eq!(ranges.iter().map(|r| r.page).collect::<Vec<_>>(), vec![0, 1, 2]);
        let interior = ranges[1];
        assert_eq!(interior.left_top, GridCell::default());
        assert_eq!(interior.right_bottom, GridCell { row: 1, col: 1 });
    }

    #[test]
    fn test_horizontal_ranges_walk_columns() {
        let layout = layout(3, ViewportSize::new(500, 400), ScrollAxis::Horizontal);
        let planner = TileGridPlanner::default();

        let window = VisibleWindow::new(0.0, 0.0, 500.0, 400.0, 0.0);
        let ranges = planner.render_ranges(&layout, &window, 1.0);

        assert_eq!(ranges.iter().map(|r| r.page).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(ranges[0].left_top, GridCell::default());
        assert_eq!(ranges[0].right_bottom.row, ranges[0].grid.rows - 1);
        assert_eq!(ranges[1].left_top.col, 0);
    }

    #[test]
    fn test_cells_are_distinct_keys() {
        let layout = layout(2, ViewportSize::new(300, 500), ScrollAxis::Vertical);
        let planner = TileGridPlanner::default();
        let window = VisibleWindow::new(0.0, 0.0, 300.0, 900.0, 20.0);

        let mut keys = HashSet::new();
        for range in planner.render_ranges(&layout, &window, 2.0) {
            for cell in planner.cells(&range) {
                assert!(keys.insert(TileKey::new(cell.page, cell.bounds)));
            }
        }
        assert!(!keys.is_empty());
    }

    #[test]
    fn test_tile_key_compares_bounds_by_value() {
        let a = TileKey::new(1, RelativeBounds::new(0.0, 0.5, 0.5, 1.0));
        let b = TileKey::new(1, RelativeBounds::new(-0.0, 0.5, 0.5, 1.0));
        let c = TileKey::new(2, RelativeBounds::new(0.0, 0.5, 0.5, 1.0));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_window_never_projects_before_document_start() {
        let window = VisibleWindow::new(-40.0, 5.0, 100.0, 100.0, 20.0);
        assert_eq!(window.first_x, 0.0);
        assert_eq!(window.first_y, 0.0);
        assert_eq!(window.last_x, 120.0);
        assert_eq!(window.last_y, 125.0);
    }
}
