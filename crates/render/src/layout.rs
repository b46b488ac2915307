//! Page geometry
//!
//! Lays pages out into one continuous strip along the scroll axis. All values
//! are in layout units at zoom 1; callers multiply by the current zoom.

use serde::{Deserialize, Serialize};

use crate::document::PageSize;

/// Floating point size in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizeF {
    pub width: f32,
    pub height: f32,
}

impl SizeF {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, zoom: f32) -> Self {
        Self::new(self.width * zoom, self.height * zoom)
    }
}

/// Viewport size in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// How a page's intrinsic size maps to its on-screen size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    #[default]
    Width,
    Height,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollAxis {
    #[default]
    Vertical,
    Horizontal,
}

impl ScrollAxis {
    pub fn is_vertical(self) -> bool {
        self == ScrollAxis::Vertical
    }

    /// Extent along the scroll axis.
    pub fn main(self, size: SizeF) -> f32 {
        match self {
            ScrollAxis::Vertical => size.height,
            ScrollAxis::Horizontal => size.width,
        }
    }

    /// Extent across the scroll axis.
    pub fn cross(self, size: SizeF) -> f32 {
        match self {
            ScrollAxis::Vertical => size.width,
            ScrollAxis::Horizontal => size.height,
        }
    }
}

/// Gaps between and around pages, in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacingConfig {
    pub page_separator: f32,
    pub start: f32,
    pub end: f32,
    /// Pad pages shorter than the viewport so they are shown one at a time.
    pub auto_spacing: bool,
}

/// Scales pages according to a [`FitPolicy`].
///
/// Reference sizes come from the widest and the tallest page so pages with
/// differing aspect ratios stay proportional to each other.
#[derive(Debug, Clone)]
pub struct PageSizeCalculator {
    fit_policy: FitPolicy,
    viewport: SizeF,
    fit_each_page: bool,
    optimal_max_width_page_size: SizeF,
    optimal_max_height_page_size: SizeF,
    width_ratio: f32,
    height_ratio: f32,
}

impl PageSizeCalculator {
    pub fn new(
        fit_policy: FitPolicy,
        widest_page: PageSize,
        tallest_page: PageSize,
        viewport: ViewportSize,
        fit_each_page: bool,
    ) -> Self {
        let mut calculator = Self {
            fit_policy,
            viewport: SizeF::new(viewport.width as f32, viewport.height as f32),
            fit_each_page,
            optimal_max_width_page_size: SizeF::default(),
            optimal_max_height_page_size: SizeF::default(),
            width_ratio: 0.0,
            height_ratio: 0.0,
        };
        if is_valid(widest_page) && is_valid(tallest_page) {
            calculator.calculate_max_pages(widest_page, tallest_page);
        }
        calculator
    }

    pub fn optimal_max_width_page_size(&self) -> SizeF {
        self.optimal_max_width_page_size
    }

    pub fn optimal_max_height_page_size(&self) -> SizeF {
        self.optimal_max_height_page_size
    }

    pub fn calculate(&self, page: PageSize) -> SizeF {
        if !is_valid(page) {
            return SizeF::default();
        }
        let (max_width, max_height) = if self.fit_each_page {
            (self.viewport.width, self.viewport.height)
        } else {
            (page.width * self.width_ratio, page.height * self.height_ratio)
        };
        match self.fit_policy {
            FitPolicy::Width => fit_width(page, max_width),
            FitPolicy::Height => fit_height(page, max_height),
            FitPolicy::Both => fit_both(page, max_width, max_height),
        }
    }

    fn calculate_max_pages(&mut self, max_width_page: PageSize, max_height_page: PageSize) {
        let view = self.viewport;
        match self.fit_policy {
            FitPolicy::Width => {
                let optimal_width = fit_width(max_width_page, view.width);
                self.width_ratio = optimal_width.width / max_width_page.width;
                self.optimal_max_height_page_size =
                    fit_width(max_height_page, max_height_page.width * self.width_ratio);
                self.optimal_max_width_page_size = optimal_width;
            }
            FitPolicy::Height => {
                let optimal_height = fit_height(max_height_page, view.height);
                self.height_ratio = optimal_height.height / max_height_page.height;
                self.optimal_max_width_page_size =
                    fit_height(max_width_page, max_width_page.height * self.height_ratio);
                self.optimal_max_height_page_size = optimal_height;
            }
            FitPolicy::Both => {
                let local_max_width = fit_both(max_width_page, view.width, view.height);
                let local_width_ratio = local_max_width.width / max_width_page.width;
                let optimal_height = fit_both(
                    max_height_page,
                    max_height_page.width * local_width_ratio,
                    view.height,
                );
                self.height_ratio = optimal_height.height / max_height_page.height;
                let optimal_width = fit_both(
                    max_width_page,
                    view.width,
                    max_width_page.height * self.height_ratio,
                );
                self.width_ratio = optimal_width.width / max_width_page.width;
                self.optimal_max_height_page_size = optimal_height;
                self.optimal_max_width_page_size = optimal_width;
            }
        }
    }
}

fn is_valid(page: PageSize) -> bool {
    page.width > 0.0 && page.height > 0.0
}

fn fit_width(page: PageSize, max_width: f32) -> SizeF {
    let ratio = page.width / page.height;
    SizeF::new(max_width, (max_width / ratio).floor())
}

fn fit_height(page: PageSize, max_height: f32) -> SizeF {
    let ratio = page.height / page.width;
    SizeF::new((max_height / ratio).floor(), max_height)
}

fn fit_both(page: PageSize, max_width: f32, max_height: f32) -> SizeF {
    let ratio = page.width / page.height;
    let height = (max_width / ratio).floor();
    if height > max_height {
        SizeF::new((max_height * ratio).floor(), max_height)
    } else {
        SizeF::new(max_width, height)
    }
}

/// Options that shape the strip independent of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutOptions {
    pub axis: ScrollAxis,
    pub fit_policy: FitPolicy,
    pub fit_each_page: bool,
    pub spacing: SpacingConfig,
}

/// Derived geometry of one page.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageLayout {
    pub intrinsic_size: PageSize,
    pub scaled_size: SizeF,
    /// Distance from the document start to the page's leading edge.
    pub offset: f32,
    /// Gap attributed to this page.
    pub spacing: f32,
}

/// Layout of every page into the strip.
#[derive(Debug, Clone)]
pub struct DocumentLayout {
    options: LayoutOptions,
    viewport: ViewportSize,
    intrinsic_sizes: Vec<PageSize>,
    widest_page: PageSize,
    tallest_page: PageSize,
    pages: Vec<PageLayout>,
    max_width_page_size: SizeF,
    max_height_page_size: SizeF,
    document_length: f32,
}

impl DocumentLayout {
    pub fn new(intrinsic_sizes: Vec<PageSize>, viewport: ViewportSize, options: LayoutOptions) -> Self {
        let mut widest_page = PageSize::default();
        let mut tallest_page = PageSize::default();
        for size in &intrinsic_sizes {
            if size.width > widest_page.width {
                widest_page = *size;
            }
            if size.height > tallest_page.height {
                tallest_page = *size;
            }
        }

        let mut layout = Self {
            options,
            viewport,
            intrinsic_sizes,
            widest_page,
            tallest_page,
            pages: Vec::new(),
            max_width_page_size: SizeF::default(),
            max_height_page_size: SizeF::default(),
            document_length: 0.0,
        };
        layout.recalculate(viewport);
        layout
    }

    /// Recompute scaled sizes, spacing, offsets and document length for a new viewport.
    pub fn recalculate(&mut self, viewport: ViewportSize) {
        self.viewport = viewport;
        let calculator = PageSizeCalculator::new(
            self.options.fit_policy,
            self.widest_page,
            self.tallest_page,
            viewport,
            self.options.fit_each_page,
        );
        self.max_width_page_size = calculator.optimal_max_width_page_size();
        self.max_height_page_size = calculator.optimal_max_height_page_size();

        let axis = self.options.axis;
        let spacing = self.options.spacing;
        let count = self.intrinsic_sizes.len();
        let view_main = match axis {
            ScrollAxis::Vertical => viewport.height as f32,
            ScrollAxis::Horizontal => viewport.width as f32,
        };

        let mut pages: Vec<PageLayout> = self
            .intrinsic_sizes
            .iter()
            .enumerate()
            .map(|(i, &intrinsic_size)| {
                let scaled_size = calculator.calculate(intrinsic_size);
                let page_spacing = if spacing.auto_spacing {
                    let mut gap = (view_main - axis.main(scaled_size)).max(0.0);
                    if i + 1 < count {
                        gap += spacing.page_separator;
                    }
                    gap
                } else {
                    spacing.page_separator
                };
                PageLayout {
                    intrinsic_size,
                    scaled_size,
                    offset: 0.0,
                    spacing: page_spacing,
                }
            })
            .collect();

        let mut length = 0.0;
        let mut offset = 0.0;
        for (i, page) in pages.iter_mut().enumerate() {
            let size = axis.main(page.scaled_size);
            length += size;
            if spacing.auto_spacing {
                length += page.spacing;
                offset += page.spacing / 2.0;
                if i == 0 {
                    offset -= spacing.page_separator / 2.0;
                } else if i + 1 == count {
                    offset += spacing.page_separator / 2.0;
                }
                page.offset = offset;
                offset += size + page.spacing / 2.0;
            } else {
                if i + 1 < count {
                    length += spacing.page_separator;
                }
                if i == 0 {
                    offset += spacing.start;
                }
                page.offset = offset;
                offset += size + spacing.page_separator;
            }
        }

        self.document_length = length + spacing.start + spacing.end;
        self.pages = pages;
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn axis(&self) -> ScrollAxis {
        self.options.axis
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn pages(&self) -> &[PageLayout] {
        &self.pages
    }

    pub fn page(&self, page_index: u32) -> Option<&PageLayout> {
        self.pages.get(page_index as usize)
    }

    /// Scaled page size at zoom 1. Unknown pages are empty.
    pub fn page_size(&self, page_index: u32) -> SizeF {
        self.page(page_index).map(|page| page.scaled_size).unwrap_or_default()
    }

    pub fn scaled_page_size(&self, page_index: u32, zoom: f32) -> SizeF {
        self.page_size(page_index).scaled(zoom)
    }

    /// Page extent along the scroll axis.
    pub fn page_length(&self, page_index: u32, zoom: f32) -> f32 {
        self.options.axis.main(self.page_size(page_index)) * zoom
    }

    pub fn page_spacing(&self, page_index: u32, zoom: f32) -> f32 {
        let spacing = if self.options.spacing.auto_spacing {
            self.page(page_index).map(|page| page.spacing).unwrap_or_default()
        } else {
            self.options.spacing.page_separator
        };
        spacing * zoom
    }

    /// Offset of the page's leading edge along the scroll axis.
    pub fn page_offset(&self, page_index: u32, zoom: f32) -> f32 {
        self.page(page_index).map(|page| page.offset * zoom).unwrap_or_default()
    }

    /// Centering offset of a page against the widest (vertical) or tallest
    /// (horizontal) page.
    pub fn secondary_page_offset(&self, page_index: u32, zoom: f32) -> f32 {
        let size = self.page_size(page_index);
        let axis = self.options.axis;
        zoom * (axis.cross(self.max_page_size()) - axis.cross(size)) / 2.0
    }

    /// The page that bounds the cross axis.
    pub fn max_page_size(&self) -> SizeF {
        match self.options.axis {
            ScrollAxis::Vertical => self.max_width_page_size,
            ScrollAxis::Horizontal => self.max_height_page_size,
        }
    }

    pub fn max_page_width(&self) -> f32 {
        self.max_page_size().width
    }

    pub fn max_page_height(&self) -> f32 {
        self.max_page_size().height
    }

    pub fn doc_len(&self, zoom: f32) -> f32 {
        self.document_length * zoom
    }

    /// Greatest page whose leading edge, less half its spacing, is at or before `offset`.
    pub fn page_at_offset(&self, offset: f32, zoom: f32) -> u32 {
        let count = self.pages.partition_point(|page| {
            let spacing = if self.options.spacing.auto_spacing {
                page.spacing
            } else {
                self.options.spacing.page_separator
            };
            page.offset * zoom - spacing * zoom / 2.0 <= offset
        });
        count.saturating_sub(1) as u32
    }
}
