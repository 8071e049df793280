//! Pure calculation functions for crop geometry and resize dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! ## Crop geometry
//!
//! Crops are written the way ImageMagick reads them:
//!
//! | Form | Meaning |
//! |---|---|
//! | `300x200` | 300×200 region placed by gravity |
//! | `300x200+10+20` | same, shifted 10/20 px inward from the gravity anchor |
//! | `300x` / `x200` | missing side keeps the full source extent |
//! | `50%` / `50%x25%` | region relative to the source size |
//! | `16:9` | largest region with that aspect ratio |
//!
//! Gravity names are the nine compass anchors (`northwest` … `southeast`,
//! plus `center`), case-insensitive. An empty gravity anchors at the top-left
//! corner, as ImageMagick does when none is given.

use super::backend::BackendError;

/// Anchor used to position a crop region inside the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

/// Horizontal or vertical placement of an anchor along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    Middle,
    End,
}

impl Gravity {
    /// Parse a gravity name. Empty means [`Gravity::NorthWest`].
    pub fn parse(value: &str) -> Result<Self, BackendError> {
        let gravity = match value.trim().to_ascii_lowercase().as_str() {
            "" | "northwest" => Self::NorthWest,
            "north" => Self::North,
            "northeast" => Self::NorthEast,
            "west" => Self::West,
            "center" | "centre" => Self::Center,
            "east" => Self::East,
            "southwest" => Self::SouthWest,
            "south" => Self::South,
            "southeast" => Self::SouthEast,
            other => {
                return Err(BackendError::InvalidCrop(format!(
                    "unknown gravity '{}'",
                    other
                )));
            }
        };
        Ok(gravity)
    }

    fn edges(self) -> (Edge, Edge) {
        match self {
            Self::NorthWest => (Edge::Start, Edge::Start),
            Self::North => (Edge::Middle, Edge::Start),
            Self::NorthEast => (Edge::End, Edge::Start),
            Self::West => (Edge::Start, Edge::Middle),
            Self::Center => (Edge::Middle, Edge::Middle),
            Self::East => (Edge::End, Edge::Middle),
            Self::SouthWest => (Edge::Start, Edge::End),
            Self::South => (Edge::Middle, Edge::End),
            Self::SouthEast => (Edge::End, Edge::End),
        }
    }
}

/// Parsed crop geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum CropGeometry {
    /// Absolute size; `None` keeps the full source extent on that axis.
    Pixels {
        width: Option<u32>,
        height: Option<u32>,
        offset: (i64, i64),
    },
    /// Size relative to the source, in percent.
    Percent { width: f64, height: f64 },
    /// Largest region with this aspect ratio.
    Aspect { width: u32, height: u32 },
}

impl CropGeometry {
    pub fn parse(value: &str) -> Result<Self, BackendError> {
        let value = value.trim();
        let invalid = || BackendError::InvalidCrop(format!("invalid crop geometry '{}'", value));

        if let Some((w, h)) = value.split_once(':') {
            let width: u32 = w.trim().parse().map_err(|_| invalid())?;
            let height: u32 = h.trim().parse().map_err(|_| invalid())?;
            if width == 0 || height == 0 {
                return Err(invalid());
            }
            return Ok(Self::Aspect { width, height });
        }

        if value.contains('%') {
            let plain = value.replace('%', "");
            let (w, h) = match plain.split_once('x') {
                Some((w, h)) => (w.to_string(), h.to_string()),
                None => (plain.clone(), plain.clone()),
            };
            let width: f64 = w.parse().map_err(|_| invalid())?;
            let height: f64 = h.parse().map_err(|_| invalid())?;
            if !(width > 0.0 && width <= 100.0 && height > 0.0 && height <= 100.0) {
                return Err(invalid());
            }
            return Ok(Self::Percent { width, height });
        }

        let (size, offset) = split_offset(value).ok_or_else(invalid)?;
        let (w, h) = size.split_once('x').ok_or_else(invalid)?;
        let width = parse_extent(w).ok_or_else(invalid)?;
        let height = parse_extent(h).ok_or_else(invalid)?;
        if width.is_none() && height.is_none() {
            return Err(invalid());
        }
        Ok(Self::Pixels {
            width,
            height,
            offset,
        })
    }
}

/// `""` → `Some(None)`, `"120"` → `Some(Some(120))`, `"0"`/garbage → `None`.
fn parse_extent(s: &str) -> Option<Option<u32>> {
    if s.is_empty() {
        return Some(None);
    }
    match s.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(Some(n)),
    }
}

/// Split `WxH+X+Y` into `("WxH", (X, Y))`. Offsets default to zero.
fn split_offset(value: &str) -> Option<(&str, (i64, i64))> {
    let Some(start) = value.find(['+', '-']) else {
        return Some((value, (0, 0)));
    };
    let (size, offsets) = value.split_at(start);

    // offsets = "+X+Y", "-X+Y", "+X" ...
    let second = offsets[1..].find(['+', '-']).map(|i| i + 1);
    let (x, y) = match second {
        Some(i) => (&offsets[..i], &offsets[i..]),
        None => (offsets, "+0"),
    };
    let x: i64 = x.parse().ok()?;
    let y: i64 = y.parse().ok()?;
    Some((size, (x, y)))
}

/// A rectangle inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Calculate the crop region for a source of the given size.
///
/// The region is always inside the source and at least 1×1. Sizes larger
/// than the source are clamped to it.
pub fn crop_region(source: (u32, u32), geometry: &CropGeometry, gravity: Gravity) -> Region {
    let (src_w, src_h) = (source.0.max(1), source.1.max(1));

    let (crop_w, crop_h, offset) = match *geometry {
        CropGeometry::Pixels {
            width,
            height,
            offset,
        } => (
            width.unwrap_or(src_w).min(src_w),
            height.unwrap_or(src_h).min(src_h),
            offset,
        ),
        CropGeometry::Percent { width, height } => (
            scale_extent(src_w, width / 100.0),
            scale_extent(src_h, height / 100.0),
            (0, 0),
        ),
        CropGeometry::Aspect { width, height } => {
            let (w, h) = aspect_extent((src_w, src_h), (width, height));
            (w, h, (0, 0))
        }
    };

    let (edge_x, edge_y) = gravity.edges();
    Region {
        x: place(src_w, crop_w, edge_x, offset.0),
        y: place(src_h, crop_h, edge_y, offset.1),
        width: crop_w,
        height: crop_h,
    }
}

fn scale_extent(extent: u32, factor: f64) -> u32 {
    ((extent as f64 * factor).round() as u32).clamp(1, extent)
}

/// Largest `(w, h)` inside `source` with the aspect ratio `aspect`.
fn aspect_extent(source: (u32, u32), aspect: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (source.0 as u64, source.1 as u64);
    let (a_w, a_h) = (aspect.0 as u64, aspect.1 as u64);

    if src_w * a_h > src_h * a_w {
        // Source is wider than the target aspect: keep full height
        let w = (src_h as f64 * a_w as f64 / a_h as f64).round() as u32;
        (w.clamp(1, source.0), source.1)
    } else {
        let h = (src_w as f64 * a_h as f64 / a_w as f64).round() as u32;
        (source.0, h.clamp(1, source.1))
    }
}

/// Position a span of `len` inside `extent` along one axis.
///
/// Offsets move away from the anchored edge (rightward/downward from the
/// start, leftward/upward from the end) and the result is clamped so the
/// span stays inside the source.
fn place(extent: u32, len: u32, edge: Edge, offset: i64) -> u32 {
    let free = extent.saturating_sub(len) as i64;
    let pos = match edge {
        Edge::Start => offset,
        Edge::Middle => free / 2 + offset,
        Edge::End => free - offset,
    };
    pos.clamp(0, free) as u32
}

/// Height of an image resized to `target_width`, preserving aspect ratio.
pub fn resize_height(source: (u32, u32), target_width: u32) -> u32 {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return src_h.max(1);
    }
    let h = (src_h as f64 * target_width as f64 / src_w as f64).round() as u32;
    h.max(1)
}
