//! Encoding quality lookup.
//!
//! The generator asks a [`QualityResolver`] for the quality of every variant
//! it builds, keyed by resolved format and target width. The result feeds
//! both the encoder and the variant identity.
//!
//! [`QualityTable`] is the configured implementation: a default plus
//! per-format entries that are either fixed or a width curve.
//!
//! ```text
//! jpg = [[400, 85], [1600, 65]]
//!
//!  width:  200   400   1000   1600   3000
//! quality:  85    85     75     65     65
//! ```

use crate::config::{QualityConfig, QualitySetting};
use std::collections::BTreeMap;

/// Maps `(format, width)` to an encoding quality in 1–100.
pub trait QualityResolver: Send + Sync {
    fn quality(&self, format: &str, width: u32) -> u32;
}

impl<F> QualityResolver for F
where
    F: Fn(&str, u32) -> u32 + Send + Sync,
{
    fn quality(&self, format: &str, width: u32) -> u32 {
        self(format, width)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Fixed(u32),
    /// Points sorted by width.
    Curve(Vec<(u32, u32)>),
}

/// Quality table built from [`QualityConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct QualityTable {
    default: u32,
    formats: BTreeMap<String, Entry>,
}

impl QualityTable {
    /// One quality for every format and width.
    pub fn fixed(quality: u32) -> Self {
        Self {
            default: quality,
            formats: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        let formats = config
            .formats
            .iter()
            .map(|(format, setting)| {
                let entry = match setting {
                    QualitySetting::Fixed(q) => Entry::Fixed(*q),
                    QualitySetting::Curve(points) => {
                        let mut points: Vec<(u32, u32)> =
                            points.iter().map(|[w, q]| (*w, *q)).collect();
                        points.sort_unstable_by_key(|(w, _)| *w);
                        Entry::Curve(points)
                    }
                };
                (format.to_lowercase(), entry)
            })
            .collect();
        Self {
            default: config.default,
            formats,
        }
    }
}

impl Default for QualityTable {
    fn default() -> Self {
        Self::from_config(&QualityConfig::default())
    }
}

impl QualityResolver for QualityTable {
    fn quality(&self, format: &str, width: u32) -> u32 {
        match self.formats.get(&format.to_lowercase()) {
            Some(Entry::Fixed(q)) => *q,
            Some(Entry::Curve(points)) => interpolate(points, width).unwrap_or(self.default),
            None => self.default,
        }
    }
}

/// Piecewise-linear lookup, clamped to the end points.
fn interpolate(points: &[(u32, u32)], width: u32) -> Option<u32> {
    let &(first_w, first_q) = points.first()?;
    let &(last_w, last_q) = points.last()?;
    if width <= first_w {
        return Some(first_q);
    }
    if width >= last_w {
        return Some(last_q);
    }
    points.windows(2).find_map(|pair| {
        let (w0, q0) = pair[0];
        let (w1, q1) = pair[1];
        if width < w0 || width > w1 {
            return None;
        }
        let t = f64::from(width - w0) / f64::from(w1 - w0);
        let q = f64::from(q0) + t * (f64::from(q1) - f64::from(q0));
        Some(q.round() as u32)
    })
}
