//! Configuration options for the selection-and-outline pipeline.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::outline::{OutlineMaterial, DEFAULT_OUTLINE_COLOR, DEFAULT_OUTLINE_OFFSET};
use crate::pick::{RayPicker, DEFAULT_LINE_PRECISION};
use crate::renderable::hex_to_rgb;
use crate::selection::LineWidths;

/// Pipeline configuration. Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Distance under which a ray touches a line segment.
    pub line_precision: f32,

    /// Outline offset along vertex normals.
    pub outline_offset: f32,

    /// Outline fill color.
    pub outline_color: Vec3,

    /// Whether the mask excludes (rather than includes) the covered pixels.
    pub mask_inverse: bool,

    /// Background color of the scene pass.
    pub clear_color: Vec3,

    /// Line widths in pixels.
    pub line_widths: LineWidths,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            line_precision: DEFAULT_LINE_PRECISION,
            outline_offset: DEFAULT_OUTLINE_OFFSET,
            outline_color: DEFAULT_OUTLINE_COLOR,
            mask_inverse: true,
            clear_color: hex_to_rgb(0x0020_2020),
            line_widths: LineWidths::default(),
        }
    }
}

impl PipelineOptions {
    /// Parses options from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HaloError::Json`] on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O or JSON error.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serializes the options as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HaloError::Json`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The outline material described by these options.
    #[must_use]
    pub fn outline_material(&self) -> OutlineMaterial {
        OutlineMaterial::new(self.outline_offset, self.outline_color)
    }

    /// A picker using the configured line precision.
    #[must_use]
    pub fn picker(&self) -> RayPicker {
        RayPicker::new(self.line_precision)
    }
}
