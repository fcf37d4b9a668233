use serde::{Deserialize, Serialize};

use crate::config::LimitsConfig;
use crate::error::{RenderError, Result};

/// Output dimensions in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Size {
    #[serde(default = "default_width")]
    pub w: u32,
    #[serde(default = "default_height")]
    pub h: u32,
}

impl Default for Size {
    fn default() -> Self {
        Self {
            w: default_width(),
            h: default_height(),
        }
    }
}

/// One still image shown for a number of seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "default_seconds")]
    pub seconds: f64,
}

impl Scene {
    /// Scenes with no image or a non-positive duration are skipped, not
    /// rejected.
    pub fn is_usable(&self) -> bool {
        !clean_url(&self.image_url).is_empty() && self.seconds > 0.0
    }
}

/// A render request as received on the wire. Immutable once decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub size: Size,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub audio_url: String,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

impl RenderRequest {
    /// Scenes that will actually be rendered, with cleaned URLs.
    pub fn usable_scenes(&self) -> impl Iterator<Item = (String, f64)> + '_ {
        self.scenes
            .iter()
            .filter(|s| s.is_usable())
            .map(|s| (clean_url(&s.image_url), s.seconds))
    }

    pub fn audio_url(&self) -> String {
        clean_url(&self.audio_url)
    }

    /// Reject malformed requests before any slot or workspace is allocated.
    pub fn validate(&self, limits: &LimitsConfig) -> Result<()> {
        if self.scenes.is_empty() {
            return Err(RenderError::Validation("scenes is empty".to_string()));
        }
        if self.scenes.len() > limits.max_scenes {
            return Err(RenderError::Validation(format!(
                "too many scenes: {} (max {})",
                self.scenes.len(),
                limits.max_scenes
            )));
        }
        if self.usable_scenes().next().is_none() {
            return Err(RenderError::Validation(
                "no usable scenes (need an image_url and positive seconds)".to_string(),
            ));
        }

        let audio = self.audio_url();
        if audio.is_empty() {
            return Err(RenderError::Validation("audio_url is empty".to_string()));
        }
        validate_url(&audio)?;
        for (url, _) in self.usable_scenes() {
            validate_url(&url)?;
        }

        if self.fps == 0 || self.fps > limits.max_fps {
            return Err(RenderError::Validation(format!(
                "fps must be between 1 and {}",
                limits.max_fps
            )));
        }
        let Size { w, h } = self.size;
        if w < 16 || h < 16 || w > limits.max_dimension || h > limits.max_dimension {
            return Err(RenderError::Validation(format!(
                "size must be between 16x16 and {0}x{0}",
                limits.max_dimension
            )));
        }

        Ok(())
    }
}

/// Strip whitespace and one pair of surrounding quotes, keeping the URL
/// otherwise exactly as sent.
pub fn clean_url(url: &str) -> String {
    let s = url.trim();
    let quoted = (s.starts_with('"') && s.ends_with('"'))
        || (s.starts_with('\'') && s.ends_with('\''));
    if quoted && s.len() >= 2 {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(RenderError::Validation(format!(
            "unsupported input URL (http/https only): {url}"
        )))
    }
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_fps() -> u32 {
    24
}

fn default_seconds() -> f64 {
    5.0
}
