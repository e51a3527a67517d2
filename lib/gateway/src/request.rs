//! Caller-facing generation requests and their validation.

use crate::error::{FieldViolation, GatewayError};
use comfy_relay_core::Result;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

const DIMENSION_RANGE: RangeInclusive<i64> = 512..=2048;
const STEPS_RANGE: RangeInclusive<i64> = 1..=100;
const CFG_RANGE: RangeInclusive<f64> = 1.0..=30.0;

/// A request to generate an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Text prompt.
    pub prompt: String,
    /// Negative prompt.
    #[serde(default)]
    pub negative_prompt: String,
    /// Image width in pixels.
    #[serde(default = "default_width")]
    pub width: i64,
    /// Image height in pixels.
    #[serde(default = "default_height")]
    pub height: i64,
    /// Sampling steps.
    #[serde(default = "default_steps")]
    pub steps: i64,
    /// Classifier-free guidance scale.
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f64,
    /// Sampler seed; drawn at random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Checkpoint file; the gateway default when absent.
    #[serde(default)]
    pub checkpoint: Option<String>,
}

fn default_width() -> i64 {
    832
}

fn default_height() -> i64 {
    1216
}

fn default_steps() -> i64 {
    28
}

fn default_cfg_scale() -> f64 {
    6.5
}

/// A request whose fields are all within bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    /// Non-empty text prompt.
    pub prompt: String,
    /// Negative prompt, possibly empty.
    pub negative_prompt: String,
    /// Width in pixels, 512 to 2048.
    pub width: u32,
    /// Height in pixels, 512 to 2048.
    pub height: u32,
    /// Sampling steps, 1 to 100.
    pub steps: u32,
    /// Guidance scale, 1.0 to 30.0.
    pub cfg_scale: f64,
    /// Caller's seed, if one was given.
    pub seed: Option<u64>,
    /// Checkpoint file, with the gateway default applied.
    pub checkpoint: String,
}

impl GenerateRequest {
    /// Creates a request with default settings.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            width: default_width(),
            height: default_height(),
            steps: default_steps(),
            cfg_scale: default_cfg_scale(),
            seed: None,
            checkpoint: None,
        }
    }

    /// Checks every field against its bounds.
    ///
    /// # Errors
    ///
    /// Returns `Validation` listing every violation, in field order.
    pub fn validate(&self, default_checkpoint: &str) -> Result<ValidatedRequest, GatewayError> {
        let mut violations = Vec::new();

        if self.prompt.trim().is_empty() {
            violations.push(FieldViolation {
                field: "prompt",
                reason: "must not be empty".to_string(),
            });
        }
        let width = check_integer("width", self.width, DIMENSION_RANGE, &mut violations);
        let height = check_integer("height", self.height, DIMENSION_RANGE, &mut violations);
        let steps = check_integer("steps", self.steps, STEPS_RANGE, &mut violations);
        if !(self.cfg_scale.is_finite() && CFG_RANGE.contains(&self.cfg_scale)) {
            violations.push(FieldViolation {
                field: "cfg_scale",
                reason: format!(
                    "must be between {:.1} and {:.1}",
                    CFG_RANGE.start(),
                    CFG_RANGE.end()
                ),
            });
        }
        let checkpoint = self
            .checkpoint
            .as_deref()
            .unwrap_or(default_checkpoint)
            .trim();
        if checkpoint.is_empty() {
            violations.push(FieldViolation {
                field: "checkpoint",
                reason: "must not be empty".to_string(),
            });
        }

        if !violations.is_empty() {
            return Err(GatewayError::Validation { violations }.into());
        }

        Ok(ValidatedRequest {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            width,
            height,
            steps,
            cfg_scale: self.cfg_scale,
            seed: self.seed,
            checkpoint: checkpoint.to_string(),
        })
    }
}

fn check_integer(
    field: &'static str,
    value: i64,
    range: RangeInclusive<i64>,
    violations: &mut Vec<FieldViolation>,
) -> u32 {
    if range.contains(&value) {
        // The ranges all fit in u32.
        u32::try_from(value).unwrap_or_default()
    } else {
        violations.push(FieldViolation {
            field,
            reason: format!("must be between {} and {}", range.start(), range.end()),
        });
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKPOINT: &str = "bigLove_photo1.3.safetensors";

    fn violations(request: &GenerateRequest) -> Vec<FieldViolation> {
        match request.validate(CHECKPOINT) {
            Ok(_) => panic!("expected validation to fail"),
            Err(report) => match report.current_context() {
                GatewayError::Validation { violations } => violations.clone(),
                other => panic!("unexpected error: {other}"),
            },
        }
    }

    #[test]
    fn defaults_from_json() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"prompt": "a lighthouse at dusk"}"#).expect("valid");
        assert_eq!(request, GenerateRequest::new("a lighthouse at dusk"));

        let validated = request.validate(CHECKPOINT).expect("valid");
        assert_eq!(validated.width, 832);
        assert_eq!(validated.height, 1216);
        assert_eq!(validated.steps, 28);
        assert_eq!(validated.cfg_scale, 6.5);
        assert_eq!(validated.negative_prompt, "");
        assert_eq!(validated.seed, None);
        assert_eq!(validated.checkpoint, CHECKPOINT);
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut request = GenerateRequest::new("x");
        request.width = 512;
        request.height = 2048;
        request.steps = 100;
        request.cfg_scale = 1.0;
        assert!(request.validate(CHECKPOINT).is_ok());

        request.steps = 1;
        request.cfg_scale = 30.0;
        assert!(request.validate(CHECKPOINT).is_ok());
    }

    #[test]
    fn width_below_minimum() {
        let mut request = GenerateRequest::new("x");
        request.width = 500;
        let violations = violations(&request);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "width");
    }

    #[test]
    fn every_violation_is_reported() {
        let request = GenerateRequest {
            prompt: "   ".to_string(),
            negative_prompt: String::new(),
            width: 4096,
            height: -1,
            steps: 0,
            cfg_scale: f64::NAN,
            seed: None,
            checkpoint: Some(String::new()),
        };
        let fields: Vec<_> = violations(&request).iter().map(|v| v.field).collect();
        assert_eq!(
            fields,
            ["prompt", "width", "height", "steps", "cfg_scale", "checkpoint"]
        );
    }

    #[test]
    fn cfg_scale_above_maximum() {
        let mut request = GenerateRequest::new("x");
        request.cfg_scale = 30.5;
        assert_eq!(violations(&request)[0].field, "cfg_scale");
    }

    #[test]
    fn explicit_checkpoint_and_seed_are_kept() {
        let mut request = GenerateRequest::new("x");
        request.checkpoint = Some("sdxl_base_1.0.safetensors".to_string());
        request.seed = Some(42);
        let validated = request.validate(CHECKPOINT).expect("valid");
        assert_eq!(validated.checkpoint, "sdxl_base_1.0.safetensors");
        assert_eq!(validated.seed, Some(42));
    }
}
