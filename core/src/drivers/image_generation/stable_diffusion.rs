use serde::Deserialize;
use serde_json::{json, Value};

use super::{decode_image, ImageModelDriver, ImageRequest};
use crate::{artifacts::ImageArtifact, config::parse_config, drivers::DriverError};

const DRIVER: &str = "StableDiffusionImageModel";

/// Request/response shapes of Stability AI's JSON generation API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StableDiffusionImageModel {
    pub cfg_scale: u32,
    pub steps: u32,
    pub style_preset: Option<String>,
    pub clip_guidance_preset: Option<String>,
    pub sampler: Option<String>,
    /// Share of the input image kept in image-to-image runs.
    pub image_strength: f64,
}

impl Default for StableDiffusionImageModel {
    fn default() -> Self {
        Self {
            cfg_scale: 7,
            steps: 30,
            style_preset: None,
            clip_guidance_preset: None,
            sampler: None,
            image_strength: 0.35,
        }
    }
}

impl StableDiffusionImageModel {
    pub fn from_config(json_config: Option<&str>) -> Result<Self, DriverError> {
        parse_config(DRIVER, json_config)
    }

    fn base_parameters(&self, request: &ImageRequest<'_>) -> Value {
        let mut text_prompts: Vec<Value> = request
            .prompts
            .iter()
            .map(|p| json!({"text": p, "weight": 1.0}))
            .collect();
        if let Some(negative) = request.negative_prompts {
            text_prompts.extend(negative.iter().map(|p| json!({"text": p, "weight": -1.0})));
        }

        let mut params = json!({
            "text_prompts": text_prompts,
            "cfg_scale": self.cfg_scale,
            "steps": self.steps,
        });
        let optional = [
            ("style_preset", self.style_preset.as_ref().map(|v| json!(v))),
            (
                "clip_guidance_preset",
                self.clip_guidance_preset.as_ref().map(|v| json!(v)),
            ),
            ("sampler", self.sampler.as_ref().map(|v| json!(v))),
            ("seed", request.seed.map(|v| json!(v))),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                params[key] = value;
            }
        }
        params
    }
}

impl ImageModelDriver for StableDiffusionImageModel {
    fn name(&self) -> &'static str {
        DRIVER
    }

    fn text_to_image_request_parameters(&self, request: &ImageRequest<'_>) -> Value {
        let mut params = self.base_parameters(request);
        params["width"] = json!(request.width);
        params["height"] = json!(request.height);
        params
    }

    fn image_to_image_request_parameters(
        &self,
        request: &ImageRequest<'_>,
        input_image: &ImageArtifact,
        mask_image: Option<&ImageArtifact>,
    ) -> Value {
        let mut params = self.base_parameters(request);
        params["init_image"] = json!(input_image.base64());
        match mask_image {
            Some(mask) => {
                params["mask_source"] = json!("MASK_IMAGE_BLACK");
                params["mask_image"] = json!(mask.base64());
            }
            None => {
                params["init_image_mode"] = json!("IMAGE_STRENGTH");
                params["image_strength"] = json!(self.image_strength);
            }
        }
        params
    }

    fn process_output(&self, output: Value) -> Result<Vec<u8>, DriverError> {
        let artifact = &output["artifacts"][0];
        if let Some(reason) = artifact["finishReason"].as_str() {
            if reason != "SUCCESS" {
                return Err(DriverError::protocol(
                    DRIVER,
                    "process_output",
                    format!("Image generation finished with {reason}"),
                ));
            }
        }
        decode_image(DRIVER, "process_output", artifact["base64"].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(prompts: &'a [String], negative: Option<&'a [String]>) -> ImageRequest<'a> {
        ImageRequest {
            prompts,
            negative_prompts: negative,
            width: 512,
            height: 256,
            seed: Some(42),
        }
    }

    #[test]
    fn test_text_to_image_parameters() {
        let prompts = vec!["fox".to_string()];
        let negative = vec!["blurry".to_string()];
        let params = StableDiffusionImageModel::default()
            .text_to_image_request_parameters(&request(&prompts, Some(&negative)));
        assert_eq!(
            params["text_prompts"],
            json!([{"text": "fox", "weight": 1.0}, {"text": "blurry", "weight": -1.0}])
        );
        assert_eq!(params["width"], 512);
        assert_eq!(params["height"], 256);
        assert_eq!(params["seed"], 42);
        assert!(params.get("style_preset").is_none());
    }

    #[test]
    fn test_image_to_image_with_mask() {
        let prompts = vec!["fox".to_string()];
        let input = ImageArtifact::new(b"in".to_vec(), "png", 1, 1);
        let mask = ImageArtifact::new(b"mask".to_vec(), "png", 1, 1);
        let model = StableDiffusionImageModel::default();

        let masked = model.image_to_image_request_parameters(&request(&prompts, None), &input, Some(&mask));
        assert_eq!(masked["init_image"], "aW4=");
        assert_eq!(masked["mask_source"], "MASK_IMAGE_BLACK");
        assert!(masked.get("width").is_none());

        let unmasked = model.image_to_image_request_parameters(&request(&prompts, None), &input, None);
        assert_eq!(unmasked["init_image_mode"], "IMAGE_STRENGTH");
    }

    #[test]
    fn test_filtered_output_is_rejected() {
        let output = json!({"artifacts": [{"base64": "", "finishReason": "CONTENT_FILTERED"}]});
        assert!(StableDiffusionImageModel::default().process_output(output).is_err());
    }

    #[test]
    fn test_from_config() {
        let model = StableDiffusionImageModel::from_config(Some(r#"{"steps": 50}"#)).unwrap();
        assert_eq!(model.steps, 50);
        assert_eq!(model.cfg_scale, 7);
    }
}
