//! 场景描述生成器接口
//!
//! `describe(image, seed)` 同步阻塞, 可能失败 (超时/模型错误), 无延迟上限.
//! 内置实现通过 Ollama 兼容的 HTTP 接口调用多模态模型.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 场景描述生成器
pub trait Describer {
    fn describe(&mut self, image: &RgbImage, seed: &str) -> Result<String>;
}

impl<D: Describer + ?Sized> Describer for Box<D> {
    fn describe(&mut self, image: &RgbImage, seed: &str) -> Result<String> {
        (**self).describe(image, seed)
    }
}

/// 生成器参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriberConfig {
    /// 服务地址, 如 http://localhost:11434
    pub endpoint: String,
    pub model: String,
    /// 最大生成token数 (防止模型编造日期等细节)
    pub max_new_tokens: u32,
    /// 重复惩罚 (避免 "cci cci cci")
    pub repetition_penalty: f32,
    /// 描述最少单词数, 过短视为失败
    pub min_words: usize,
    pub timeout_secs: u64,
    pub jpeg_quality: u8,
}

impl Default for DescriberConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            max_new_tokens: 20,
            repetition_penalty: 1.5,
            min_words: 3,
            timeout_secs: 30,
            jpeg_quality: 85,
        }
    }
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    repeat_penalty: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    images: Vec<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama 兼容的多模态描述生成器
pub struct OllamaDescriber {
    agent: ureq::Agent,
    config: DescriberConfig,
}

impl OllamaDescriber {
    pub fn new(config: DescriberConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { agent, config }
    }

    fn prompt(seed: &str) -> String {
        format!(
            "Describe this surveillance frame in one short sentence. Start the sentence with \"{}\".",
            seed
        )
    }
}

impl Describer for OllamaDescriber {
    fn describe(&mut self, image: &RgbImage, seed: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));

        let request = GenerateRequest {
            model: &self.config.model,
            prompt: Self::prompt(seed),
            images: vec![encode_jpeg_base64(image, self.config.jpeg_quality)?],
            stream: false,
            options: GenerateOptions {
                num_predict: self.config.max_new_tokens,
                repeat_penalty: self.config.repetition_penalty,
            },
        };

        debug!("📤 描述请求: {} (模型 {})", url, self.config.model);

        let response: GenerateResponse = self
            .agent
            .post(&url)
            .send_json(&request)
            .with_context(|| format!("描述服务请求失败: {}", url))?
            .into_json()
            .context("描述服务响应解析失败")?;

        let description = anchor_description(&response.response, seed);
        if description.split_whitespace().count() < self.config.min_words {
            bail!("描述过短: {:?}", description);
        }
        Ok(description)
    }
}

/// 保证描述以种子短语开头
pub fn anchor_description(raw: &str, seed: &str) -> String {
    let text = raw.trim().trim_matches('"').trim();
    if text.to_lowercase().starts_with(&seed.to_lowercase()) {
        text.to_string()
    } else {
        format!("{} {}", seed, text)
    }
}

/// RGB图像 → JPEG → Base64
pub fn encode_jpeg_base64(image: &RgbImage, quality: u8) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(image)
        .context("JPEG编码失败")?;
    Ok(BASE64.encode(buffer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_description() {
        assert_eq!(
            anchor_description("walking across the street", "A person is"),
            "A person is walking across the street"
        );
        assert_eq!(
            anchor_description(" \"a person is sitting\" ", "A person is"),
            "a person is sitting"
        );
    }

    #[test]
    fn test_encode_jpeg_base64() {
        let image = RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]));
        let encoded = encode_jpeg_base64(&image, 80).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        // JPEG SOI
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_unreachable_service_is_error() {
        let mut describer = OllamaDescriber::new(DescriberConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..DescriberConfig::default()
        });
        let image = RgbImage::new(4, 4);
        assert!(describer.describe(&image, "A photo of").is_err());
    }
}
