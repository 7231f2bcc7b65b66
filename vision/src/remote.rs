use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::VisionConfig;
use crate::detect::{Detection, Detector, Region};
use crate::embed::ImageEmbedder;
use crate::error::VisionError;

const DEFAULT_DIM: usize = 512;

/// Embedding request body. Images travel as base64; the service crops the
/// region and runs the backbone.
#[derive(Serialize)]
struct EmbedRequest<'a> {
    image: &'a str,
    region: Region,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f64>,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct DetectResponse {
    detections: Vec<Detection>,
}

/// RemoteEmbedder calls an HTTP embedding service implementing
/// `POST {base_url}/embed`.
pub struct RemoteEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    dim: usize,
}

impl RemoteEmbedder {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(VisionConfig::new(base_url))
    }

    pub fn with_config(cfg: VisionConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: cfg.base_url,
            api_key: cfg.api_key,
            dim: if cfg.dimension == 0 {
                DEFAULT_DIM
            } else {
                cfg.dimension
            },
        }
    }
}

#[async_trait::async_trait]
impl ImageEmbedder for RemoteEmbedder {
    async fn embed(&self, image: &[u8], region: Region) -> Result<Vec<f32>, VisionError> {
        if image.is_empty() {
            return Err(VisionError::EmptyImage);
        }

        let url = format!("{}/embed", self.base_url);
        let encoded = B64.encode(image);
        let body = EmbedRequest {
            image: &encoded,
            region,
        };

        let data: EmbedResponse = post_json(&self.client, &url, &self.api_key, &body).await?;

        if data.embedding.len() != self.dim {
            return Err(VisionError::Dimension {
                got: data.embedding.len(),
                want: self.dim,
            });
        }

        // float64 on the wire, f32 in the index.
        Ok(data.embedding.iter().map(|&v| v as f32).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// RemoteDetector calls an HTTP detection service implementing
/// `POST {base_url}/detect`.
pub struct RemoteDetector {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RemoteDetector {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(VisionConfig::new(base_url))
    }

    pub fn with_config(cfg: VisionConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: cfg.base_url,
            api_key: cfg.api_key,
        }
    }
}

#[async_trait::async_trait]
impl Detector for RemoteDetector {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, VisionError> {
        if image.is_empty() {
            return Err(VisionError::EmptyImage);
        }

        let url = format!("{}/detect", self.base_url);
        let encoded = B64.encode(image);
        let body = DetectRequest { image: &encoded };

        let data: DetectResponse = post_json(&self.client, &url, &self.api_key, &body).await?;
        Ok(data.detections)
    }
}

async fn post_json<B, R>(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &B,
) -> Result<R, VisionError>
where
    B: Serialize,
    R: for<'de> Deserialize<'de>,
{
    let mut req = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(body);
    if !api_key.is_empty() {
        req = req.header("Authorization", format!("Bearer {api_key}"));
    }

    let resp = req
        .send()
        .await
        .map_err(|e| VisionError::Api(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(VisionError::Api(format!("HTTP {status}: {body}")));
    }

    resp.json().await.map_err(|e| VisionError::Api(e.to_string()))
}
