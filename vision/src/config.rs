/// Builder-style configuration for remote vision services.
pub struct VisionConfig {
    pub base_url: String,
    pub dimension: usize,
    pub api_key: String,
}

impl VisionConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            dimension: 0,
            api_key: String::new(),
        }
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = key.to_string();
        self
    }
}
