use crate::domain::model::GenerationParams;
use crate::utils::error::Result;
use async_trait::async_trait;

/// HTTP 層與推論層之間的接口
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// 回傳完整解碼結果 (含 prompt 前綴)
    async fn generate(&self, prompt: String) -> Result<String>;

    fn params(&self) -> &GenerationParams;

    fn device_name(&self) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn model_path(&self) -> &str;
    fn bind_address(&self) -> String;
    fn device(&self) -> &str;
    fn dtype(&self) -> &str;
    fn generation_params(&self) -> GenerationParams;
}
