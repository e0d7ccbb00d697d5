use crate::config::UploadConfig;
use crate::{debug, info};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::header::CONTENT_TYPE;
use serde::Serialize;
use simd_json::derived::ValueObjectAccessAsScalar;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("图片文件不存在: {0}")]
    NotFound(PathBuf),

    #[error("图片文件过大: {size} 字节 (上限 {limit} 字节)")]
    TooLarge { size: u64, limit: u64 },

    #[error("读取图片失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("上传请求失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("图床返回异常状态码: {0}")]
    Status(u16),

    #[error("图床拒绝上传 (code={code}): {msg}")]
    Api { code: i64, msg: String },

    #[error("图床响应缺少图片 URL")]
    MissingUrl,
}

#[derive(Serialize)]
struct UploadBody<'a> {
    #[serde(rename = "imageData")]
    image_data: &'a str,
}

/// 图床上传器：把本地图片转为公网可访问的 URL。
/// 通过 Base64 Data URI 提交到第三方接口。
pub struct Uploader {
    client: reqwest::Client,
    api_url: String,
    max_bytes: u64,
}

impl Uploader {
    pub fn new(config: &UploadConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url: config.api_url.clone(),
            max_bytes: config.max_size_mb * 1024 * 1024,
        }
    }

    /// 从本地路径上传图片，成功返回公网 URL
    pub async fn upload_path(&self, path: &Path) -> Result<String, UploadError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| UploadError::NotFound(path.to_path_buf()))?;

        if meta.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: meta.len(),
                limit: self.max_bytes,
            });
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| UploadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("png");

        self.upload_bytes(&bytes, extension).await
    }

    /// 从字节数据上传图片
    pub async fn upload_bytes(
        &self,
        bytes: &[u8],
        extension: &str,
    ) -> Result<String, UploadError> {
        let data_uri = build_data_uri(bytes, extension);
        debug!(target: "Upload", "提交图片 {} 字节 -> {}", bytes.len(), self.api_url);

        let body = serde_json::to_string(&UploadBody {
            image_data: &data_uri,
        })
        .expect("upload body serialization cannot fail");

        let response = self
            .client
            .post(&self.api_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }

        let mut raw = response.bytes().await?.to_vec();
        let url = parse_upload_response(&mut raw)?;
        info!(target: "Upload", "图片上传成功: {}", url);
        Ok(url)
    }
}

/// 构造 Base64 Data URI
fn build_data_uri(bytes: &[u8], extension: &str) -> String {
    format!("data:{};base64,{}", mime_type(extension), BASE64.encode(bytes))
}

/// 根据扩展名确定 MIME 类型，未知类型按 png 处理
fn mime_type(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "image/png",
    }
}

/// 解析图床响应: { code, msg?, image_url }
fn parse_upload_response(raw: &mut [u8]) -> Result<String, UploadError> {
    let value = simd_json::to_owned_value(raw).map_err(|_| UploadError::MissingUrl)?;

    let code = value
        .get_i64("code")
        .or_else(|| value.get_u64("code").map(|v| v as i64))
        .unwrap_or(-1);
    if code != 200 {
        let msg = value.get_str("msg").unwrap_or("未知错误").to_string();
        return Err(UploadError::Api { code, msg });
    }

    value
        .get_str("image_url")
        .map(|s| s.to_string())
        .ok_or(UploadError::MissingUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_covers_common_extensions() {
        assert_eq!(mime_type("png"), "image/png");
        assert_eq!(mime_type(".JPG"), "image/jpeg");
        assert_eq!(mime_type("jpeg"), "image/jpeg");
        assert_eq!(mime_type("webp"), "image/webp");
        assert_eq!(mime_type("unknown"), "image/png");
    }

    #[test]
    fn data_uri_has_mime_and_payload() {
        let uri = build_data_uri(b"ab", "gif");
        assert!(uri.starts_with("data:image/gif;base64,"));
        assert!(uri.ends_with(&BASE64.encode(b"ab")));
    }

    #[test]
    fn parse_accepts_success_response() {
        let mut raw =
            br#"{"code": 200, "image_url": "https://img.example.com/a.png"}"#.to_vec();
        assert_eq!(
            parse_upload_response(&mut raw).unwrap(),
            "https://img.example.com/a.png"
        );
    }

    #[test]
    fn parse_rejects_business_failure() {
        let mut raw = br#"{"code": 413, "msg": "too large"}"#.to_vec();
        match parse_upload_response(&mut raw) {
            Err(UploadError::Api { code, msg }) => {
                assert_eq!(code, 413);
                assert_eq!(msg, "too large");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_missing_url() {
        let mut raw = br#"{"code": 200}"#.to_vec();
        assert!(matches!(
            parse_upload_response(&mut raw),
            Err(UploadError::MissingUrl)
        ));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let uploader = Uploader::new(&crate::config::UploadConfig::default());
        let result = uploader
            .upload_path(Path::new("/no/such/image.png"))
            .await;
        assert!(matches!(result, Err(UploadError::NotFound(_))));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_locally() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.png");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let config = crate::config::UploadConfig {
            max_size_mb: 0,
            ..Default::default()
        };
        let uploader = Uploader::new(&config);
        assert!(matches!(
            uploader.upload_path(&path).await,
            Err(UploadError::TooLarge { .. })
        ));
    }
}
