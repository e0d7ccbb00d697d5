use serde::Serialize;
use simd_json::owned::{Object, Value};

/// 消息段 (Segment)
#[derive(Debug, Serialize, Clone)]
pub struct Segment {
    #[serde(rename = "type")]
    pub type_: String,
    pub data: Object,
}

impl Segment {
    pub fn new(type_: &str, data: Object) -> Self {
        Self {
            type_: type_.to_string(),
            data,
        }
    }
}

/// 消息链 (Message Chain)
#[derive(Debug, Serialize, Clone, Default)]
pub struct Message(Vec<Segment>);

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// 通用添加方法：手动构建 Segment
    pub fn add(mut self, type_: &str, data: Object) -> Self {
        self.0.push(Segment::new(type_, data));
        self
    }

    /// 纯文本
    pub fn text(self, text: impl Into<String>) -> Self {
        let mut data = Object::new();
        data.insert("text".into(), Value::from(text.into()));
        self.add("text", data)
    }

    /// 图片
    /// - `file`: 图片 URL、Base64 或文件路径
    pub fn image(self, file: impl Into<String>) -> Self {
        let mut data = Object::new();
        data.insert("file".into(), Value::from(file.into()));
        self.add("image", data)
    }

    /// 回复消息
    pub fn reply(self, message_id: impl ToString) -> Self {
        let mut data = Object::new();
        data.insert("id".into(), Value::from(message_id.to_string()));
        self.add("reply", data)
    }
}

// 允许直接从字符串字面量转换为纯文本消息
impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::new().text(s)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::new().text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_onebot_segments() {
        let msg = Message::new()
            .reply(42)
            .text("地图如下")
            .image("https://example.com/map.png");

        let json = simd_json::to_string(&msg).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains(r#""type":"reply""#));
        assert!(json.contains(r#""id":"42""#));
        assert!(json.contains(r#""type":"text""#));
        assert!(json.contains(r#""type":"image""#));
        assert!(json.contains("https://example.com/map.png"));
    }

    #[test]
    fn from_str_builds_single_text_segment() {
        let msg: Message = "你好".into();
        let json = simd_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""text":"你好""#));
    }
}
