use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("读取资源文件失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("解析资源文档失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("条目 [{entry}] 的等级键无效: {key:?} (应为正整数)")]
    InvalidLevelKey { entry: String, key: String },

    #[error("条目 [{entry}] 缺少 filename 或 levels 字段")]
    MissingAsset { entry: String },

    #[error("名称或别名冲突: {alias:?} (条目 [{entry}])")]
    Duplicate { alias: String, entry: String },

    #[error("等级 {level} 不存在，可用等级: {available:?}")]
    LevelNotFound { level: u32, available: Vec<u32> },
}

// ================= 文档格式 =================

#[derive(Deserialize)]
struct RawLevel {
    filename: String,
}

#[derive(Deserialize)]
struct RawEntry {
    name: Option<String>,
    filename: Option<String>,
    levels: Option<BTreeMap<String, RawLevel>>,
    #[serde(default)]
    aliases: Vec<String>,
}

// ================= 索引结构 =================

/// 单个资源条目。加载后不可变，重载时整体替换。
#[derive(Debug)]
pub struct ResourceEntry {
    /// 规范键（文档中的对象键）
    pub key: String,
    /// 展示名称，缺省时等于规范键
    pub name: String,
    /// 无等级条目的图片文件名
    pub filename: Option<String>,
    /// 等级 → 图片文件名
    pub levels: BTreeMap<u32, String>,
    pub aliases: Vec<String>,
}

impl ResourceEntry {
    pub fn has_levels(&self) -> bool {
        !self.levels.is_empty()
    }

    pub fn available_levels(&self) -> Vec<u32> {
        self.levels.keys().copied().collect()
    }

    /// 取指定等级的图片文件名。等级缺省为 1；
    /// 无等级条目忽略等级参数，直接返回其唯一文件名。
    pub fn asset_for_level(&self, level: Option<u32>) -> Result<&str, ResourceError> {
        if self.levels.is_empty() {
            return self
                .filename
                .as_deref()
                .ok_or_else(|| ResourceError::MissingAsset {
                    entry: self.key.clone(),
                });
        }

        let level = level.unwrap_or(1);
        self.levels
            .get(&level)
            .map(String::as_str)
            .ok_or_else(|| ResourceError::LevelNotFound {
                level,
                available: self.available_levels(),
            })
    }
}

/// 单类别资源索引：规范键与别名到条目的解析表。
/// 查询归一化规则为去首尾空白后转小写。
pub struct ResourceIndex {
    entries: Vec<Arc<ResourceEntry>>,
    lookup: HashMap<String, usize>,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

impl ResourceIndex {
    /// 解析一份 JSON 资源文档。
    /// 键重复、别名重复、等级键非法、条目缺少图片均视为解析失败。
    pub fn parse(doc: &str) -> Result<Self, ResourceError> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(doc)?;

        let mut entries = Vec::with_capacity(raw.len());
        let mut lookup = HashMap::new();

        for (key, raw_entry) in raw {
            let mut levels = BTreeMap::new();
            if let Some(raw_levels) = raw_entry.levels {
                for (level_key, level) in raw_levels {
                    let parsed = level_key.parse::<u32>().ok().filter(|lv| *lv >= 1);
                    let Some(lv) = parsed else {
                        return Err(ResourceError::InvalidLevelKey {
                            entry: key,
                            key: level_key,
                        });
                    };
                    levels.insert(lv, level.filename);
                }
            }

            if levels.is_empty() && raw_entry.filename.is_none() {
                return Err(ResourceError::MissingAsset { entry: key });
            }

            let entry = ResourceEntry {
                name: raw_entry.name.unwrap_or_else(|| key.clone()),
                filename: raw_entry.filename,
                levels,
                aliases: raw_entry.aliases,
                key,
            };

            let idx = entries.len();
            let normalized_key = normalize(&entry.key);
            if lookup.insert(normalized_key.clone(), idx).is_some() {
                return Err(ResourceError::Duplicate {
                    alias: entry.key.clone(),
                    entry: entry.key.clone(),
                });
            }

            for alias in &entry.aliases {
                let normalized = normalize(alias);
                // 别名与自身规范键相同视为冗余，直接忽略
                if normalized == normalized_key {
                    continue;
                }
                if lookup.insert(normalized, idx).is_some() {
                    return Err(ResourceError::Duplicate {
                        alias: alias.clone(),
                        entry: entry.key.clone(),
                    });
                }
            }

            entries.push(Arc::new(entry));
        }

        Ok(Self { entries, lookup })
    }

    /// 按规范键或别名解析查询（大小写不敏感，无模糊匹配）
    pub fn resolve(&self, query: &str) -> Option<Arc<ResourceEntry>> {
        let normalized = normalize(query);
        if normalized.is_empty() {
            return None;
        }
        self.lookup
            .get(&normalized)
            .map(|&idx| self.entries[idx].clone())
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<ResourceEntry>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
