use crate::{error, info};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::fs;

pub mod index;

pub use index::{ResourceEntry, ResourceError, ResourceIndex};

/// 资源类别。每个类别一份独立索引，互不构成命名空间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Maps,
    Weapons,
    Arc,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Maps, Category::Weapons, Category::Arc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Maps => "maps",
            Category::Weapons => "weapons",
            Category::Arc => "arc",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Category::Maps => "maps.json",
            Category::Weapons => "weapons.json",
            Category::Arc => "arc.json",
        }
    }

    /// 资源文件缺失时写入的默认文档
    fn default_doc(&self) -> &'static str {
        match self {
            Category::Maps => include_str!("../res/maps.json"),
            Category::Weapons => include_str!("../res/weapons.json"),
            Category::Arc => include_str!("../res/arc.json"),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 资源中心：持有三个类别的索引快照。
/// 查询方通过 `index()` 克隆 Arc 取得一致快照；
/// 重载构建完整的新索引后整体替换引用，读取方永远不会看到半成品。
pub struct Resources {
    dir: PathBuf,
    maps: RwLock<Arc<ResourceIndex>>,
    weapons: RwLock<Arc<ResourceIndex>>,
    arc: RwLock<Arc<ResourceIndex>>,
}

/// 一次重载的结果，供 /reload 回复使用
#[derive(Debug, Default)]
pub struct ReloadSummary {
    pub loaded: Vec<(Category, usize)>,
    pub failed: Vec<(Category, String)>,
}

impl ReloadSummary {
    pub fn total(&self) -> usize {
        self.loaded.iter().map(|(_, n)| n).sum()
    }
}

impl Resources {
    /// 启动加载。任何一个文档解析失败都视为致命错误。
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self, ResourceError> {
        let dir = dir.into();
        let mut indices = Vec::with_capacity(Category::ALL.len());

        for category in Category::ALL {
            let index = read_index(&dir, category).await?;
            info!(target: "Resource", "加载 {} 资源: {} 个", category, index.len());
            indices.push(Arc::new(index));
        }

        let mut iter = indices.into_iter();
        let resources = Self {
            dir,
            maps: RwLock::new(iter.next().unwrap()),
            weapons: RwLock::new(iter.next().unwrap()),
            arc: RwLock::new(iter.next().unwrap()),
        };

        let total: usize = Category::ALL
            .iter()
            .map(|c| resources.index(*c).len())
            .sum();
        info!(target: "Resource", "资源加载完成，共 {} 个条目", total);

        Ok(resources)
    }

    fn slot(&self, category: Category) -> &RwLock<Arc<ResourceIndex>> {
        match category {
            Category::Maps => &self.maps,
            Category::Weapons => &self.weapons,
            Category::Arc => &self.arc,
        }
    }

    /// 取当前索引快照
    pub fn index(&self, category: Category) -> Arc<ResourceIndex> {
        self.slot(category).read().unwrap().clone()
    }

    /// 类别下某个图片文件的本地路径
    pub fn asset_path(&self, category: Category, filename: &str) -> PathBuf {
        self.dir.join(category.as_str()).join(filename)
    }

    /// 重新读取全部资源文档。
    /// 单个类别失败时保留其旧索引，不影响其他类别。
    pub async fn reload(&self) -> ReloadSummary {
        let mut summary = ReloadSummary::default();

        for category in Category::ALL {
            match read_index(&self.dir, category).await {
                Ok(index) => {
                    let count = index.len();
                    *self.slot(category).write().unwrap() = Arc::new(index);
                    info!(target: "Resource", "重载 {} 资源: {} 个", category, count);
                    summary.loaded.push((category, count));
                }
                Err(e) => {
                    error!(target: "Resource", "重载 {} 失败，保留旧索引: {}", category, e);
                    summary.failed.push((category, e.to_string()));
                }
            }
        }

        summary
    }
}

/// 读取并解析单个类别的文档；文件缺失时先写入默认内容
async fn read_index(dir: &Path, category: Category) -> Result<ResourceIndex, ResourceError> {
    let path = dir.join(category.file_name());

    if !path.exists() {
        if let Err(e) = fs::create_dir_all(dir).await {
            return Err(ResourceError::Io {
                path: dir.to_path_buf(),
                source: e,
            });
        }
        if let Err(e) = fs::write(&path, category.default_doc()).await {
            return Err(ResourceError::Io { path, source: e });
        }
        info!(target: "Resource", "已创建默认资源文档: {}", path.display());
    }

    let doc = fs::read_to_string(&path)
        .await
        .map_err(|e| ResourceError::Io {
            path: path.clone(),
            source: e,
        })?;

    ResourceIndex::parse(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_doc(dir: &Path, category: Category, doc: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(category.file_name()), doc).unwrap();
    }

    #[tokio::test]
    async fn load_seeds_missing_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let resources = Resources::load(tmp.path()).await.unwrap();

        // 默认文档已写入磁盘且可解析
        for category in Category::ALL {
            assert!(tmp.path().join(category.file_name()).exists());
            assert!(!resources.index(category).is_empty());
        }
    }

    #[tokio::test]
    async fn load_fails_on_malformed_document() {
        let tmp = tempfile::tempdir().unwrap();
        write_doc(tmp.path(), Category::Maps, "{broken");
        assert!(Resources::load(tmp.path()).await.is_err());
    }

    #[tokio::test]
    async fn reload_swaps_snapshot_atomically() {
        let tmp = tempfile::tempdir().unwrap();
        write_doc(
            tmp.path(),
            Category::Maps,
            r#"{"旧地图": {"filename": "old.png", "aliases": ["old"]}}"#,
        );
        let resources = Resources::load(tmp.path()).await.unwrap();

        // 重载前取得的快照
        let before = resources.index(Category::Maps);
        assert!(before.resolve("old").is_some());

        write_doc(
            tmp.path(),
            Category::Maps,
            r#"{"新地图": {"filename": "new.png", "aliases": ["new"]}}"#,
        );
        let summary = resources.reload().await;
        assert!(summary.failed.is_empty());

        // 旧快照不受影响，新快照看到完整的新文档
        assert!(before.resolve("old").is_some());
        assert!(before.resolve("new").is_none());
        let after = resources.index(Category::Maps);
        assert!(after.resolve("new").is_some());
        assert!(after.resolve("old").is_none());
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_index() {
        let tmp = tempfile::tempdir().unwrap();
        write_doc(
            tmp.path(),
            Category::Weapons,
            r#"{"枪": {"filename": "gun.png", "aliases": []}}"#,
        );
        let resources = Resources::load(tmp.path()).await.unwrap();

        write_doc(tmp.path(), Category::Weapons, "{broken");
        let summary = resources.reload().await;

        assert!(
            summary
                .failed
                .iter()
                .any(|(c, _)| *c == Category::Weapons)
        );
        // 旧索引仍然可用
        assert!(resources.index(Category::Weapons).resolve("枪").is_some());
    }

    #[test]
    fn asset_path_is_category_scoped() {
        let empty = || Arc::new(ResourceIndex::parse("{}").unwrap());
        let resources = Resources {
            dir: PathBuf::from("resources"),
            maps: RwLock::new(empty()),
            weapons: RwLock::new(empty()),
            arc: RwLock::new(empty()),
        };
        assert_eq!(
            resources.asset_path(Category::Maps, "map.png"),
            PathBuf::from("resources/maps/map.png")
        );
    }
}
