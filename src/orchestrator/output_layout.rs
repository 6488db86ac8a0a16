//! 输出文件布局
//!
//! `<output_dir>/<base>.tex`、`<output_dir>/<base>.json`、`<output_dir>/images/`

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::FileError;
use crate::services::raster_diagram::IMAGES_SUBDIR;

/// 一次运行的输出路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub output_dir: PathBuf,
    pub tex_path: PathBuf,
    pub json_path: PathBuf,
    pub images_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(output_dir: &Path, topic: &str, class_level: &str) -> Self {
        let base = base_filename(topic, class_level);
        Self {
            output_dir: output_dir.to_path_buf(),
            tex_path: output_dir.join(format!("{}.tex", base)),
            json_path: output_dir.join(format!("{}.json", base)),
            images_dir: output_dir.join(IMAGES_SUBDIR),
        }
    }

    /// 创建输出目录和图片目录
    pub fn prepare(&self) -> Result<(), FileError> {
        for dir in [&self.output_dir, &self.images_dir] {
            std::fs::create_dir_all(dir).map_err(|e| FileError::CreateDirFailed {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        debug!("输出目录已就绪: {}", self.output_dir.display());
        Ok(())
    }
}

/// 文件名主干：主题去掉逗号、空格和连字符换成下划线，加上年级，全部小写
pub fn base_filename(topic: &str, class_level: &str) -> String {
    let topic = topic
        .replace(' ', "_")
        .replace(',', "")
        .replace('-', "_")
        .to_lowercase();
    let class_level = class_level.to_lowercase().replace(' ', "_");
    format!("{}_{}", topic, class_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_filename() {
        assert_eq!(
            base_filename("Congruence of Triangles, AREA AND PERIMETER", "Class 7"),
            "congruence_of_triangles_area_and_perimeter_class_7"
        );
        assert_eq!(base_filename("Number-Line", "Grade 10"), "number_line_grade_10");
    }

    #[test]
    fn test_prepare_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(&dir.path().join("out"), "Ratios", "Class 6");
        layout.prepare().unwrap();

        assert!(layout.images_dir.is_dir());
        assert_eq!(layout.tex_path, dir.path().join("out/ratios_class_6.tex"));
        assert_eq!(layout.json_path, dir.path().join("out/ratios_class_6.json"));
        // 重复调用没有副作用
        layout.prepare().unwrap();
    }
}
