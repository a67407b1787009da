//! Рабочая директория фрагментов одной конверсии
//!
//! Директория монопольно принадлежит текущей конверсии: новая задача
//! сначала зачищает остатки предыдущей на том же месте, а по завершении
//! (успех, отмена, фатальный сбой) удаляет директорию целиком.

use std::path::{Path, PathBuf};

use crate::error::Result;

pub struct JobWorkDir {
    path: PathBuf,
    cleaned: bool,
}

impl JobWorkDir {
    /// Создать рабочую директорию рядом с будущим выходным файлом,
    /// удалив остатки предыдущей конверсии по этому же пути.
    pub fn create(output_base: &Path) -> Result<Self> {
        let stem = output_base
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "job".to_string());
        let parent = output_base
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir());
        let path = parent.join(format!(".{}_fragments", stem));

        if path.exists() {
            log::info!("clearing leftover fragment dir {}", path.display());
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;

        Ok(Self {
            path,
            cleaned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Удалить директорию со всем содержимым
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.cleaned {
            if self.path.exists() {
                std::fs::remove_dir_all(&self.path)?;
            }
            self.cleaned = true;
        }
        Ok(())
    }
}

impl Drop for JobWorkDir {
    fn drop(&mut self) {
        // Страховка для путей с ошибками: директория не должна переживать задачу
        let _ = self.cleanup();
    }
}
