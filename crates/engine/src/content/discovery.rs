use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::compiler::{compile_level, ContentCompileError, ContentErrorCode};
use super::types::LevelDef;

/// Compiles every `*.xml` file under `dir`, in normalized relative path order.
pub fn load_levels(dir: &Path) -> Result<Vec<LevelDef>, ContentCompileError> {
    let files = collect_xml_files_sorted(dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut levels = Vec::with_capacity(files.len());
    for path in files {
        let raw = fs::read_to_string(&path).map_err(|source| read_error(path.clone(), source))?;
        let level = compile_level(&path, &raw)?;
        info!(
            name = %level.name,
            periods = level.time_periods.len(),
            path = %path.display(),
            "level_loaded"
        );
        levels.push(level);
    }
    Ok(levels)
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read: {source}"),
        file_path: path,
        location: None,
    }
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_cached_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write file");
    }

    fn level_xml(name: &str) -> String {
        format!(
            r#"<Level name="{name}"><TimePeriod name="now"><Area key="a" width="100" height="100"/></TimePeriod></Level>"#
        )
    }

    #[test]
    fn levels_load_in_relative_path_order() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        write_file(&root.join("b_second.xml"), &level_xml("Second"));
        write_file(&root.join("a_first.xml"), &level_xml("First"));
        write_file(&root.join("c").join("third.xml"), &level_xml("Third"));
        write_file(&root.join("notes.txt"), "not a level");

        let levels = load_levels(root).expect("load");
        let names = levels.iter().map(|level| level.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert!(levels[0].source.ends_with("a_first.xml"));
    }

    #[test]
    fn compile_errors_carry_the_failing_file() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        write_file(&root.join("ok.xml"), &level_xml("Fine"));
        write_file(&root.join("zz_broken.xml"), "<Level name=\"x\">");

        let err = load_levels(root).expect_err("broken level should fail");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.file_path.ends_with("zz_broken.xml"));
    }

    #[test]
    fn missing_directory_is_a_read_error() {
        let temp = TempDir::new().expect("tempdir");
        let err = load_levels(&temp.path().join("missing")).expect_err("should fail");
        assert_eq!(err.code, ContentErrorCode::ReadFile);
        assert!(err.location.is_none());
    }

    #[test]
    fn empty_directory_yields_no_levels() {
        let temp = TempDir::new().expect("tempdir");
        assert!(load_levels(temp.path()).expect("load").is_empty());
    }
}
