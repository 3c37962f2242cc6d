use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use glob::{Pattern, glob};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::{FRAMEWORK_FILES, TEST_FILE_PATTERNS};
use crate::core::source::{FileId, SourceFile};

/// Check if a pattern contains glob wildcards (* or ?).
/// Patterns without wildcards are treated as literal directory paths.
fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Result of scanning files.
pub struct ScanResult {
    /// Eligible files, sorted by path.
    pub files: Vec<PathBuf>,
    pub skipped_count: usize,
}

/// A file that was found but could not be turned into a snapshot.
#[derive(Debug, Clone)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: String,
}

pub fn scan_files(
    base_dir: &Path,
    includes: &[String],
    ignore_patterns: &[String],
    ignore_test_files: bool,
) -> ScanResult {
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();
    let mut skipped_count = 0;

    // Separate ignore patterns into literal paths and glob patterns
    let mut literal_ignore_paths: Vec<PathBuf> = Vec::new();
    let mut glob_patterns: Vec<Pattern> = Vec::new();

    for p in ignore_patterns {
        if is_glob_pattern(p) {
            match Pattern::new(p) {
                Ok(pattern) => glob_patterns.push(pattern),
                Err(e) => tracing::warn!("Invalid ignore pattern '{}': {}", p, e),
            }
        } else {
            literal_ignore_paths.push(base_dir.join(p));
        }
    }

    if ignore_test_files {
        for p in TEST_FILE_PATTERNS {
            if let Ok(pattern) = Pattern::new(p) {
                glob_patterns.push(pattern);
            }
        }
    }

    let dirs_to_scan: Vec<PathBuf> = if includes.is_empty() {
        vec![base_dir.to_path_buf()]
    } else {
        let mut paths = Vec::new();
        for inc in includes {
            if is_glob_pattern(inc) {
                let full_pattern = base_dir.join(inc);
                match glob(&full_pattern.to_string_lossy()) {
                    Ok(entries) => {
                        paths.extend(entries.flatten().filter(|entry| entry.is_dir()));
                    }
                    Err(e) => tracing::warn!("Invalid glob pattern '{}': {}", inc, e),
                }
            } else {
                let path = base_dir.join(inc);
                if path.exists() {
                    paths.push(path);
                } else {
                    tracing::warn!("Include path does not exist: {}", path.display());
                }
            }
        }
        paths
    };

    for dir in dirs_to_scan {
        for entry in WalkDir::new(dir) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    skipped_count += 1;
                    tracing::warn!("Cannot access path: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            // Globs match the root-relative path so a parent directory
            // named like an ignored one does not hide the whole project.
            let relative = path.strip_prefix(base_dir).unwrap_or(path);
            let path_str = relative.to_string_lossy();

            if literal_ignore_paths
                .iter()
                .any(|ignore_path| path.starts_with(ignore_path))
            {
                continue;
            }

            if glob_patterns.iter().any(|p| p.matches(&path_str)) {
                continue;
            }

            if path.is_file() && is_scannable_file(path) && !is_framework_file(path) {
                files.insert(path.to_path_buf());
            }
        }
    }

    ScanResult {
        files: files.into_iter().collect(),
        skipped_count,
    }
}

/// Read every scanned path into an immutable snapshot, in parallel.
///
/// File ids follow the order of `paths`. Unreadable or non-UTF-8 files are
/// returned as failures and never get an id.
pub fn load_sources(paths: &[PathBuf]) -> (Vec<SourceFile>, Vec<ScanFailure>) {
    let loaded: Vec<Result<(PathBuf, String), ScanFailure>> = paths
        .par_iter()
        .map(|path| {
            let bytes = fs::read(path).map_err(|e| ScanFailure {
                path: path.clone(),
                error: e.to_string(),
            })?;
            let content = String::from_utf8(bytes).map_err(|e| ScanFailure {
                path: path.clone(),
                error: format!("not valid UTF-8: {}", e.utf8_error()),
            })?;
            Ok((path.clone(), content))
        })
        .collect();

    let mut files = Vec::new();
    let mut failures = Vec::new();
    for result in loaded {
        match result {
            Ok((path, content)) => {
                let id = FileId(files.len());
                files.push(SourceFile::new(id, path, content));
            }
            Err(failure) => failures.push(failure),
        }
    }
    (files, failures)
}

fn is_scannable_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("tsx" | "ts" | "jsx" | "js")
    )
}

fn is_framework_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| FRAMEWORK_FILES.contains(&stem))
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_scan_tsx_files() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path();

        File::create(dir_path.join("app.tsx")).unwrap();
        File::create(dir_path.join("utils.ts")).unwrap();
        File::create(dir_path.join("style.css")).unwrap();

        let result = scan_files(dir_path, &[], &[], false);

        assert_eq!(result.files.len(), 2);
        assert!(result.files.iter().any(|f| f.ends_with("app.tsx")));
        assert!(result.files.iter().any(|f| f.ends_with("utils.ts")));
        assert!(!result.files.iter().any(|f| f.ends_with("style.css")));
    }

    #[test]
    fn test_scan_result_is_sorted() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path();

        File::create(dir_path.join("b.tsx")).unwrap();
        File::create(dir_path.join("a.tsx")).unwrap();
        File::create(dir_path.join("c.ts")).unwrap();

        let result = scan_files(dir_path, &[], &[], false);
        let names: Vec<_> = result
            .files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.tsx", "b.tsx", "c.ts"]);
    }

    #[test]
    fn test_scan_ignores_node_modules() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path();

        let node_modules = dir_path.join("node_modules");
        fs::create_dir(&node_modules).unwrap();
        File::create(node_modules.join("lib.ts")).unwrap();

        File::create(dir_path.join("app.tsx")).unwrap();

        let result = scan_files(dir_path, &[], &["**/node_modules/**".to_owned()], false);

        assert_eq!(result.files.len(), 1);
        assert!(!result.files.iter().any(|f| f.starts_with(&node_modules)));
    }

    #[test]
    fn test_scan_skips_framework_files() {
        let dir = tempdir().unwrap();
        let pages = dir.path().join("pages");
        fs::create_dir(&pages).unwrap();
        File::create(pages.join("_app.tsx")).unwrap();
        File::create(pages.join("_document.tsx")).unwrap();
        File::create(pages.join("index.tsx")).unwrap();

        let result = scan_files(dir.path(), &[], &[], false);

        assert_eq!(result.files, vec![pages.join("index.tsx")]);
    }

    #[test]
    fn test_scan_with_includes() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path();

        let src = dir_path.join("src");
        fs::create_dir(&src).unwrap();
        File::create(src.join("app.tsx")).unwrap();

        let lib = dir_path.join("lib");
        fs::create_dir(&lib).unwrap();
        File::create(lib.join("utils.ts")).unwrap();

        let result = scan_files(dir_path, &["src".to_owned()], &[], false);

        assert_eq!(result.files, vec![src.join("app.tsx")]);
    }

    #[test]
    fn test_scan_with_nonexistent_include() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        File::create(src.join("app.tsx")).unwrap();

        let result = scan_files(
            dir.path(),
            &["src".to_owned(), "nonexistent".to_owned()],
            &[],
            false,
        );

        assert_eq!(result.files.len(), 1);
    }

    #[test]
    fn test_scan_ignores_test_files() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path();

        File::create(dir_path.join("app.tsx")).unwrap();
        File::create(dir_path.join("app.test.tsx")).unwrap();
        File::create(dir_path.join("utils.spec.jsx")).unwrap();

        let result = scan_files(dir_path, &[], &[], true);

        assert_eq!(result.files, vec![dir_path.join("app.tsx")]);
    }

    #[test]
    fn test_is_scannable_file() {
        assert!(is_scannable_file(Path::new("app.tsx")));
        assert!(is_scannable_file(Path::new("app.ts")));
        assert!(is_scannable_file(Path::new("app.jsx")));
        assert!(is_scannable_file(Path::new("app.js")));
        assert!(!is_scannable_file(Path::new("style.css")));
        assert!(!is_scannable_file(Path::new("data.json")));
    }

    #[test]
    fn test_load_sources_reports_invalid_utf8() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("a.tsx");
        let bad = dir.path().join("b.tsx");
        fs::write(&good, "export const A = () => <p>Hi</p>;").unwrap();
        fs::write(&bad, [0xff, 0xfe, 0x00, b'<']).unwrap();

        let (files, failures) = load_sources(&[good.clone(), bad.clone()]);

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, FileId(0));
        assert_eq!(files[0].path, good);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, bad);
        assert!(failures[0].error.contains("UTF-8"));
    }
}
