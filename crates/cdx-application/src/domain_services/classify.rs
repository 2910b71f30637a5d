//! Source vs. test file classification by path convention.

use cdx_domain::ChunkNamespace;

/// Returns true when the path follows a test-file convention: a `tests`,
/// `test` or `__tests__` directory segment, a `.test.` / `.spec.` infix,
/// or a `_test` suffix before the extension.
pub fn is_test_file(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let segments: Vec<&str> = normalized.split('/').collect();
    let Some((file_name, dirs)) = segments.split_last() else {
        return false;
    };
    if dirs
        .iter()
        .any(|d| matches!(*d, "tests" | "test" | "__tests__"))
    {
        return true;
    }
    if file_name.contains(".test.") || file_name.contains(".spec.") {
        return true;
    }
    let stem = file_name.rsplit_once('.').map_or(*file_name, |(s, _)| s);
    stem.ends_with("_test")
}

/// Namespace a file's chunks should be stored under.
pub fn namespace_for(path: &str) -> ChunkNamespace {
    if is_test_file(path) {
        ChunkNamespace::Test
    } else {
        ChunkNamespace::Source
    }
}
