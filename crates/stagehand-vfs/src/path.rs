//! VFS path utilities

/// Normalize a VFS path
/// - Converts backslashes to forward slashes
/// - Removes redundant separators
/// - Resolves `.` and `..` components, never climbing above the root
/// - Ensures the result starts with `/`
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");

    let mut components = Vec::new();
    for component in path.trim().split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }

    if components.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", components.join("/"))
    }
}
