use std::path::{Path, PathBuf};

/// `<output_dir>/com/example/Foo.<extension>` for the internal name `com/example/Foo`.
pub fn compiled_unit_path(output_dir: &Path, class_name: &str, extension: &str) -> PathBuf {
    let mut path = output_dir.to_path_buf();
    let mut segments = class_name.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_some() {
            path.push(segment);
        } else {
            path.push(format!("{segment}.{extension}"));
        }
    }
    path
}

/// Existing output files of a top-level type: its own unit plus every `Simple$*` unit
/// next to it.
pub fn compiled_outputs(output_dir: &Path, class_name: &str, extension: &str) -> Vec<PathBuf> {
    let unit = compiled_unit_path(output_dir, class_name, extension);
    let simple_name = class_name.rsplit('/').next().unwrap_or(class_name);
    let nested_prefix = format!("{simple_name}$");
    let suffix = format!(".{extension}");

    let mut outputs = Vec::new();
    if unit.is_file() {
        outputs.push(unit.clone());
    }

    let Some(dir) = unit.parent() else {
        return outputs;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return outputs;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&nested_prefix) && name.ends_with(&suffix) {
            outputs.push(entry.path());
        }
    }
    outputs.sort();
    outputs
}

/// Removes every output of `class_name`. Files already gone are ignored.
pub fn delete_compiled_outputs(
    output_dir: &Path,
    class_name: &str,
    extension: &str,
) -> std::io::Result<()> {
    for path in compiled_outputs(output_dir, class_name, extension) {
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Deleted stale output {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Empties `dir`, creating it if needed.
pub fn recreate_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)
}
