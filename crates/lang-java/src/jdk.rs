use std::path::{Path, PathBuf};

/// Locates `javac`: `$JAVA_HOME/bin/javac` when it exists, otherwise whatever `javac` the
/// `PATH` provides.
pub fn find_javac() -> PathBuf {
    if let Ok(home) = std::env::var("JAVA_HOME") {
        if let Some(javac) = check_jdk_home(Path::new(&home)) {
            return javac;
        }
        tracing::debug!("JAVA_HOME={} has no javac, falling back to PATH", home);
    }
    PathBuf::from("javac")
}

fn check_jdk_home(home: &Path) -> Option<PathBuf> {
    let bin = home.join("bin");
    ["javac", "javac.exe"]
        .iter()
        .map(|name| bin.join(name))
        .find(|candidate| candidate.is_file())
}
