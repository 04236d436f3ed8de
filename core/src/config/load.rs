use std::path::PathBuf;

use crate::error::ExecError;

use super::types::ExecConfig;

/// Default taskfan data directory: ~/.taskfan
pub fn get_taskfan_data_dir() -> Result<PathBuf, ExecError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ExecError::Config("cannot determine home directory".into()))?;
    Ok(PathBuf::from(home).join(".taskfan"))
}

/// Load the effective configuration.
///
/// File priority: `~/.taskfan/config.toml`, then `./taskfan.toml`, then
/// built-in defaults. Environment variables override whatever was loaded.
/// A home directory that cannot be resolved only skips the first candidate.
pub fn load_default() -> Result<ExecConfig, ExecError> {
    let mut candidates = Vec::new();
    if let Ok(dir) = get_taskfan_data_dir() {
        candidates.push(dir.join("config.toml"));
    }
    candidates.push(PathBuf::from("taskfan.toml"));

    let mut cfg = load_first(&candidates)?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// First existing candidate wins; none existing yields the defaults. A file
/// that exists but does not parse is a hard config error, not a fallthrough.
fn load_first(candidates: &[PathBuf]) -> Result<ExecConfig, ExecError> {
    for path in candidates {
        if path.exists() {
            let s = std::fs::read_to_string(path)?;
            return toml::from_str(&s)
                .map_err(|e| ExecError::Config(format!("{}: {e}", path.display())));
        }
    }
    Ok(ExecConfig::default())
}

fn apply_env_overrides(cfg: &mut ExecConfig) {
    if let Ok(v) = std::env::var("TASKFAN_SHELL") {
        if !v.trim().is_empty() {
            cfg.shell = v;
        }
    }
    if let Ok(v) = std::env::var("TASKFAN_MAX_CONCURRENCY") {
        if let Ok(n) = v.trim().parse::<usize>() {
            cfg.max_concurrency = n.max(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskfan.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "max_concurrency = 2\ncommand_timeout_ms = 5000").unwrap();

        let cfg = load_first(&[path]).unwrap();
        assert_eq!(cfg.max_concurrency, 2);
        assert_eq!(cfg.command_timeout_ms, 5_000);
        // Untouched fields fall back to defaults.
        assert_eq!(cfg.shell, "/bin/sh");
    }

    #[test]
    fn earlier_candidates_shadow_later_ones() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("config.toml");
        let second = dir.path().join("taskfan.toml");
        std::fs::write(&first, "max_concurrency = 7").unwrap();
        std::fs::write(&second, "max_concurrency = 3").unwrap();

        let cfg = load_first(&[first.clone(), second.clone()]).unwrap();
        assert_eq!(cfg.max_concurrency, 7);

        // With the first candidate gone, the second takes over.
        std::fs::remove_file(&first).unwrap();
        let cfg = load_first(&[first, second]).unwrap();
        assert_eq!(cfg.max_concurrency, 3);
    }

    #[test]
    fn missing_candidates_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_first(&[dir.path().join("nope.toml")]).unwrap();
        assert_eq!(cfg.command_timeout_ms, 30_000);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskfan.toml");
        std::fs::write(&path, "max_concurrency = \"lots\"").unwrap();

        let err = load_first(&[path]).unwrap_err();
        assert!(matches!(err, ExecError::Config(_)));
        assert!(err.to_string().contains("taskfan.toml"));
    }

    #[test]
    fn load_default_reads_home_config_and_env_overrides() {
        let home = tempfile::tempdir().unwrap();
        let data_dir = home.path().join(".taskfan");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(data_dir.join("config.toml"), "command_timeout_ms = 1111").unwrap();

        let old_home = std::env::var("HOME").ok();
        std::env::set_var("HOME", home.path());
        std::env::set_var("TASKFAN_SHELL", "/bin/bash");
        std::env::set_var("TASKFAN_MAX_CONCURRENCY", "2");

        let cfg = load_default();

        // Restore the process environment before asserting.
        std::env::remove_var("TASKFAN_SHELL");
        std::env::remove_var("TASKFAN_MAX_CONCURRENCY");
        match old_home {
            Some(h) => std::env::set_var("HOME", h),
            None => std::env::remove_var("HOME"),
        }

        let cfg = cfg.unwrap();
        assert_eq!(cfg.command_timeout_ms, 1_111);
        assert_eq!(cfg.shell, "/bin/bash");
        assert_eq!(cfg.max_concurrency, 2);
    }
}
