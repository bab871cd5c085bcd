use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "PHYLOTREE_RUST_DIR";
const BASE_DIR_NAME: &str = ".phylotree-rust";

pub(crate) fn base_dir() -> PathBuf {
    if let Some(dir) = base_dir_override() {
        return dir;
    }
    home_join(BASE_DIR_NAME).unwrap_or_else(|| PathBuf::from(BASE_DIR_NAME))
}

pub(crate) fn settings_dir() -> Option<PathBuf> {
    if let Some(dir) = base_dir_override() {
        return Some(dir);
    }
    home_join(BASE_DIR_NAME)
}

pub(crate) fn placeholder_path() -> PathBuf {
    base_dir().join("placeholder.png")
}

pub(crate) fn annotated_path() -> PathBuf {
    base_dir().join("annotated_image.png")
}

pub(crate) fn images_dir() -> PathBuf {
    base_dir().join("images")
}

/// Turns an organism name into a file stem: `Panthera leo` -> `panthera_leo`.
pub(crate) fn file_stem_for(name: &str) -> String {
    let mut out = String::new();
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch.to_ascii_lowercase());
        } else if (ch.is_whitespace() || ch == '_' || ch == '.') && !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "organism".to_string()
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn expand_tilde(value: &str) -> PathBuf {
    let trimmed = value.trim();
    if trimmed == "~" || trimmed.starts_with("~/") {
        if let Some(home) = home() {
            if trimmed == "~" {
                return home;
            }
            return home.join(&trimmed[2..]);
        }
    }
    PathBuf::from(trimmed)
}

fn base_dir_override() -> Option<PathBuf> {
    std::env::var(BASE_DIR_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| expand_tilde(&value))
}

fn home() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).to_path_buf())
        }
    })
}

fn home_join(suffix: &str) -> Option<PathBuf> {
    home().map(|home| home.join(suffix))
}

#[cfg(test)]
mod tests {
    use super::file_stem_for;

    #[test]
    fn organism_names_become_safe_stems() {
        assert_eq!(file_stem_for("Panthera leo"), "panthera_leo");
        assert_eq!(file_stem_for("  Homo  sapiens "), "homo_sapiens");
        assert_eq!(file_stem_for("E. coli K-12"), "e_coli_k-12");
        assert_eq!(file_stem_for("../etc/passwd"), "etcpasswd");
        assert_eq!(file_stem_for("???"), "organism");
    }
}
