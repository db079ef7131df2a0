use std::path::Path;

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

/// Cut `text` to at most `max_bytes`, keeping the tail: the end of a process
/// log is where the failure is.
pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_path_strips_base_when_possible() {
        let base = Path::new("/ws");
        assert_eq!(display_path(Path::new("/ws/pom.xml"), Some(base)), "pom.xml");
        assert_eq!(display_path(Path::new("/other/pom.xml"), Some(base)), "/other/pom.xml");
        assert_eq!(display_path(Path::new("rel/x"), None), "rel/x");
    }

    #[test]
    fn truncate_keeps_the_tail_on_char_boundaries() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("0123456789", 4), "...6789");
        let text = "aé€";
        let cut = truncate_string(text, 4);
        assert!(cut.ends_with('€'));
        assert!(cut.len() <= 4 + 3);
    }
}
