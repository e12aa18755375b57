//! Small filename and display helpers shared by intake and the CLI.

/// Strips the last extension from `filename`. Names that would become empty
/// (dotfiles such as `.svg`) are returned unchanged.
pub fn base_name(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => filename,
        Some(idx) => &filename[..idx],
    }
}

/// Lowercase extension of `filename`, with `jpeg` folded to `jpg` and `heif`
/// to `heic`. A name without a dot yields the whole name lowercased.
pub fn file_extension(filename: &str) -> String {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_lowercase();
    match ext.as_str() {
        "jpeg" => "jpg".to_string(),
        "heif" => "heic".to_string(),
        _ => ext,
    }
}

/// Shortens `name` to at most `max_len` characters, keeping a short
/// extension (up to four characters after the dot) visible.
pub fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        return name.to_string();
    }

    if let Some(dot) = chars.iter().rposition(|c| *c == '.') {
        let ext_len = chars.len() - dot;
        if dot > 0 && ext_len <= 5 {
            let available = max_len.saturating_sub(ext_len + 1);
            if available > 3 {
                let base: String = chars[..available].iter().collect();
                let ext: String = chars[dot..].iter().collect();
                return format!("{}…{}", base, ext);
            }
        }
    }

    let head: String = chars[..max_len.saturating_sub(1)].iter().collect();
    format!("{}…", head)
}

/// Human-readable byte size: `512 B`, `1.5 KB`, `3.2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
