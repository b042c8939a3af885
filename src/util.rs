use std::path::PathBuf;

/// a path rooted at the crate's manifest directory
pub fn manifest_path<const N: usize>(segments: [&str; N]) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.extend(segments);
    path
}

pub fn relative_path<const N: usize>(segments: [&str; N]) -> PathBuf {
    segments.iter().collect()
}
