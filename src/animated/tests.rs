// SPDX-License-Identifier: MPL-2.0

//! Unit tests for container detection.

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::super::detection::{is_gif_file, is_remote, looks_like_gif};

    #[test]
    fn test_is_gif_file() {
        assert!(is_gif_file(Path::new("test.gif")));
        assert!(is_gif_file(Path::new("test.GIF")));
        assert!(is_gif_file(Path::new("/path/to/animation.gif")));
        assert!(!is_gif_file(Path::new("test.mp4")));
        assert!(!is_gif_file(Path::new("test.png")));
    }

    #[test]
    fn test_case_insensitive_extensions() {
        let test_cases = [
            ("test.GIF", true),
            ("test.Gif", true),
            ("test.gif", true),
            ("test.gifv", false),
            ("test.webp", false),
        ];

        for (path, expected) in test_cases {
            assert_eq!(
                is_gif_file(Path::new(path)),
                expected,
                "Path {path} should return {expected}"
            );
        }
    }

    #[test]
    fn test_edge_cases() {
        // No extension
        assert!(!is_gif_file(Path::new("test")));
        assert!(!is_gif_file(Path::new("/path/to/file")));

        // Hidden files with extensions
        assert!(is_gif_file(Path::new(".hidden.gif")));

        // Multiple dots
        assert!(is_gif_file(Path::new("test.backup.gif")));

        // Weird paths
        assert!(is_gif_file(Path::new("./test.gif")));
        assert!(is_gif_file(Path::new("../test.gif")));
    }

    #[test]
    fn test_signatures() {
        assert!(looks_like_gif(b"GIF89a\x01\x00\x01\x00"));
        assert!(looks_like_gif(b"GIF87a"));
        assert!(!looks_like_gif(b"GIF88a"));
        assert!(!looks_like_gif(b"\x89PNG\r\n\x1a\n"));
        assert!(!looks_like_gif(b"GIF"));
        assert!(!looks_like_gif(b""));
    }

    #[test]
    fn test_remote_identifiers() {
        assert!(is_remote("https://example.com/a.gif"));
        assert!(is_remote("HTTP://example.com/a.gif"));
        assert!(!is_remote("spinner"));
        assert!(!is_remote("/tmp/spinner.gif"));
    }
}
