/// Characters that never make it into an uploaded file name.
pub const RESERVED: &[char] = &[
    '.', ',', '?', '!', '@', '\'', '"', '\\', '/', ':', ';', '`', '#', '%', '<',
    '>', '|', '*', '&', '+', '=',
];

/// Extension given to every uploaded image.
pub const EXTENSION: &str = "jpg";

const MAX_STEM_LEN: usize = 128;
const FALLBACK_STEM: &str = "cat";

/// Derive the disk file name for a caption: reserved characters dropped,
/// whitespace runs turned into `_`, and a single `.jpg` appended.
///
/// `"Hello World!"` becomes `Hello_World.jpg`.
pub fn file_name(caption: &str) -> String {
    let stem = caption
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| !RESERVED.contains(c) && !c.is_control())
                .collect::<String>()
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    let (stem, _) = stem.split_at_floor_char_boundary(MAX_STEM_LEN);
    let stem = stem.trim_end_matches('_');

    if stem.is_empty() {
        format!("{FALLBACK_STEM}.{EXTENSION}")
    } else {
        format!("{stem}.{EXTENSION}")
    }
}

trait StrExt {
    /// Safely splits the string at `mid` (or the last valid char boundary).
    /// Unlike `std::str::split_at`, this will never panic.
    fn split_at_floor_char_boundary(&self, mid: usize) -> (&str, &str);

    /// Finds the largest `i <= index` such that `self.is_char_boundary(i)`.
    fn vendored_floor_char_boundary(&self, index: usize) -> usize;
}

impl StrExt for str {
    fn split_at_floor_char_boundary(&self, mid: usize) -> (&str, &str) {
        let floor_mid = self.vendored_floor_char_boundary(mid);
        self.split_at(floor_mid)
    }

    fn vendored_floor_char_boundary(&self, index: usize) -> usize {
        if index >= self.len() {
            return self.len();
        }

        // UTF-8 code points are 1-4 bytes
        let lower_bound = index.saturating_sub(3);
        (lower_bound..=index)
            .rev()
            .find(|idx| self.is_char_boundary(*idx))
            .unwrap_or(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_world() {
        assert_eq!(file_name("Hello World!"), "Hello_World.jpg");
    }

    #[test]
    fn test_reserved_characters_removed() {
        let captions = [
            "what? no. way, really!",
            r#"she said "hi" @ 10:30; ok"#,
            r"back\slash/and`tick'",
            "file.jpg",
            "a.b.c.",
            "50% off #cats <3 | * & + =",
        ];
        for caption in captions {
            let name = file_name(caption);
            let stem = name.strip_suffix(".jpg").expect("missing extension");
            assert!(
                !stem.contains(RESERVED),
                "{caption:?} -> {name:?} kept a reserved char"
            );
            assert!(!stem.ends_with(".jpg"));
            assert_eq!(name.matches('.').count(), 1, "{name:?}");
        }
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(file_name("  many   spaces\there "), "many_spaces_here.jpg");
        // A word made only of reserved chars leaves no double underscore
        assert_eq!(file_name("cats ! dogs"), "cats_dogs.jpg");
    }

    #[test]
    fn test_unicode_passthrough() {
        assert_eq!(file_name("Привет, мир!"), "Привет_мир.jpg");
    }

    #[test]
    fn test_empty_falls_back() {
        assert_eq!(file_name(""), "cat.jpg");
        assert_eq!(file_name("?!..."), "cat.jpg");
    }

    #[test]
    fn test_long_caption_truncated_on_char_boundary() {
        let caption = "ж".repeat(200);
        let name = file_name(&caption);
        let stem = name.strip_suffix(".jpg").unwrap();
        assert!(stem.len() <= MAX_STEM_LEN);
        assert!(stem.chars().all(|c| c == 'ж'));
    }
}
