use std::path::Path;

/// Guesses a MIME type from a filename's extension, defaulting to
/// `application/octet-stream` when unknown.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| crate::model::FileMetadata::default_mime().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn known_extension_resolves() {
        assert_eq!(guess_mime(&PathBuf::from("notes.txt")), "text/plain");
    }

    #[test]
    fn unknown_extension_defaults() {
        assert_eq!(
            guess_mime(&PathBuf::from("blob.unknownext")),
            "application/octet-stream"
        );
    }
}
