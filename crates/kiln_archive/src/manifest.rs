//! Jar manifest synthesis.
//!
//! Manifest lines are limited to 72 bytes; longer headers continue on the
//! next line after a single leading space. Lines end in CRLF and the main
//! section ends with an empty line.

/// Reserved location of the manifest inside a jar.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Maximum manifest line length in bytes, excluding the line terminator.
const MAX_LINE_BYTES: usize = 72;

/// Main-section attributes of a synthesized manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarManifest {
    /// Fully qualified entry point class.
    pub main_class: Option<String>,
    /// Runtime classpath entries, relative to the jar's location.
    pub class_path: Vec<String>,
    /// Tool identification written as `Created-By`.
    pub created_by: String,
}

impl JarManifest {
    /// Creates a manifest for `main_class` with no classpath.
    pub fn new(main_class: Option<String>) -> Self {
        Self {
            main_class,
            class_path: Vec::new(),
            created_by: format!("kiln {}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Renders the manifest bytes.
    pub fn render(&self) -> Vec<u8> {
        let mut out = String::new();
        write_header(&mut out, "Manifest-Version", "1.0");
        write_header(&mut out, "Created-By", &self.created_by);
        if let Some(main) = &self.main_class {
            write_header(&mut out, "Main-Class", main);
        }
        if !self.class_path.is_empty() {
            write_header(&mut out, "Class-Path", &self.class_path.join(" "));
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

/// Writes `name: value`, wrapping at [`MAX_LINE_BYTES`] without splitting a
/// UTF-8 sequence.
fn write_header(out: &mut String, name: &str, value: &str) {
    let line = format!("{name}: {value}");
    let mut limit = MAX_LINE_BYTES;
    let mut rest = line.as_str();
    let mut first = true;
    while !rest.is_empty() {
        if !first {
            out.push(' ');
        }
        let mut cut = rest.len().min(limit);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push_str(&rest[..cut]);
        out.push_str("\r\n");
        rest = &rest[cut..];
        first = false;
        limit = MAX_LINE_BYTES - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(m: &JarManifest) -> String {
        String::from_utf8(m.render()).unwrap()
    }

    #[test]
    fn minimal_manifest() {
        let mut m = JarManifest::new(Some("com.example.Main".to_string()));
        m.created_by = "kiln".to_string();
        assert_eq!(
            render(&m),
            "Manifest-Version: 1.0\r\nCreated-By: kiln\r\nMain-Class: com.example.Main\r\n\r\n"
        );
    }

    #[test]
    fn class_path_is_space_separated() {
        let mut m = JarManifest::new(None);
        m.class_path = vec!["lib/a.jar".to_string(), "lib/b.jar".to_string()];
        assert!(render(&m).contains("Class-Path: lib/a.jar lib/b.jar\r\n"));
        assert!(!render(&m).contains("Main-Class"));
    }

    #[test]
    fn long_lines_wrap_at_72_bytes() {
        let mut m = JarManifest::new(None);
        m.class_path = (0..20).map(|i| format!("lib/dependency-{i}.jar")).collect();
        let text = render(&m);
        for line in text.split("\r\n") {
            assert!(line.len() <= 72, "line too long: {line:?}");
        }

        // Unwrapping restores the original header.
        let unwrapped = text.replace("\r\n ", "");
        assert!(unwrapped.contains(&format!("Class-Path: {}", m.class_path.join(" "))));
    }

    #[test]
    fn wrapping_respects_utf8_boundaries() {
        let mut out = String::new();
        write_header(&mut out, "X", &"é".repeat(60));
        assert!(out.split("\r\n").all(|l| l.len() <= 72));
        assert_eq!(out.replace("\r\n ", "").trim_end(), format!("X: {}", "é".repeat(60)));
    }
}
