use std::path::{Path, PathBuf};

/// Minimal valid n-page PDF assembled with lopdf.
pub fn minimal_pdf(pages: usize) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("Failed to serialize PDF fixture");
    buf
}

/// Writes an executable shell script standing in for the OCR toolchain.
#[cfg(unix)]
pub fn write_tool(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ocrmypdf");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write tool script");
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Tool script that copies its input (second-to-last argument) to its
/// output (last argument), and answers `--version` for health probes.
#[cfg(unix)]
pub const COPY_TOOL: &str = r#"if [ "$1" = "--version" ]; then echo "16.4.0"; exit 0; fi
prev=""; last=""
for a in "$@"; do prev="$last"; last="$a"; done
cp "$prev" "$last""#;

pub const BOUNDARY: &str = "textlayer-test-boundary";

/// Hand-rolled multipart/form-data body builder for router-level tests.
pub struct FormBuilder {
    body: Vec<u8>,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}
