//! Recording fake tool adapter and inspector for unit tests.
//!
//! Extraction and attach calls materialize scripted directory trees, so
//! resolver scenarios run without any macOS utility installed.

use super::error::{Error, Result};
use super::inspect::{IdentityCandidate, IdentityInspector, SignatureVerdict};
use super::resolver::TerminalArtifact;
use super::tools::{Tool, ToolAdapter, ToolOutput};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One entry of a scripted archive, image or package expansion.
#[derive(Clone, Debug)]
pub enum Entry {
    File(String, Vec<u8>),
    Dir(String),
}

pub fn file(path: &str, contents: &[u8]) -> Entry {
    Entry::File(path.to_string(), contents.to_vec())
}

pub fn dir(path: &str) -> Entry {
    Entry::Dir(path.to_string())
}

#[derive(Clone, Debug, Default)]
struct FakeImage {
    license_agreement: bool,
    entries: Vec<Entry>,
}

#[derive(Debug, Default)]
pub struct FakeTools {
    calls: Mutex<Vec<(Tool, Vec<String>)>>,
    archives: Mutex<HashMap<String, Vec<Entry>>>,
    images: Mutex<HashMap<String, FakeImage>>,
    expansions: Mutex<HashMap<String, Vec<Entry>>>,
    scripted: Mutex<HashMap<String, ToolOutput>>,
    mounted: Mutex<HashSet<PathBuf>>,
    convert_drops_output: Mutex<bool>,
}

fn materialize(root: &Path, entries: &[Entry]) {
    std::fs::create_dir_all(root).unwrap();
    for entry in entries {
        match entry {
            Entry::File(rel, contents) => {
                let path = root.join(rel);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, contents).unwrap();
            }
            Entry::Dir(rel) => std::fs::create_dir_all(root.join(rel)).unwrap(),
        }
    }
}

fn file_name(arg: &str) -> String {
    Path::new(arg)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the tree extracted from the archive called `name`.
    pub fn with_archive(self, name: &str, entries: Vec<Entry>) -> Self {
        self.archives.lock().unwrap().insert(name.into(), entries);
        self
    }

    /// Scripts the volume contents of the disk image called `name`.
    pub fn with_image(self, name: &str, license_agreement: bool, entries: Vec<Entry>) -> Self {
        self.images.lock().unwrap().insert(
            name.into(),
            FakeImage {
                license_agreement,
                entries,
            },
        );
        self
    }

    /// Scripts what `pkgutil --expand` writes for the package called `name`.
    pub fn with_expansion(self, name: &str, entries: Vec<Entry>) -> Self {
        self.expansions.lock().unwrap().insert(name.into(), entries);
        self
    }

    /// Forces the output for a call key: the tool name, or `hdiutil <verb>`,
    /// `pkgutil <flag>`, `codesign <flag>`.
    pub fn with_output(self, key: &str, output: ToolOutput) -> Self {
        self.scripted.lock().unwrap().insert(key.into(), output);
        self
    }

    /// Makes `hdiutil convert` succeed without writing its output file.
    pub fn with_convert_dropping_output(self) -> Self {
        *self.convert_drops_output.lock().unwrap() = true;
        self
    }

    pub fn calls(&self) -> Vec<(Tool, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Call keys in invocation order, e.g. `["unzip", "hdiutil attach"]`.
    pub fn call_keys(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|(tool, args)| Self::key(*tool, args))
            .collect()
    }

    pub fn count(&self, key: &str) -> usize {
        self.call_keys().iter().filter(|k| *k == key).count()
    }

    /// Mount points currently attached, the fake's mount table.
    pub fn mounted(&self) -> HashSet<PathBuf> {
        self.mounted.lock().unwrap().clone()
    }

    fn key(tool: Tool, args: &[String]) -> String {
        match tool {
            Tool::Hdiutil | Tool::Pkgutil | Tool::Codesign => match args.first() {
                Some(first) => format!("{} {}", tool, first),
                None => tool.to_string(),
            },
            _ => tool.to_string(),
        }
    }

    fn perform(&self, tool: Tool, args: &[String]) -> ToolOutput {
        match (tool, args.first().map(String::as_str)) {
            (Tool::Unzip, _) | (Tool::Tar, _) => {
                let archive = file_name(&args[1]);
                let dest = PathBuf::from(&args[3]);
                match self.archives.lock().unwrap().get(&archive) {
                    Some(entries) => {
                        materialize(&dest, entries);
                        ToolOutput::ok("")
                    }
                    None => ToolOutput::failed(9, format!("cannot find {archive}")),
                }
            }
            (Tool::Hdiutil, Some("imageinfo")) => {
                let name = file_name(&args[2]);
                match self.images.lock().unwrap().get(&name) {
                    Some(image) => ToolOutput::ok(imageinfo_plist(image.license_agreement)),
                    None => ToolOutput::failed(1, "image not recognized"),
                }
            }
            (Tool::Hdiutil, Some("convert")) => {
                let output = PathBuf::from(&args[4]);
                let source = file_name(&args[5]);
                let mut images = self.images.lock().unwrap();
                let Some(image) = images.get_mut(&source) else {
                    return ToolOutput::failed(1, "image not recognized");
                };
                // The converted file replaces the source under its name.
                image.license_agreement = false;
                let converted = image.clone();
                if !*self.convert_drops_output.lock().unwrap() {
                    std::fs::write(&output, b"converted").unwrap();
                }
                images.insert(file_name(&args[4]), converted);
                ToolOutput::ok("")
            }
            (Tool::Hdiutil, Some("attach")) => {
                let name = file_name(&args[1]);
                let mount_point = PathBuf::from(&args[3]);
                let images = self.images.lock().unwrap();
                let Some(image) = images.get(&name) else {
                    return ToolOutput::failed(1, "image not recognized");
                };
                if image.license_agreement {
                    return ToolOutput::failed(1, "license agreement not accepted");
                }
                materialize(&mount_point, &image.entries);
                self.mounted.lock().unwrap().insert(mount_point);
                ToolOutput::ok("")
            }
            (Tool::Hdiutil, Some("detach")) => {
                let mount_point = PathBuf::from(&args[1]);
                if self.mounted.lock().unwrap().remove(&mount_point) {
                    let _ = std::fs::remove_dir_all(&mount_point);
                    std::fs::create_dir_all(&mount_point).unwrap();
                    ToolOutput::ok("")
                } else {
                    ToolOutput::failed(1, "no such mount")
                }
            }
            (Tool::Pkgutil, Some("--expand")) => {
                let name = file_name(&args[1]);
                let dest = PathBuf::from(&args[2]);
                match self.expansions.lock().unwrap().get(&name) {
                    Some(entries) => {
                        materialize(&dest, entries);
                        ToolOutput::ok("")
                    }
                    None => ToolOutput::failed(1, "could not expand"),
                }
            }
            _ => ToolOutput::failed(127, "unscripted call"),
        }
    }
}

/// Minimal `hdiutil imageinfo -plist` document.
pub fn imageinfo_plist(license_agreement: bool) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Format</key>
    <string>UDZO</string>
    <key>Properties</key>
    <dict>
        <key>Encrypted</key>
        <false/>
        <key>Software License Agreement</key>
        <{}/>
    </dict>
</dict>
</plist>"#,
        license_agreement
    )
}

impl ToolAdapter for FakeTools {
    async fn run(&self, tool: Tool, args: &[String]) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push((tool, args.to_vec()));
        let key = Self::key(tool, args);
        if let Some(output) = self.scripted.lock().unwrap().get(&key) {
            return Ok(output.clone());
        }
        Ok(self.perform(tool, args))
    }
}

/// Inspector returning a fixed identity, optionally failing the signature read.
pub struct FakeInspector {
    pub candidates: Vec<IdentityCandidate>,
    pub signature_fails: bool,
}

impl FakeInspector {
    pub fn new(identifier: &str, version: &str) -> Self {
        Self {
            candidates: vec![IdentityCandidate {
                identifier: identifier.into(),
                version: version.into(),
                minimum_os: None,
            }],
            signature_fails: false,
        }
    }

    pub fn with_failing_signature(mut self) -> Self {
        self.signature_fails = true;
        self
    }
}

impl IdentityInspector for FakeInspector {
    async fn inspect_package(&self, _path: &Path) -> Result<Vec<IdentityCandidate>> {
        Ok(self.candidates.clone())
    }

    async fn inspect_app(&self, _path: &Path) -> Result<Vec<IdentityCandidate>> {
        Ok(self.candidates.clone())
    }

    async fn inspect_signature(&self, artifact: &TerminalArtifact) -> Result<SignatureVerdict> {
        if self.signature_fails {
            return Err(Error::Inspection(format!(
                "cannot read signature of {}",
                artifact.path.display()
            )));
        }
        Ok(SignatureVerdict {
            accepted: true,
            developer_id: "Vendor Software Inc".into(),
            developer_team: "ABCDE12345".into(),
        })
    }
}

/// Serves one canned HTTP response on a local port and returns the base URL.
pub async fn serve_once(response: Vec<u8>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(&response).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{addr}")
}

/// Raw HTTP/1.1 response with a `Content-Length` for `body`.
pub fn http_response(status: &str, headers: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n{headers}\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}
