//! Shared fixtures for integration tests
//!
//! Builds a signed three-step demo supply chain (clone, update-version,
//! package) plus an `untar` inspection, with deterministic Ed25519 keys.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use toto_verify::{
    ArtifactMap, CommandOutput, CommandRunner, Digests, Envelope, Key, Link, LinkStore,
    LoadedLink, RunnerError, VerifyOptions,
};

pub const FOO_ORIGINAL: &str = "VERSION = \"foo-v0\"\n";
pub const FOO_UPDATED: &str = "VERSION = \"foo-v1\"\n";
pub const FOO_TAMPERED: &str = "VERSION = \"foo-v1\"\nimport os; os.system('evil')\n";
pub const TARBALL: &str = "gzip-compressed demo-project";

pub const FUTURE: &str = "2099-01-01T00:00:00Z";
pub const PAST: &str = "2001-01-01T00:00:00Z";

pub const CLONE_COMMAND: &[&str] = &["git", "clone", "https://github.com/in-toto/demo-project.git"];
pub const PACKAGE_COMMAND: &[&str] = &[
    "tar",
    "--exclude",
    ".git",
    "-zcvf",
    "demo-project.tar.gz",
    "demo-project",
];

/// Deterministic signing key
pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn public_key(signing_key: &SigningKey) -> Key {
    Key::from_verifying_key(&signing_key.verifying_key()).unwrap()
}

/// Project owner and functionaries
pub struct Parties {
    pub alice: SigningKey,
    pub bob: SigningKey,
    pub carl: SigningKey,
    pub dave: SigningKey,
}

impl Parties {
    pub fn new() -> Self {
        Self {
            alice: signing_key(1),
            bob: signing_key(2),
            carl: signing_key(3),
            dave: signing_key(4),
        }
    }
}

pub fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

pub fn digest(content: &str) -> Digests {
    let mut digests = Digests::new();
    digests.insert(
        "sha256".to_string(),
        hex::encode(Sha256::digest(content.as_bytes())),
    );
    digests
}

pub fn artifacts(entries: &[(&str, &str)]) -> ArtifactMap {
    entries
        .iter()
        .map(|(path, content)| (path.to_string(), digest(content)))
        .collect()
}

/// JCS envelope over `metadata` signed by every key in `signers`
pub fn sign<T: Serialize>(metadata: &T, signers: &[&SigningKey]) -> Envelope {
    let mut envelope = Envelope::from_metadata(metadata).unwrap();
    for signer in signers {
        envelope.sign(signer).unwrap();
    }
    envelope
}

fn keys_value(keys: &[&Key]) -> Value {
    let map: serde_json::Map<String, Value> = keys
        .iter()
        .map(|key| (key.keyid.clone(), serde_json::to_value(key).unwrap()))
        .collect();
    Value::Object(map)
}

/// The demo layout payload
pub fn demo_layout(parties: &Parties, expires: &str) -> Value {
    let bob = public_key(&parties.bob);
    let carl = public_key(&parties.carl);

    json!({
        "_type": "layout",
        "expires": expires,
        "readme": "demo supply chain",
        "keys": keys_value(&[&bob, &carl]),
        "steps": [{
            "name": "clone",
            "expected_materials": [],
            "expected_products": [["CREATE", "demo-project/foo.py"], ["DISALLOW", "*"]],
            "pubkeys": [bob.keyid],
            "expected_command": CLONE_COMMAND,
            "threshold": 1
        }, {
            "name": "update-version",
            "expected_materials": [
                ["MATCH", "demo-project/*", "WITH", "PRODUCTS", "FROM", "clone"],
                ["DISALLOW", "*"]
            ],
            "expected_products": [["MODIFY", "demo-project/foo.py"], ["DISALLOW", "*"]],
            "pubkeys": [bob.keyid],
            "expected_command": [],
            "threshold": 1
        }, {
            "name": "package",
            "expected_materials": [
                ["MATCH", "demo-project/*", "WITH", "PRODUCTS", "FROM", "update-version"],
                ["DISALLOW", "*"]
            ],
            "expected_products": [["CREATE", "demo-project.tar.gz"], ["DISALLOW", "*"]],
            "pubkeys": [carl.keyid],
            "expected_command": PACKAGE_COMMAND,
            "threshold": 1
        }],
        "inspect": [{
            "name": "untar",
            "expected_materials": [
                ["MATCH", "demo-project.tar.gz", "WITH", "PRODUCTS", "FROM", "package"],
                ["ALLOW", "alice.pub"],
                ["ALLOW", "root.layout"],
                ["DISALLOW", "*"]
            ],
            "expected_products": [
                ["MATCH", "demo-project/foo.py", "WITH", "PRODUCTS", "FROM", "update-version"],
                ["ALLOW", "demo-project.tar.gz"],
                ["ALLOW", "alice.pub"],
                ["ALLOW", "root.layout"],
                ["DISALLOW", "*"]
            ],
            "run": ["tar", "xzf", "demo-project.tar.gz"]
        }]
    })
}

pub fn link(
    name: &str,
    command: &[&str],
    materials: &[(&str, &str)],
    products: &[(&str, &str)],
) -> Link {
    let mut link = Link::new(name);
    link.command = strings(command);
    link.materials = artifacts(materials);
    link.products = artifacts(products);
    link.byproducts.return_value = Some(0);
    link
}

/// Links of an honest run, with the content `package` consumed
pub fn demo_links(package_input: &str) -> Vec<Link> {
    vec![
        link(
            "clone",
            CLONE_COMMAND,
            &[],
            &[("demo-project/foo.py", FOO_ORIGINAL)],
        ),
        link(
            "update-version",
            &[],
            &[("demo-project/foo.py", FOO_ORIGINAL)],
            &[("demo-project/foo.py", FOO_UPDATED)],
        ),
        link(
            "package",
            PACKAGE_COMMAND,
            &[("demo-project/foo.py", package_input)],
            &[("demo-project.tar.gz", TARBALL)],
        ),
    ]
}

/// The functionary who signs each demo step
pub fn demo_signer<'a>(parties: &'a Parties, step: &str) -> &'a SigningKey {
    match step {
        "package" => &parties.carl,
        _ => &parties.bob,
    }
}

/// Link store holding `links`, each signed by its demo functionary
pub fn signed_store(parties: &Parties, links: &[Link]) -> LinkStore {
    let mut store = LinkStore::new();
    for link in links {
        let envelope = sign(link, &[demo_signer(parties, &link.name)]);
        store.add(LoadedLink::from_envelope(envelope).unwrap());
    }
    store
}

/// Write `links` as `<step>.<keyid-prefix>.link` files into `dir`
pub fn write_link_files(parties: &Parties, links: &[Link], dir: &Path) {
    for link in links {
        let signer = demo_signer(parties, &link.name);
        let file_name = format!("{}.{}.link", link.name, public_key(signer).short_id());
        sign(link, &[signer])
            .write_to_file(&dir.join(file_name))
            .unwrap();
    }
}

/// Inspection directory as left after `package`
pub fn inspection_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("demo-project.tar.gz"), TARBALL).unwrap();
    fs::write(dir.path().join("alice.pub"), "alice public key").unwrap();
    fs::write(dir.path().join("root.layout"), "layout").unwrap();
    dir
}

pub fn options(work_dir: &Path) -> VerifyOptions {
    VerifyOptions {
        inspection_dir: work_dir.to_path_buf(),
        ..VerifyOptions::default()
    }
}

/// Runner that writes a fixed set of files and returns a fixed output
pub struct ScriptedRunner {
    pub files: Vec<(String, String)>,
    pub output: CommandOutput,
    pub calls: RefCell<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(files: &[(&str, &str)], return_value: i32) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
            output: CommandOutput {
                return_value: Some(return_value),
                ..CommandOutput::default()
            },
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Simulates `tar xzf demo-project.tar.gz`
    pub fn untar() -> Self {
        Self::new(&[("demo-project/foo.py", FOO_UPDATED)], 0)
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        command: &[String],
        work_dir: &Path,
        _timeout: Option<Duration>,
    ) -> Result<CommandOutput, RunnerError> {
        self.calls.borrow_mut().push(command.to_vec());
        for (path, content) in &self.files {
            let target = work_dir.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, content)?;
        }
        Ok(self.output.clone())
    }
}
