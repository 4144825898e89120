use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

struct SchemaRow {
    path: String,
    sha256: String,
    body: String,
}

fn main() {
    let manifest_dir =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let repo_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("repo root")
        .to_path_buf();
    let contracts_dir = repo_root.join("contracts/v1");
    let openapi_path = repo_root.join("openapi/v1.yaml");

    println!("cargo:rerun-if-changed={}", contracts_dir.display());
    println!("cargo:rerun-if-changed={}", openapi_path.display());

    let rows = collect_schemas(&repo_root, &contracts_dir);

    let mut set_hasher = Sha256::new();
    for row in &rows {
        set_hasher.update(row.path.as_bytes());
        set_hasher.update([0]);
        set_hasher.update(row.body.as_bytes());
        set_hasher.update([0]);
    }
    let contracts_set_sha = to_hex(&set_hasher.finalize());

    let openapi_bytes = fs::read(&openapi_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", openapi_path.display()));
    let openapi_sha = to_hex(&Sha256::digest(&openapi_bytes));
    let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let out = render(&openapi_sha, &contracts_set_sha, &generated_at, &rows);
    let out_path = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR"));
    fs::write(out_path.join("generated_contracts.rs"), out).expect("write generated_contracts.rs");
}

fn collect_schemas(repo_root: &Path, contracts_dir: &Path) -> Vec<SchemaRow> {
    let mut paths: Vec<PathBuf> = fs::read_dir(contracts_dir)
        .expect("read contracts/v1")
        .filter_map(|entry| entry.ok().map(|v| v.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".schema.json"))
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            println!("cargo:rerun-if-changed={}", path.display());
            let bytes = fs::read(&path)
                .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
            let sha256 = to_hex(&Sha256::digest(&bytes));
            let body = String::from_utf8(bytes)
                .unwrap_or_else(|e| panic!("schema is not valid utf-8 {}: {e}", path.display()));
            SchemaRow {
                path: contract_ref(repo_root, &path),
                sha256,
                body,
            }
        })
        .collect()
}

fn render(openapi_sha: &str, set_sha: &str, generated_at: &str, rows: &[SchemaRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "pub const GENERATED_OPENAPI_SHA256: &str = {openapi_sha:?};");
    let _ = writeln!(out, "pub const GENERATED_CONTRACTS_SET_SHA256: &str = {set_sha:?};");
    let _ = writeln!(out, "pub const GENERATED_AT_RFC3339: &str = {generated_at:?};");
    out.push_str("pub const GENERATED_CONTRACT_SCHEMAS: &[(&str, &str, &str)] = &[\n");
    for row in rows {
        let _ = writeln!(out, "    ({:?}, {:?}, {:?}),", row.path, row.sha256, row.body);
    }
    out.push_str("];\n");
    out
}

// Paths are recorded relative to openapi/, matching the $ref form used there.
fn contract_ref(repo_root: &Path, full_path: &Path) -> String {
    let rel = full_path
        .strip_prefix(repo_root)
        .unwrap_or_else(|e| panic!("failed to strip repo root from {}: {e}", full_path.display()));
    format!("../{}", rel.to_string_lossy().replace('\\', "/"))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
