//! Lint: browser APIs stay out of the pure logic modules.
//!
//! Game logic runs under native `cargo test`, so any module that reaches for
//! `web_sys`/`js_sys` directly must keep those calls behind a
//! `target_arch = "wasm32"` gate with a native fallback. Only the entry point
//! (`main.rs`), which exists solely to run in the browser, is exempt.
//!
//! This test scans `src/` and flags browser API references in files that are
//! either not expected to touch the browser at all, or that touch it without
//! a wasm gate.

use std::fs;
use std::path::Path;

/// Files allowed to reference `web_sys`/`js_sys`. All but `main.rs` must
/// carry a `target_arch = "wasm32"` gate somewhere in the file.
const BROWSER_FILES: &[&str] = &["main.rs", "time.rs", "diag.rs", "identity.rs", "referrals.rs"];

fn references_browser_api(source: &str) -> bool {
    source.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed.starts_with("//") {
            return false;
        }
        trimmed.contains("web_sys::") || trimmed.contains("js_sys::")
    })
}

fn has_wasm_gate(source: &str) -> bool {
    source.contains(r#"target_arch = "wasm32""#)
}

#[test]
fn browser_apis_are_confined_and_gated() {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut violations = Vec::new();

    let entries = fs::read_dir(&src_dir).expect("src/ must be readable");
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map(|e| e != "rs").unwrap_or(true) {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let source = fs::read_to_string(&path).expect("source must be readable");

        if !references_browser_api(&source) {
            continue;
        }
        if !BROWSER_FILES.contains(&name.as_str()) {
            violations.push(format!(
                "{name}: references web_sys/js_sys but is a pure logic module"
            ));
        } else if name != "main.rs" && !has_wasm_gate(&source) {
            violations.push(format!(
                "{name}: references web_sys/js_sys without a target_arch = \"wasm32\" gate"
            ));
        }
    }

    if !violations.is_empty() {
        panic!(
            "Browser API usage outside the allowed, gated files:\n  {}",
            violations.join("\n  ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_browser_reference() {
        assert!(references_browser_api("let w = web_sys::window();"));
        assert!(references_browser_api("let t = js_sys::Date::now();"));
        assert!(!references_browser_api("let x = 1;"));
    }

    #[test]
    fn ignores_comments() {
        assert!(!references_browser_api("// uses web_sys::window at runtime"));
    }

    #[test]
    fn gate_detection() {
        assert!(has_wasm_gate(r#"#[cfg(target_arch = "wasm32")]"#));
        assert!(!has_wasm_gate("fn main() {}"));
    }
}
