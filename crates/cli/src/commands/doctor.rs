//! `itzai doctor` — Diagnose system health.

use itzai_config::AppConfig;
use itzai_core::document::DocumentSource;
use itzai_pipeline::{DocumentExtractor, PdfExtractor};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 ItzAI Doctor — System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    println!("  ✅ Rust binary running");

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid");
                config
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                issues += 1;
                AppConfig::default()
            }
        }
    } else {
        println!("  ⚠️  No config file — run `itzai onboard` (using defaults)");
        issues += 1;
        AppConfig::default()
    };

    // Check API key and provider reachability
    if config.has_api_key() || config.default_provider == "ollama" {
        if config.has_api_key() {
            println!("  ✅ API key configured");
        }
        let router = itzai_providers::router::build_from_config(&config);
        match router.default() {
            Some(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
                Ok(false) => {
                    println!(
                        "  ❌ Provider '{}' rejected the request (check the key)",
                        provider.name()
                    );
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                    issues += 1;
                }
            },
            None => {
                println!("  ❌ No provider named '{}'", config.default_provider);
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  No API key configured — set GEMINI_API_KEY or add api_key to config.toml");
        issues += 1;
    }

    // Check the clinical history can actually be read
    let history = &config.documents.history_path;
    match PdfExtractor::new().extract(&DocumentSource::path(history)).await {
        Ok(text) if text.trim().is_empty() => {
            println!(
                "  ⚠️  {} has no extractable text (scanned document?)",
                history.display()
            );
            issues += 1;
        }
        Ok(text) => println!(
            "  ✅ Clinical history readable: {} ({} chars)",
            history.display(),
            text.chars().count()
        ),
        Err(e) => {
            println!("  ❌ Clinical history unavailable: {e}");
            issues += 1;
        }
    }

    if let Some(protocol) = &config.documents.protocol_path {
        match PdfExtractor::new().extract(&DocumentSource::path(protocol)).await {
            Ok(text) if !text.trim().is_empty() => {
                println!("  ✅ Treatment protocol readable: {}", protocol.display())
            }
            Ok(_) => {
                println!("  ⚠️  {} has no extractable text", protocol.display());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Treatment protocol unavailable: {e}");
                issues += 1;
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
