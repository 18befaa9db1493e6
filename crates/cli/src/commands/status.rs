//! `itzai status` — Show system status.

use itzai_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🩺 ItzAI Status");
    println!("==============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Assistant:    {}", config.prompt.assistant_name);
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.effective_model());
    println!("  Temperature:  {}", config.default_temperature);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Char budget:  {} per document", config.documents.char_budget);
    println!("  History:      {}", describe_path(&config.documents.history_path));
    match &config.documents.protocol_path {
        Some(path) => println!("  Protocol:     {}", describe_path(path)),
        None => println!("  Protocol:     none configured"),
    }
    println!(
        "  Include protocol by default: {}",
        if config.documents.include_protocol { "yes" } else { "no" }
    );

    // Check config file existence
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `itzai onboard` first");
    }

    Ok(())
}

fn describe_path(path: &std::path::Path) -> String {
    if path.is_file() {
        format!("{} (found)", path.display())
    } else {
        format!("{} (missing)", path.display())
    }
}
