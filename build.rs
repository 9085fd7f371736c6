use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../config.template.toml");
    
    let template = r#"# streamkit configuration template
# Copy this file to 'streamkit.toml' and fill in your actual values

rtmp_chunk_size = 128
patpmt_interval_ms = 3000
pacer_reanchor_ms = 5000
pacer_slack_ms = 30
# listen_addr = "0.0.0.0:1935"
"#;
    
    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
