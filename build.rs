use dotenvy::dotenv;
use std::env::var;

fn main() {
    println!("cargo:rustc-check-cfg=cfg(no_azure_key)");
    println!("cargo:rerun-if-env-changed=AZURE_OPENAI_KEY");

    dotenv().ok();

    if var("AZURE_OPENAI_KEY").is_err() {
        println!("cargo:rustc-cfg=no_azure_key");
    }
}
